use crate::error::{FemError, Result};
use log::debug;
use ndarray::prelude::*;
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Represent an object whose data can be timestepped with an explicit scheme
pub trait ExplicitTimeSteppable {
    /// Get the current time
    fn time(&self) -> &f64;

    /// Get a mut reference to the current time
    fn time_mut(&mut self) -> &mut f64;

    /// Get an `ArrayView1` into the current state of the degrees of freedom
    fn dofs(&self) -> ArrayView1<f64>;

    /// Set the object's degrees of freedom from `dofs`
    fn set_dofs(&mut self, dofs: ArrayView1<f64>);

    /// Perform `dofs += factor * increment`
    fn increment_and_multiply_dofs(&mut self, increment: ArrayView1<f64>, factor: f64);

    /// Gets an owned array of the current right-hand side values
    fn rhs(&self) -> Array1<f64>;

    /// Actions performed before each explicit timestep
    fn actions_before_explicit_timestep(&mut self) { }

    /// Actions performed before each stage of the scheme
    fn actions_before_explicit_stage(&mut self) { }

    /// Actions performed after each stage of the scheme
    fn actions_after_explicit_stage(&mut self) { }

    /// Actions performed after each explicit timestep
    fn actions_after_explicit_timestep(&mut self) { }
}

/// Relative and absolute error tolerances of an adaptive scheme
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Tolerances {
            rtol: 1e-3,
            atol: 1e-6,
        }
    }
}

// Dormand-Prince 5(4) tableau
const C: [f64; 6] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0];
const A: [[f64; 5]; 6] = [
    [0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0],
    [19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0, 0.0],
    [9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0, 49.0 / 176.0, -5103.0 / 18656.0],
];
const B: [f64; 6] = [35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0];
/// Difference between the fifth- and embedded fourth-order weights, last entry for the
/// first-same-as-last stage
const E: [f64; 7] = [
    -71.0 / 57600.0,
    0.0,
    71.0 / 16695.0,
    -71.0 / 1920.0,
    17253.0 / 339200.0,
    -22.0 / 525.0,
    1.0 / 40.0,
];

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const ERROR_EXPONENT: f64 = -1.0 / 5.0;

/// Distance from `t` to the next larger float
fn spacing(t: f64) -> f64 {
    let t = t.abs();
    f64::from_bits(t.to_bits() + 1) - t
}

/// RMS norm of `v / scale`. Components where both are zero contribute nothing, so an exactly
/// zero state stays measurable with `atol = 0`.
fn rms_norm(v: &Array1<f64>, scale: &Array1<f64>) -> f64 {
    if v.is_empty() {
        return 0.0;
    }

    let sum = Zip::from(v).and(scale).fold(0.0, |acc, &x, &s| {
        if x == 0.0 && s == 0.0 {
            acc
        } else {
            acc + (x / s) * (x / s)
        }
    });
    (sum / v.len() as f64).sqrt()
}

/// Adaptive explicit Runge-Kutta 4(5) of Dormand and Prince with local extrapolation.
///
/// Each call to `step` makes one accepted step of at most `max_step`, never passing
/// `t_bound`. The step is controlled by the RMS norm of the embedded error estimate scaled
/// by `atol + rtol * max(|y|, |y_new|)`. The stepper keeps the right-hand side at the end of
/// the last accepted step, so the object must not be modified between steps.
#[derive(Clone, Debug)]
pub struct DormandPrince45 {
    tolerances: Tolerances,
    max_step: f64,
    t_bound: f64,
    h_abs: Option<f64>,
    f: Option<Array1<f64>>,
    n_rejected: usize,
}

impl DormandPrince45 {
    pub fn new(tolerances: Tolerances, max_step: f64, t_bound: f64) -> Result<Self> {
        if !(max_step > 0.0) {
            return Err(FemError::InvalidParameter(format!(
                "max_step must be positive, got {}",
                max_step
            )));
        }
        if !(tolerances.rtol >= 0.0 && tolerances.atol >= 0.0) {
            return Err(FemError::InvalidParameter(format!(
                "tolerances must be non-negative, got {:?}",
                tolerances
            )));
        }

        Ok(DormandPrince45 {
            tolerances,
            max_step,
            t_bound,
            h_abs: None,
            f: None,
            n_rejected: 0,
        })
    }

    pub fn t_bound(&self) -> f64 {
        self.t_bound
    }

    /// Number of rejected step attempts so far
    pub fn n_rejected(&self) -> usize {
        self.n_rejected
    }

    fn scale(&self, y: &Array1<f64>, y_new: Option<&Array1<f64>>) -> Array1<f64> {
        let Tolerances { rtol, atol } = self.tolerances;
        match y_new {
            Some(y_new) => Zip::from(y)
                .and(y_new)
                .map_collect(|&a, &b| atol + rtol * a.abs().max(b.abs())),
            None => y.mapv(|a| atol + rtol * a.abs()),
        }
    }

    /// Evaluate the right-hand side at `t` and `y + h * Σ a_j k_j`
    fn stage<T>(obj: &mut T, y: &Array1<f64>, t: f64, h: f64, ks: &[Array1<f64>], a: &[f64]) -> Array1<f64>
    where
        T: ExplicitTimeSteppable,
    {
        obj.set_dofs(y.view());
        for (k, &a_j) in ks.iter().zip(a) {
            if a_j != 0.0 {
                obj.increment_and_multiply_dofs(k.view(), h * a_j);
            }
        }
        *obj.time_mut() = t;

        obj.actions_before_explicit_stage();
        let k = obj.rhs();
        obj.actions_after_explicit_stage();
        k
    }

    /// Initial step from the size of the state and of its first two derivatives, after
    /// Hairer, Nørsett & Wanner (1993), Sec. II.4
    fn initial_step<T>(&self, obj: &mut T, y0: &Array1<f64>, f0: &Array1<f64>, t0: f64) -> f64
    where
        T: ExplicitTimeSteppable,
    {
        let interval = self.t_bound - t0;
        if y0.is_empty() {
            return interval;
        }

        let scale = self.scale(y0, None);
        let d0 = rms_norm(y0, &scale);
        let d1 = rms_norm(f0, &scale);
        let h0 = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };
        let h0 = h0.min(interval);

        let f1 = Self::stage(obj, y0, t0 + h0, h0, std::slice::from_ref(f0), &[1.0]);
        let d2 = rms_norm(&(&f1 - f0), &scale) / h0;

        let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(1.0 / 5.0)
        };

        (100.0 * h0).min(h1).min(interval)
    }

    /// Make one accepted step, returning its length. Returns 0 without touching `obj` once
    /// `t_bound` is reached. Fails with `FemError::StepSizeTooSmall`, leaving `obj` at the
    /// last accepted state, when the error cannot be controlled above the smallest step the
    /// current time can resolve.
    pub fn step<T>(&mut self, obj: &mut T) -> Result<f64>
    where
        T: ExplicitTimeSteppable,
    {
        let t = *obj.time();
        if t >= self.t_bound {
            return Ok(0.0);
        }

        obj.actions_before_explicit_timestep();

        let y = obj.dofs().to_owned();
        let f = match self.f.take() {
            Some(f) => f,
            None => Self::stage(obj, &y, t, 0.0, &[], &[]),
        };
        let mut h_abs = match self.h_abs {
            Some(h_abs) => h_abs,
            None => self.initial_step(obj, &y, &f, t),
        };

        let min_step = 10.0 * spacing(t);
        if h_abs > self.max_step {
            h_abs = self.max_step;
        } else if h_abs < min_step {
            h_abs = min_step;
        }

        let mut rejected = false;
        loop {
            if h_abs < min_step {
                obj.set_dofs(y.view());
                *obj.time_mut() = t;
                return Err(FemError::StepSizeTooSmall { time: t, step: h_abs });
            }

            let t_new = (t + h_abs).min(self.t_bound);
            let h = t_new - t;

            let mut ks: Vec<Array1<f64>> = Vec::with_capacity(7);
            ks.push(f.clone());
            for s in 1..6 {
                let k = Self::stage(obj, &y, t + C[s] * h, h, &ks, &A[s][..s]);
                ks.push(k);
            }

            let mut y_new = y.clone();
            for (k, &b) in ks.iter().zip(B.iter()) {
                if b != 0.0 {
                    y_new.scaled_add(h * b, k);
                }
            }
            let f_new = Self::stage(obj, &y_new, t_new, 0.0, &[], &[]);
            ks.push(f_new);

            let mut error = Array1::zeros(y.len());
            for (k, &e) in ks.iter().zip(E.iter()) {
                if e != 0.0 {
                    error.scaled_add(h * e, k);
                }
            }
            let error_norm = rms_norm(&error, &self.scale(&y, Some(&y_new)));

            if error_norm < 1.0 {
                let mut factor = if error_norm == 0.0 {
                    MAX_FACTOR
                } else {
                    MAX_FACTOR.min(SAFETY * error_norm.powf(ERROR_EXPONENT))
                };
                if rejected {
                    factor = factor.min(1.0);
                }

                obj.set_dofs(y_new.view());
                *obj.time_mut() = t_new;
                self.h_abs = Some((h * factor).max(0.0));
                self.f = ks.pop();

                debug!("Accepted step t = {:.6e}, h = {:.3e}, error = {:.3e}", t_new, h, error_norm);
                obj.actions_after_explicit_timestep();
                return Ok(h);
            }

            h_abs = h * MIN_FACTOR.max(SAFETY * error_norm.powf(ERROR_EXPONENT));
            rejected = true;
            self.n_rejected += 1;
            debug!("Rejected step t = {:.6e}, h = {:.3e}, error = {:.3e}", t, h, error_norm);
        }
    }
}
