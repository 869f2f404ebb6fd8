//! Globally adaptive Gauss-Kronrod integration in one and two dimensions

use super::Estimate;
use log::warn;
use nalgebra::Point2;

/// Kronrod abscissae on [0, 1]; the odd entries are the 7-point Gauss abscissae
const XGK: [f64; 8] = [
    0.991455371120812639206854697526329,
    0.949107912342758524526189684047851,
    0.864864423359769072789712788640926,
    0.741531185599394439863864773280788,
    0.586087235467691130294144845693013,
    0.405845151377397166906606412076961,
    0.207784955007898467600689403773245,
    0.000000000000000000000000000000000,
];

const WGK: [f64; 8] = [
    0.022935322010529224963732008058970,
    0.063092092629978553290700663189204,
    0.104790010322250183839876322541518,
    0.140653259715525918745189590510238,
    0.169004726639267902826583426598550,
    0.190350578064785409913256402421014,
    0.204432940075298892414161999234649,
    0.209482141084727828012999174891714,
];

const WG: [f64; 4] = [
    0.129484966168869693270611432679082,
    0.279705391489276667901467771423780,
    0.381830050505118944950369775488975,
    0.417959183673469387755102040816327,
];

/// 15-point Kronrod estimate of ∫_a^b f and its distance from the embedded 7-point Gauss
/// estimate
fn kronrod15<F>(f: &mut F, a: f64, b: f64) -> (f64, f64)
where
    F: FnMut(f64) -> f64,
{
    let center = 0.5 * (a + b);
    let half_length = 0.5 * (b - a);

    let f_center = f(center);
    let mut result_kronrod = WGK[7] * f_center;
    let mut result_gauss = WG[3] * f_center;

    for j in 0..7 {
        let dx = half_length * XGK[j];
        let f_pair = f(center - dx) + f(center + dx);
        result_kronrod += WGK[j] * f_pair;
        if j % 2 == 1 {
            result_gauss += WG[j / 2] * f_pair;
        }
    }

    (
        result_kronrod * half_length,
        ((result_kronrod - result_gauss) * half_length).abs(),
    )
}

#[derive(Clone, Copy, Debug)]
struct Interval {
    a: f64,
    b: f64,
    value: f64,
    error: f64,
}

/// Bisects the interval with the largest error estimate until the total error drops below
/// `max(epsabs, epsrel * |integral|)` or `limit` intervals are in use
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdaptiveIntegrator {
    pub epsabs: f64,
    pub epsrel: f64,
    pub limit: usize,
}

impl AdaptiveIntegrator {
    pub const DEFAULT_LIMIT: usize = 50;

    /// Use `tolerance` as both the absolute and the relative tolerance
    pub fn new(tolerance: f64) -> Self {
        AdaptiveIntegrator {
            epsabs: tolerance,
            epsrel: tolerance,
            limit: Self::DEFAULT_LIMIT,
        }
    }

    fn tolerance(&self, value: f64) -> f64 {
        self.epsabs.max(self.epsrel * value.abs())
    }

    /// ∫_a^b f(x) dx
    pub fn integrate<F>(&self, mut f: F, a: f64, b: f64) -> Estimate
    where
        F: FnMut(f64) -> f64,
    {
        if a == b {
            return Estimate::exact(0.0);
        }

        let (value, error) = kronrod15(&mut f, a, b);
        let mut intervals = vec![Interval { a, b, value, error }];
        let mut total_value = value;
        let mut total_error = error;

        while total_error > self.tolerance(total_value) && intervals.len() < self.limit {
            let worst = intervals
                .iter()
                .enumerate()
                .max_by(|(_, l), (_, r)| l.error.total_cmp(&r.error))
                .map(|(idx, _)| idx)
                .unwrap_or(0);
            let parent = intervals.swap_remove(worst);
            let mid = 0.5 * (parent.a + parent.b);

            let (left_value, left_error) = kronrod15(&mut f, parent.a, mid);
            let (right_value, right_error) = kronrod15(&mut f, mid, parent.b);

            total_value += left_value + right_value - parent.value;
            total_error += left_error + right_error - parent.error;

            intervals.push(Interval { a: parent.a, b: mid, value: left_value, error: left_error });
            intervals.push(Interval { a: mid, b: parent.b, value: right_value, error: right_error });
        }

        // Re-sum to shed the rounding picked up by the running updates
        let value = intervals.iter().map(|i| i.value).sum();
        let error: f64 = intervals.iter().map(|i| i.error).sum();

        Estimate {
            value,
            error,
            converged: error <= self.tolerance(value),
        }
    }

    /// ∫_a^b ∫_{lower(x)}^{upper(x)} f(x, y) dy dx
    pub fn dblquad<F, G, H>(&self, mut f: F, a: f64, b: f64, lower: G, upper: H) -> Estimate
    where
        F: FnMut(&Point2<f64>) -> f64,
        G: Fn(f64) -> f64,
        H: Fn(f64) -> f64,
    {
        let mut inner_converged = true;
        let mut inner_error = 0.0_f64;

        let outer = self.integrate(
            |x| {
                let inner = self.integrate(|y| f(&Point2::new(x, y)), lower(x), upper(x));
                inner_converged &= inner.converged;
                inner_error = inner_error.max(inner.error);
                inner.value
            },
            a,
            b,
        );

        let converged = outer.converged && inner_converged;
        if !converged {
            warn!(
                "Adaptive integration did not reach the requested tolerance (outer error {:e}, worst inner error {:e})",
                outer.error, inner_error
            );
        }

        Estimate {
            value: outer.value,
            error: outer.error + (b - a).abs() * inner_error,
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn polynomial_in_one_pass() {
        let integrator = AdaptiveIntegrator::new(1e-10);
        let mut calls = 0;
        let estimate = integrator.integrate(
            |x| {
                calls += 1;
                x.powi(5) - 2.0 * x
            },
            0.0,
            2.0,
        );
        assert_abs_diff_eq!(estimate.value, 64.0 / 6.0 - 4.0, epsilon = 1e-12);
        assert!(estimate.converged);
        assert_eq!(calls, 15);
    }

    #[test]
    fn empty_interval() {
        let estimate = AdaptiveIntegrator::new(1e-8).integrate(|x| x, 0.3, 0.3);
        assert_eq!(estimate, Estimate::exact(0.0));
    }

    #[test]
    fn reversed_interval() {
        let estimate = AdaptiveIntegrator::new(1e-10).integrate(|x| x * x, 1.0, 0.0);
        assert_abs_diff_eq!(estimate.value, -1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn oscillatory_needs_subdivision() {
        let estimate = AdaptiveIntegrator::new(1e-10).integrate(|x| (20.0 * x).sin(), 0.0, PI);
        let exact = (1.0 - (20.0 * PI).cos()) / 20.0;
        assert_abs_diff_eq!(estimate.value, exact, epsilon = 1e-9);
        assert!(estimate.converged);
    }

    #[test]
    fn step_function() {
        let estimate = AdaptiveIntegrator::new(1e-6)
            .integrate(|x| if x < 0.3 { 1.0 } else { 0.0 }, 0.0, 1.0);
        assert_abs_diff_eq!(estimate.value, 0.3, epsilon = 1e-5);
    }

    #[test]
    fn limit_reports_non_convergence() {
        let integrator = AdaptiveIntegrator {
            epsabs: 1e-14,
            epsrel: 0.0,
            limit: 2,
        };
        let estimate = integrator.integrate(|x| x.abs().sqrt(), -1.0, 1.0);
        assert!(!estimate.converged);
        assert!(estimate.error > 0.0);
    }

    #[test]
    fn triangle_area() {
        let estimate = AdaptiveIntegrator::new(1e-10).dblquad(|_| 1.0, 0.0, 1.0, |_| 0.0, |x| 1.0 - x);
        assert_abs_diff_eq!(estimate.value, 0.5, epsilon = 1e-14);
        assert!(estimate.converged);
    }

    #[test]
    fn smooth_over_square() {
        let estimate = AdaptiveIntegrator::new(1e-10).dblquad(
            |p| (PI * p.x).sin() * (PI * p.y).sin(),
            0.0,
            1.0,
            |_| 0.0,
            |_| 1.0,
        );
        assert_abs_diff_eq!(estimate.value, 4.0 / (PI * PI), epsilon = 1e-10);
    }
}
