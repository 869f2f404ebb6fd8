//! The homogeneous wave equation `u_tt = Δu` on the unit square, written as the first-order
//! system `d/dt [u; v] = [[0, I], [A, 0]] [u; v]` with `A = -M⁻¹K`, and integrated with an
//! adaptive Runge-Kutta scheme.

use crate::assembly::{Assembler, IntegrationMode, StiffnessEvaluation};
use crate::boundary::BoundaryMarker;
use crate::error::{FemError, Result};
use crate::interpolation::SpaceTimeInterpolant;
use crate::linalg::DenseLu;
use crate::mesh::Mesh;
use crate::timestepping::{DormandPrince45, ExplicitTimeSteppable, Tolerances};
use log::info;
use nalgebra::Point2;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Initial displacement of the membrane. The velocity always starts at zero.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialDisplacement {
    /// `height - r` inside the disc of radius `radius` about the centre, where `r` is the
    /// distance to the centre, and zero outside
    Bump {
        center_x: f64,
        center_y: f64,
        radius: f64,
        height: f64,
    },
    /// Zero displacement everywhere
    Rest,
}

impl Default for InitialDisplacement {
    fn default() -> Self {
        InitialDisplacement::Bump {
            center_x: 0.5,
            center_y: 0.5,
            radius: 0.2,
            height: 0.5,
        }
    }
}

impl InitialDisplacement {
    pub fn value(&self, p: &Point2<f64>) -> f64 {
        match *self {
            InitialDisplacement::Bump {
                center_x,
                center_y,
                radius,
                height,
            } => {
                let r = (p.x - center_x).hypot(p.y - center_y);
                if r <= radius {
                    height - r
                } else {
                    0.0
                }
            }
            InitialDisplacement::Rest => 0.0,
        }
    }

    /// Nodal values on `mesh`, pinned to zero on all four sides of the square
    pub fn nodal_values(&self, mesh: &Mesh) -> Array1<f64> {
        let boundary = BoundaryMarker::All;
        mesh.vertex_iter()
            .map(|p| if boundary.contains(p.x, p.y) { 0.0 } else { self.value(&p) })
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveParameters {
    pub t_start: f64,
    pub t_end: f64,
    /// Upper bound on the adaptive step
    pub max_timestep: f64,
    pub tolerances: Tolerances,
    pub stiffness: StiffnessEvaluation,
    pub initial_displacement: InitialDisplacement,
}

impl Default for WaveParameters {
    fn default() -> Self {
        WaveParameters {
            t_start: 0.0,
            t_end: 1.0,
            max_timestep: 0.01,
            tolerances: Tolerances::default(),
            stiffness: StiffnessEvaluation::Fast,
            initial_displacement: InitialDisplacement::default(),
        }
    }
}

/// State `[u; v]` of the semi-discrete wave equation
pub struct WaveProblem {
    pub time: f64,
    state: Array1<f64>,
    /// `A = -M⁻¹K`
    operator: Array2<f64>,
    n_vertex: usize,
}

impl WaveProblem {
    pub fn new(operator: Array2<f64>, u0: ArrayView1<f64>, v0: ArrayView1<f64>, t_start: f64) -> Result<Self> {
        let n_vertex = operator.nrows();
        if operator.ncols() != n_vertex {
            return Err(FemError::DimensionMismatch {
                expected: n_vertex,
                got: operator.ncols(),
            });
        }
        for len in [u0.len(), v0.len()].iter() {
            if *len != n_vertex {
                return Err(FemError::DimensionMismatch {
                    expected: n_vertex,
                    got: *len,
                });
            }
        }

        let mut state = Array1::zeros(2 * n_vertex);
        state.slice_mut(s![..n_vertex]).assign(&u0);
        state.slice_mut(s![n_vertex..]).assign(&v0);

        Ok(WaveProblem {
            time: t_start,
            state,
            operator,
            n_vertex,
        })
    }

    pub fn displacement(&self) -> ArrayView1<f64> {
        self.state.slice(s![..self.n_vertex])
    }

    pub fn velocity(&self) -> ArrayView1<f64> {
        self.state.slice(s![self.n_vertex..])
    }
}

impl ExplicitTimeSteppable for WaveProblem {
    fn time(&self) -> &f64 {
        &self.time
    }

    fn time_mut(&mut self) -> &mut f64 {
        &mut self.time
    }

    fn dofs(&self) -> ArrayView1<f64> {
        self.state.view()
    }

    fn set_dofs(&mut self, dofs: ArrayView1<f64>) {
        self.state.assign(&dofs);
    }

    fn increment_and_multiply_dofs(&mut self, increment: ArrayView1<f64>, factor: f64) {
        self.state.scaled_add(factor, &increment);
    }

    fn rhs(&self) -> Array1<f64> {
        let mut rhs = Array1::zeros(2 * self.n_vertex);
        rhs.slice_mut(s![..self.n_vertex]).assign(&self.velocity());
        rhs.slice_mut(s![self.n_vertex..]).assign(&self.operator.dot(&self.displacement()));
        rhs
    }
}

/// One `(t, x, y, u)` sample of the displacement
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpaceTimeSample {
    pub t: f64,
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

/// Every accepted state of a time integration
#[derive(Clone, Debug)]
pub struct Trajectory {
    times: Vec<f64>,
    states: Vec<Array1<f64>>,
    n_vertex: usize,
}

impl Trajectory {
    pub fn new(n_vertex: usize) -> Self {
        Trajectory {
            times: Vec::new(),
            states: Vec::new(),
            n_vertex,
        }
    }

    pub fn push(&mut self, time: f64, state: ArrayView1<f64>) {
        self.times.push(time);
        self.states.push(state.to_owned());
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn displacement(&self, k: usize) -> ArrayView1<f64> {
        self.states[k].slice(s![..self.n_vertex])
    }

    pub fn velocity(&self, k: usize) -> ArrayView1<f64> {
        self.states[k].slice(s![self.n_vertex..])
    }

    /// Displacements with one row per retained time
    pub fn displacements(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.len(), self.n_vertex));
        for (k, mut row) in out.rows_mut().into_iter().enumerate() {
            row.assign(&self.displacement(k));
        }
        out
    }

    /// The displacement as a `(t, x, y, u)` cloud, time-major
    pub fn samples(&self, mesh: &Mesh) -> Vec<SpaceTimeSample> {
        let mut samples = Vec::with_capacity(self.len() * self.n_vertex);
        for (k, &t) in self.times.iter().enumerate() {
            let u = self.displacement(k);
            for (idx, p) in mesh.vertex_iter().enumerate() {
                samples.push(SpaceTimeSample {
                    t,
                    x: p.x,
                    y: p.y,
                    value: u[idx],
                });
            }
        }
        samples
    }

    /// Discrete energy `½(uᵀKu + vᵀMv)` at every retained time
    pub fn energies(&self, stiffness: ArrayView2<f64>, mass: ArrayView2<f64>) -> Vec<f64> {
        (0..self.len())
            .map(|k| {
                let u = self.displacement(k);
                let v = self.velocity(k);
                0.5 * (u.dot(&stiffness.dot(&u)) + v.dot(&mass.dot(&v)))
            })
            .collect()
    }

    /// Write `t x y u` rows, one per sample
    pub fn output(&self, mesh: &Mesh, buffer: &mut impl Write) -> std::io::Result<()> {
        buffer.write_all(b"t x y u\n")?;
        for sample in self.samples(mesh) {
            buffer.write_all(
                format!(
                    "{:.6e} {:.6e} {:.6e} {:.6e}\n",
                    sample.t, sample.x, sample.y, sample.value
                )
                .as_bytes(),
            )?;
        }
        Ok(())
    }
}

/// Everything produced by a wave solve
pub struct WaveSolution {
    pub trajectory: Trajectory,
    pub interpolant: SpaceTimeInterpolant,
    pub mass: Array2<f64>,
    pub stiffness: Array2<f64>,
    /// Number of step attempts the error control rejected
    pub n_rejected: usize,
}

impl WaveSolution {
    pub fn energies(&self) -> Vec<f64> {
        self.trajectory.energies(self.stiffness.view(), self.mass.view())
    }
}

/// Integrate the wave equation from `params.t_start` to `params.t_end`, keeping every
/// accepted step
pub fn simulate(mesh: &Mesh, params: &WaveParameters, mode: IntegrationMode) -> Result<WaveSolution> {
    if !(params.t_end >= params.t_start) {
        return Err(FemError::InvalidParameter(format!(
            "t_end = {} lies before t_start = {}",
            params.t_end, params.t_start
        )));
    }

    let assembler = Assembler::new(mesh, mode)?;
    let mass = assembler.mass_matrix()?;
    let stiffness = assembler.stiffness_matrix(params.stiffness)?;

    let operator = -DenseLu::new(mass.view())?.solve_matrix(stiffness.view())?;

    info!("Solving system in time domain");
    let n_vertex = mesh.n_vertex();
    let u0 = params.initial_displacement.nodal_values(mesh);
    let v0 = Array1::zeros(n_vertex);
    let mut problem = WaveProblem::new(operator, u0.view(), v0.view(), params.t_start)?;
    let mut stepper = DormandPrince45::new(params.tolerances, params.max_timestep, params.t_end)?;

    let mut trajectory = Trajectory::new(n_vertex);
    trajectory.push(problem.time, problem.dofs());
    while problem.time < params.t_end {
        stepper.step(&mut problem)?;
        trajectory.push(problem.time, problem.dofs());
    }
    info!(
        "Made {} time steps ({} rejected)",
        trajectory.len(),
        stepper.n_rejected()
    );

    info!("Generating interpolator");
    let interpolant = SpaceTimeInterpolant::new(
        mesh.clone(),
        trajectory.times().to_vec(),
        trajectory.displacements(),
    )?;

    Ok(WaveSolution {
        trajectory,
        interpolant,
        mass,
        stiffness,
        n_rejected: stepper.n_rejected(),
    })
}

/// Integrate the wave equation and return the displacement as a function of `(t, x, y)`
pub fn solve_dynamic(mesh: &Mesh, params: &WaveParameters, mode: IntegrationMode) -> Result<SpaceTimeInterpolant> {
    Ok(simulate(mesh, params, mode)?.interpolant)
}
