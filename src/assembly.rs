//! Global mass and stiffness matrices and load vectors, accumulated triangle by triangle
//! in mesh order

use crate::affine::CellMap;
use crate::error::{FemError, Result};
use crate::functions::ScalarFunction;
use crate::mesh::{Mesh, Triangle};
use crate::quadrature::adaptive::AdaptiveIntegrator;
use crate::quadrature::{RuleKind, TriangleQuadrature};
use crate::reference_element::{P1ReferenceElement, ReferenceElement};
use crate::utilities::{max, min};
use log::info;
use nalgebra::{Matrix3, Point2, Vector3};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// How element integrals are evaluated
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMode {
    /// A fixed rule on the reference triangle, pushed forward through the affine map
    Quadrature { rule: RuleKind },
    /// Adaptive Gauss-Kronrod integration; `tolerance` is both the absolute and the
    /// relative tolerance. Load integrals run over the physical triangle's bounding box.
    Adaptive { tolerance: f64 },
}

impl IntegrationMode {
    pub const DEFAULT_TOLERANCE: f64 = 1.49e-5;

    pub fn adaptive() -> Self {
        IntegrationMode::Adaptive {
            tolerance: Self::DEFAULT_TOLERANCE,
        }
    }
}

impl Default for IntegrationMode {
    fn default() -> Self {
        IntegrationMode::Quadrature {
            rule: RuleKind::SevenPoint,
        }
    }
}

/// How the stiffness integrand is evaluated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StiffnessEvaluation {
    /// Evaluate the gradient product at every integration point
    Exact,
    /// Evaluate the gradient product once at `FAST_GRADIENT_POINT` and integrate it as a
    /// constant cut off to zero where `x + y > 1`. With adaptive integration the cutoff is
    /// integrated over the whole unit square, so the result is only approximate.
    Fast,
}

/// Interior reference point at which the fast stiffness integrand samples the gradients
pub const FAST_GRADIENT_POINT: (f64, f64) = (0.1, 0.1);

#[derive(Clone, Debug)]
enum Integrator {
    Quadrature(TriangleQuadrature),
    Adaptive(AdaptiveIntegrator),
}

impl TryFrom<IntegrationMode> for Integrator {
    type Error = FemError;

    fn try_from(mode: IntegrationMode) -> Result<Self> {
        match mode {
            IntegrationMode::Quadrature { rule } => {
                Ok(Integrator::Quadrature(TriangleQuadrature::new(rule)))
            }
            IntegrationMode::Adaptive { tolerance } if tolerance > 0.0 && tolerance.is_finite() => {
                Ok(Integrator::Adaptive(AdaptiveIntegrator::new(tolerance)))
            }
            IntegrationMode::Adaptive { tolerance } => Err(FemError::InvalidParameter(format!(
                "adaptive tolerance must be positive and finite, got {}",
                tolerance
            ))),
        }
    }
}

impl Integrator {
    /// ∫ f over the reference triangle
    fn reference_triangle<F>(&self, f: F) -> f64
    where
        F: FnMut(&Point2<f64>) -> f64,
    {
        match self {
            Integrator::Quadrature(rule) => rule.integrate(f).value,
            Integrator::Adaptive(integrator) => {
                integrator.dblquad(f, 0.0, 1.0, |_| 0.0, |x| 1.0 - x).value
            }
        }
    }

    /// ∫ f over the unit square for adaptive integration. Fixed rules only have nodes inside
    /// the reference triangle, so they fall back to `reference_triangle`.
    fn unit_square<F>(&self, f: F) -> f64
    where
        F: FnMut(&Point2<f64>) -> f64,
    {
        match self {
            Integrator::Quadrature(rule) => rule.integrate(f).value,
            Integrator::Adaptive(integrator) => {
                integrator.dblquad(f, 0.0, 1.0, |_| 0.0, |_| 1.0).value
            }
        }
    }
}

/// Lowest and highest y of `corners`' triangle on the vertical line through `x`
fn vertical_section(corners: &[Point2<f64>; 3], x: f64) -> (f64, f64) {
    let mut lower = f64::INFINITY;
    let mut upper = f64::NEG_INFINITY;

    for k in 0..3 {
        let a = corners[k];
        let b = corners[(k + 1) % 3];
        if x < a.x.min(b.x) || x > a.x.max(b.x) {
            continue;
        }

        if a.x == b.x {
            lower = lower.min(a.y.min(b.y));
            upper = upper.max(a.y.max(b.y));
        } else {
            let y = a.y + (x - a.x) * (b.y - a.y) / (b.x - a.x);
            lower = lower.min(y);
            upper = upper.max(y);
        }
    }

    if lower > upper {
        (0.0, 0.0)
    } else {
        (lower, upper)
    }
}

/// Builds local element contributions and scatters them into global arrays indexed by
/// vertex
pub struct Assembler<'a, E = P1ReferenceElement> {
    mesh: &'a Mesh,
    element: E,
    integrator: Integrator,
}

impl<'a> Assembler<'a, P1ReferenceElement> {
    pub fn new(mesh: &'a Mesh, mode: IntegrationMode) -> Result<Self> {
        Assembler::with_element(mesh, P1ReferenceElement, mode)
    }
}

impl<'a, E> Assembler<'a, E>
where
    E: ReferenceElement,
{
    /// Fails with `InvalidParameter` for an adaptive tolerance that is not positive and finite
    pub fn with_element(mesh: &'a Mesh, element: E, mode: IntegrationMode) -> Result<Self> {
        Ok(Assembler {
            mesh,
            element,
            integrator: Integrator::try_from(mode)?,
        })
    }

    pub fn mesh(&self) -> &Mesh {
        self.mesh
    }

    /// `|det J| ∫ φ_i φ_j` over the reference triangle
    pub fn local_mass(&self, map: &CellMap) -> Matrix3<f64> {
        let mut local = Matrix3::zeros();
        for i in 0..3 {
            for j in i..3 {
                let integral = self.integrator.reference_triangle(|xi| {
                    let phi = self.element.value(xi);
                    phi[i] * phi[j]
                });
                local[(i, j)] = map.area_scale() * integral;
                local[(j, i)] = local[(i, j)];
            }
        }
        local
    }

    /// `|det J| ∫ (J⁻ᵀ∇φ_i)·(J⁻ᵀ∇φ_j)` over the reference triangle
    pub fn local_stiffness(&self, map: &CellMap, evaluation: StiffnessEvaluation) -> Matrix3<f64> {
        let jinvt = map.inverse_transpose();
        let mut local = Matrix3::zeros();

        for i in 0..3 {
            for j in i..3 {
                let integral = match evaluation {
                    StiffnessEvaluation::Exact => self.integrator.reference_triangle(|xi| {
                        let grads = jinvt * self.element.gradients(xi);
                        grads.column(i).dot(&grads.column(j))
                    }),
                    StiffnessEvaluation::Fast => {
                        let (x, y) = FAST_GRADIENT_POINT;
                        let grads = jinvt * self.element.gradients(&Point2::new(x, y));
                        let product = grads.column(i).dot(&grads.column(j));
                        self.integrator.unit_square(|xi| {
                            if xi.x + xi.y > 1.0 {
                                0.0
                            } else {
                                product
                            }
                        })
                    }
                };
                local[(i, j)] = map.area_scale() * integral;
                local[(j, i)] = local[(i, j)];
            }
        }
        local
    }

    /// `∫_T φ_i f` over the physical triangle `corners`
    pub fn local_load<F>(&self, map: &CellMap, corners: &[Point2<f64>; 3], forcing: &F) -> Vector3<f64>
    where
        F: ScalarFunction + ?Sized,
    {
        let mut local = Vector3::zeros();

        match &self.integrator {
            Integrator::Quadrature(rule) => {
                for i in 0..3 {
                    let integral = rule
                        .integrate(|xi| self.element.value(xi)[i] * forcing.value(&map.to_physical(xi)))
                        .value;
                    local[i] = map.area_scale() * integral;
                }
            }
            Integrator::Adaptive(integrator) => {
                let xs = [corners[0].x, corners[1].x, corners[2].x];
                let (x_min, x_max) = (min(&xs), max(&xs));
                for i in 0..3 {
                    local[i] = integrator
                        .dblquad(
                            |p| self.element.value(&map.to_reference(p))[i] * forcing.value(p),
                            x_min,
                            x_max,
                            |x| vertical_section(corners, x).0,
                            |x| vertical_section(corners, x).1,
                        )
                        .value;
                }
            }
        }
        local
    }

    /// Visit every triangle with its cell map, stopping at the first degenerate triangle
    fn for_each_cell<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&Triangle, &CellMap, &[Point2<f64>; 3]),
    {
        for tri in self.mesh.triangles() {
            let corners = self.mesh.corners(tri);
            let map = CellMap::new(&corners)?;
            f(tri, &map, &corners);
        }
        Ok(())
    }

    fn scatter_matrix(global: &mut Array2<f64>, tri: &Triangle, local: &Matrix3<f64>) {
        for i in 0..3 {
            for j in 0..3 {
                global[(tri.v[i], tri.v[j])] += local[(i, j)];
            }
        }
    }

    pub fn mass_matrix(&self) -> Result<Array2<f64>> {
        info!("Calculating mass matrix");
        let n = self.mesh.n_vertex();
        let mut mass = Array2::zeros((n, n));
        self.for_each_cell(|tri, map, _| {
            Self::scatter_matrix(&mut mass, tri, &self.local_mass(map));
        })?;
        Ok(mass)
    }

    pub fn stiffness_matrix(&self, evaluation: StiffnessEvaluation) -> Result<Array2<f64>> {
        info!("Calculating stiffness matrix");
        let n = self.mesh.n_vertex();
        let mut stiffness = Array2::zeros((n, n));
        self.for_each_cell(|tri, map, _| {
            Self::scatter_matrix(&mut stiffness, tri, &self.local_stiffness(map, evaluation));
        })?;
        Ok(stiffness)
    }

    pub fn load_vector<F>(&self, forcing: &F) -> Result<Array1<f64>>
    where
        F: ScalarFunction + ?Sized,
    {
        info!("Calculating linear form");
        let mut load = Array1::zeros(self.mesh.n_vertex());
        self.for_each_cell(|tri, map, corners| {
            let local = self.local_load(map, corners, forcing);
            for i in 0..3 {
                load[tri.v[i]] += local[i];
            }
        })?;
        Ok(load)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FemError;
    use crate::functions::SineBump;
    use crate::linalg::DenseLu;
    use approx::assert_abs_diff_eq;

    fn p(x: f64, y: f64) -> Point2<f64> {
        Point2::new(x, y)
    }

    fn quadrature(rule: RuleKind) -> IntegrationMode {
        IntegrationMode::Quadrature { rule }
    }

    #[test]
    fn vertical_sections() {
        let corners = [p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)];
        let (lo, hi) = vertical_section(&corners, 0.25);
        assert_abs_diff_eq!(lo, 0.0);
        assert_abs_diff_eq!(hi, 0.25);

        let (lo, hi) = vertical_section(&corners, 1.0);
        assert_abs_diff_eq!(lo, 0.0);
        assert_abs_diff_eq!(hi, 1.0);

        assert_eq!(vertical_section(&corners, 1.5), (0.0, 0.0));
    }

    #[test]
    fn reference_cell_mass() {
        let mesh = Mesh::unit_square(2, 2).unwrap();
        let assembler = Assembler::new(&mesh, IntegrationMode::default()).unwrap();
        let map = CellMap::new(&[p(0.0, 0.0), p(1.0, 0.0), p(0.0, 1.0)]).unwrap();
        let local = assembler.local_mass(&map);
        for i in 0..3 {
            for j in 0..3 {
                let exact = if i == j { 1.0 / 12.0 } else { 1.0 / 24.0 };
                assert_abs_diff_eq!(local[(i, j)], exact, epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn reference_cell_stiffness() {
        let mesh = Mesh::unit_square(2, 2).unwrap();
        let map = CellMap::new(&[p(0.0, 0.0), p(1.0, 0.0), p(0.0, 1.0)]).unwrap();
        let exact = Matrix3::new(1.0, -0.5, -0.5, -0.5, 0.5, 0.0, -0.5, 0.0, 0.5);

        for &evaluation in &[StiffnessEvaluation::Exact, StiffnessEvaluation::Fast] {
            let assembler = Assembler::new(&mesh, IntegrationMode::default()).unwrap();
            assert_abs_diff_eq!(assembler.local_stiffness(&map, evaluation), exact, epsilon = 1e-14);
        }

        let assembler = Assembler::new(&mesh, IntegrationMode::adaptive()).unwrap();
        assert_abs_diff_eq!(
            assembler.local_stiffness(&map, StiffnessEvaluation::Exact),
            exact,
            epsilon = 1e-10
        );
        // The cutoff is only resolved to the integrator's tolerance
        assert_abs_diff_eq!(
            assembler.local_stiffness(&map, StiffnessEvaluation::Fast),
            exact,
            epsilon = 1e-3
        );
    }

    #[test]
    fn orientation_does_not_change_local_matrices() {
        let mesh = Mesh::unit_square(2, 2).unwrap();
        let assembler = Assembler::new(&mesh, IntegrationMode::default()).unwrap();
        let ccw = CellMap::new(&[p(0.2, 0.1), p(0.9, 0.3), p(0.4, 0.8)]).unwrap();
        let cw = CellMap::new(&[p(0.2, 0.1), p(0.4, 0.8), p(0.9, 0.3)]).unwrap();

        let mass_ccw = assembler.local_mass(&ccw);
        let mass_cw = assembler.local_mass(&cw);
        assert_abs_diff_eq!(mass_ccw, mass_cw, epsilon = 1e-15);

        let k_ccw = assembler.local_stiffness(&ccw, StiffnessEvaluation::Exact);
        let k_cw = assembler.local_stiffness(&cw, StiffnessEvaluation::Exact);
        // Corners 1 and 2 swap places
        assert_abs_diff_eq!(k_ccw[(0, 0)], k_cw[(0, 0)], epsilon = 1e-13);
        assert_abs_diff_eq!(k_ccw[(1, 1)], k_cw[(2, 2)], epsilon = 1e-13);
        assert_abs_diff_eq!(k_ccw[(0, 1)], k_cw[(0, 2)], epsilon = 1e-13);
    }

    #[test]
    fn mass_matrix_total_is_domain_area() {
        let mesh = Mesh::unit_square(4, 3).unwrap();
        for mode in [quadrature(RuleKind::ThreePoint), quadrature(RuleKind::SevenPoint), IntegrationMode::adaptive()].iter() {
            let mass = Assembler::new(&mesh, *mode).unwrap().mass_matrix().unwrap();
            assert_abs_diff_eq!(mass.sum(), 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn mass_matrix_symmetric_positive_definite() {
        let mesh = Mesh::unit_square(5, 4).unwrap();
        let mass = Assembler::new(&mesh, IntegrationMode::default()).unwrap().mass_matrix().unwrap();
        assert_eq!(mass, mass.t());

        // Cholesky succeeds only for positive definite matrices
        let n = mesh.n_vertex();
        let m = nalgebra::DMatrix::from_fn(n, n, |i, j| mass[(i, j)]);
        assert!(m.cholesky().is_some());
    }

    #[test]
    fn stiffness_rows_sum_to_zero() {
        let mesh = Mesh::unit_square(4, 4).unwrap();
        let stiffness = Assembler::new(&mesh, IntegrationMode::default()).unwrap()
            .stiffness_matrix(StiffnessEvaluation::Exact)
            .unwrap();
        for row in stiffness.rows() {
            assert_abs_diff_eq!(row.sum(), 0.0, epsilon = 1e-12);
        }
        // Five point stencil in the interior of a regular grid
        let centre = 5;
        assert_abs_diff_eq!(stiffness[(centre, centre)], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stiffness[(centre, centre + 1)], -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stiffness[(centre, centre + 5)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn stiffness_evaluations_agree_with_fixed_rules() {
        let mesh = Mesh::unit_square(4, 4).unwrap();
        let assembler = Assembler::new(&mesh, quadrature(RuleKind::FourPoint)).unwrap();
        let exact = assembler.stiffness_matrix(StiffnessEvaluation::Exact).unwrap();
        let fast = assembler.stiffness_matrix(StiffnessEvaluation::Fast).unwrap();
        for (e, f) in exact.iter().zip(fast.iter()) {
            assert_abs_diff_eq!(e, f, epsilon = 1e-13);
        }
    }

    #[test]
    fn load_of_constant_is_lumped_area() {
        let mesh = Mesh::unit_square(3, 3).unwrap();
        let one = |_: &Point2<f64>| 1.0;
        let load = Assembler::new(&mesh, IntegrationMode::default()).unwrap().load_vector(&one).unwrap();
        assert_abs_diff_eq!(load.sum(), 1.0, epsilon = 1e-14);

        // The mass matrix applied to the constant 1 is the same vector
        let mass = Assembler::new(&mesh, IntegrationMode::default()).unwrap().mass_matrix().unwrap();
        let lumped = mass.dot(&Array1::ones(mesh.n_vertex()));
        for (l, m) in load.iter().zip(lumped.iter()) {
            assert_abs_diff_eq!(l, m, epsilon = 1e-14);
        }
    }

    #[test]
    fn load_strategies_agree() {
        let mesh = Mesh::unit_square(3, 3).unwrap();
        let fixed = Assembler::new(&mesh, IntegrationMode::default()).unwrap()
            .load_vector(&SineBump)
            .unwrap();
        let adaptive = Assembler::new(&mesh, IntegrationMode::Adaptive { tolerance: 1e-9 }).unwrap()
            .load_vector(&SineBump)
            .unwrap();
        for (a, b) in fixed.iter().zip(adaptive.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-4);
        }
    }

    #[test]
    fn load_projection_of_linear_function() {
        // For f in the P1 space, M⁻¹ b reproduces f at the vertices
        let mesh = Mesh::unit_square(4, 4).unwrap();
        let f = |p: &Point2<f64>| 2.0 * p.x - p.y + 0.5;
        let assembler = Assembler::new(&mesh, quadrature(RuleKind::ThreePoint)).unwrap();
        let load = assembler.load_vector(&f).unwrap();
        let mass = assembler.mass_matrix().unwrap();
        let projected = DenseLu::new(mass.view()).unwrap().solve(load.view()).unwrap();
        for (idx, vertex) in mesh.vertex_iter().enumerate() {
            assert_abs_diff_eq!(projected[idx], f(&vertex), epsilon = 1e-12);
        }
    }

    #[test]
    fn degenerate_triangle_aborts_assembly() {
        let vertices = array![[0.0, 1.0, 2.0, 0.0], [0.0, 1.0, 2.0, 1.0]];
        let mesh = Mesh::new(
            vertices,
            vec![Triangle::new(0, 1, 3), Triangle::new(0, 1, 2)],
        )
        .unwrap();
        let result = Assembler::new(&mesh, IntegrationMode::default()).unwrap().mass_matrix();
        assert!(matches!(result, Err(FemError::SingularTransform { .. })));
    }

    #[test]
    fn adaptive_tolerance_must_be_positive() {
        let mesh = Mesh::unit_square(2, 2).unwrap();
        for &tolerance in &[0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = Assembler::new(&mesh, IntegrationMode::Adaptive { tolerance });
            assert!(matches!(result, Err(FemError::InvalidParameter(_))));
        }
        assert!(Assembler::new(&mesh, IntegrationMode::adaptive()).is_ok());
    }
}
