//! `u - Δu = f` on the unit square with `u = 0` on y = 0 and y = 1 and natural boundary
//! conditions on x = 0 and x = 1

use crate::assembly::{Assembler, IntegrationMode, StiffnessEvaluation};
use crate::boundary::{apply_dirichlet_rows, BoundaryMarker};
use crate::error::Result;
use crate::functions::ScalarFunction;
use crate::linalg::DenseLu;
use crate::mesh::Mesh;
use crate::utilities::max_abs_difference;
use log::info;
use nalgebra::Point2;
use ndarray::prelude::*;
use std::io::Write;

/// Nodal solution together with the coordinates of the vertices it lives on
#[derive(Clone, Debug)]
pub struct StaticSolution {
    /// 2×N vertex table
    pub vertices: Array2<f64>,
    pub u: Array1<f64>,
}

impl StaticSolution {
    /// `exact` sampled at every vertex
    pub fn interpolate<F>(&self, exact: &F) -> Array1<f64>
    where
        F: ScalarFunction + ?Sized,
    {
        self.vertices
            .columns()
            .into_iter()
            .map(|p| exact.value(&Point2::new(p[0], p[1])))
            .collect()
    }

    /// Largest nodal deviation from `exact`
    pub fn max_nodal_error<F>(&self, exact: &F) -> f64
    where
        F: ScalarFunction + ?Sized,
    {
        let reference = self.interpolate(exact);
        max_abs_difference(self.u.view(), reference.view())
    }

    /// Write `x y u u_exact` rows, one per vertex
    pub fn output<F>(&self, buffer: &mut impl Write, exact: &F) -> std::io::Result<()>
    where
        F: ScalarFunction + ?Sized,
    {
        let reference = self.interpolate(exact);
        buffer.write_all(b"x y u u_exact\n")?;
        for (idx, p) in self.vertices.columns().into_iter().enumerate() {
            buffer.write_all(
                format!("{:.6e} {:.6e} {:.6e} {:.6e}\n", p[0], p[1], self.u[idx], reference[idx]).as_bytes(),
            )?;
        }
        Ok(())
    }
}

/// Assemble `(K + M) u = b`, pin the vertices on y = 0 and y = 1, and solve by LU
pub fn solve_static<F>(mesh: &Mesh, forcing: &F, mode: IntegrationMode) -> Result<StaticSolution>
where
    F: ScalarFunction + ?Sized,
{
    let assembler = Assembler::new(mesh, mode)?;
    let mut a = assembler.mass_matrix()?;
    a += &assembler.stiffness_matrix(StiffnessEvaluation::Exact)?;
    let mut b = assembler.load_vector(forcing)?;

    let boundary = BoundaryMarker::Horizontal.vertices(mesh);
    apply_dirichlet_rows(a.view_mut(), b.view_mut(), &boundary);

    info!("Solving linear system with {} unknowns", b.len());
    let u = DenseLu::new(a.view())?.solve(b.view())?;

    Ok(StaticSolution {
        vertices: mesh.vertices().to_owned(),
        u,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FemError;
    use crate::functions::{UTilde, UTildeForcing};
    use crate::mesh::Triangle;
    use crate::quadrature::RuleKind;
    use approx::assert_abs_diff_eq;

    #[test]
    fn dirichlet_rows_are_zero() {
        let mesh = Mesh::unit_square(5, 5).unwrap();
        let solution = solve_static(&mesh, &UTildeForcing, IntegrationMode::default()).unwrap();
        for idx in BoundaryMarker::Horizontal.vertices(&mesh) {
            assert_eq!(solution.u[idx], 0.0);
        }
        assert_eq!(solution.vertices, mesh.vertices());
    }

    #[test]
    fn antisymmetric_under_half_turn() {
        // (x, y) -> (1 - x, 1 - y) maps the mesh onto itself, vertex i onto N - 1 - i, and
        // flips the sign of the forcing
        let mesh = Mesh::unit_square(6, 5).unwrap();
        let solution = solve_static(&mesh, &UTildeForcing, IntegrationMode::default()).unwrap();
        let n = mesh.n_vertex();
        for idx in 0..n {
            assert_abs_diff_eq!(solution.u[idx], -solution.u[n - 1 - idx], epsilon = 1e-12);
        }
    }

    #[test]
    fn manufactured_solution_error_is_small() {
        let mesh = Mesh::unit_square(9, 9).unwrap();
        let solution = solve_static(&mesh, &UTildeForcing, IntegrationMode::default()).unwrap();
        let error = solution.max_nodal_error(&UTilde);
        assert!(error < 0.02, "error {}", error);
    }

    #[test]
    fn rules_of_sufficient_degree_agree() {
        let mesh = Mesh::unit_square(5, 5).unwrap();
        let seven = solve_static(&mesh, &UTildeForcing, IntegrationMode::default()).unwrap();
        let four = solve_static(&mesh, &UTildeForcing, IntegrationMode::Quadrature { rule: RuleKind::FourPoint }).unwrap();
        for (a, b) in seven.u.iter().zip(four.u.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 5e-3);
        }
    }

    #[test]
    fn output_rows() {
        let mesh = Mesh::unit_square(2, 2).unwrap();
        let solution = StaticSolution {
            vertices: mesh.vertices().to_owned(),
            u: array![0.0, 0.0, 0.0, 0.0],
        };
        let mut buffer = Vec::new();
        solution.output(&mut buffer, &UTilde).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 5);
        assert!(text.starts_with("x y u u_exact\n"));
    }

    #[test]
    fn unconnected_interior_vertex_is_singular() {
        // Vertex 3 belongs to no triangle and is not pinned, so its row stays zero
        let vertices = array![[0.0, 1.0, 0.0, 0.5], [0.0, 0.0, 1.0, 0.5]];
        let mesh = Mesh::new(vertices, vec![Triangle::new(0, 1, 2)]).unwrap();
        let result = solve_static(&mesh, &UTildeForcing, IntegrationMode::default());
        assert!(matches!(result, Err(FemError::SingularSystem { size: 4, .. })));
    }

    #[test]
    fn invalid_adaptive_tolerance_is_rejected() {
        let mesh = Mesh::unit_square(3, 3).unwrap();
        for &tolerance in &[-1.0, f64::NAN] {
            let result = solve_static(&mesh, &UTildeForcing, IntegrationMode::Adaptive { tolerance });
            assert!(matches!(result, Err(FemError::InvalidParameter(_))));
        }
    }
}
