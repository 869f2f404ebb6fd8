//! Dense LU factorization on top of nalgebra, for the ndarray matrices produced by assembly

use crate::error::{FemError, Result};
use nalgebra::{DMatrix, DVector, LU};
use ndarray::prelude::*;

/// Smallest acceptable ratio between the smallest and largest pivot magnitude
const PIVOT_RATIO_TOLERANCE: f64 = 1e-13;

/// An LU factorization with partial pivoting, computed once and reused for any number of
/// right-hand sides
pub struct DenseLu {
    lu: LU<f64, nalgebra::Dyn, nalgebra::Dyn>,
    n: usize,
}

impl DenseLu {
    /// Factor the square matrix `a`. Fails with `FemError::SingularSystem` when a pivot is
    /// zero or negligible relative to the largest one.
    pub fn new(a: ArrayView2<f64>) -> Result<Self> {
        let (n, m) = a.dim();
        if n != m {
            return Err(FemError::DimensionMismatch { expected: n, got: m });
        }

        let lu = to_nalgebra(a).lu();

        let pivots = lu.u().diagonal();
        let largest = pivots.amax();
        let smallest = pivots.amin();
        let pivot_ratio = if largest > 0.0 { smallest / largest } else { 0.0 };
        if !(pivot_ratio > PIVOT_RATIO_TOLERANCE) {
            return Err(FemError::SingularSystem { size: n, pivot_ratio });
        }

        Ok(DenseLu { lu, n })
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn solve(&self, b: ArrayView1<f64>) -> Result<Array1<f64>> {
        if b.len() != self.n {
            return Err(FemError::DimensionMismatch {
                expected: self.n,
                got: b.len(),
            });
        }

        let rhs = DVector::from_iterator(self.n, b.iter().copied());
        let x = self.lu.solve(&rhs).ok_or(FemError::SingularSystem {
            size: self.n,
            pivot_ratio: 0.0,
        })?;

        Ok(Array1::from_iter(x.iter().copied()))
    }

    /// Solve for every column of `b` at once
    pub fn solve_matrix(&self, b: ArrayView2<f64>) -> Result<Array2<f64>> {
        if b.nrows() != self.n {
            return Err(FemError::DimensionMismatch {
                expected: self.n,
                got: b.nrows(),
            });
        }

        let x = self.lu.solve(&to_nalgebra(b)).ok_or(FemError::SingularSystem {
            size: self.n,
            pivot_ratio: 0.0,
        })?;

        Ok(Array2::from_shape_fn(x.shape(), |(i, j)| x[(i, j)]))
    }
}

fn to_nalgebra(a: ArrayView2<f64>) -> DMatrix<f64> {
    let (n, m) = a.dim();
    DMatrix::from_fn(n, m, |i, j| a[(i, j)])
}
