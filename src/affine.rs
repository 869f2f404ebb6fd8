//! The affine map from the reference triangle with corners (0,0), (1,0), (0,1) onto a
//! physical triangle. Corner `v0` is the image of the reference origin, `v1` of (1,0) and
//! `v2` of (0,1).

use crate::error::{FemError, Result};
use nalgebra::{Matrix2, Point2};

/// `|det J|` below this fraction of the squared largest Jacobian entry counts as zero
const SINGULARITY_TOLERANCE: f64 = 1e-12;

/// `[[x1 - x0, x2 - x0], [y1 - y0, y2 - y0]]`
pub fn jacobian(corners: &[Point2<f64>; 3]) -> Matrix2<f64> {
    let [v0, v1, v2] = corners;
    Matrix2::new(v1.x - v0.x, v2.x - v0.x, v1.y - v0.y, v2.y - v0.y)
}

/// Signed determinant of the Jacobian: positive for counter-clockwise corners, and twice
/// the triangle's area in magnitude
pub fn determinant(corners: &[Point2<f64>; 3]) -> f64 {
    jacobian(corners).determinant()
}

pub fn inverse_jacobian(corners: &[Point2<f64>; 3]) -> Result<Matrix2<f64>> {
    invert(&jacobian(corners))
}

fn is_singular(jacobian: &Matrix2<f64>, determinant: f64) -> bool {
    let scale = jacobian.amax();
    scale == 0.0 || determinant.abs() <= SINGULARITY_TOLERANCE * scale * scale
}

fn invert(jacobian: &Matrix2<f64>) -> Result<Matrix2<f64>> {
    let det = jacobian.determinant();
    if is_singular(jacobian, det) {
        return Err(singular(jacobian, det));
    }

    Ok(Matrix2::new(
        jacobian[(1, 1)] / det,
        -jacobian[(0, 1)] / det,
        -jacobian[(1, 0)] / det,
        jacobian[(0, 0)] / det,
    ))
}

fn singular(jacobian: &Matrix2<f64>, determinant: f64) -> FemError {
    FemError::SingularTransform {
        jacobian: [
            [jacobian[(0, 0)], jacobian[(0, 1)]],
            [jacobian[(1, 0)], jacobian[(1, 1)]],
        ],
        determinant,
    }
}

/// Everything assembly needs to know about the map onto one triangle. Built once per
/// triangle and never mutated, so triangles can be processed independently.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellMap {
    origin: Point2<f64>,
    jacobian: Matrix2<f64>,
    inverse: Matrix2<f64>,
    determinant: f64,
}

impl CellMap {
    /// Fails with `FemError::SingularTransform` for degenerate (collinear) corners
    pub fn new(corners: &[Point2<f64>; 3]) -> Result<Self> {
        let jacobian = jacobian(corners);
        let inverse = invert(&jacobian)?;

        Ok(CellMap {
            origin: corners[0],
            jacobian,
            inverse,
            determinant: jacobian.determinant(),
        })
    }

    pub fn jacobian(&self) -> &Matrix2<f64> {
        &self.jacobian
    }

    pub fn inverse_jacobian(&self) -> &Matrix2<f64> {
        &self.inverse
    }

    /// `J⁻ᵀ`, which maps reference gradients onto physical ones
    pub fn inverse_transpose(&self) -> Matrix2<f64> {
        self.inverse.transpose()
    }

    pub fn determinant(&self) -> f64 {
        self.determinant
    }

    /// Area scaling between reference and physical triangle, independent of orientation
    pub fn area_scale(&self) -> f64 {
        self.determinant.abs()
    }

    pub fn to_physical(&self, xi: &Point2<f64>) -> Point2<f64> {
        self.origin + self.jacobian * xi.coords
    }

    pub fn to_reference(&self, p: &Point2<f64>) -> Point2<f64> {
        Point2::from(self.inverse * (*p - self.origin))
    }
}

/// Stateful form of the map: a current target cell that the accessors read unless they are
/// handed explicit corners. Explicit corners never replace the stored cell.
#[derive(Clone, Copy, Debug)]
pub struct AffineTransformation {
    corners: [Point2<f64>; 3],
}

impl AffineTransformation {
    pub fn new(v0: Point2<f64>, v1: Point2<f64>, v2: Point2<f64>) -> Self {
        AffineTransformation {
            corners: [v0, v1, v2],
        }
    }

    pub fn set_target_cell(&mut self, v0: Point2<f64>, v1: Point2<f64>, v2: Point2<f64>) {
        self.corners = [v0, v1, v2];
    }

    pub fn target_cell(&self) -> &[Point2<f64>; 3] {
        &self.corners
    }

    fn pick<'a>(&'a self, corners: Option<&'a [Point2<f64>; 3]>) -> &'a [Point2<f64>; 3] {
        corners.unwrap_or(&self.corners)
    }

    pub fn jacobian(&self, corners: Option<&[Point2<f64>; 3]>) -> Matrix2<f64> {
        jacobian(self.pick(corners))
    }

    pub fn inverse_jacobian(&self, corners: Option<&[Point2<f64>; 3]>) -> Result<Matrix2<f64>> {
        inverse_jacobian(self.pick(corners))
    }

    pub fn determinant(&self, corners: Option<&[Point2<f64>; 3]>) -> f64 {
        determinant(self.pick(corners))
    }

    /// Snapshot of the current cell as an immutable `CellMap`
    pub fn cell_map(&self) -> Result<CellMap> {
        CellMap::new(&self.corners)
    }
}
