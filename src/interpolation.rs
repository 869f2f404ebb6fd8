//! Piecewise-linear interpolation of nodal values sampled at a sequence of times.
//!
//! Every prism `triangle × [t_k, t_{k+1}]` is cut into three tetrahedra. The cut is taken
//! in the order of the triangle's global vertex indices, so neighbouring prisms share
//! their faces and the interpolant is continuous. At a mesh vertex it reduces to linear
//! interpolation in time.

use crate::affine::CellMap;
use crate::error::{FemError, Result};
use crate::mesh::Mesh;
use nalgebra::Point2;
use ndarray::prelude::*;
use ndarray::Zip;

/// Barycentric coordinates within this margin of zero still count as inside a triangle
const INSIDE_TOLERANCE: f64 = 1e-12;

pub struct SpaceTimeInterpolant {
    mesh: Mesh,
    cells: Vec<CellMap>,
    times: Vec<f64>,
    /// One row per time, one column per vertex
    values: Array2<f64>,
}

impl SpaceTimeInterpolant {
    /// `times` must be strictly increasing, with row `k` of `values` holding the nodal values
    /// at `times[k]`
    pub fn new(mesh: Mesh, times: Vec<f64>, values: Array2<f64>) -> Result<Self> {
        if times.is_empty() {
            return Err(FemError::InvalidParameter("no time samples given".into()));
        }
        if values.nrows() != times.len() {
            return Err(FemError::DimensionMismatch {
                expected: times.len(),
                got: values.nrows(),
            });
        }
        if values.ncols() != mesh.n_vertex() {
            return Err(FemError::DimensionMismatch {
                expected: mesh.n_vertex(),
                got: values.ncols(),
            });
        }
        if times.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(FemError::InvalidParameter(
                "sample times must be strictly increasing".into(),
            ));
        }

        let cells = mesh
            .triangles()
            .iter()
            .map(|tri| CellMap::new(&mesh.corners(tri)))
            .collect::<Result<Vec<_>>>()?;

        Ok(SpaceTimeInterpolant {
            mesh,
            cells,
            times,
            values,
        })
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn t_first(&self) -> f64 {
        self.times[0]
    }

    pub fn t_last(&self) -> f64 {
        self.times[self.times.len() - 1]
    }

    /// The time slab containing `t` and the position of `t` within it, or `None` outside the
    /// sampled range
    fn slab(&self, t: f64) -> Option<(usize, f64)> {
        if !(t >= self.t_first() && t <= self.t_last()) {
            return None;
        }
        if self.times.len() == 1 {
            return Some((0, 0.0));
        }

        let k = self
            .times
            .partition_point(|&tk| tk <= t)
            .saturating_sub(1)
            .min(self.times.len() - 2);
        let s = (t - self.times[k]) / (self.times[k + 1] - self.times[k]);
        Some((k, s.clamp(0.0, 1.0)))
    }

    /// The first triangle containing `p`, with the barycentric weight of each of its corners
    fn locate(&self, p: &Point2<f64>) -> Option<(usize, [f64; 3])> {
        self.cells.iter().enumerate().find_map(|(idx, cell)| {
            let xi = cell.to_reference(p);
            let weights = [1.0 - xi.x - xi.y, xi.x, xi.y];
            if weights.iter().all(|&w| w >= -INSIDE_TOLERANCE) {
                Some((idx, weights))
            } else {
                None
            }
        })
    }

    /// Value at `(t, x, y)`, or NaN when the point lies outside the sampled times or the mesh
    pub fn value(&self, t: f64, x: f64, y: f64) -> f64 {
        let (k, s) = match self.slab(t) {
            Some(slab) => slab,
            None => return f64::NAN,
        };
        let (tri, weights) = match self.locate(&Point2::new(x, y)) {
            Some(found) => found,
            None => return f64::NAN,
        };

        let u0 = self.values.row(k);
        if self.times.len() == 1 {
            let v = self.mesh.triangles()[tri].v;
            return (0..3).map(|i| weights[i] * u0[v[i]]).sum();
        }
        let u1 = self.values.row(k + 1);

        // Corners in global index order
        let mut corners: Vec<(usize, f64)> = self.mesh.triangles()[tri]
            .v
            .iter()
            .copied()
            .zip(weights.iter().copied())
            .collect();
        corners.sort_unstable_by_key(|&(idx, _)| idx);
        let [(p0, l0), (p1, l1), (p2, l2)] = [corners[0], corners[1], corners[2]];

        let c1 = l0;
        let c2 = l0 + l1;
        if s <= c1 {
            (l0 - s) * u0[p0] + l1 * u0[p1] + l2 * u0[p2] + s * u1[p0]
        } else if s <= c2 {
            l0 * u1[p0] + (s - l0) * u1[p1] + (c2 - s) * u0[p1] + l2 * u0[p2]
        } else {
            l0 * u1[p0] + l1 * u1[p1] + (s - c2) * u1[p2] + (1.0 - s) * u0[p2]
        }
    }

    /// Values at every mesh vertex at time `t`, all NaN outside the sampled times
    pub fn values_at(&self, t: f64) -> Array1<f64> {
        let mut out = Array1::from_elem(self.mesh.n_vertex(), f64::NAN);
        let (k, s) = match self.slab(t) {
            Some(slab) => slab,
            None => return out,
        };
        if self.times.len() == 1 {
            out.assign(&self.values.row(0));
            return out;
        }

        Zip::from(&mut out)
            .and(self.values.row(k))
            .and(self.values.row(k + 1))
            .par_for_each(|o, &a, &b| *o = (1.0 - s) * a + s * b);
        out
    }

    /// Values at the columns of the 2×P array `points` at time `t`
    pub fn values_at_points(&self, t: f64, points: ArrayView2<f64>) -> Array1<f64> {
        let mut out = Array1::zeros(points.ncols());
        Zip::from(&mut out)
            .and(points.columns())
            .par_for_each(|o, p| *o = self.value(t, p[0], p[1]));
        out
    }
}
