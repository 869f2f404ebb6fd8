use crate::mesh::Mesh;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

/// Which vertices of the unit square count as boundary vertices. Identification is by exact
/// coordinate match, which holds because `Mesh::unit_square` places its boundary vertices at
/// exactly 0.0 and 1.0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryMarker {
    /// The edges y = 0 and y = 1
    Horizontal,
    /// All four edges
    All,
}

impl BoundaryMarker {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let on_edge = |c: f64| c == 0.0 || c == 1.0;
        match self {
            BoundaryMarker::Horizontal => on_edge(y),
            BoundaryMarker::All => on_edge(x) || on_edge(y),
        }
    }

    /// Indices of the marked vertices, in increasing order
    pub fn vertices(&self, mesh: &Mesh) -> Vec<usize> {
        mesh.vertex_iter()
            .enumerate()
            .filter(|(_, p)| self.contains(p.x, p.y))
            .map(|(idx, _)| idx)
            .collect()
    }
}

/// Pin the unknowns in `rows` to zero by row replacement: the row of `a` becomes the
/// corresponding row of the identity and the entry of `b` becomes zero
pub fn apply_dirichlet_rows(mut a: ArrayViewMut2<f64>, mut b: ArrayViewMut1<f64>, rows: &[usize]) {
    for &row in rows {
        a.row_mut(row).fill(0.0);
        a[(row, row)] = 1.0;
        b[row] = 0.0;
    }
}
