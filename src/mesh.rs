use crate::error::{FemError, Result};
use nalgebra::Point2;
use ndarray::prelude::*;

/// A triangle given by three indices into the mesh's vertex table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Triangle {
    pub v: [usize; 3],
}

impl Triangle {
    pub fn new(v0: usize, v1: usize, v2: usize) -> Self {
        Triangle { v: [v0, v1, v2] }
    }

    pub fn v0(&self) -> usize {
        self.v[0]
    }

    pub fn v1(&self) -> usize {
        self.v[1]
    }

    pub fn v2(&self) -> usize {
        self.v[2]
    }
}

#[derive(Clone, Debug)]
pub struct Mesh {
    /// Physical coordinates, one column per vertex (row 0 is x, row 1 is y)
    vertices: Array2<f64>,
    triangles: Vec<Triangle>,
    supports_x: usize,
    supports_y: usize,
}

impl Mesh {
    /// Create a mesh from an arbitrary 2×N vertex table and triangle list. The vertices are
    /// treated as an N × 1 grid.
    pub fn new(vertices: Array2<f64>, triangles: Vec<Triangle>) -> Result<Self> {
        let n_vertex = vertices.ncols();
        Mesh::with_supports(vertices, triangles, n_vertex, 1)
    }

    fn with_supports(
        vertices: Array2<f64>,
        triangles: Vec<Triangle>,
        supports_x: usize,
        supports_y: usize,
    ) -> Result<Self> {
        if vertices.nrows() != 2 {
            return Err(FemError::DimensionMismatch {
                expected: 2,
                got: vertices.nrows(),
            });
        }

        let n_vertex = vertices.ncols();
        if let Some(tri) = triangles
            .iter()
            .find(|tri| tri.v.iter().any(|&idx| idx >= n_vertex))
        {
            return Err(FemError::InvalidMesh(format!(
                "triangle {:?} references a vertex outside 0..{}",
                tri.v, n_vertex
            )));
        }

        Ok(Mesh {
            vertices,
            triangles,
            supports_x,
            supports_y,
        })
    }

    /// Create the regular mesh of the unit square with `supports_x` by `supports_y` vertices.
    /// Every grid cell is cut along its lower-left to upper-right diagonal into two
    /// counter-clockwise triangles.
    pub fn unit_square(supports_x: usize, supports_y: usize) -> Result<Self> {
        if supports_x < 2 || supports_y < 2 {
            return Err(FemError::InvalidMesh(format!(
                "at least 2 x 2 supports are needed, got {} x {}",
                supports_x, supports_y
            )));
        }

        let dx = 1.0 / (supports_x - 1) as f64;
        let dy = 1.0 / (supports_y - 1) as f64;

        let mut vertices = Array2::zeros((2, supports_x * supports_y));
        for j in 0..supports_y {
            for i in 0..supports_x {
                let idx = j * supports_x + i;
                // Pin the last row/column so boundary coordinates are exactly 1.0
                vertices[(0, idx)] = if i == supports_x - 1 { 1.0 } else { i as f64 * dx };
                vertices[(1, idx)] = if j == supports_y - 1 { 1.0 } else { j as f64 * dy };
            }
        }

        let mut triangles = Vec::with_capacity(2 * (supports_x - 1) * (supports_y - 1));
        for j in 0..supports_y - 1 {
            for i in 0..supports_x - 1 {
                let lower_left = j * supports_x + i;
                let lower_right = lower_left + 1;
                let upper_left = lower_left + supports_x;
                let upper_right = upper_left + 1;
                triangles.push(Triangle::new(lower_left, lower_right, upper_right));
                triangles.push(Triangle::new(lower_left, upper_right, upper_left));
            }
        }

        Mesh::with_supports(vertices, triangles, supports_x, supports_y)
    }

    pub fn vertices(&self) -> ArrayView2<f64> {
        self.vertices.view()
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn supports_x(&self) -> usize {
        self.supports_x
    }

    pub fn supports_y(&self) -> usize {
        self.supports_y
    }

    /// The number of vertices, i.e. the number of P1 degrees of freedom
    pub fn n_vertex(&self) -> usize {
        self.vertices.ncols()
    }

    pub fn vertex(&self, idx: usize) -> Point2<f64> {
        Point2::new(self.vertices[(0, idx)], self.vertices[(1, idx)])
    }

    /// Physical coordinates of the three corners of `tri`
    pub fn corners(&self, tri: &Triangle) -> [Point2<f64>; 3] {
        [self.vertex(tri.v0()), self.vertex(tri.v1()), self.vertex(tri.v2())]
    }

    /// Iterator over all vertex positions in index order
    pub fn vertex_iter(&self) -> impl Iterator<Item = Point2<f64>> + '_ {
        (0..self.n_vertex()).map(move |idx| self.vertex(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn unit_square_vertices() {
        let mesh = Mesh::unit_square(3, 3).unwrap();
        assert_eq!(mesh.n_vertex(), 9);
        assert_eq!(mesh.vertices().dim(), (2, 9));

        assert_abs_diff_eq!(mesh.vertex(0).x, 0.0);
        assert_abs_diff_eq!(mesh.vertex(0).y, 0.0);
        assert_abs_diff_eq!(mesh.vertex(4).x, 0.5);
        assert_abs_diff_eq!(mesh.vertex(4).y, 0.5);
        assert_eq!(mesh.vertex(8).x, 1.0);
        assert_eq!(mesh.vertex(8).y, 1.0);
        assert_eq!(mesh.vertex(5).x, 1.0);
        assert_abs_diff_eq!(mesh.vertex(5).y, 0.5);
    }

    #[test]
    fn unit_square_boundary_coords_exact() {
        // 1/7 is not exact in binary, the last column must still land on 1.0
        let mesh = Mesh::unit_square(8, 8).unwrap();
        for j in 0..8 {
            assert_eq!(mesh.vertex(j * 8 + 7).x, 1.0);
            assert_eq!(mesh.vertex(j * 8).x, 0.0);
        }
        for i in 0..8 {
            assert_eq!(mesh.vertex(7 * 8 + i).y, 1.0);
        }
    }

    #[test]
    fn unit_square_triangles() {
        let mesh = Mesh::unit_square(3, 2).unwrap();
        assert_eq!(mesh.triangles().len(), 4);
        assert_eq!(mesh.triangles()[0], Triangle::new(0, 1, 4));
        assert_eq!(mesh.triangles()[1], Triangle::new(0, 4, 3));
        assert_eq!(mesh.triangles()[2].v, [1, 2, 5]);
        assert_eq!(mesh.triangles()[3].v0(), 1);
        assert_eq!(mesh.triangles()[3].v1(), 5);
        assert_eq!(mesh.triangles()[3].v2(), 4);
    }

    #[test]
    fn unit_square_is_counter_clockwise() {
        let mesh = Mesh::unit_square(4, 5).unwrap();
        for tri in mesh.triangles() {
            let [p0, p1, p2] = mesh.corners(tri);
            let cross = (p1.x - p0.x) * (p2.y - p0.y) - (p2.x - p0.x) * (p1.y - p0.y);
            assert!(cross > 0.0);
        }
    }

    #[test]
    fn too_few_supports() {
        assert!(matches!(Mesh::unit_square(1, 3), Err(FemError::InvalidMesh(_))));
    }

    #[test]
    fn out_of_range_triangle() {
        let vertices = array![[0.0, 1.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]];
        let result = Mesh::new(vertices, vec![Triangle::new(0, 1, 4)]);
        assert!(matches!(result, Err(FemError::InvalidMesh(_))));
    }

    #[test]
    fn unstructured_vertex_table() {
        let vertices = array![[0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let mesh = Mesh::new(vertices, vec![Triangle::new(0, 1, 2)]).unwrap();
        assert_eq!(mesh.n_vertex(), 3);
        assert_eq!((mesh.supports_x(), mesh.supports_y()), (3, 1));
        assert_eq!(mesh.vertex_iter().count(), 3);

        let result = Mesh::new(Array2::zeros((3, 3)), vec![]);
        assert!(matches!(result, Err(FemError::DimensionMismatch { expected: 2, got: 3 })));
    }
}
