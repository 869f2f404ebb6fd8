use nalgebra::{Matrix2x3, Point2, Vector3};

/// Nodal basis on the reference triangle with corners (0,0), (1,0), (0,1)
pub trait ReferenceElement {
    /// Values of the three basis functions at `xi`
    fn value(&self, xi: &Point2<f64>) -> Vector3<f64>;

    /// Gradients of the three basis functions at `xi`, one per column
    fn gradients(&self, xi: &Point2<f64>) -> Matrix2x3<f64>;
}

/// Piecewise-linear element: basis `i` is 1 at reference corner `i` and 0 at the others
#[derive(Clone, Copy, Debug, Default)]
pub struct P1ReferenceElement;

impl ReferenceElement for P1ReferenceElement {
    fn value(&self, xi: &Point2<f64>) -> Vector3<f64> {
        Vector3::new(1.0 - xi.x - xi.y, xi.x, xi.y)
    }

    // Constant over the element; the point is only taken to match the trait
    fn gradients(&self, _xi: &Point2<f64>) -> Matrix2x3<f64> {
        Matrix2x3::new(-1.0, 1.0, 0.0, -1.0, 0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector2;

    #[test]
    fn nodal_values() {
        let p1 = P1ReferenceElement;
        let corners = [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)];
        for (i, corner) in corners.iter().enumerate() {
            let value = p1.value(corner);
            for j in 0..3 {
                assert_abs_diff_eq!(value[j], if i == j { 1.0 } else { 0.0 });
            }
        }
    }

    #[test]
    fn partition_of_unity() {
        let p1 = P1ReferenceElement;
        for &(x, y) in &[(0.1, 0.1), (0.25, 0.6), (1.0 / 3.0, 1.0 / 3.0), (0.9, 0.05)] {
            let xi = Point2::new(x, y);
            assert_abs_diff_eq!(p1.value(&xi).sum(), 1.0, epsilon = 1e-15);

            let gradient_sum: Vector2<f64> = p1.gradients(&xi).column_sum();
            assert_abs_diff_eq!(gradient_sum, Vector2::zeros());
        }
    }

    #[test]
    fn gradient_columns() {
        let grads = P1ReferenceElement.gradients(&Point2::new(0.2, 0.3));
        assert_abs_diff_eq!(grads.column(0).into_owned(), Vector2::new(-1.0, -1.0));
        assert_abs_diff_eq!(grads.column(1).into_owned(), Vector2::new(1.0, 0.0));
        assert_abs_diff_eq!(grads.column(2).into_owned(), Vector2::new(0.0, 1.0));
    }
}
