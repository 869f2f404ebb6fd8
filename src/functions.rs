//! Closed-form functions used as forcing terms and as reference solutions

use nalgebra::{Point2, Vector2};
use std::f64::consts::PI;

/// A scalar field on the physical domain
pub trait ScalarFunction {
    fn value(&self, p: &Point2<f64>) -> f64;
}

impl<F> ScalarFunction for F
where
    F: Fn(&Point2<f64>) -> f64,
{
    fn value(&self, p: &Point2<f64>) -> f64 {
        self(p)
    }
}

/// A closed-form solution whose derivatives are known, for consistency checks
pub trait AnalyticSolution: ScalarFunction {
    fn gradient(&self, p: &Point2<f64>) -> Vector2<f64>;

    fn laplacian(&self, p: &Point2<f64>) -> f64;
}

/// `sin(πx) sin(πy)`
#[derive(Clone, Copy, Debug, Default)]
pub struct SineBump;

impl ScalarFunction for SineBump {
    fn value(&self, p: &Point2<f64>) -> f64 {
        (PI * p.x).sin() * (PI * p.y).sin()
    }
}

impl AnalyticSolution for SineBump {
    fn gradient(&self, p: &Point2<f64>) -> Vector2<f64> {
        Vector2::new(
            PI * (PI * p.x).cos() * (PI * p.y).sin(),
            PI * (PI * p.x).sin() * (PI * p.y).cos(),
        )
    }

    fn laplacian(&self, p: &Point2<f64>) -> f64 {
        -2.0 * PI * PI * self.value(p)
    }
}

/// `cos(πx) sin(πy)`: the solution of `u - Δu = f` for `f = UTildeForcing`, vanishing on
/// y = 0 and y = 1 with zero normal derivative on x = 0 and x = 1
#[derive(Clone, Copy, Debug, Default)]
pub struct UTilde;

impl ScalarFunction for UTilde {
    fn value(&self, p: &Point2<f64>) -> f64 {
        (PI * p.x).cos() * (PI * p.y).sin()
    }
}

impl AnalyticSolution for UTilde {
    fn gradient(&self, p: &Point2<f64>) -> Vector2<f64> {
        Vector2::new(
            -PI * (PI * p.x).sin() * (PI * p.y).sin(),
            PI * (PI * p.x).cos() * (PI * p.y).cos(),
        )
    }

    fn laplacian(&self, p: &Point2<f64>) -> f64 {
        -2.0 * PI * PI * self.value(p)
    }
}

/// `(1 + 2π²) cos(πx) sin(πy)`
#[derive(Clone, Copy, Debug, Default)]
pub struct UTildeForcing;

impl ScalarFunction for UTildeForcing {
    fn value(&self, p: &Point2<f64>) -> f64 {
        (1.0 + 2.0 * PI * PI) * UTilde.value(p)
    }
}
