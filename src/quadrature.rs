//! Fixed-order cubature on the reference triangle, plus a general adaptive integrator
//! (see `adaptive`) for the alternative integration strategy.
//!
//! Every fixed rule is normalized to the reference triangle's area, so integrating the
//! constant 1 gives exactly 1/2.

pub mod adaptive;

use crate::error::FemError;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Result of a numerical integration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Estimate {
    pub value: f64,
    /// Absolute error estimate; always zero for fixed-order rules
    pub error: f64,
    /// Whether the requested tolerance was met; always true for fixed-order rules
    pub converged: bool,
}

impl Estimate {
    pub fn exact(value: f64) -> Self {
        Estimate {
            value,
            error: 0.0,
            converged: true,
        }
    }
}

/// The supported fixed rules, named by their number of nodes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum RuleKind {
    /// Centroid rule, exact for degree 1
    OnePoint,
    /// Edge midpoints, exact for degree 2
    ThreePoint,
    /// Strang-Fix rule, exact for degree 3
    FourPoint,
    /// Radon's rule, exact for degree 5
    SevenPoint,
}

impl RuleKind {
    pub fn order(self) -> usize {
        match self {
            RuleKind::OnePoint => 1,
            RuleKind::ThreePoint => 3,
            RuleKind::FourPoint => 4,
            RuleKind::SevenPoint => 7,
        }
    }

    /// Highest polynomial degree integrated exactly
    pub fn degree(self) -> usize {
        match self {
            RuleKind::OnePoint => 1,
            RuleKind::ThreePoint => 2,
            RuleKind::FourPoint => 3,
            RuleKind::SevenPoint => 5,
        }
    }
}

impl TryFrom<usize> for RuleKind {
    type Error = FemError;

    fn try_from(order: usize) -> Result<Self, Self::Error> {
        match order {
            1 => Ok(RuleKind::OnePoint),
            3 => Ok(RuleKind::ThreePoint),
            4 => Ok(RuleKind::FourPoint),
            7 => Ok(RuleKind::SevenPoint),
            n => Err(FemError::UnsupportedQuadratureOrder(n)),
        }
    }
}

impl From<RuleKind> for usize {
    fn from(kind: RuleKind) -> usize {
        kind.order()
    }
}

/// Cartesian reference coordinates of the barycentric point `(l1, l2, l3)`: `x` follows
/// the weight of corner (1,0) and `y` the weight of corner (0,1)
pub fn barycentric_to_reference(l1: f64, l2: f64, l3: f64) -> Point2<f64> {
    let total = l1 + l2 + l3;
    Point2::new(l2 / total, l3 / total)
}

/// The three distinct permutations of `(a, a, 1 - 2a)`
fn orbit(a: f64) -> [(f64, f64, f64); 3] {
    let b = 1.0 - 2.0 * a;
    [(a, a, b), (a, b, a), (b, a, a)]
}

/// An immutable table of reference-triangle nodes and weights
#[derive(Clone, Debug, PartialEq)]
pub struct TriangleQuadrature {
    kind: RuleKind,
    nodes: Vec<(Point2<f64>, f64)>,
}

impl TriangleQuadrature {
    pub fn new(kind: RuleKind) -> Self {
        let third = 1.0 / 3.0;
        let centroid = barycentric_to_reference(third, third, third);

        let nodes = match kind {
            RuleKind::OnePoint => vec![(centroid, 0.5)],
            RuleKind::ThreePoint => [(0.5, 0.5, 0.0), (0.5, 0.0, 0.5), (0.0, 0.5, 0.5)]
                .iter()
                .map(|&(l1, l2, l3)| (barycentric_to_reference(l1, l2, l3), 1.0 / 6.0))
                .collect(),
            RuleKind::FourPoint => {
                let mut nodes = vec![(centroid, -27.0 / 96.0)];
                nodes.extend(
                    orbit(0.2)
                        .iter()
                        .map(|&(l1, l2, l3)| (barycentric_to_reference(l1, l2, l3), 25.0 / 96.0)),
                );
                nodes
            }
            RuleKind::SevenPoint => {
                let sqrt15 = 15.0_f64.sqrt();
                let mut nodes = vec![(centroid, 9.0 / 80.0)];
                for &(a, weight) in &[
                    ((6.0 - sqrt15) / 21.0, (155.0 - sqrt15) / 2400.0),
                    ((6.0 + sqrt15) / 21.0, (155.0 + sqrt15) / 2400.0),
                ] {
                    nodes.extend(
                        orbit(a)
                            .iter()
                            .map(|&(l1, l2, l3)| (barycentric_to_reference(l1, l2, l3), weight)),
                    );
                }
                nodes
            }
        };

        TriangleQuadrature { kind, nodes }
    }

    /// Build the rule for an integer order, rejecting anything but 1, 3, 4 and 7
    pub fn with_order(order: usize) -> Result<Self, FemError> {
        Ok(Self::new(RuleKind::try_from(order)?))
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn nodes(&self) -> &[(Point2<f64>, f64)] {
        &self.nodes
    }

    /// Weighted sum of `integrand` over the nodes. Extra arguments are captured by the
    /// closure.
    pub fn integrate<F>(&self, mut integrand: F) -> Estimate
    where
        F: FnMut(&Point2<f64>) -> f64,
    {
        let value = self
            .nodes
            .iter()
            .fold(0.0, |acc, (xi, weight)| acc + weight * integrand(xi));
        Estimate::exact(value)
    }
}
