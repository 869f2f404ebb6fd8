use thiserror::Error;

/// Errors raised while assembling or solving a finite-element problem
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FemError {
    #[error("J is singular and can therefore not be inverted: J = {jacobian:?}, det(J) = {determinant:e}")]
    SingularTransform {
        jacobian: [[f64; 2]; 2],
        determinant: f64,
    },
    #[error("Quadrature order {0} is not supported (expected one of 1, 3, 4, 7)")]
    UnsupportedQuadratureOrder(usize),
    #[error("Linear system of size {size} is singular or nearly singular (pivot ratio {pivot_ratio:e})")]
    SingularSystem { size: usize, pivot_ratio: f64 },
    #[error("Required step size {step:e} is below the minimum allowed at t = {time}")]
    StepSizeTooSmall { time: f64, step: f64 },
    #[error("Dimensions mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, FemError>;
