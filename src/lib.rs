pub mod affine;
pub mod assembly;
pub mod boundary;
pub mod config;
pub mod error;
pub mod functions;
pub mod helmholtz;
pub mod interpolation;
pub mod linalg;
pub mod mesh;
pub mod quadrature;
pub mod reference_element;
pub mod timestepping;
pub mod utilities;
pub mod wave;

pub use crate::error::{FemError, Result};
pub use crate::helmholtz::solve_static;
pub use crate::wave::solve_dynamic;
