//! Tangent-stiffness estimators for hybrid simulation.
//!
//! Each estimator consumes one increment of basic displacement and basic
//! force together with the nominal initial stiffness and the previous
//! estimate, and returns the next stiffness estimate. Singular or
//! near-singular solves are reported as [`EstimatorError::EstimationFailed`]
//! and never replaced by a substitute matrix.

pub mod bfgs;
pub mod broyden;
pub mod error;
pub mod estimator;
pub mod transpose;

pub use bfgs::Bfgs;
pub use broyden::Broyden;
pub use error::{EstimatorError, EstimatorResult};
pub use estimator::{EstimatorSpec, TangentStiffEstimator, solve_checked};
pub use transpose::Transpose;
