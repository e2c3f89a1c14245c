//! Error types for stiffness estimation.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimatorError {
    #[error("Estimator '{estimator}' update: estimation failed: {what}")]
    EstimationFailed {
        estimator: &'static str,
        what: String,
    },

    #[error(
        "Estimator '{estimator}' update: dimension mismatch for {what} (expected {expected}, found {found})"
    )]
    DimensionMismatch {
        estimator: &'static str,
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Estimator '{estimator}': invalid argument: {what}")]
    InvalidArg {
        estimator: &'static str,
        what: &'static str,
    },
}

pub type EstimatorResult<T> = Result<T, EstimatorError>;
