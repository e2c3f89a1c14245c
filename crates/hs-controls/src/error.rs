//! Error types for experimental control operations.

use hs_core::{CoreError, ResponseKind};
use hs_tangent::EstimatorError;
use thiserror::Error;

/// Result type for control operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors raised by controls, control points and signal filters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided when building a control component.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error(
        "Control '{control}' {op}: size mismatch for {kind} (expected {expected}, found {found})"
    )]
    SizeMismatch {
        control: String,
        op: &'static str,
        kind: ResponseKind,
        expected: usize,
        found: usize,
    },

    /// The backend cannot serve the requested response kind.
    #[error("Control '{control}' {op}: unsupported {kind} channel: {what}")]
    Unsupported {
        control: String,
        op: &'static str,
        kind: ResponseKind,
        what: String,
    },

    #[error(
        "Control '{control}' set_trial_response: {kind} signal {index} = {value} outside limits [{lower}, {upper}]"
    )]
    LimitExceeded {
        control: String,
        kind: ResponseKind,
        index: usize,
        value: f64,
        lower: f64,
        upper: f64,
    },

    /// Operation called in the wrong lifecycle state.
    #[error("Control '{control}' {op}: {what}")]
    StateError {
        control: String,
        op: &'static str,
        what: String,
    },

    #[error("Filter '{filter}': {what}")]
    Filter { filter: &'static str, what: String },

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Estimator error: {0}")]
    Estimator(#[from] EstimatorError),
}
