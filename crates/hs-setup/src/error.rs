//! Error types for experimental setups.

use hs_controls::ControlError;
use hs_core::{CoreError, ResponseKind};
use thiserror::Error;

pub type SetupResult<T> = Result<T, SetupError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SetupError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// A used response kind does not have the setup's fixed arity.
    #[error(
        "Setup '{setup}' set_size: {side} {kind} count must be 0 or {expected}, found {found}"
    )]
    ArityMismatch {
        setup: String,
        side: &'static str,
        kind: ResponseKind,
        expected: usize,
        found: usize,
    },

    #[error("Setup '{setup}' {op}: not implemented: {what}")]
    NotImplemented {
        setup: String,
        op: &'static str,
        what: String,
    },

    #[error("Setup '{setup}' {op}: {what}")]
    Invalid {
        setup: String,
        op: &'static str,
        what: String,
    },

    #[error("Setup '{setup}' {op}: set_size has not been called")]
    NotSized { setup: String, op: &'static str },

    /// No control was committed.
    #[error("Setup '{setup}' commit_state: control '{control}' has nothing to commit")]
    CommitRefused { setup: String, control: String },

    /// A control failed mid-commit. With `rolled_back` the controls
    /// committed before it were undone; without it the specimens are in a
    /// partially committed state and the session must not continue.
    #[error(
        "Setup '{setup}' commit_state: control '{control}' failed (rolled back: {rolled_back}): {source}"
    )]
    CommitFailed {
        setup: String,
        control: String,
        rolled_back: bool,
        source: ControlError,
    },

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl SetupError {
    /// True when the session cannot safely continue.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SetupError::CommitFailed {
                rolled_back: false,
                ..
            }
        )
    }
}
