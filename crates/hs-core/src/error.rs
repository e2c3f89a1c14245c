use thiserror::Error;

use crate::ResponseKind;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Size mismatch for {kind}: expected {expected}, found {found}")]
    SizeMismatch {
        kind: ResponseKind,
        expected: usize,
        found: usize,
    },

    #[error("Flat buffer length mismatch: expected {expected}, found {found}")]
    BufferLength { expected: usize, found: usize },

    #[error("Unknown response kind code {code}")]
    UnknownKind { code: i32 },
}
