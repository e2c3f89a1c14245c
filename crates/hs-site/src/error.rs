//! Error types for sites, channels and sessions.

use hs_controls::ControlError;
use hs_core::{CoreError, ResponseKind};
use hs_setup::SetupError;
use thiserror::Error;

use crate::codec::Action;
use crate::session::SessionState;

pub type SiteResult<T> = Result<T, SiteError>;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Site '{site}' {op}: not configured")]
    NotConfigured { site: String, op: &'static str },

    #[error("Site '{site}' configure: already configured")]
    AlreadyConfigured { site: String },

    /// The kind has a zero count in the negotiated sizes.
    #[error("Site '{site}' {op}: no {kind} in this session")]
    NoSuchKind {
        site: String,
        op: &'static str,
        kind: ResponseKind,
    },

    #[error("Site '{site}' {op}: {kind} has {found} entries, expected {expected}")]
    SizeMismatch {
        site: String,
        op: &'static str,
        kind: ResponseKind,
        expected: usize,
        found: usize,
    },

    /// The peer broke the framing or the message order; the session is over.
    #[error("Site '{site}' {op}: protocol error: {what}")]
    Protocol {
        site: String,
        op: &'static str,
        what: String,
    },

    /// The local session state does not admit the message.
    #[error("Site '{site}': {action} rejected in state {state}")]
    SessionState {
        site: String,
        action: Action,
        state: SessionState,
    },

    /// The peer answered with a failure header.
    #[error("Site '{site}' {op}: peer refused: {what}")]
    Refused {
        site: String,
        op: &'static str,
        what: String,
    },

    #[error("Site '{site}' commit_state: daq response not fetched since the last trial")]
    CommitBeforeDaq { site: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl SiteError {
    /// True when the session cannot continue and must be rebuilt.
    pub fn is_fatal(&self) -> bool {
        match self {
            SiteError::Protocol { .. } | SiteError::Refused { .. } | SiteError::Io(_) => true,
            SiteError::Setup(e) => e.is_fatal(),
            _ => false,
        }
    }
}
