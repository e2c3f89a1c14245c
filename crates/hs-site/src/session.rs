//! Session state machine shared by both ends of a channel.
//!
//! ```text
//! Unconnected -> Open -(open acked)-> Configuring -(trial sizes acked)->
//!     Configuring -(daq sizes acked)-> Ready -(die)-> Terminated
//! ```
//!
//! Any rejection moves the session to `Failed`. `Failed` and `Terminated`
//! admit nothing; a new session needs a new channel.

use std::fmt;

use crate::codec::Action;
use crate::error::{SiteError, SiteResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    /// Channel established, `open` not yet acknowledged.
    Open,
    Configuring {
        trial_accepted: bool,
    },
    Ready,
    Terminated,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Terminated | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unconnected => f.write_str("unconnected"),
            SessionState::Open => f.write_str("open"),
            SessionState::Configuring {
                trial_accepted: false,
            } => f.write_str("configuring (trial sizes pending)"),
            SessionState::Configuring {
                trial_accepted: true,
            } => f.write_str("configuring (daq sizes pending)"),
            SessionState::Ready => f.write_str("ready"),
            SessionState::Terminated => f.write_str("terminated"),
            SessionState::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Session {
    site: String,
    state: SessionState,
}

impl Session {
    /// A session on a freshly established channel.
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            state: SessionState::Open,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Whether `action` may be sent or handled now.
    pub fn admits(&self, action: Action) -> bool {
        use SessionState::*;
        match (self.state, action) {
            (Terminated | Failed | Unconnected, _) => false,
            (_, Action::Die) => true,
            (Open, Action::Open) => true,
            (Configuring { .. }, Action::Setup) => true,
            (Ready, a) => !matches!(a, Action::Open | Action::Setup | Action::Execute),
            _ => false,
        }
    }

    /// Rejects `action` without touching the state.
    pub fn check(&self, action: Action) -> SiteResult<()> {
        if self.admits(action) {
            Ok(())
        } else {
            tracing::warn!(site = %self.site, %action, state = %self.state, "message rejected");
            Err(SiteError::SessionState {
                site: self.site.clone(),
                action,
                state: self.state,
            })
        }
    }

    /// Records that `action` completed. Call only after a successful
    /// [`check`](Self::check).
    pub fn complete(&mut self, action: Action) {
        use SessionState::*;
        let next = match (self.state, action) {
            (_, Action::Die) => Terminated,
            (Open, Action::Open) => Configuring {
                trial_accepted: false,
            },
            (
                Configuring {
                    trial_accepted: false,
                },
                Action::Setup,
            ) => Configuring {
                trial_accepted: true,
            },
            (
                Configuring {
                    trial_accepted: true,
                },
                Action::Setup,
            ) => Ready,
            (state, _) => state,
        };
        if next != self.state {
            tracing::debug!(site = %self.site, from = %self.state, to = %next, "session transition");
            self.state = next;
        }
    }

    pub fn fail(&mut self) {
        if self.state != SessionState::Failed {
            tracing::warn!(site = %self.site, from = %self.state, "session failed");
            self.state = SessionState::Failed;
        }
    }

    /// Channel dropped without `die`.
    pub fn disconnect(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Unconnected;
        }
    }
}
