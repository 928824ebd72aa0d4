//! Exec session record and state machine.
//!
//! A session is born `Created` once the exec-create call succeeds, moves to
//! `Attaching` when the handshake starts, `Attached` once the protocol
//! switch is acknowledged, then `Detached` (fire-and-forget), `Closed`
//! (normal release), or `Failed` (handshake or transport error). Illegal
//! transitions are caught at a single choke point.

use crate::errors::{PodlinkError, PodlinkResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Requested execution mode: TTY × detach.
///
/// `tty = true` means a single combined stream with no stdout/stderr
/// separation; `tty = false` means framed multiplexed stdio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecMode {
    pub tty: bool,
    pub detach: bool,
}

impl ExecMode {
    pub fn tty(detach: bool) -> Self {
        Self { tty: true, detach }
    }

    pub fn piped(detach: bool) -> Self {
        Self { tty: false, detach }
    }
}

impl std::fmt::Display for ExecMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tty={}, detach={}", self.tty, self.detach)
    }
}

/// Lifecycle state of an exec session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Exec-create succeeded; no attach attempted yet.
    Created,

    /// Upgrade handshake in flight.
    Attaching,

    /// Protocol switch acknowledged; the channel belongs to an adapter.
    Attached,

    /// Handshake succeeded in detach mode; no channel retained.
    Detached,

    /// Channel released normally by the caller.
    Closed,

    /// Handshake or transport error. Terminal.
    Failed,
}

impl SessionState {
    /// Terminal states are never left and their sessions never reused.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, target),
            // Created → Attaching (handshake start) or Failed (pre-flight error)
            (Created, Attaching) |
            (Created, Failed) |
            // Attaching → Attached (101) or Failed (rejection / transport)
            (Attaching, Attached) |
            (Attaching, Failed) |
            // Attached → Detached (fire-and-forget), Closed (release), Failed
            (Attached, Detached) |
            (Attached, Closed) |
            (Attached, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Attaching => "attaching",
            SessionState::Attached => "attached",
            SessionState::Detached => "detached",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        }
    }
}

impl std::str::FromStr for SessionState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(SessionState::Created),
            "attaching" => Ok(SessionState::Attaching),
            "attached" => Ok(SessionState::Attached),
            "detached" => Ok(SessionState::Detached),
            "closed" => Ok(SessionState::Closed),
            "failed" => Ok(SessionState::Failed),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One exec session registered against a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecSession {
    /// Engine-assigned opaque identifier.
    pub id: String,
    /// Target container reference.
    pub container: String,
    /// Mode the session was created with; attach must match it.
    pub mode: ExecMode,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Last state change timestamp (UTC).
    pub last_updated: DateTime<Utc>,
}

impl ExecSession {
    /// New session in `Created`.
    pub fn new(id: impl Into<String>, container: impl Into<String>, mode: ExecMode) -> Self {
        Self {
            id: id.into(),
            container: container.into(),
            mode,
            state: SessionState::Created,
            last_updated: Utc::now(),
        }
    }

    /// Attempt a validated state transition.
    pub fn transition_to(&mut self, new_state: SessionState) -> PodlinkResult<()> {
        if !self.state.can_transition_to(new_state) {
            return Err(PodlinkError::InvalidTransition {
                id: self.id.clone(),
                from: self.state,
                to: new_state,
            });
        }

        self.state = new_state;
        self.last_updated = Utc::now();
        Ok(())
    }
}
