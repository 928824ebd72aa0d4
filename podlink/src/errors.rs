//! Error types for podlink.

use crate::api::ContainerStatus;
use crate::exec::session::{ExecMode, SessionState};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type PodlinkResult<T> = Result<T, PodlinkError>;

/// Errors surfaced by the exec-attach client.
///
/// Local precondition failures (`InvalidTransition`, `ModeMismatch`,
/// `ContainerNotRunning`) are detected before any upgrade request is sent.
/// `Rejected` and `Transport` are distinct categories: the first carries the
/// engine's decoded error payload, the second a connection-level cause with
/// no payload at all.
#[derive(Debug, Error)]
pub enum PodlinkError {
    /// An exec session with this id already exists in a non-terminal state.
    #[error("exec session already registered: {0}")]
    DuplicateSession(String),

    /// The requested state change violates the session state machine.
    #[error("invalid session transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: SessionState,
        to: SessionState,
    },

    /// No session with this id is known to the registry.
    #[error("unknown exec session: {0}")]
    UnknownSession(String),

    /// Attach was requested with a mode different from the one the session
    /// was created with.
    #[error("exec session {id} was created with {declared}, attach requested {requested}")]
    ModeMismatch {
        id: String,
        declared: ExecMode,
        requested: ExecMode,
    },

    /// The target container is not in the `running` state.
    #[error("container {container} is not running (status: {status})")]
    ContainerNotRunning {
        container: String,
        status: ContainerStatus,
    },

    /// The engine declined the protocol upgrade with a decodable error
    /// payload. The message is surfaced verbatim.
    #[error("engine rejected upgrade: {0}")]
    Rejected(String),

    /// Connection-level failure: refused, reset mid-handshake, timed out.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Read, write, or any other use of a channel after it was released.
    #[error("channel already closed")]
    ChannelClosed,

    /// Non-success status on a plain (non-upgrade) engine call.
    #[error("engine returned status {status}: {message}")]
    Engine { status: u16, message: String },

    /// Malformed data on the wire (bad frame tag, undecodable payload).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invariant breakage inside the client itself.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for PodlinkError {
    fn from(err: std::io::Error) -> Self {
        PodlinkError::Transport(err.to_string())
    }
}

impl From<hyper::Error> for PodlinkError {
    fn from(err: hyper::Error) -> Self {
        PodlinkError::Transport(err.to_string())
    }
}
