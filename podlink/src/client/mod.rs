//! Request Service seam.
//!
//! Everything the exec-attach core needs from the engine fits behind one
//! trait: issue a plain request, or perform the protocol upgrade. The
//! upgrade deliberately returns a tagged outcome rather than a response
//! object whose shape depends on a status field — a rejected upgrade can
//! never be mistaken for a raw stream, and vice versa.

mod unix;

pub use unix::UnixEngineClient;

use crate::api::EngineErrorBody;
use crate::errors::{PodlinkError, PodlinkResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite};

pub use hyper::Method;

/// Duplex byte channel handed over by a successful upgrade.
///
/// Ownership is transferred to exactly one holder; the trait object keeps
/// the seam independent of the concrete transport.
pub trait RawIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> RawIo for T {}

/// Boxed raw channel.
pub type RawChannel = Box<dyn RawIo>;

/// Outcome of an upgrade request that reached the engine.
///
/// Transport-level failures (refused, reset, timeout) never appear here;
/// they surface as `Err(PodlinkError::Transport)` from `upgrade` itself.
pub enum UpgradeOutcome {
    /// 101 Switching Protocols: the connection is now a raw byte stream.
    Switched(RawChannel),
    /// The engine declined with a normal response; the decoded error
    /// message is carried so callers can present it verbatim.
    Rejected { status: u16, message: String },
}

impl std::fmt::Debug for UpgradeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpgradeOutcome::Switched(_) => f.write_str("Switched(..)"),
            UpgradeOutcome::Rejected { status, message } => f
                .debug_struct("Rejected")
                .field("status", status)
                .field("message", message)
                .finish(),
        }
    }
}

/// Plain request/response result.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl EngineResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> PodlinkResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| PodlinkError::Protocol(format!("undecodable engine response: {e}")))
    }

    /// Best-effort extraction of the engine's error message.
    pub fn error_message(&self) -> String {
        match serde_json::from_slice::<EngineErrorBody>(&self.body) {
            Ok(err) => err.message,
            Err(_) => String::from_utf8_lossy(&self.body).into_owned(),
        }
    }

    /// Convert a non-success response into the ambient engine error.
    pub fn into_engine_error(self) -> PodlinkError {
        PodlinkError::Engine {
            status: self.status,
            message: self.error_message(),
        }
    }
}

/// Request/response access to the engine daemon.
///
/// `issue` returns non-success statuses as data, not errors: callers decide
/// which statuses are acceptable for their endpoint. `upgrade` is used
/// exclusively by the handshake.
#[async_trait]
pub trait RequestService: Send + Sync {
    /// Issue a plain request and collect the response body.
    async fn issue(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> PodlinkResult<EngineResponse>;

    /// Send an upgrade request and either hand back the raw connection or
    /// the engine's structured rejection.
    async fn upgrade(&self, path: &str, body: serde_json::Value) -> PodlinkResult<UpgradeOutcome>;
}
