//! Exec create and the upgrade handshake.
//!
//! `ExecClient::attach` converts a created exec session into a raw channel.
//! Every local precondition (mode match, lifecycle guard, state machine) is
//! checked before the upgrade request goes out; the upgrade itself resolves
//! to a tagged outcome so a rejection is never parsed as a stream.

use crate::api::{ExecCreateRequest, ExecCreateResponse, ExecStartRequest};
use crate::client::{Method, RequestService, UpgradeOutcome};
use crate::errors::{PodlinkError, PodlinkResult};
use crate::exec::registry::SessionRegistry;
use crate::exec::session::{ExecMode, ExecSession, SessionState};
use crate::exec::stream::AttachedStream;
use crate::lifecycle;
use std::sync::Arc;

/// Command descriptor for an exec session.
///
/// Builder API in the manner of `std::process::Command`:
///
/// ```rust,no_run
/// # use podlink::ExecConfig;
/// let config = ExecConfig::new("echo").arg("test").tty(false).detach(false);
/// ```
#[derive(Debug, Clone)]
pub struct ExecConfig {
    cmd: Vec<String>,
    tty: bool,
    detach: bool,
    user: String,
    privileged: bool,
}

impl ExecConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            cmd: vec![program.into()],
            tty: false,
            detach: false,
            user: String::new(),
            privileged: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.cmd.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd.extend(args.into_iter().map(Into::into));
        self
    }

    /// Allocate a pseudo-terminal (single combined output stream).
    pub fn tty(mut self, enable: bool) -> Self {
        self.tty = enable;
        self
    }

    /// Fire-and-forget: no interactive channel is retained after start.
    pub fn detach(mut self, enable: bool) -> Self {
        self.detach = enable;
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn privileged(mut self, enable: bool) -> Self {
        self.privileged = enable;
        self
    }

    /// Mode this descriptor declares for the session.
    pub fn mode(&self) -> ExecMode {
        ExecMode {
            tty: self.tty,
            detach: self.detach,
        }
    }
}

/// Result of a successful attach.
pub enum Attachment {
    /// Interactive channel; the caller owns it until `close()`.
    Interactive(AttachedStream),
    /// Detach mode: the process was started and the channel was already
    /// released; no further I/O is expected.
    Detached,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Attachment::Interactive(_) => f.write_str("Interactive(..)"),
            Attachment::Detached => f.write_str("Detached"),
        }
    }
}

/// Client for the exec-attach surface of the engine.
pub struct ExecClient {
    svc: Arc<dyn RequestService>,
    registry: SessionRegistry,
}

impl ExecClient {
    pub fn new(svc: Arc<dyn RequestService>) -> Self {
        Self {
            svc,
            registry: SessionRegistry::new(),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Create an exec session against a container.
    ///
    /// Registers the engine-assigned id with the registry and returns it.
    pub async fn create(&self, container: &str, config: &ExecConfig) -> PodlinkResult<String> {
        let request = ExecCreateRequest {
            cmd: config.cmd.clone(),
            detach: config.detach,
            tty: config.tty,
            // The engine hangs the started process when any attach flag is
            // missing from the descriptor, so all three are always sent.
            attach_stdin: true,
            attach_stdout: true,
            attach_stderr: true,
            privileged: config.privileged,
            user: config.user.clone(),
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| PodlinkError::Internal(format!("unserializable exec config: {e}")))?;

        let response = self
            .svc
            .issue(Method::POST, &format!("/containers/{container}/exec"), Some(body))
            .await?;

        if !response.is_success() {
            return Err(response.into_engine_error());
        }

        let created: ExecCreateResponse = response.decode()?;
        tracing::debug!(container, exec_id = %created.id, "exec session created");

        self.registry
            .record(ExecSession::new(&created.id, container, config.mode()))?;

        Ok(created.id)
    }

    /// Upgrade a created session into a raw channel.
    ///
    /// Succeeds at most once per session: the compare-and-transition to
    /// `Attaching` makes a second call fail with `InvalidTransition`
    /// regardless of how the first one ended. No retry is attempted here;
    /// reattaching may re-run a process, so retry policy belongs to the
    /// caller.
    pub async fn attach(&self, exec_id: &str, mode: ExecMode) -> PodlinkResult<Attachment> {
        let session = self.registry.get(exec_id)?;

        if session.mode != mode {
            return Err(PodlinkError::ModeMismatch {
                id: exec_id.to_string(),
                declared: session.mode,
                requested: mode,
            });
        }

        // A session that already left Created can never attach again; reject
        // it here so no inspect call goes out. The compare-and-transition
        // below remains the gate against concurrent attachers.
        if session.state != SessionState::Created {
            return Err(PodlinkError::InvalidTransition {
                id: exec_id.to_string(),
                from: session.state,
                to: SessionState::Attaching,
            });
        }

        // Fail fast with a better message; the engine remains the authority.
        lifecycle::ensure_running(self.svc.as_ref(), &session.container).await?;

        self.registry.transition(exec_id, SessionState::Attaching)?;

        let body = serde_json::to_value(ExecStartRequest {
            detach: mode.detach,
            tty: mode.tty,
        })
        .map_err(|e| PodlinkError::Internal(format!("unserializable start body: {e}")))?;

        tracing::debug!(exec_id, %mode, "starting upgrade handshake");
        let outcome = match self.svc.upgrade(&format!("/exec/{exec_id}/start"), body).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let _ = self.registry.transition(exec_id, SessionState::Failed);
                return Err(e);
            }
        };

        match outcome {
            UpgradeOutcome::Switched(channel) => {
                self.registry.transition(exec_id, SessionState::Attached)?;

                let stream = AttachedStream::new(channel, mode);
                if mode.detach {
                    // Nothing more will be read or written; release now.
                    stream.close().await?;
                    self.registry.transition(exec_id, SessionState::Detached)?;
                    tracing::debug!(exec_id, "detached exec started");
                    return Ok(Attachment::Detached);
                }

                let registry = self.registry.clone();
                let id = exec_id.to_string();
                stream.set_release_hook(move || {
                    // The session may already be Failed; release still wins
                    // the resource, the bookkeeping just keeps its state.
                    let _ = registry.transition(&id, SessionState::Closed);
                });

                tracing::debug!(exec_id, "attached");
                Ok(Attachment::Interactive(stream))
            }
            UpgradeOutcome::Rejected { status, message } => {
                let _ = self.registry.transition(exec_id, SessionState::Failed);
                tracing::debug!(exec_id, status, %message, "upgrade rejected");
                Err(PodlinkError::Rejected(message))
            }
        }
    }
}
