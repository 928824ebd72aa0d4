//! Test helpers for podlink: a scripted stub engine and a simulated peer.
//!
//! `StubEngine` implements `RequestService` entirely in memory. Upgrade
//! calls can be scripted to accept (handing the test the peer end of an
//! in-memory duplex), reject with a structured error, or fail at the
//! transport level. Call counters let tests assert that pre-flight
//! failures never reach the wire.

use async_trait::async_trait;
use parking_lot::Mutex;
use podlink::client::{EngineResponse, Method, RequestService, UpgradeOutcome};
use podlink::errors::{PodlinkError, PodlinkResult};
use podlink::exec::frame::{encode_frame, StreamKind};
use serde_json::json;
use std::collections::HashMap;
use tokio::io::{AsyncWriteExt, DuplexStream};

/// Scripted upgrade behavior.
#[derive(Clone)]
pub enum UpgradeBehavior {
    /// Return 101 and hand over one end of an in-memory duplex; the other
    /// end becomes available via [`StubEngine::take_peer`].
    Accept,
    /// Decline with a structured error payload.
    Reject { status: u16, message: String },
    /// Fail at the transport level (no decodable payload).
    Fail(String),
}

struct Inner {
    container_status: HashMap<String, String>,
    upgrade_behavior: UpgradeBehavior,
    next_exec: u64,
    exec_bodies: Vec<serde_json::Value>,
    upgrade_bodies: Vec<serde_json::Value>,
    issue_calls: usize,
    upgrade_calls: usize,
    peer: Option<DuplexStream>,
}

/// In-memory engine double.
pub struct StubEngine {
    inner: Mutex<Inner>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                container_status: HashMap::new(),
                upgrade_behavior: UpgradeBehavior::Accept,
                next_exec: 0,
                exec_bodies: Vec::new(),
                upgrade_bodies: Vec::new(),
                issue_calls: 0,
                upgrade_calls: 0,
                peer: None,
            }),
        }
    }

    /// Engine with one running container.
    pub fn with_running(container: &str) -> Self {
        let engine = Self::new();
        engine.set_container_status(container, "running");
        engine
    }

    /// Script the status the inspect endpoint reports for a container.
    pub fn set_container_status(&self, container: &str, status: &str) {
        self.inner
            .lock()
            .container_status
            .insert(container.to_string(), status.to_string());
    }

    /// Script how the next upgrade calls behave.
    pub fn set_upgrade_behavior(&self, behavior: UpgradeBehavior) {
        self.inner.lock().upgrade_behavior = behavior;
    }

    /// Take the server end of the most recent accepted upgrade.
    pub fn take_peer(&self) -> Option<DuplexStream> {
        self.inner.lock().peer.take()
    }

    pub fn issue_calls(&self) -> usize {
        self.inner.lock().issue_calls
    }

    pub fn upgrade_calls(&self) -> usize {
        self.inner.lock().upgrade_calls
    }

    /// Body of the most recent exec-create request.
    pub fn last_exec_body(&self) -> Option<serde_json::Value> {
        self.inner.lock().exec_bodies.last().cloned()
    }

    /// Body of the most recent upgrade request.
    pub fn last_upgrade_body(&self) -> Option<serde_json::Value> {
        self.inner.lock().upgrade_bodies.last().cloned()
    }

    fn not_found(message: &str) -> EngineResponse {
        EngineResponse {
            status: 404,
            body: json!({ "message": message }).to_string().into_bytes(),
        }
    }
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestService for StubEngine {
    async fn issue(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> PodlinkResult<EngineResponse> {
        let mut inner = self.inner.lock();
        inner.issue_calls += 1;

        // GET /containers/{id}/json
        if method == Method::GET {
            if let Some(container) = path
                .strip_prefix("/containers/")
                .and_then(|rest| rest.strip_suffix("/json"))
            {
                return match inner.container_status.get(container) {
                    Some(status) => Ok(EngineResponse {
                        status: 200,
                        body: json!({
                            "Id": container,
                            "State": {
                                "Status": status,
                                "Running": status == "running",
                                "Paused": status == "paused",
                            }
                        })
                        .to_string()
                        .into_bytes(),
                    }),
                    None => Ok(Self::not_found("no such container")),
                };
            }
        }

        // POST /containers/{id}/exec
        if method == Method::POST {
            if let Some(container) = path
                .strip_prefix("/containers/")
                .and_then(|rest| rest.strip_suffix("/exec"))
            {
                if !inner.container_status.contains_key(container) {
                    return Ok(Self::not_found("no such container"));
                }

                inner.exec_bodies.push(body.unwrap_or_default());
                inner.next_exec += 1;
                let id = format!("exec-{:04}", inner.next_exec);
                return Ok(EngineResponse {
                    status: 201,
                    body: json!({ "Id": id }).to_string().into_bytes(),
                });
            }
        }

        Ok(Self::not_found("no such endpoint"))
    }

    async fn upgrade(&self, _path: &str, body: serde_json::Value) -> PodlinkResult<UpgradeOutcome> {
        let mut inner = self.inner.lock();
        inner.upgrade_calls += 1;
        inner.upgrade_bodies.push(body);

        match inner.upgrade_behavior.clone() {
            UpgradeBehavior::Accept => {
                let (client_side, server_side) = tokio::io::duplex(64 * 1024);
                inner.peer = Some(server_side);
                Ok(UpgradeOutcome::Switched(Box::new(client_side)))
            }
            UpgradeBehavior::Reject { status, message } => {
                Ok(UpgradeOutcome::Rejected { status, message })
            }
            UpgradeBehavior::Fail(cause) => Err(PodlinkError::Transport(cause)),
        }
    }
}

/// Write one multiplexed stdio frame to the peer end.
pub async fn write_frame(peer: &mut DuplexStream, kind: StreamKind, payload: &[u8]) {
    peer.write_all(&encode_frame(kind, payload))
        .await
        .expect("peer write failed");
}
