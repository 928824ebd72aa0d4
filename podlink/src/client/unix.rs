//! Unix-socket engine client.
//!
//! One HTTP/1.1 connection per request, hand-rolled over `hyper`'s client
//! conn so the upgrade path can take ownership of the underlying socket.

use super::{EngineResponse, Method, RawChannel, RequestService, UpgradeOutcome};
use crate::constants::{DEFAULT_SOCKET_PATH, UPGRADE_CONTENT_TYPE};
use crate::errors::{PodlinkError, PodlinkResult};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use std::path::{Path, PathBuf};
use tokio::net::UnixStream;

/// Engine client speaking Docker-compatible HTTP over a Unix socket.
pub struct UnixEngineClient {
    socket_path: PathBuf,
}

impl UnixEngineClient {
    /// Client against the default daemon socket.
    pub fn new() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
        }
    }

    /// Client against a custom socket path.
    pub fn with_socket(path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: path.as_ref().to_path_buf(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    async fn connect(
        &self,
    ) -> PodlinkResult<(
        hyper::client::conn::http1::SendRequest<Full<Bytes>>,
        hyper::client::conn::http1::Connection<TokioIo<UnixStream>, Full<Bytes>>,
    )> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            PodlinkError::Transport(format!(
                "failed to connect to engine at {}: {e}",
                self.socket_path.display()
            ))
        })?;

        let (sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| PodlinkError::Transport(format!("HTTP handshake failed: {e}")))?;

        Ok((sender, conn))
    }

    fn build_request(
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        upgrade: bool,
    ) -> PodlinkResult<Request<Full<Bytes>>> {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("http://localhost{path}"))
            .header(header::HOST, "localhost");

        if upgrade {
            builder = builder
                .header(header::CONNECTION, "Upgrade")
                .header(header::UPGRADE, "tcp")
                .header(header::CONTENT_TYPE, UPGRADE_CONTENT_TYPE);
        }

        let bytes = match body {
            Some(value) => {
                let encoded = serde_json::to_vec(&value)
                    .map_err(|e| PodlinkError::Internal(format!("unserializable body: {e}")))?;
                if !upgrade {
                    builder = builder.header(header::CONTENT_TYPE, "application/json");
                }
                builder = builder.header(header::CONTENT_LENGTH, encoded.len());
                Bytes::from(encoded)
            }
            None => Bytes::new(),
        };

        builder
            .body(Full::new(bytes))
            .map_err(|e| PodlinkError::Internal(format!("failed to build request: {e}")))
    }
}

impl Default for UnixEngineClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestService for UnixEngineClient {
    async fn issue(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> PodlinkResult<EngineResponse> {
        let (mut sender, conn) = self.connect().await?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("engine connection closed: {e}");
            }
        });

        let request = Self::build_request(method, path, body, false)?;
        let response = sender
            .send_request(request)
            .await
            .map_err(|e| PodlinkError::Transport(format!("request failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| PodlinkError::Transport(format!("failed to read response: {e}")))?
            .to_bytes()
            .to_vec();

        Ok(EngineResponse { status, body })
    }

    async fn upgrade(&self, path: &str, body: serde_json::Value) -> PodlinkResult<UpgradeOutcome> {
        let (mut sender, conn) = self.connect().await?;

        // The connection task must keep running (with upgrades enabled) for
        // hyper to release the socket after the 101.
        tokio::spawn(async move {
            if let Err(e) = conn.with_upgrades().await {
                tracing::debug!("upgrade connection closed: {e}");
            }
        });

        let request = Self::build_request(Method::POST, path, Some(body), true)?;
        let response = sender
            .send_request(request)
            .await
            .map_err(|e| PodlinkError::Transport(format!("upgrade request failed: {e}")))?;

        let status = response.status();
        if status != StatusCode::SWITCHING_PROTOCOLS {
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| PodlinkError::Transport(format!("failed to read rejection: {e}")))?
                .to_bytes()
                .to_vec();

            let rejection = EngineResponse {
                status: status.as_u16(),
                body,
            };
            let message = rejection.error_message();

            tracing::debug!(status = rejection.status, %message, "engine declined upgrade");
            return Ok(UpgradeOutcome::Rejected {
                status: rejection.status,
                message,
            });
        }

        let upgraded = hyper::upgrade::on(response)
            .await
            .map_err(|e| PodlinkError::Transport(format!("connection upgrade failed: {e}")))?;

        tracing::debug!(path, "protocol switch accepted");
        Ok(UpgradeOutcome::Switched(
            Box::new(TokioIo::new(upgraded)) as RawChannel
        ))
    }
}
