//! Container lifecycle guard.
//!
//! Fail-fast check that the attach target is running. Advisory only: the
//! engine is the authority, and the handshake can still be rejected if the
//! container's state changes between this check and the upgrade request.

use crate::api::ContainerInspect;
use crate::client::{Method, RequestService};
use crate::errors::{PodlinkError, PodlinkResult};

/// Fail with `ContainerNotRunning` unless the engine reports the container
/// as running. Issues one inspect call and no upgrade traffic.
pub async fn ensure_running(svc: &dyn RequestService, container: &str) -> PodlinkResult<()> {
    let response = svc
        .issue(Method::GET, &format!("/containers/{container}/json"), None)
        .await?;

    if !response.is_success() {
        return Err(response.into_engine_error());
    }

    let inspect: ContainerInspect = response.decode()?;
    let status = inspect.state.status();

    if !status.is_running() {
        tracing::debug!(container, %status, "attach target is not running");
        return Err(PodlinkError::ContainerNotRunning {
            container: container.to_string(),
            status,
        });
    }

    Ok(())
}
