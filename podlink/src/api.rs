//! Wire types for the engine's Docker-compatible HTTP API.
//!
//! Only the surface the exec-attach path touches: exec create/start bodies,
//! container inspect (for the lifecycle guard), and the engine error payload.

use serde::{Deserialize, Serialize};

/// Request body for `POST /containers/{id}/exec`.
///
/// Every attach boolean must be populated; the engine can hang the started
/// process when one is omitted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecCreateRequest {
    pub cmd: Vec<String>,
    pub detach: bool,
    pub tty: bool,
    pub attach_stdin: bool,
    pub attach_stdout: bool,
    pub attach_stderr: bool,
    pub privileged: bool,
    pub user: String,
}

/// Response body for `POST /containers/{id}/exec`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecCreateResponse {
    pub id: String,
}

/// Request body for `POST /exec/{id}/start` (the upgrade request).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecStartRequest {
    pub detach: bool,
    pub tty: bool,
}

/// Structured error payload returned by the engine on non-success statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineErrorBody {
    pub message: String,
}

/// Container inspect response, reduced to what the lifecycle guard reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerInspect {
    #[serde(default)]
    pub id: String,
    pub state: ContainerState,
}

/// Container runtime state from inspect.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerState {
    pub status: String,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub paused: bool,
}

impl ContainerState {
    /// Parse the engine's status token.
    pub fn status(&self) -> ContainerStatus {
        self.status.parse().unwrap_or(ContainerStatus::Unknown)
    }
}

/// Lifecycle status token reported by the engine.
///
/// Tokens the engine is known to report; anything else maps to `Unknown`
/// so a newer daemon does not break the guard (unknown is never `running`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerStatus {
    Unknown,
    Created,
    Running,
    Paused,
    Stopping,
    Stopped,
    Exited,
    Dead,
    Removed,
}

impl ContainerStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ContainerStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Unknown => "unknown",
            ContainerStatus::Created => "created",
            ContainerStatus::Running => "running",
            ContainerStatus::Paused => "paused",
            ContainerStatus::Stopping => "stopping",
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::Exited => "exited",
            ContainerStatus::Dead => "dead",
            ContainerStatus::Removed => "removed",
        }
    }
}

impl std::str::FromStr for ContainerStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ContainerStatus::Created),
            "running" => Ok(ContainerStatus::Running),
            "paused" => Ok(ContainerStatus::Paused),
            "stopping" => Ok(ContainerStatus::Stopping),
            "stopped" => Ok(ContainerStatus::Stopped),
            "exited" => Ok(ContainerStatus::Exited),
            "dead" => Ok(ContainerStatus::Dead),
            "removed" => Ok(ContainerStatus::Removed),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
