//! Crate-wide constants.

/// Default Unix socket path of a Docker-compatible engine daemon.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/docker.sock";

/// Read buffer size for the attached-stream pump.
pub const PUMP_READ_BUF: usize = 8 * 1024;

/// Per-stream channel capacity between the pump and an output endpoint.
///
/// Bounded so transport backpressure stays visible to the peer instead of
/// piling up in memory.
pub const STREAM_CHANNEL_CAPACITY: usize = 64;

/// Content type sent on the upgrade request, per the engine's plain-text
/// upgrade negotiation contract.
pub const UPGRADE_CONTENT_TYPE: &str = "text/plain";
