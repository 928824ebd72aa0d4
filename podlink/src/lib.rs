//! podlink — client library for Docker-compatible container engines.
//!
//! The crate centers on the exec-attach protocol: create an exec session
//! against a running container, then upgrade an ordinary request/response
//! exchange into a raw duplex byte stream carrying the process's stdio.
//!
//! ```rust,no_run
//! # async fn example() -> podlink::PodlinkResult<()> {
//! use std::sync::Arc;
//! use podlink::{Attachment, ExecClient, ExecConfig, UnixEngineClient};
//!
//! let client = ExecClient::new(Arc::new(UnixEngineClient::new()));
//!
//! let config = ExecConfig::new("sh").arg("-c").arg("echo hello");
//! let exec_id = client.create("my-container", &config).await?;
//!
//! if let Attachment::Interactive(mut stream) = client.attach(&exec_id, config.mode()).await? {
//!     stream.write(b"input\n").await?;
//!     let mut stdout = stream.stdout().unwrap();
//!     while let Some(chunk) = stdout.read().await? {
//!         print!("{}", String::from_utf8_lossy(&chunk));
//!     }
//!     stream.close().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod constants;
pub mod errors;
pub mod exec;
pub mod lifecycle;

pub use client::{
    EngineResponse, Method, RawChannel, RequestService, UnixEngineClient, UpgradeOutcome,
};
pub use errors::{PodlinkError, PodlinkResult};
pub use exec::{
    AttachedStream, Attachment, CloseHandle, ExecClient, ExecConfig, ExecMode, ExecSession,
    OutputStream, SessionRegistry, SessionState,
};
