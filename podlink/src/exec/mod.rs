//! Exec sessions: creation, registry, upgrade handshake, attached streams.

pub mod frame;
pub mod handshake;
pub mod registry;
pub mod session;
pub mod stream;

pub use handshake::{Attachment, ExecClient, ExecConfig};
pub use registry::SessionRegistry;
pub use session::{ExecMode, ExecSession, SessionState};
pub use stream::{AttachedStream, CloseHandle, OutputStream};
