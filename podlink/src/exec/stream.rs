//! Attached stream adapter.
//!
//! Wraps the raw channel handed over by a successful upgrade. A pump task
//! owns the read half: in TTY mode it forwards raw chunks to one combined
//! output endpoint, in non-TTY mode it demultiplexes stdio frames to
//! stdout/stderr endpoints. Writes go to stdin and carry no framing.
//!
//! Release is exactly-once: `close()` is idempotent, callable from any
//! task (via `CloseHandle`), cancels the pump, and shuts down the write
//! half. After release every read and write observes `ChannelClosed`.
//! Clean end-of-stream from the peer yields `None` from the endpoints and
//! is the only attach-completion signal.

use crate::constants::{PUMP_READ_BUF, STREAM_CHANNEL_CAPACITY};
use crate::errors::{PodlinkError, PodlinkResult};
use crate::exec::frame::{FrameDecoder, StreamKind};
use crate::exec::session::ExecMode;
use crate::RawChannel;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// State shared between the adapter, its close handles, and the pump.
struct Shared {
    released: AtomicBool,
    cancel: CancellationToken,
    writer: tokio::sync::Mutex<Option<WriteHalf<RawChannel>>>,
    on_release: parking_lot::Mutex<Option<ReleaseHook>>,
}

impl Shared {
    /// Release the channel. No-op after the first call.
    async fn close(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        self.cancel.cancel();
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        if let Some(hook) = self.on_release.lock().take() {
            hook();
        }
        tracing::debug!("attached channel released");
    }

    /// Synchronous release for drop paths: cancels the pump and fires the
    /// hook; the write half goes down with the last Arc.
    fn close_abrupt(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        self.cancel.cancel();
        if let Some(hook) = self.on_release.lock().take() {
            hook();
        }
        tracing::trace!("attached channel dropped without close");
    }
}

/// Interactive channel to a remote process.
pub struct AttachedStream {
    mode: ExecMode,
    shared: Arc<Shared>,
    stdout: Option<OutputStream>,
    stderr: Option<OutputStream>,
}

impl AttachedStream {
    /// Take ownership of a raw channel and start the pump.
    pub fn new(channel: RawChannel, mode: ExecMode) -> Self {
        let (read_half, write_half) = tokio::io::split(channel);

        let shared = Arc::new(Shared {
            released: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            writer: tokio::sync::Mutex::new(Some(write_half)),
            on_release: parking_lot::Mutex::new(None),
        });

        let (stdout_tx, stdout_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let (stderr_tx, stderr_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

        tokio::spawn(pump(
            read_half,
            mode,
            stdout_tx,
            stderr_tx,
            shared.cancel.clone(),
        ));

        let released = ReleasedFlag(shared.clone());
        Self {
            mode,
            stdout: Some(OutputStream {
                rx: stdout_rx,
                released: released.clone(),
            }),
            stderr: Some(OutputStream {
                rx: stderr_rx,
                released,
            }),
            shared,
        }
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    /// Register a hook to run exactly once when the channel is released.
    pub(crate) fn set_release_hook(&self, hook: impl FnOnce() + Send + 'static) {
        *self.shared.on_release.lock() = Some(Box::new(hook));
    }

    /// Take the stdout endpoint (non-TTY mode; can only be taken once).
    pub fn stdout(&mut self) -> Option<OutputStream> {
        if self.mode.tty {
            return None;
        }
        self.stdout.take()
    }

    /// Take the stderr endpoint (non-TTY mode; can only be taken once).
    pub fn stderr(&mut self) -> Option<OutputStream> {
        if self.mode.tty {
            return None;
        }
        self.stderr.take()
    }

    /// Take the combined output endpoint (TTY mode; can only be taken once).
    pub fn output(&mut self) -> Option<OutputStream> {
        if !self.mode.tty {
            return None;
        }
        self.stdout.take()
    }

    /// Write stdin bytes to the remote process.
    pub async fn write(&self, data: &[u8]) -> PodlinkResult<()> {
        if self.shared.released.load(Ordering::SeqCst) {
            return Err(PodlinkError::ChannelClosed);
        }

        let mut guard = self.shared.writer.lock().await;
        let writer = guard.as_mut().ok_or(PodlinkError::ChannelClosed)?;
        writer
            .write_all(data)
            .await
            .map_err(|e| PodlinkError::Transport(format!("stdin write failed: {e}")))
    }

    /// Release the channel. Safe to call repeatedly; the second call is a
    /// no-op, so cleanup code on any exit path can call it unconditionally.
    pub async fn close(&self) -> PodlinkResult<()> {
        self.shared.close().await;
        Ok(())
    }

    /// Handle for releasing the channel from another task, e.g. a timeout
    /// or cancellation path.
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle(self.shared.clone())
    }

    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }
}

impl Drop for AttachedStream {
    fn drop(&mut self) {
        self.shared.close_abrupt();
    }
}

/// Cloneable handle that can release the channel from any task.
#[derive(Clone)]
pub struct CloseHandle(Arc<Shared>);

impl CloseHandle {
    pub async fn close(&self) -> PodlinkResult<()> {
        self.0.close().await;
        Ok(())
    }

    pub fn is_released(&self) -> bool {
        self.0.released.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct ReleasedFlag(Arc<Shared>);

impl ReleasedFlag {
    fn get(&self) -> bool {
        self.0.released.load(Ordering::SeqCst)
    }
}

/// One logical read endpoint fed by the pump.
pub struct OutputStream {
    rx: mpsc::Receiver<Vec<u8>>,
    released: ReleasedFlag,
}

impl OutputStream {
    /// Next chunk of output.
    ///
    /// `Ok(None)` is clean end-of-stream from the peer. After the channel
    /// is released the call fails with `ChannelClosed` instead, including
    /// a read already blocked when the release happens.
    pub async fn read(&mut self) -> PodlinkResult<Option<Vec<u8>>> {
        if self.released.get() {
            return Err(PodlinkError::ChannelClosed);
        }

        match self.rx.recv().await {
            Some(chunk) => Ok(Some(chunk)),
            None if self.released.get() => Err(PodlinkError::ChannelClosed),
            None => Ok(None),
        }
    }

    /// Drain everything until end-of-stream into one buffer.
    pub async fn read_to_end(&mut self) -> PodlinkResult<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.read().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}

/// The `Stream` surface cannot carry `ChannelClosed`, so release and clean
/// end-of-stream both terminate with `None`, buffered chunks included. Use
/// `read()` to tell the two apart.
impl Stream for OutputStream {
    type Item = Vec<u8>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.released.get() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

/// Read loop owning the read half of the raw channel.
///
/// Exits on cancellation, clean EOF, transport error, malformed frame, or
/// all endpoints being dropped. Dropping the senders is what signals
/// end-of-stream to the endpoints.
async fn pump(
    mut read_half: ReadHalf<RawChannel>,
    mode: ExecMode,
    stdout_tx: mpsc::Sender<Vec<u8>>,
    stderr_tx: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; PUMP_READ_BUF];
    let mut decoder = FrameDecoder::new();

    loop {
        let n = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::trace!("pump cancelled");
                break;
            }
            read = read_half.read(&mut buf) => match read {
                Ok(0) => {
                    tracing::debug!("peer closed the attached channel");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!("attached channel read failed: {e}");
                    break;
                }
            },
        };

        if mode.tty {
            // Single combined stream, no demultiplexing.
            if route(&stdout_tx, buf[..n].to_vec(), &cancel).await.is_err() {
                break;
            }
            continue;
        }

        decoder.feed(&buf[..n]);
        let mut stop = false;
        loop {
            match decoder.next_frame() {
                Ok(Some(frame)) => {
                    let tx = match frame.kind {
                        StreamKind::Stdout => &stdout_tx,
                        StreamKind::Stderr => &stderr_tx,
                        // The engine never tags server-to-client data as
                        // stdin; drop it rather than misroute it.
                        StreamKind::Stdin => {
                            tracing::trace!(len = frame.payload.len(), "ignoring stdin-tagged frame");
                            continue;
                        }
                    };
                    if route(tx, frame.payload, &cancel).await.is_err() {
                        stop = true;
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("malformed stdio frame, ending streams: {e}");
                    stop = true;
                    break;
                }
            }
        }
        if stop {
            break;
        }
    }
}

/// Forward one chunk unless the channel is being released.
async fn route(
    tx: &mpsc::Sender<Vec<u8>>,
    chunk: Vec<u8>,
    cancel: &CancellationToken,
) -> Result<(), ()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(()),
        sent = tx.send(chunk) => sent.map_err(|_| ()),
    }
}
