//! Writer handle for an open port
//!
//! Every [`Writer`] cloned from one connection shares the same sink. A send
//! holds the sink for its whole duration; a second send issued meanwhile
//! fails with `WriteInProgress` instead of queueing. Closing the slot aborts
//! an in-flight send so a disconnect never waits on a stalled device.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use tokio::sync::Mutex;
use tokio_util::codec::Encoder;
use tokio_util::sync::CancellationToken;

use serline_utils::{Result, SerlineError};

use crate::transport::ByteSink;

/// Sink shared by the manager and its writers
pub(crate) struct SinkSlot {
    sink: Mutex<Option<Box<dyn ByteSink>>>,
    busy: AtomicBool,
    closed: CancellationToken,
}

impl SinkSlot {
    pub(crate) fn new(sink: Box<dyn ByteSink>) -> Arc<Self> {
        Arc::new(Self {
            sink: Mutex::new(Some(sink)),
            busy: AtomicBool::new(false),
            closed: CancellationToken::new(),
        })
    }

    /// Abort any in-flight send, then take the sink out of the slot
    ///
    /// Later sends fail with `NotConnected`.
    pub(crate) async fn close(&self) -> Option<Box<dyn ByteSink>> {
        self.closed.cancel();
        self.sink.lock().await.take()
    }
}

/// Marks the slot busy for the lifetime of one send
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Clonable write handle
///
/// Payloads go out exactly as given. Append a terminator yourself, or use
/// [`send_encoded`](Writer::send_encoded) with a `LineCodec`.
#[derive(Clone)]
pub struct Writer {
    slot: Arc<SinkSlot>,
}

impl Writer {
    pub(crate) fn new(slot: Arc<SinkSlot>) -> Self {
        Self { slot }
    }

    /// Write raw bytes
    ///
    /// Failures are returned as-is; nothing is retried. A send still running
    /// when the port is disconnected returns `NotConnected`.
    pub async fn send(&self, payload: impl AsRef<[u8]>) -> Result<()> {
        let payload = payload.as_ref();
        let mut guard = self
            .slot
            .sink
            .try_lock()
            .map_err(|_| SerlineError::WriteInProgress)?;
        let _busy = BusyGuard::set(&self.slot.busy);
        let sink = guard.as_mut().ok_or(SerlineError::NotConnected)?;

        let written = tokio::select! {
            biased;

            _ = self.slot.closed.cancelled() => {
                tracing::debug!(len = payload.len(), "Send aborted by disconnect");
                return Err(SerlineError::NotConnected);
            }
            result = async {
                sink.write(payload).await?;
                sink.flush().await
            } => result,
        };
        written.map_err(SerlineError::Write)?;

        tracing::trace!(len = payload.len(), "Payload written");
        Ok(())
    }

    /// Write text as UTF-8
    pub async fn send_text(&self, text: &str) -> Result<()> {
        self.send(text.as_bytes()).await
    }

    /// Encode `item` with `encoder`, then write the result
    pub async fn send_encoded<E, I>(&self, encoder: &mut E, item: I) -> Result<()>
    where
        E: Encoder<I>,
        E::Error: fmt::Display,
    {
        let mut buf = BytesMut::new();
        encoder
            .encode(item, &mut buf)
            .map_err(|e| SerlineError::InvalidMessage(e.to_string()))?;
        self.send(&buf).await
    }

    /// Whether a send is currently running
    ///
    /// Reads a flag only; never contends with a concurrent send.
    pub fn is_busy(&self) -> bool {
        self.slot.busy.load(Ordering::Acquire)
    }

    /// Whether the port behind this writer has been disconnected
    pub fn is_closed(&self) -> bool {
        self.slot.closed.is_cancelled()
    }
}

impl fmt::Debug for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("busy", &self.is_busy())
            .field("closed", &self.is_closed())
            .finish()
    }
}
