//! Reader loop
//!
//! Pulls chunks from the port's byte source, reassembles frames and reports
//! them to a [`FrameHandler`] on a dedicated task. A read cycle holds an
//! exclusive lease on the source; the lease goes back to the
//! [`SharedSource`] when the cycle ends, however it ends.
//!
//! Cancellation races a oneshot signal against the pending pull. It is
//! checked at every pull, so frames already split from the current chunk are
//! still delivered, and bytes still pending are discarded.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use serline_protocol::FrameAssembler;
use serline_utils::{Result, SerlineError};

use crate::handler::FrameHandler;
use crate::transport::{ByteSource, Chunk};

/// Lifecycle of one read cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Not started
    Idle,
    /// Pulling chunks
    Running,
    /// The handler asked to stop
    Stopped,
    /// Cancelled through the handle
    Cancelled,
    /// The device ended the stream
    Ended,
    /// A read failed
    Failed,
}

impl ReaderState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Cancelled => "cancelled",
            Self::Ended => "ended",
            Self::Failed => "failed",
        }
    }

    /// Whether the cycle has finished
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Idle | Self::Running)
    }
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum SourceSlot {
    Available(Box<dyn ByteSource>),
    Leased,
    Closed,
}

/// Byte source shared between read cycles of one open port
///
/// At most one read cycle holds the source at a time.
#[derive(Clone)]
pub struct SharedSource {
    slot: Arc<Mutex<SourceSlot>>,
}

impl SharedSource {
    pub fn new(source: Box<dyn ByteSource>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(SourceSlot::Available(source))),
        }
    }

    /// Whether a read cycle could start right now
    pub fn is_available(&self) -> bool {
        matches!(*self.slot.lock(), SourceSlot::Available(_))
    }

    /// Drop the source; later read cycles fail with `NotConnected`
    ///
    /// A source currently leased is dropped when its cycle ends.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.slot.lock(), SourceSlot::Closed);
        drop(previous);
    }

    fn acquire(&self) -> Result<SourceLease> {
        let mut slot = self.slot.lock();
        match std::mem::replace(&mut *slot, SourceSlot::Leased) {
            SourceSlot::Available(source) => Ok(SourceLease {
                slot: self.slot.clone(),
                source: Some(source),
            }),
            SourceSlot::Leased => Err(SerlineError::ReadInProgress),
            SourceSlot::Closed => {
                *slot = SourceSlot::Closed;
                Err(SerlineError::NotConnected)
            }
        }
    }
}

/// Exclusive read access, returned to the slot on drop
struct SourceLease {
    slot: Arc<Mutex<SourceSlot>>,
    source: Option<Box<dyn ByteSource>>,
}

impl SourceLease {
    async fn read(&mut self) -> std::io::Result<Chunk> {
        match self.source.as_mut() {
            Some(source) => source.read().await,
            None => Ok(Chunk::EndOfStream),
        }
    }
}

impl Drop for SourceLease {
    fn drop(&mut self) {
        let source = self.source.take();
        let mut slot = self.slot.lock();
        // A slot closed while leased keeps the source dropped
        if matches!(*slot, SourceSlot::Leased) {
            if let Some(source) = source {
                *slot = SourceSlot::Available(source);
            }
        }
    }
}

/// Handle to a running read cycle
///
/// Dropping the handle cancels the cycle.
pub struct ReadHandle {
    id: Uuid,
    state: Arc<Mutex<ReaderState>>,
    cancel_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<ReaderState>,
}

impl ReadHandle {
    /// Identifier used in log fields for this cycle
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current state of the cycle
    pub fn state(&self) -> ReaderState {
        *self.state.lock()
    }

    /// Whether the reader task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Request cancellation; takes effect at the next pull
    ///
    /// Calling it again, or after the cycle ended, does nothing.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            // Receiver is gone if the cycle already ended
            let _ = tx.send(());
        }
    }

    /// Cancel and wait for the cycle to end
    pub async fn stop(mut self) -> ReaderState {
        self.cancel();
        self.join().await
    }

    /// Wait for the cycle to end on its own
    pub async fn join(self) -> ReaderState {
        let ReadHandle {
            id,
            state,
            cancel_tx,
            task,
        } = self;

        let result = task.await;
        drop(cancel_tx);

        match result {
            Ok(final_state) => final_state,
            Err(e) => {
                tracing::error!(cycle = %id, error = %e, "Reader task did not complete");
                *state.lock() = ReaderState::Failed;
                ReaderState::Failed
            }
        }
    }
}

impl fmt::Debug for ReadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Start a read cycle against `source`
///
/// Fails with `ReadInProgress` while another cycle holds the source, and with
/// `NotConnected` once the source has been closed. Must be called inside a
/// tokio runtime.
pub fn start<H>(source: &SharedSource, handler: H) -> Result<ReadHandle>
where
    H: FrameHandler + 'static,
{
    let lease = source.acquire()?;
    let id = Uuid::new_v4();
    let state = Arc::new(Mutex::new(ReaderState::Running));
    let (cancel_tx, cancel_rx) = oneshot::channel();

    let task = tokio::spawn(read_loop(id, lease, handler, cancel_rx, state.clone()));
    tracing::debug!(cycle = %id, "Read cycle started");

    Ok(ReadHandle {
        id,
        state,
        cancel_tx: Some(cancel_tx),
        task,
    })
}

async fn read_loop<H>(
    id: Uuid,
    mut lease: SourceLease,
    mut handler: H,
    mut cancel_rx: oneshot::Receiver<()>,
    state: Arc<Mutex<ReaderState>>,
) -> ReaderState
where
    H: FrameHandler,
{
    let mut assembler = FrameAssembler::new();
    let mut frames_delivered: u64 = 0;

    let outcome = loop {
        let chunk = tokio::select! {
            biased;

            // Fires on cancel() and when the handle is dropped
            _ = &mut cancel_rx => break ReaderState::Cancelled,
            chunk = lease.read() => chunk,
        };

        match chunk {
            Ok(Chunk::Data(bytes)) => {
                tracing::trace!(cycle = %id, len = bytes.len(), "Chunk received");

                let mut flow = ControlFlow::Continue(());
                for frame in assembler.ingest(&bytes) {
                    frames_delivered += 1;
                    flow = handler.on_frame(frame);
                    if flow.is_break() {
                        break;
                    }
                }
                if flow.is_break() {
                    break ReaderState::Stopped;
                }
            }
            Ok(Chunk::EndOfStream) => {
                if let Some(trailing) = assembler.flush() {
                    tracing::debug!(
                        cycle = %id,
                        len = trailing.len(),
                        "Stream ended mid-frame, delivering trailing bytes"
                    );
                    frames_delivered += 1;
                    let _ = handler.on_frame(trailing);
                }
                handler.on_end();
                break ReaderState::Ended;
            }
            Err(e) => {
                let error = SerlineError::Read(e);
                tracing::warn!(cycle = %id, error = %error, "Read cycle failed");
                handler.on_error(&error);
                break ReaderState::Failed;
            }
        }
    };

    if !assembler.is_empty() {
        tracing::debug!(
            cycle = %id,
            discarded = assembler.pending().len(),
            "Discarding partial frame"
        );
    }

    // Release read access before reporting the final state
    drop(lease);
    *state.lock() = outcome;

    tracing::debug!(
        cycle = %id,
        state = %outcome,
        frames = frames_delivered,
        "Read cycle finished"
    );
    outcome
}
