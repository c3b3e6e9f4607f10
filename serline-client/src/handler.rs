//! Frame handler trait and utilities
//!
//! The reader loop reports frames, end of stream and read failures to a
//! [`FrameHandler`]. Handlers run on the reader task and must not block.

use std::ops::ControlFlow;

use tokio::sync::mpsc;

use serline_protocol::{Frame, FrameTransform};
use serline_utils::{ErrorKind, SerlineError};

/// Trait for handling frames read from the device
pub trait FrameHandler: Send {
    /// Handle one frame; `Break` stops the read cycle
    fn on_frame(&mut self, frame: Frame) -> ControlFlow<()>;

    /// Called once when the device ends the stream, after the trailing frame
    fn on_end(&mut self) {}

    /// Called once when a read fails; the cycle ends afterwards
    fn on_error(&mut self, _error: &SerlineError) {}
}

impl<H: FrameHandler + ?Sized> FrameHandler for Box<H> {
    fn on_frame(&mut self, frame: Frame) -> ControlFlow<()> {
        (**self).on_frame(frame)
    }

    fn on_end(&mut self) {
        (**self).on_end()
    }

    fn on_error(&mut self, error: &SerlineError) {
        (**self).on_error(error)
    }
}

/// Simple callback-based handler
pub struct CallbackHandler<F>
where
    F: FnMut(Frame) + Send,
{
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: FnMut(Frame) + Send,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> FrameHandler for CallbackHandler<F>
where
    F: FnMut(Frame) + Send,
{
    fn on_frame(&mut self, frame: Frame) -> ControlFlow<()> {
        (self.callback)(frame);
        ControlFlow::Continue(())
    }
}

/// Event forwarded by [`ChannelHandler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    Frame(Frame),
    End,
    Error { kind: ErrorKind, detail: String },
}

/// Handler forwarding every event onto an unbounded channel
///
/// The read cycle stops once the receiver is dropped.
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<ReadEvent>,
}

impl ChannelHandler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl FrameHandler for ChannelHandler {
    fn on_frame(&mut self, frame: Frame) -> ControlFlow<()> {
        match self.tx.send(ReadEvent::Frame(frame)) {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => {
                tracing::debug!("Frame receiver dropped, stopping read cycle");
                ControlFlow::Break(())
            }
        }
    }

    fn on_end(&mut self) {
        let _ = self.tx.send(ReadEvent::End);
    }

    fn on_error(&mut self, error: &SerlineError) {
        let _ = self.tx.send(ReadEvent::Error {
            kind: error.kind(),
            detail: error.to_string(),
        });
    }
}

/// Applies a [`FrameTransform`] before handing the result to a callback
pub struct TransformHandler<T, F> {
    transform: T,
    consumer: F,
}

impl<T, F> TransformHandler<T, F>
where
    T: FrameTransform,
    F: FnMut(T::Output) + Send,
{
    pub fn new(transform: T, consumer: F) -> Self {
        Self {
            transform,
            consumer,
        }
    }
}

impl<T, F> FrameHandler for TransformHandler<T, F>
where
    T: FrameTransform,
    F: FnMut(T::Output) + Send,
{
    fn on_frame(&mut self, frame: Frame) -> ControlFlow<()> {
        (self.consumer)(self.transform.apply(frame));
        ControlFlow::Continue(())
    }
}
