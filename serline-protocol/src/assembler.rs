//! Reassembly of CRLF-terminated frames from arbitrarily chunked input
//!
//! Serial devices deliver bytes in whatever chunk sizes the driver happens to
//! read. A chunk may hold several frames, part of one, or half a terminator.
//! [`FrameAssembler`] buffers the bytes and hands back complete frames in the
//! order their terminators arrived.

use std::iter::FusedIterator;

use bytes::{Buf, BytesMut};

use crate::frame::{Frame, TERMINATOR};

/// Split the next terminated frame off the front of `buf`
///
/// `scan_from` remembers how far the previous unsuccessful scan got, so bytes
/// already known to hold no terminator are not searched again.
pub(crate) fn split_frame(buf: &mut BytesMut, scan_from: &mut usize) -> Option<Frame> {
    let start = (*scan_from).min(buf.len());

    match find_terminator(&buf[start..]) {
        Some(offset) => {
            let payload = buf.split_to(start + offset).freeze();
            buf.advance(TERMINATOR.len());
            *scan_from = 0;
            Some(Frame::new(payload))
        }
        None => {
            // A trailing CR may still pair with an LF from the next chunk
            *scan_from = buf.len().saturating_sub(TERMINATOR.len() - 1);
            None
        }
    }
}

fn find_terminator(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(TERMINATOR.len())
        .position(|window| window == TERMINATOR)
}

/// Stateful frame reassembler
///
/// Driven by a single sequential caller. Feed every chunk to [`ingest`] and
/// call [`flush`] once the source reports end of stream.
///
/// [`ingest`]: FrameAssembler::ingest
/// [`flush`]: FrameAssembler::flush
#[derive(Debug, Default)]
pub struct FrameAssembler {
    pending: BytesMut,
    scan_from: usize,
}

impl FrameAssembler {
    /// Create an assembler with an empty pending buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an assembler sized for the expected chunk length
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: BytesMut::with_capacity(capacity),
            scan_from: 0,
        }
    }

    /// Append a chunk and iterate over the frames it completes
    ///
    /// The iterator is lazy. Frames it has not yet returned when dropped stay
    /// buffered and come out first on the next call.
    pub fn ingest(&mut self, chunk: &[u8]) -> Frames<'_> {
        self.pending.extend_from_slice(chunk);
        Frames { assembler: self }
    }

    /// Surface whatever is left once the stream has ended
    ///
    /// Returns the unterminated remainder as a final frame, or `None` when
    /// nothing is pending. The buffer is empty afterwards.
    pub fn flush(&mut self) -> Option<Frame> {
        self.scan_from = 0;
        if self.pending.is_empty() {
            return None;
        }
        Some(Frame::unterminated(self.pending.split().freeze()))
    }

    /// Bytes buffered while waiting for a terminator
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Whether nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Discard buffered bytes without emitting them
    pub fn clear(&mut self) {
        self.pending.clear();
        self.scan_from = 0;
    }
}

/// Frames completed by one [`FrameAssembler::ingest`] call
#[derive(Debug)]
pub struct Frames<'a> {
    assembler: &'a mut FrameAssembler,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        let FrameAssembler { pending, scan_from } = &mut *self.assembler;
        split_frame(pending, scan_from)
    }
}

impl FusedIterator for Frames<'_> {}
