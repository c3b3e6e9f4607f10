//! Line codec for use with `tokio_util::codec` adapters
//!
//! Applies the same terminator rule as [`FrameAssembler`] to a
//! `FramedRead`/`FramedWrite` buffer, with an optional length limit.
//!
//! [`FrameAssembler`]: crate::FrameAssembler

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::assembler::split_frame;
use crate::frame::{Frame, TERMINATOR};

/// Line codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame too long: {size} bytes (max {max})")]
    FrameTooLong { size: usize, max: usize },
}

/// CRLF line codec
///
/// Decoding yields [`Frame`]s without the terminator. Encoding writes the
/// payload followed by the terminator; payloads are not escaped.
#[derive(Debug, Clone, Default)]
pub struct LineCodec {
    scan_from: usize,
    max_length: Option<usize>,
}

impl LineCodec {
    /// Codec without a length limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec rejecting payloads longer than `max_length` bytes
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            scan_from: 0,
            max_length: Some(max_length),
        }
    }

    /// Configured payload limit
    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    fn check_length(&self, size: usize) -> Result<(), CodecError> {
        match self.max_length {
            Some(max) if size > max => Err(CodecError::FrameTooLong { size, max }),
            _ => Ok(()),
        }
    }

    fn encode_payload(&mut self, payload: &[u8], dst: &mut BytesMut) -> Result<(), CodecError> {
        self.check_length(payload.len())?;
        dst.reserve(payload.len() + TERMINATOR.len());
        dst.put_slice(payload);
        dst.put_slice(&TERMINATOR);
        Ok(())
    }
}

impl Decoder for LineCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
        if let Some(frame) = split_frame(src, &mut self.scan_from) {
            self.check_length(frame.len())?;
            return Ok(Some(frame));
        }

        // A trailing CR may be the first half of the terminator
        let pending = if src.ends_with(&TERMINATOR[..1]) {
            src.len() - 1
        } else {
            src.len()
        };
        self.check_length(pending)?;
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        self.scan_from = 0;
        if src.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Frame::unterminated(src.split().freeze())))
        }
    }
}

impl Encoder<Bytes> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), CodecError> {
        self.encode_payload(&item, dst)
    }
}

impl<'a> Encoder<&'a [u8]> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &'a [u8], dst: &mut BytesMut) -> Result<(), CodecError> {
        self.encode_payload(item, dst)
    }
}

impl<'a> Encoder<&'a str> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &'a str, dst: &mut BytesMut) -> Result<(), CodecError> {
        self.encode_payload(item.as_bytes(), dst)
    }
}
