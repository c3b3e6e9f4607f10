//! Optional post-processing of frame payloads
//!
//! Some devices wrap their lines in extra encoding (null-padded characters,
//! numeric readings as text). Those quirks belong to the caller, so the
//! framer never applies them; callers pick a [`FrameTransform`] instead.

use std::marker::PhantomData;
use std::str::FromStr;

use bytes::Bytes;

use crate::frame::Frame;

/// Caller-selected conversion applied to each frame after framing
pub trait FrameTransform: Send {
    type Output: Send;

    fn apply(&mut self, frame: Frame) -> Self::Output;
}

/// Passes frames through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl FrameTransform for Identity {
    type Output = Frame;

    fn apply(&mut self, frame: Frame) -> Frame {
        frame
    }
}

/// Keeps the bytes at even offsets and drops every second byte
///
/// For devices that pad each character to two bytes on the wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropInterleaved;

impl FrameTransform for DropInterleaved {
    type Output = Frame;

    fn apply(&mut self, frame: Frame) -> Frame {
        let kept: Vec<u8> = frame.iter().step_by(2).copied().collect();
        if frame.is_terminated() {
            Frame::new(Bytes::from(kept))
        } else {
            Frame::unterminated(Bytes::from(kept))
        }
    }
}

/// Parses a text frame as a list of integers
///
/// Values are separated by commas and/or whitespace. Any token that fails to
/// parse makes the whole frame an error, reported with the offending token.
#[derive(Debug, Clone, Copy)]
pub struct ParseIntegers<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> ParseIntegers<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for ParseIntegers<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Token of a frame that could not be parsed as an integer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid integer in frame: {token:?}")]
pub struct ParseIntegersError {
    pub token: String,
}

impl<T> FrameTransform for ParseIntegers<T>
where
    T: FromStr + Send,
{
    type Output = Result<Vec<T>, ParseIntegersError>;

    fn apply(&mut self, frame: Frame) -> Self::Output {
        frame
            .to_text()
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(|token| {
                token.parse::<T>().map_err(|_| ParseIntegersError {
                    token: token.to_string(),
                })
            })
            .collect()
    }
}
