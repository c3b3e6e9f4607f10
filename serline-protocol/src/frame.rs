//! Frame type produced by the line framer

use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;

use bytes::Bytes;

/// Frame terminator: carriage return, line feed
pub const TERMINATOR: [u8; 2] = [0x0D, 0x0A];

/// One delimited message extracted from the byte stream
///
/// The terminator is never part of the payload. Frames produced when the
/// stream ended without a final terminator report `is_terminated() == false`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    payload: Bytes,
    terminated: bool,
}

impl Frame {
    /// Frame that was closed by a terminator
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            terminated: true,
        }
    }

    /// Trailing bytes surfaced at end of stream without a terminator
    pub fn unterminated(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            terminated: false,
        }
    }

    /// Whether a terminator closed this frame
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload
    pub fn into_bytes(self) -> Bytes {
        self.payload
    }

    /// Decode the payload as UTF-8, replacing invalid sequences
    pub fn to_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.payload
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}

impl From<Frame> for Bytes {
    fn from(frame: Frame) -> Self {
        frame.payload
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("payload", &self.to_text())
            .field("len", &self.payload.len())
            .field("terminated", &self.terminated)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_accessors() {
        let frame = Frame::new(&b"hello"[..]);
        assert_eq!(frame.as_bytes(), b"hello");
        assert_eq!(frame.len(), 5);
        assert_eq!(frame.to_text(), "hello");
        assert!(frame.is_terminated());
    }

    #[test]
    fn test_unterminated_frame() {
        let frame = Frame::unterminated(vec![0x41]);
        assert!(!frame.is_terminated());
        assert_ne!(frame, Frame::new(vec![0x41]));
    }

    #[test]
    fn test_lossy_text() {
        let frame = Frame::new(vec![0x68, 0xFF, 0x69]);
        assert_eq!(frame.to_text(), "h\u{FFFD}i");
    }

    #[test]
    fn test_into_bytes() {
        let bytes: Bytes = Frame::new(&b"abc"[..]).into();
        assert_eq!(&bytes[..], b"abc");
    }
}
