//! serline-protocol: Line framing and shared types
//!
//! This crate turns a chunked byte stream into CRLF-terminated frames and
//! defines the option and port records shared by transports and clients.

pub mod assembler;
pub mod codec;
pub mod frame;
pub mod transform;
pub mod types;

// Re-export main types at crate root
pub use assembler::{FrameAssembler, Frames};
pub use codec::{CodecError, LineCodec};
pub use frame::{Frame, TERMINATOR};
pub use transform::{DropInterleaved, FrameTransform, Identity, ParseIntegers, ParseIntegersError};
pub use types::{DataBits, FlowControl, LineOptions, Parity, PortFilter, PortInfo, StopBits};
