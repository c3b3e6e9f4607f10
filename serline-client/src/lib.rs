//! serline-client: Connection lifecycle, reader loop and writer
//!
//! [`ConnectionManager`] opens a port through a [`TransportProvider`], runs
//! one read cycle at a time against it and hands out [`Writer`]s. Frames
//! reach the caller through a [`FrameHandler`].

pub mod config;
pub mod handler;
pub mod manager;
pub mod reader;
pub mod transport;
pub mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ClientConfig;
pub use handler::{CallbackHandler, ChannelHandler, FrameHandler, ReadEvent, TransformHandler};
pub use manager::{ConnectionManager, ConnectionState};
pub use reader::{ReadHandle, ReaderState, SharedSource};
pub use transport::{
    AddrProvider, ByteSink, ByteSource, Chunk, IoTransport, StreamSink, StreamSource, Transport,
    TransportProvider, TransportStreams,
};
pub use writer::Writer;
