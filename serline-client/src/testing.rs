//! In-memory sources, sinks and transports for tests

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::DuplexStream;
use tokio::sync::Notify;

use serline_protocol::{LineOptions, PortFilter, PortInfo};

use crate::transport::{
    ByteSink, ByteSource, Chunk, IoTransport, Transport, TransportProvider, TransportStreams,
};

/// Yields the scripted chunks, then end of stream
pub struct ScriptedSource {
    chunks: VecDeque<Bytes>,
}

impl ScriptedSource {
    pub fn new(chunks: Vec<Bytes>) -> Self {
        Self {
            chunks: chunks.into(),
        }
    }
}

#[async_trait]
impl ByteSource for ScriptedSource {
    async fn read(&mut self) -> io::Result<Chunk> {
        Ok(self
            .chunks
            .pop_front()
            .map_or(Chunk::EndOfStream, Chunk::Data))
    }
}

/// Yields the scripted chunks, then fails
pub struct ErrorSource {
    chunks: VecDeque<Bytes>,
}

impl ErrorSource {
    pub fn new(chunks: Vec<Bytes>) -> Self {
        Self {
            chunks: chunks.into(),
        }
    }
}

#[async_trait]
impl ByteSource for ErrorSource {
    async fn read(&mut self) -> io::Result<Chunk> {
        match self.chunks.pop_front() {
            Some(chunk) => Ok(Chunk::Data(chunk)),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged")),
        }
    }
}

/// Sink recording writes; optionally parks each write until released
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub written: Arc<Mutex<Vec<u8>>>,
    pub gate: Option<Arc<Notify>>,
    pub fail: bool,
}

#[async_trait]
impl ByteSink for RecordingSink {
    async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "write stalled"));
        }
        self.written.lock().extend_from_slice(bytes);
        Ok(())
    }
}

/// What a [`MockTransport`] saw
#[derive(Debug, Default)]
pub struct CallLog {
    pub opened_with: Option<LineOptions>,
    pub closed: bool,
}

/// Duplex-backed transport with switchable failures
pub struct MockTransport {
    inner: IoTransport<DuplexStream>,
    info: PortInfo,
    pub fail_open: bool,
    pub fail_close: bool,
    pub calls: Arc<Mutex<CallLog>>,
}

impl MockTransport {
    /// Transport plus the device end of its stream
    pub fn pair(info: PortInfo) -> (Self, DuplexStream) {
        let (device, host) = tokio::io::duplex(1024);
        let transport = Self {
            inner: IoTransport::new(info.clone(), host),
            info,
            fail_open: false,
            fail_close: false,
            calls: Arc::new(Mutex::new(CallLog::default())),
        };
        (transport, device)
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn info(&self) -> PortInfo {
        self.info.clone()
    }

    async fn open(&mut self, options: &LineOptions) -> io::Result<TransportStreams> {
        if self.fail_open {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "port busy"));
        }
        self.calls.lock().opened_with = Some(options.clone());
        self.inner.open(options).await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.calls.lock().closed = true;
        if self.fail_close {
            return Err(io::Error::new(io::ErrorKind::Other, "close failed"));
        }
        self.inner.close().await
    }
}

/// Provider handing out queued transports in order
#[derive(Default)]
pub struct MockProvider {
    transports: VecDeque<MockTransport>,
}

impl MockProvider {
    pub fn new(transports: Vec<MockTransport>) -> Self {
        Self {
            transports: transports.into(),
        }
    }
}

#[async_trait]
impl TransportProvider for MockProvider {
    async fn request(&mut self, filters: &[PortFilter]) -> io::Result<Box<dyn Transport>> {
        let index = self
            .transports
            .iter()
            .position(|t| PortFilter::any_matches(filters, &t.info))
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no port selected"))?;

        match self.transports.remove(index) {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no port selected")),
        }
    }
}
