//! Transport abstraction
//!
//! A [`Transport`] is the device driver boundary: it opens with a set of
//! [`LineOptions`] and hands back a byte source and a byte sink. The manager
//! owns the transport for as long as the port is open and never shares it.
//!
//! [`IoTransport`] adapts any tokio byte stream, and [`AddrProvider`] dials
//! `tcp://` or `unix://` addresses, which covers serial-over-network bridges.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpStream, UnixStream};
use url::Url;

use serline_protocol::{LineOptions, PortFilter, PortInfo};

/// Result of one pull from a [`ByteSource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Bytes received, in arrival order; never empty
    Data(Bytes),
    /// The device will not produce any more bytes
    EndOfStream,
}

/// Pull-style byte input of an open port
#[async_trait]
pub trait ByteSource: Send {
    /// Wait for the next chunk
    ///
    /// Must be cancel safe: dropping the future before it resolves loses no
    /// bytes.
    async fn read(&mut self) -> io::Result<Chunk>;
}

/// Byte output of an open port
#[async_trait]
pub trait ByteSink: Send {
    /// Write all of `bytes`
    async fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Push buffered bytes to the device
    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Signal that no more bytes will be written
    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Source and sink returned by [`Transport::open`]
pub struct TransportStreams {
    pub source: Box<dyn ByteSource>,
    pub sink: Box<dyn ByteSink>,
}

/// Device driver boundary
#[async_trait]
pub trait Transport: Send {
    /// Identity of the underlying port
    fn info(&self) -> PortInfo;

    /// Open the port with the given line options
    ///
    /// Options are forwarded as-is; the transport decides what it can honour.
    async fn open(&mut self, options: &LineOptions) -> io::Result<TransportStreams>;

    /// Close the port; called after the source and sink have been dropped
    async fn close(&mut self) -> io::Result<()>;
}

/// Hands out a transport for a port matching the filters
#[async_trait]
pub trait TransportProvider: Send {
    async fn request(&mut self, filters: &[PortFilter]) -> io::Result<Box<dyn Transport>>;
}

// ==================== Stream adapter ====================

/// Largest chunk a [`StreamSource`] reads in one pull
pub const MAX_CHUNK_SIZE: usize = 64 * 1024;

/// [`ByteSource`] reading from an `AsyncRead` in bounded chunks
///
/// `chunk_size` is clamped to `1..=MAX_CHUNK_SIZE`.
pub struct StreamSource<R> {
    reader: R,
    buf: BytesMut,
    chunk_size: usize,
}

impl<R> StreamSource<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        Self {
            reader,
            buf: BytesMut::with_capacity(chunk_size),
            chunk_size,
        }
    }
}

#[async_trait]
impl<R> ByteSource for StreamSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read(&mut self) -> io::Result<Chunk> {
        // Reclaims the previous allocation once earlier chunks are dropped
        self.buf.reserve(self.chunk_size);

        let n = (&mut self.reader)
            .take(self.chunk_size as u64)
            .read_buf(&mut self.buf)
            .await?;
        if n == 0 {
            return Ok(Chunk::EndOfStream);
        }
        Ok(Chunk::Data(self.buf.split().freeze()))
    }
}

/// [`ByteSink`] writing to an `AsyncWrite`
pub struct StreamSink<W> {
    writer: W,
}

impl<W> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W> ByteSink for StreamSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.writer.flush().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }
}

/// Transport over an already connected tokio stream
///
/// The stream is split on open. It cannot be reopened after close; ask the
/// provider for a fresh transport instead.
pub struct IoTransport<S> {
    info: PortInfo,
    stream: Option<S>,
}

impl<S> IoTransport<S> {
    pub fn new(info: PortInfo, stream: S) -> Self {
        Self {
            info,
            stream: Some(stream),
        }
    }
}

#[async_trait]
impl<S> Transport for IoTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    fn info(&self) -> PortInfo {
        self.info.clone()
    }

    async fn open(&mut self, options: &LineOptions) -> io::Result<TransportStreams> {
        let stream = self.stream.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrInUse, "stream was already opened")
        })?;

        tracing::debug!(
            port = %self.info,
            baud_rate = options.baud_rate,
            buffer_size = options.buffer_size,
            "Opening stream transport"
        );

        let (reader, writer): (ReadHalf<S>, WriteHalf<S>) = tokio::io::split(stream);
        Ok(TransportStreams {
            source: Box::new(StreamSource::new(reader, options.buffer_size as usize)),
            sink: Box::new(StreamSink::new(writer)),
        })
    }

    async fn close(&mut self) -> io::Result<()> {
        // The halves own the stream; it is released once both are dropped
        self.stream = None;
        Ok(())
    }
}

// ==================== Address provider ====================

/// Provider dialing a `tcp://host:port`, `unix://path` or bare socket path
#[derive(Debug, Clone)]
pub struct AddrProvider {
    addr: String,
    info: Option<PortInfo>,
}

impl AddrProvider {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            info: None,
        }
    }

    /// Report fixed port details (e.g. the USB ids behind a bridge)
    pub fn with_info(mut self, info: PortInfo) -> Self {
        self.info = Some(info);
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn port_info(&self) -> PortInfo {
        self.info
            .clone()
            .unwrap_or_else(|| PortInfo::new(self.addr.clone()))
    }
}

fn invalid_addr(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg)
}

#[async_trait]
impl TransportProvider for AddrProvider {
    async fn request(&mut self, filters: &[PortFilter]) -> io::Result<Box<dyn Transport>> {
        let info = self.port_info();
        if !PortFilter::any_matches(filters, &info) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Port {} does not match the requested filters", info),
            ));
        }

        if self.addr.starts_with("tcp://") {
            let url = Url::parse(&self.addr)
                .map_err(|e| invalid_addr(format!("Invalid TCP URL '{}': {}", self.addr, e)))?;
            let host = url
                .host_str()
                .ok_or_else(|| invalid_addr("Missing host in TCP URL".into()))?;
            let port = url
                .port()
                .ok_or_else(|| invalid_addr("Missing port in TCP URL".into()))?;

            let stream = TcpStream::connect((host, port)).await?;
            stream.set_nodelay(true)?;
            tracing::debug!(addr = %self.addr, "Connected to TCP bridge");
            return Ok(Box::new(IoTransport::new(info, stream)));
        }

        let path = if self.addr.starts_with("unix://") {
            let url = Url::parse(&self.addr)
                .map_err(|e| invalid_addr(format!("Invalid Unix URL: {}", e)))?;
            PathBuf::from(url.path())
        } else {
            PathBuf::from(&self.addr)
        };

        let stream = UnixStream::connect(&path).await?;
        tracing::debug!(path = %path.display(), "Connected to Unix socket");
        Ok(Box::new(IoTransport::new(info, stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::{TcpListener, UnixListener};

    #[tokio::test]
    async fn test_stream_source_chunks_and_eof() {
        let (device, host) = tokio::io::duplex(64);
        let mut transport = IoTransport::new(PortInfo::new("duplex"), host);
        let options = LineOptions::default().with_buffer_size(4);
        let mut streams = transport.open(&options).await.unwrap();

        let (_device_read, mut device_write) = tokio::io::split(device);
        device_write.write_all(b"abcdef").await.unwrap();

        let first = streams.source.read().await.unwrap();
        assert_eq!(first, Chunk::Data(Bytes::from_static(b"abcd")));
        let second = streams.source.read().await.unwrap();
        assert_eq!(second, Chunk::Data(Bytes::from_static(b"ef")));

        drop(device_write);
        drop(_device_read);
        assert_eq!(streams.source.read().await.unwrap(), Chunk::EndOfStream);
    }

    #[tokio::test]
    async fn test_oversized_buffer_is_clamped() {
        let (mut device, host) = tokio::io::duplex(64);
        let mut source = StreamSource::new(host, u32::MAX as usize);
        assert_eq!(source.chunk_size, MAX_CHUNK_SIZE);

        device.write_all(b"abc").await.unwrap();
        assert_eq!(
            source.read().await.unwrap(),
            Chunk::Data(Bytes::from_static(b"abc"))
        );
        assert!(source.buf.capacity() <= 2 * MAX_CHUNK_SIZE);
    }

    #[tokio::test]
    async fn test_zero_buffer_still_reads() {
        let (mut device, host) = tokio::io::duplex(64);
        let mut source = StreamSource::new(host, 0);

        device.write_all(b"xy").await.unwrap();
        assert_eq!(
            source.read().await.unwrap(),
            Chunk::Data(Bytes::from_static(b"x"))
        );
        assert_eq!(
            source.read().await.unwrap(),
            Chunk::Data(Bytes::from_static(b"y"))
        );
    }

    #[tokio::test]
    async fn test_stream_sink_writes() {
        let (mut device, host) = tokio::io::duplex(64);
        let mut transport = IoTransport::new(PortInfo::new("duplex"), host);
        let mut streams = transport.open(&LineOptions::default()).await.unwrap();

        streams.sink.write(b"ping\r\n").await.unwrap();
        streams.sink.flush().await.unwrap();

        let mut buf = [0u8; 6];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping\r\n");
    }

    #[tokio::test]
    async fn test_io_transport_cannot_reopen() {
        let (_device, host) = tokio::io::duplex(8);
        let mut transport = IoTransport::new(PortInfo::new("duplex"), host);

        let _streams = transport.open(&LineOptions::default()).await.unwrap();
        transport.close().await.unwrap();

        assert!(transport.open(&LineOptions::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_addr_provider_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("tcp://{}", listener.local_addr().unwrap());
        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

        let mut provider = AddrProvider::new(addr.clone());
        let transport = provider.request(&[]).await.unwrap();

        assert_eq!(transport.info().name, addr);
        accept.await.unwrap();
    }

    #[tokio::test]
    async fn test_addr_provider_unix() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("device.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

        let mut provider = AddrProvider::new(format!("unix://{}", socket_path.display()));
        assert!(provider.request(&[]).await.is_ok());

        accept.await.unwrap();
    }

    #[tokio::test]
    async fn test_addr_provider_missing_socket() {
        let mut provider = AddrProvider::new("/nonexistent/serline.sock");
        assert!(provider.request(&[]).await.is_err());
    }

    #[tokio::test]
    async fn test_addr_provider_tcp_missing_port() {
        let mut provider = AddrProvider::new("tcp://localhost");
        let err = provider.request(&[]).await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_addr_provider_applies_filters() {
        let mut provider = AddrProvider::new("/nonexistent/serline.sock")
            .with_info(PortInfo::new("bridge").with_usb_ids(2389, 28704));

        let err = provider
            .request(&[PortFilter::new(1, 2)])
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
