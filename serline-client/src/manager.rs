//! Connection lifecycle
//!
//! [`ConnectionManager`] owns the transport of one port and moves it through
//! `Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected`.
//! Every operation checks the current state first and fails with
//! `InvalidState` instead of acting on a half-open port.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use serline_protocol::{DataBits, FlowControl, LineOptions, Parity, PortFilter, PortInfo, StopBits};
use serline_utils::{Result, SerlineError};

use crate::config::ClientConfig;
use crate::handler::FrameHandler;
use crate::reader::{self, ReadHandle, ReaderState, SharedSource};
use crate::transport::{Transport, TransportProvider};
use crate::writer::{SinkSlot, Writer};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sets a transitional state and restores a fallback unless finished
///
/// Covers both error returns and a dropped `connect`/`disconnect` future.
struct StateReset<'a> {
    state: &'a mut ConnectionState,
    fallback: ConnectionState,
    armed: bool,
}

impl<'a> StateReset<'a> {
    fn enter(
        state: &'a mut ConnectionState,
        during: ConnectionState,
        fallback: ConnectionState,
    ) -> Self {
        *state = during;
        Self {
            state,
            fallback,
            armed: true,
        }
    }

    fn finish(mut self, end: ConnectionState) {
        *self.state = end;
        self.armed = false;
    }
}

impl Drop for StateReset<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.state = self.fallback;
        }
    }
}

/// Resources held while connected
struct OpenPort {
    transport: Box<dyn Transport>,
    source: SharedSource,
    sink: Arc<SinkSlot>,
    info: PortInfo,
}

/// Owns one port and its read cycle
pub struct ConnectionManager {
    provider: Box<dyn TransportProvider>,
    filters: Vec<PortFilter>,
    options: LineOptions,
    state: ConnectionState,
    port: Option<OpenPort>,
    reader: Option<ReadHandle>,
    /// Final state of the last cycle stopped by `stop_reading`/`disconnect`
    stopped_cycle: Option<ReaderState>,
}

impl ConnectionManager {
    /// Create a manager with default line options and no port filters
    pub fn new(provider: Box<dyn TransportProvider>) -> Self {
        Self {
            provider,
            filters: Vec::new(),
            options: LineOptions::default(),
            state: ConnectionState::Disconnected,
            port: None,
            reader: None,
            stopped_cycle: None,
        }
    }

    /// Create a manager using the line options and filters from `config`
    pub fn from_config(provider: Box<dyn TransportProvider>, config: &ClientConfig) -> Self {
        let mut manager = Self::new(provider);
        manager.options = config.line.clone();
        manager.filters = config.filters.clone();
        manager
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Line options applied on the next `connect`
    pub fn options(&self) -> &LineOptions {
        &self.options
    }

    /// Port filters passed to the provider
    pub fn filters(&self) -> &[PortFilter] {
        &self.filters
    }

    /// Details of the open port, if connected
    pub fn port_info(&self) -> Option<&PortInfo> {
        self.port.as_ref().map(|port| &port.info)
    }

    fn expect_state(&self, expected: ConnectionState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SerlineError::InvalidState {
                operation,
                state: self.state.as_str(),
            })
        }
    }

    fn open_port(&self, operation: &'static str) -> Result<&OpenPort> {
        self.expect_state(ConnectionState::Connected, operation)?;
        self.port
            .as_ref()
            .ok_or_else(|| SerlineError::internal("connected without an open port"))
    }

    // ==================== Lifecycle ====================

    /// Request a port from the provider and open it
    ///
    /// On failure the manager is back in `Disconnected`.
    pub async fn connect(&mut self) -> Result<PortInfo> {
        self.expect_state(ConnectionState::Disconnected, "connect")?;

        let guard = StateReset::enter(
            &mut self.state,
            ConnectionState::Connecting,
            ConnectionState::Disconnected,
        );

        let mut transport = self
            .provider
            .request(&self.filters)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "No port available");
                SerlineError::PortRequest(e)
            })?;
        let info = transport.info();

        tracing::debug!(
            port = %info,
            baud_rate = self.options.baud_rate,
            data_bits = u8::from(self.options.data_bits),
            "Opening port"
        );
        let streams = transport.open(&self.options).await.map_err(|e| {
            tracing::warn!(port = %info, error = %e, "Failed to open port");
            SerlineError::Open(e)
        })?;

        self.port = Some(OpenPort {
            transport,
            source: SharedSource::new(streams.source),
            sink: SinkSlot::new(streams.sink),
            info: info.clone(),
        });
        guard.finish(ConnectionState::Connected);

        tracing::info!(port = %info, "Connected");
        Ok(info)
    }

    /// Stop reading, close the port and release it
    ///
    /// The manager ends in `Disconnected` even when closing fails; the close
    /// error is still returned.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.expect_state(ConnectionState::Connected, "disconnect")?;

        // Taken up front so a dropped future releases them as well
        let reader = self.reader.take();
        let port = self.port.take();

        let guard = StateReset::enter(
            &mut self.state,
            ConnectionState::Disconnecting,
            ConnectionState::Disconnected,
        );

        if let Some(reader) = reader {
            let id = reader.id();
            let final_state = reader.stop().await;
            tracing::debug!(cycle = %id, state = %final_state, "Read cycle stopped for disconnect");
            self.stopped_cycle = Some(final_state);
        }

        let mut result = Ok(());
        if let Some(mut port) = port {
            port.source.close();

            // Aborts an in-flight write; later sends see NotConnected
            let sink = port.sink.close().await;
            if let Some(mut sink) = sink {
                if let Err(e) = sink.close().await {
                    tracing::warn!(port = %port.info, error = %e, "Failed to close sink");
                    result = Err(SerlineError::Close(e));
                }
            }

            if let Err(e) = port.transport.close().await {
                tracing::warn!(port = %port.info, error = %e, "Failed to close port");
                if result.is_ok() {
                    result = Err(SerlineError::Close(e));
                }
            }

            tracing::info!(port = %port.info, "Disconnected");
        }

        guard.finish(ConnectionState::Disconnected);
        result
    }

    // ==================== Reading ====================

    /// Start a read cycle delivering frames to `handler`
    ///
    /// Fails with `ReadInProgress` while a previous cycle is still running.
    pub fn start_reading<H>(&mut self, handler: H) -> Result<Uuid>
    where
        H: FrameHandler + 'static,
    {
        let port = self.open_port("start reading")?;

        if let Some(previous) = &self.reader {
            if !previous.is_finished() {
                return Err(SerlineError::ReadInProgress);
            }
        }

        let handle = reader::start(&port.source, handler)?;
        let id = handle.id();
        // A finished previous handle is dropped here
        self.reader = Some(handle);
        self.stopped_cycle = None;
        Ok(id)
    }

    /// Cancel the current read cycle and wait for it to end
    ///
    /// Returns the final state of the cycle, or `Idle` if none was started.
    pub async fn stop_reading(&mut self) -> Result<ReaderState> {
        self.expect_state(ConnectionState::Connected, "stop reading")?;

        match self.reader.take() {
            Some(handle) => {
                let final_state = handle.stop().await;
                self.stopped_cycle = Some(final_state);
                Ok(final_state)
            }
            None => Ok(ReaderState::Idle),
        }
    }

    /// State of the latest read cycle, if any was started
    ///
    /// After `stop_reading` or `disconnect` this is the state the stopped
    /// cycle finished in.
    pub fn reader_state(&self) -> Option<ReaderState> {
        self.reader
            .as_ref()
            .map(ReadHandle::state)
            .or(self.stopped_cycle)
    }

    /// Whether a read cycle is currently running
    pub fn is_reading(&self) -> bool {
        self.reader_state() == Some(ReaderState::Running)
    }

    // ==================== Writing ====================

    /// Writer bound to the open port
    pub fn writer(&self) -> Result<Writer> {
        let port = self.open_port("get a writer")?;
        Ok(Writer::new(port.sink.clone()))
    }

    /// Write raw bytes to the open port
    pub async fn send(&self, payload: impl AsRef<[u8]>) -> Result<()> {
        self.writer()?.send(payload).await
    }

    // ==================== Line options ====================

    fn configure(&mut self, operation: &'static str) -> Result<&mut LineOptions> {
        self.expect_state(ConnectionState::Disconnected, operation)?;
        Ok(&mut self.options)
    }

    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.configure("change baud rate")?.baud_rate = baud_rate;
        Ok(())
    }

    pub fn set_data_bits(&mut self, data_bits: DataBits) -> Result<()> {
        self.configure("change data bits")?.data_bits = data_bits;
        Ok(())
    }

    pub fn set_parity(&mut self, parity: Parity) -> Result<()> {
        self.configure("change parity")?.parity = parity;
        Ok(())
    }

    pub fn set_stop_bits(&mut self, stop_bits: StopBits) -> Result<()> {
        self.configure("change stop bits")?.stop_bits = stop_bits;
        Ok(())
    }

    pub fn set_flow_control(&mut self, flow_control: FlowControl) -> Result<()> {
        self.configure("change flow control")?.flow_control = flow_control;
        Ok(())
    }

    pub fn set_buffer_size(&mut self, buffer_size: u32) -> Result<()> {
        self.configure("change buffer size")?.buffer_size = buffer_size;
        Ok(())
    }

    /// Replace all line options at once
    pub fn set_options(&mut self, options: LineOptions) -> Result<()> {
        *self.configure("change line options")? = options;
        Ok(())
    }

    /// Replace the port filters used by the next `connect`
    pub fn set_filters(&mut self, filters: Vec<PortFilter>) -> Result<()> {
        self.expect_state(ConnectionState::Disconnected, "change port filters")?;
        self.filters = filters;
        Ok(())
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state)
            .field("options", &self.options)
            .field("port", &self.port_info())
            .field("reader", &self.reader)
            .finish()
    }
}
