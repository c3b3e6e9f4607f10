//! Error types for serline
//!
//! Provides the unified error type used across all serline crates. Variants
//! are grouped by category; [`SerlineError::kind`] reports the category.

use std::path::PathBuf;

/// Error category reported alongside every [`SerlineError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Opening, selecting or closing the transport failed
    Connection,
    /// I/O failure while reading or writing an open transport
    Transport,
    /// Operation invoked from an invalid lifecycle state
    State,
    /// Outbound payload could not be encoded
    Protocol,
    /// Configuration could not be loaded
    Config,
    /// Bug or runtime failure outside the categories above
    Internal,
}

/// Main error type for serline operations
#[derive(Debug, thiserror::Error)]
pub enum SerlineError {
    // === Connection Errors ===

    #[error("No port available: {0}")]
    PortRequest(#[source] std::io::Error),

    #[error("Failed to open port: {0}")]
    Open(#[source] std::io::Error),

    #[error("Failed to close port: {0}")]
    Close(#[source] std::io::Error),

    // === Transport Errors ===

    #[error("Read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("Write failed: {0}")]
    Write(#[source] std::io::Error),

    // === State Errors ===

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("A read cycle is already running")]
    ReadInProgress,

    #[error("A write is already in progress")]
    WriteInProgress,

    #[error("Not connected")]
    NotConnected,

    // === Protocol Errors ===

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Filesystem Errors ===

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SerlineError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PortRequest(_) | Self::Open(_) | Self::Close(_) => ErrorKind::Connection,
            Self::Read(_) | Self::Write(_) => ErrorKind::Transport,
            Self::InvalidState { .. }
            | Self::ReadInProgress
            | Self::WriteInProgress
            | Self::NotConnected => ErrorKind::State,
            Self::InvalidMessage(_) => ErrorKind::Protocol,
            Self::Config(_) | Self::ConfigInvalid { .. } | Self::FileRead { .. } => {
                ErrorKind::Config
            }
            Self::FileWrite { .. } | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if this error is retryable
    ///
    /// Only connection failures qualify; nothing in serline retries on its own.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }
}

/// Result type alias using SerlineError
pub type Result<T> = std::result::Result<T, SerlineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display() {
        let err = SerlineError::InvalidState {
            operation: "disconnect",
            state: "disconnected",
        };
        assert_eq!(err.to_string(), "Cannot disconnect while disconnected");
    }

    #[test]
    fn test_error_kinds() {
        let io_err = || io::Error::new(io::ErrorKind::BrokenPipe, "gone");

        assert_eq!(SerlineError::Open(io_err()).kind(), ErrorKind::Connection);
        assert_eq!(SerlineError::Close(io_err()).kind(), ErrorKind::Connection);
        assert_eq!(SerlineError::Read(io_err()).kind(), ErrorKind::Transport);
        assert_eq!(SerlineError::Write(io_err()).kind(), ErrorKind::Transport);
        assert_eq!(SerlineError::WriteInProgress.kind(), ErrorKind::State);
        assert_eq!(SerlineError::NotConnected.kind(), ErrorKind::State);
        assert_eq!(
            SerlineError::InvalidMessage("too long".into()).kind(),
            ErrorKind::Protocol
        );
        assert_eq!(SerlineError::config("bad").kind(), ErrorKind::Config);
        assert_eq!(SerlineError::internal("bug").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_retryable() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "no device");
        assert!(SerlineError::Open(io_err).is_retryable());
        assert!(!SerlineError::ReadInProgress.is_retryable());
    }

    #[test]
    fn test_source_is_preserved() {
        use std::error::Error;

        let err = SerlineError::Write(io::Error::new(io::ErrorKind::TimedOut, "stalled"));
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "stalled");
    }
}
