//! Logging infrastructure for serline
//!
//! Sets up the tracing subscriber used by the CLI and by embedding
//! applications that do not bring their own.

use std::fs::File;

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::{paths, Result, SerlineError};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "SERLINE_LOG";

/// Log output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Log to stderr
    Stderr,
    /// Log to `serline.log` in the log directory
    File,
    /// Log to both stderr and file
    Both,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output destination
    pub output: LogOutput,
    /// Log level filter (e.g., "info", "serline_client=debug,tokio=warn")
    pub filter: String,
    /// Include span events (enter/exit)
    pub span_events: bool,
    /// Include file/line in logs
    pub file_line: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "info".into(),
            span_events: false,
            file_line: false,
        }
    }
}

impl LogConfig {
    /// Config for the command line tool: stderr, quiet unless asked
    pub fn cli() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: std::env::var(LOG_ENV).unwrap_or_else(|_| "warn".into()),
            span_events: false,
            file_line: false,
        }
    }

    /// Config for development (verbose stderr)
    pub fn development() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "debug".into(),
            span_events: true,
            file_line: true,
        }
    }
}

/// Initialize logging with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize logging with custom configuration
///
/// Fails if a global subscriber is already installed.
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| SerlineError::config(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(config.file_line)
        .with_line_number(config.file_line);

    let fmt_layer = if config.span_events {
        fmt_layer.with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    } else {
        fmt_layer
    };

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.output {
        LogOutput::Stderr => registry
            .with(fmt_layer.with_writer(std::io::stderr))
            .try_init(),
        LogOutput::File => {
            let file = open_log_file()?;
            registry
                .with(fmt_layer.with_writer(file).with_ansi(false))
                .try_init()
        }
        LogOutput::Both => {
            let file = open_log_file()?;
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true);
            registry
                .with(fmt_layer.with_writer(std::io::stderr))
                .with(file_layer)
                .try_init()
        }
    };

    result.map_err(|e| SerlineError::internal(format!("Failed to init logging: {}", e)))?;

    tracing::debug!(
        filter = %config.filter,
        output = ?config.output,
        "Logging initialized"
    );
    Ok(())
}

fn open_log_file() -> Result<File> {
    let log_dir = paths::log_dir();
    paths::ensure_dir(&log_dir).map_err(|e| SerlineError::FileWrite {
        path: log_dir.clone(),
        source: e,
    })?;

    let log_path = log_dir.join("serline.log");
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| SerlineError::FileWrite {
            path: log_path,
            source: e,
        })
}
