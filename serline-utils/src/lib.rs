//! serline-utils: Common utilities shared across serline crates
//!
//! This crate provides:
//! - Unified error types ([`SerlineError`], [`ErrorKind`], [`Result`])
//! - Logging infrastructure ([`init_logging`], [`LogConfig`])
//! - XDG-compliant path utilities ([`paths`] module)

pub mod error;
pub mod logging;
pub mod paths;

pub use error::{ErrorKind, Result, SerlineError};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogOutput};
pub use paths::{config_dir, config_file, log_dir, state_dir};
