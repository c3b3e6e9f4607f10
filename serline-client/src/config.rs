//! Client configuration loading
//!
//! Reads line options, port filters and remote aliases from
//! `~/.config/serline/config.toml`:
//!
//! ```toml
//! addr = "bench"
//!
//! [line]
//! baud_rate = 115200
//! parity = "even"
//!
//! [[filters]]
//! usb_vendor_id = 2389
//! usb_product_id = 28704
//!
//! [remotes]
//! bench = "tcp://192.168.1.20:4000"
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use serline_protocol::{LineOptions, PortFilter};
use serline_utils::{config_file, Result, SerlineError};

/// Client configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Line options used on connect
    pub line: LineOptions,
    /// Accepted ports; empty accepts any
    pub filters: Vec<PortFilter>,
    /// Alias to address map
    pub remotes: HashMap<String, String>,
    /// Default address or alias
    pub addr: Option<String>,
}

impl ClientConfig {
    /// Load from the default location
    ///
    /// Returns defaults if the file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = config_file();

        if !path.exists() {
            tracing::debug!("Config file not found, using defaults");
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                tracing::debug!(
                    path = %path.display(),
                    baud_rate = config.line.baud_rate,
                    filters = config.filters.len(),
                    "Loaded config"
                );
                config
            }
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Load from a specific path, failing on unreadable or invalid files
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SerlineError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| SerlineError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Resolve a remote alias to an address
    pub fn resolve_remote(&self, name: &str) -> Option<&str> {
        self.remotes.get(name).map(String::as_str)
    }

    /// Address to dial: `requested` or the configured default, with aliases
    /// resolved
    pub fn resolve_addr(&self, requested: Option<&str>) -> Option<String> {
        let addr = requested.or(self.addr.as_deref())?;
        Some(self.resolve_remote(addr).unwrap_or(addr).to_string())
    }
}
