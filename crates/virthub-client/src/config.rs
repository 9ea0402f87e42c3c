//! Client configuration and hub addressing.
//!
//! Timeouts are stored as plain millisecond integers so the TOML file
//! stays readable:
//!
//! ```toml
//! dial_timeout_ms = 3000
//! call_timeout_ms = 5000
//! write_timeout_ms = 5000
//! ```
//!
//! Fields absent from the file fall back to their defaults, so a partial
//! config (or none at all) works on first run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default hub host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default hub management port.
pub const DEFAULT_PORT: u16 = 3242;

/// Error type for configuration and address parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A hub address string was not of the form `host:port`.
    #[error("invalid hub address {0:?}: expected host:port")]
    InvalidAddr(String),
}

// ── Hub address ───────────────────────────────────────────────────────────────

/// Address of a hub: `host:port`.
///
/// Parsing splits on the **last** colon so a colon inside the host part
/// (an IPv6 literal, for instance) does not swallow the port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubAddr {
    pub host: String,
    pub port: u16,
}

impl HubAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parses a `host:port` string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddr`] when the string has no colon,
    /// an empty host, or a port that is not a valid u16.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::InvalidAddr(s.to_string()))?;
        if host.is_empty() {
            return Err(ConfigError::InvalidAddr(s.to_string()));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| ConfigError::InvalidAddr(s.to_string()))?;
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl Default for HubAddr {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl fmt::Display for HubAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ── Client config ─────────────────────────────────────────────────────────────

/// Timeout configuration for a [`crate::HubClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// TCP dial timeout in milliseconds.
    #[serde(default = "default_dial_timeout_ms")]
    pub dial_timeout_ms: u64,
    /// Management call timeout in milliseconds: how long a request may
    /// wait for its correlated response.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Socket write timeout in milliseconds.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

fn default_dial_timeout_ms() -> u64 {
    3_000
}

fn default_call_timeout_ms() -> u64 {
    5_000
}

fn default_write_timeout_ms() -> u64 {
    5_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            dial_timeout_ms: default_dial_timeout_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl ClientConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Reads a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = toml::from_str(&content)?;
        Ok(cfg)
    }

    /// Writes the config to a TOML file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if serialization or writing fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_addr_is_loopback_3242() {
        let addr = HubAddr::default();
        assert_eq!(addr.host, "127.0.0.1");
        assert_eq!(addr.port, 3242);
        assert_eq!(addr.to_string(), "127.0.0.1:3242");
    }

    #[test]
    fn test_parse_splits_on_last_colon() {
        let addr = HubAddr::parse("::1:3242").expect("parse");
        assert_eq!(addr.host, "::1");
        assert_eq!(addr.port, 3242);
    }

    #[test]
    fn test_parse_hostname_and_port() {
        let addr = HubAddr::parse("hub.local:9000").expect("parse");
        assert_eq!(addr.host, "hub.local");
        assert_eq!(addr.port, 9000);
    }

    #[test]
    fn test_parse_rejects_missing_colon() {
        assert!(matches!(
            HubAddr::parse("localhost"),
            Err(ConfigError::InvalidAddr(_))
        ));
    }

    #[test]
    fn test_parse_rejects_empty_host() {
        assert!(matches!(
            HubAddr::parse(":3242"),
            Err(ConfigError::InvalidAddr(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_numeric_port() {
        assert!(matches!(
            HubAddr::parse("localhost:abc"),
            Err(ConfigError::InvalidAddr(_))
        ));
    }

    #[test]
    fn test_config_defaults() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.dial_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.call_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.write_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_toml_round_trip() {
        let cfg = ClientConfig {
            dial_timeout_ms: 1_000,
            call_timeout_ms: 2_000,
            write_timeout_ms: 3_000,
        };
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: ClientConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(restored, cfg);
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let restored: ClientConfig = toml::from_str("call_timeout_ms = 250").expect("deserialize");
        assert_eq!(restored.call_timeout(), Duration::from_millis(250));
        assert_eq!(restored.dial_timeout(), Duration::from_secs(3));
        assert_eq!(restored.write_timeout(), Duration::from_secs(5));
    }
}
