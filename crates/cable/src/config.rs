//! Configuration
//!
//! Loads `cable.toml`. Every section and field is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cable_bridge::{ForwarderConfig, HttpSinkConfig};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "cable.toml";

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Top-level configuration (cable.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CableConfig {
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// External broadcast server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Broadcast endpoint; broadcasts go to stdout when unset
    pub url: Option<String>,
    /// Bearer key for the broadcast endpoint
    pub key: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            timeout_ms: default_timeout_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl BroadcastConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn forwarder_config(&self) -> ForwarderConfig {
        ForwarderConfig::default()
            .with_timeout(self.timeout())
            .with_queue_capacity(self.queue_capacity)
    }

    /// HTTP sink settings, `None` when no URL is configured
    pub fn http_sink_config(&self) -> Option<HttpSinkConfig> {
        let url = self.url.as_deref()?;
        let mut config = HttpSinkConfig::new(url).with_request_timeout(self.timeout());
        if let Some(key) = &self.key {
            config = config.with_key(key);
        }
        Some(config)
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directives, overridden by `RUST_LOG`
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_filter() -> String {
    "cable=info,cable_bridge=info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl CableConfig {
    /// Load configuration from a TOML file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Load an explicit file, or the default file if present, or defaults
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path).await;
        }

        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            return Self::load(default_path).await;
        }

        debug!("No config file, using defaults");
        Ok(Self::default())
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio_test::assert_ok;

    #[test]
    fn test_defaults() {
        let config = assert_ok!(CableConfig::parse(""));

        assert!(config.broadcast.url.is_none());
        assert_eq!(config.broadcast.timeout(), Duration::from_secs(5));
        assert_eq!(config.broadcast.queue_capacity, 1024);
        assert!(config.broadcast.http_sink_config().is_none());
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert_eq!(config.log.filter, "cable=info,cable_bridge=info");
    }

    #[test]
    fn test_parse_full_config() {
        let config = assert_ok!(CableConfig::parse(
            r#"
            [broadcast]
            url = "http://localhost:8090/_broadcast"
            key = "secret"
            timeout_ms = 250
            queue_capacity = 16

            [log]
            filter = "debug"
            format = "json"
            "#,
        ));

        let sink = config.broadcast.http_sink_config().unwrap();
        assert_eq!(sink.url, "http://localhost:8090/_broadcast");
        assert_eq!(sink.key.as_deref(), Some("secret"));
        assert_eq!(sink.request_timeout, Duration::from_millis(250));

        let forwarder = config.broadcast.forwarder_config();
        assert_eq!(forwarder.timeout, Duration::from_millis(250));
        assert_eq!(forwarder.queue_capacity, 16);

        assert_eq!(config.log.filter, "debug");
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_toml() {
        let result = CableConfig::parse("[broadcast\nurl = 1");
        assert!(matches!(result, Err(ConfigError::TomlParseError(_))));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[broadcast]\nurl = \"http://127.0.0.1:8090/_broadcast\"").unwrap();

        let config = assert_ok!(CableConfig::load(file.path()).await);
        assert_eq!(
            config.broadcast.url.as_deref(),
            Some("http://127.0.0.1:8090/_broadcast")
        );
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");

        let result = CableConfig::load_or_default(Some(&missing)).await;
        assert!(matches!(result, Err(ConfigError::NotFound(p)) if p == missing));
    }
}
