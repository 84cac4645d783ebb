//! Configuration for the LLD exporter.

use mqtt_lld_common::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::lld::LldFormat;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Where to fetch the metrics snapshot from.
    #[serde(default)]
    pub source: SourceConfig,

    /// Zabbix target settings.
    #[serde(default)]
    pub zabbix: ZabbixConfig,

    /// Where discovery lines go.
    #[serde(default)]
    pub output: OutputConfig,

    /// Device class filtering settings.
    #[serde(default)]
    pub filters: FilterConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metrics source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// URL of the MQTT exporter metrics endpoint.
    #[serde(default = "default_url")]
    pub url: String,

    /// Request timeout in seconds (default: 3).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_url() -> String {
    "http://localhost:8080/v1/metrics".to_string()
}

fn default_timeout() -> u64 {
    3
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Zabbix target configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZabbixConfig {
    /// Host name of the Zabbix host the discovery items belong to.
    ///
    /// `-` lets zabbix_sender pick the host from its own configuration.
    #[serde(default = "default_host")]
    pub host: String,

    /// Emit the pre-4.2 `{"data": [...]}` payload.
    #[serde(default)]
    pub legacy: bool,
}

fn default_host() -> String {
    "-".to_string()
}

impl Default for ZabbixConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            legacy: false,
        }
    }
}

impl ZabbixConfig {
    /// Payload format selected by the `legacy` flag.
    pub fn format(&self) -> LldFormat {
        if self.legacy {
            LldFormat::Legacy
        } else {
            LldFormat::Standard
        }
    }
}

/// Output destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Print zabbix_sender input lines on stdout.
    #[default]
    Stdout,
    /// Run the sender program once per class.
    Sender,
}

/// Output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output destination (default: stdout).
    #[serde(default)]
    pub mode: OutputMode,

    /// Sender program settings, used when `mode` is `sender`.
    #[serde(default)]
    pub sender: SenderConfig,
}

/// External sender program configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Path to the sender binary (default: "zabbix_sender").
    #[serde(default = "default_sender_path")]
    pub path: String,

    /// Agent configuration file the sender reads server and host from (`-c`).
    #[serde(default)]
    pub config_file: Option<String>,

    /// Zabbix server or proxy address (`-z`).
    #[serde(default)]
    pub server: Option<String>,

    /// Zabbix trapper port (`-p`).
    #[serde(default)]
    pub port: Option<u16>,
}

fn default_sender_path() -> String {
    "zabbix_sender".to_string()
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            path: default_sender_path(),
            config_file: None,
            server: None,
            port: None,
        }
    }
}

/// Device class filtering configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Glob patterns for classes to include (empty = all).
    #[serde(default)]
    pub include_classes: Vec<String>,

    /// Glob patterns for classes to exclude.
    #[serde(default)]
    pub exclude_classes: Vec<String>,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.source.url.starts_with("http://") && !self.source.url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "Invalid metrics url: {}",
                self.source.url
            )));
        }

        if self.source.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        if self.output.mode == OutputMode::Sender {
            let sender = &self.output.sender;
            if sender.path.is_empty() {
                return Err(ConfigError::Validation(
                    "sender path must not be empty".to_string(),
                ));
            }
            if sender.server.is_none() && sender.config_file.is_none() {
                return Err(ConfigError::Validation(
                    "sender mode needs a server or a config_file".to_string(),
                ));
            }
        }

        for pattern in self
            .filters
            .include_classes
            .iter()
            .chain(&self.filters.exclude_classes)
        {
            if let Err(e) = glob::Pattern::new(pattern) {
                return Err(ConfigError::Validation(format!(
                    "Invalid class pattern '{}': {}",
                    pattern, e
                )));
            }
        }

        Ok(())
    }
}
