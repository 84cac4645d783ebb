//! MQTT LLD Common Library
//!
//! This crate provides shared types and utilities for turning an MQTT metrics
//! snapshot into low-level discovery data:
//!
//! - [`metric`] - Metric snapshot model (`MetricSnapshot`, `MetricRecord`, `MetricValue`)
//! - [`topic`] - Topic key classification (`classify`, `Classified`, `Rejection`)
//! - [`config`] - Logging configuration (`LoggingConfig`, `LogFormat`)
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod metric;
pub mod topic;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig};
pub use error::{Error, Result};
pub use metric::{MetricRecord, MetricSnapshot, MetricValue, parse_snapshot};
pub use topic::{Classified, Rejection, classify};

/// Initialize tracing with the given configuration.
///
/// Logs always go to stderr; stdout is reserved for sender lines.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// # Example
///
/// ```ignore
/// use mqtt_lld_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
