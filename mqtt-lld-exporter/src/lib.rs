//! Zabbix low-level discovery for devices behind an MQTT metrics exporter.
//!
//! This crate fetches the JSON snapshot served by an MQTT-to-HTTP exporter,
//! groups its topic keys by physical device, and emits one discovery record
//! per device class for `zabbix_sender`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  HTTP exporter  │────>│    Registry     │────>│     Emitter     │
//! │  (/v1/metrics)  │     │ (per-class LLD) │     │ (stdout/sender) │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! Run the exporter binary and pipe its output into zabbix_sender:
//!
//! ```bash
//! mqtt-lld-exporter --zabbix-host wb-7 | zabbix_sender -z zabbix.local -i -
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod config;
pub mod emitter;
pub mod fetch;
pub mod lld;
pub mod registry;
pub mod runner;

pub use config::ExporterConfig;
pub use emitter::{EmitReport, Emitter, SenderCommandSink, Sink, WriterSink};
pub use fetch::{FetchError, MetricsFetcher};
pub use lld::{DeviceEntry, LldFormat};
pub use registry::{ClassFilter, DeviceRegistry, RegistryStats};
pub use runner::{DiscoveryRunner, RunSummary};
