//! One discovery run: fetch, classify, register, emit.

use mqtt_lld_common::MetricSnapshot;
use tracing::info;

use crate::config::{ExporterConfig, OutputMode};
use crate::emitter::{EmitReport, Emitter, SenderCommandSink, Sink, WriterSink};
use crate::fetch::{FetchError, MetricsFetcher};
use crate::registry::{ClassFilter, DeviceRegistry, RegistryStats};

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Registry counters.
    pub stats: RegistryStats,
    /// Classes discovered.
    pub classes: usize,
    /// Emission outcome.
    pub report: EmitReport,
}

/// Drives a single discovery pass.
///
/// Nothing survives between runs: each call builds its own snapshot and
/// registry.
///
/// # Example
///
/// ```ignore
/// use mqtt_lld_exporter::{DiscoveryRunner, ExporterConfig};
///
/// let runner = DiscoveryRunner::new(ExporterConfig::default());
/// let mut sink = runner.sink();
/// let summary = runner.run(sink.as_mut()).await?;
/// ```
pub struct DiscoveryRunner {
    config: ExporterConfig,
}

impl DiscoveryRunner {
    /// Create a runner.
    pub fn new(config: ExporterConfig) -> Self {
        Self { config }
    }

    /// The runner configuration.
    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    /// Build the sink selected by the output configuration.
    pub fn sink(&self) -> Box<dyn Sink> {
        match self.config.output.mode {
            OutputMode::Stdout => Box::new(WriterSink::stdout()),
            OutputMode::Sender => Box::new(SenderCommandSink::new(
                self.config.output.sender.clone(),
            )),
        }
    }

    /// Group the topics of a snapshot into a registry.
    pub fn discover(&self, snapshot: &MetricSnapshot) -> DeviceRegistry {
        let mut registry = DeviceRegistry::with_filter(ClassFilter::new(&self.config.filters));
        registry.ingest(snapshot);
        registry
    }

    /// Discover and emit an already fetched snapshot.
    pub fn process(&self, snapshot: &MetricSnapshot, sink: &mut dyn Sink) -> RunSummary {
        let registry = self.discover(snapshot);
        let emitter = Emitter::new(&self.config.zabbix.host, self.config.zabbix.format());
        let report = emitter.emit(&registry, sink);

        let summary = RunSummary {
            stats: registry.stats().clone(),
            classes: registry.class_count(),
            report,
        };

        info!(
            keys_seen = summary.stats.keys_seen,
            keys_rejected = summary.stats.keys_rejected,
            keys_filtered = summary.stats.keys_filtered,
            devices = summary.stats.devices_registered,
            duplicates = summary.stats.duplicates,
            classes_emitted = summary.report.emitted,
            classes_failed = summary.report.failed,
            "Discovery finished"
        );

        summary
    }

    /// Fetch a snapshot and process it.
    ///
    /// A fetch failure aborts the run before anything is emitted.
    pub async fn run(&self, sink: &mut dyn Sink) -> Result<RunSummary, FetchError> {
        let fetcher = MetricsFetcher::new(&self.config.source)?;
        let snapshot = fetcher.fetch().await?;
        Ok(self.process(&snapshot, sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use mqtt_lld_common::{MetricRecord, MetricValue};

    fn snapshot() -> MetricSnapshot {
        [
            "/devices/msu24hit_5/controls/0000000001",
            "/devices/wb-mcm16_1/controls/0005000001",
            "/devices/wb-w1/controls/28-000000000001",
            "/devices/msu24hit_6_7/controls/00000002",
        ]
        .into_iter()
        .map(|k| {
            let record = MetricRecord {
                topic: k.to_string(),
                value: Some(MetricValue::Integer(1)),
                ..Default::default()
            };
            (k.to_string(), record)
        })
        .collect()
    }

    #[test]
    fn test_process_to_buffer() {
        let runner = DiscoveryRunner::new(ExporterConfig::default());
        let mut sink = WriterSink::new(Vec::new());

        let summary = runner.process(&snapshot(), &mut sink);

        assert_eq!(summary.classes, 3);
        assert_eq!(summary.report.emitted, 3);
        assert_eq!(summary.stats.keys_rejected, 1);

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let keys: Vec<_> = output
            .lines()
            .map(|l| l.split(' ').nth(1).unwrap())
            .collect();
        assert_eq!(
            keys,
            vec!["\"msu24hit.lld\"", "\"wb-mcm16.lld\"", "\"wb-w1.lld\""]
        );
        assert!(output.lines().all(|l| l.starts_with("\"-\" ")));
    }

    #[test]
    fn test_process_with_filter_and_legacy() {
        let mut config = ExporterConfig::default();
        config.zabbix.host = "wb-7".to_string();
        config.zabbix.legacy = true;
        config.filters = FilterConfig {
            include_classes: vec!["wb-*".to_string()],
            exclude_classes: vec![],
        };
        let runner = DiscoveryRunner::new(config);
        let mut sink = WriterSink::new(Vec::new());

        let summary = runner.process(&snapshot(), &mut sink);

        assert_eq!(summary.classes, 2);
        assert_eq!(summary.stats.keys_filtered, 1);

        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.contains(r#""wb-7" "wb-mcm16.lld" "{\"data\":[{\"{#DEVICE}\":\"1\""#));
    }

    #[test]
    fn test_runs_are_independent() {
        let runner = DiscoveryRunner::new(ExporterConfig::default());

        let first = runner.process(&snapshot(), &mut WriterSink::new(Vec::new()));
        let second = runner.process(&snapshot(), &mut WriterSink::new(Vec::new()));

        assert_eq!(first, second);
        assert_eq!(second.stats.duplicates, 0);
    }
}
