//! Zabbix LLD exporter for MQTT devices.

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use mqtt_lld_common::init_tracing;
use mqtt_lld_exporter::config::OutputMode;
use mqtt_lld_exporter::{DiscoveryRunner, ExporterConfig};

/// Zabbix low-level discovery for MQTT devices.
#[derive(Parser, Debug)]
#[command(name = "mqtt-lld-exporter")]
#[command(about = "Print Zabbix LLD records for devices seen by an MQTT exporter")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// URL of the MQTT exporter metrics (overrides config).
    #[arg(long)]
    metrics_url: Option<String>,

    /// Host name of the Zabbix host (overrides config).
    #[arg(long)]
    zabbix_host: Option<String>,

    /// Emit the legacy `{"data": [...]}` payload.
    #[arg(long)]
    legacy: bool,

    /// Run the sender program per class instead of printing lines.
    #[arg(long)]
    sender: bool,

    /// Zabbix server the sender talks to (overrides config).
    #[arg(long)]
    zabbix_server: Option<String>,

    /// Agent configuration file handed to the sender (overrides config).
    #[arg(long)]
    sender_config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)
            .with_context(|| format!("Can't load config from {}", config_path))?
    } else {
        ExporterConfig::default()
    };

    // Apply CLI overrides
    if let Some(url) = args.metrics_url {
        config.source.url = url;
    }
    if let Some(host) = args.zabbix_host {
        config.zabbix.host = host;
    }
    if args.legacy {
        config.zabbix.legacy = true;
    }
    if args.sender {
        config.output.mode = OutputMode::Sender;
    }
    if let Some(server) = args.zabbix_server {
        config.output.sender.server = Some(server);
    }
    if let Some(path) = args.sender_config {
        config.output.sender.config_file = Some(path);
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_tracing(&config.logging)?;

    info!(
        url = %config.source.url,
        host = %config.zabbix.host,
        legacy = config.zabbix.legacy,
        "Starting MQTT LLD exporter"
    );

    let runner = DiscoveryRunner::new(config);
    let mut sink = runner.sink();

    let summary = match runner.run(sink.as_mut()).await {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "Can't get metrics");
            return Err(e).with_context(|| {
                format!("Can't get metrics from {}", runner.config().source.url)
            });
        }
    };

    if !summary.report.is_complete() {
        warn!(
            failed = summary.report.failed,
            "Some classes were not emitted"
        );
    }

    Ok(())
}
