//! Emission of discovery records in zabbix_sender input format.
//!
//! Every class becomes one `"<host>" "<class>.lld" "<json>"` record, written
//! to a [`Sink`]. A class that fails to serialize or send is logged and
//! skipped; the remaining classes are still emitted.

use std::fmt::Write as _;
use std::io::Write;
use std::process::Command;

use mqtt_lld_common::MetricValue;
use thiserror::Error;
use tracing::{debug, warn};
use unicode_properties::{GeneralCategoryGroup, UnicodeGeneralCategory};

use crate::config::SenderConfig;
use crate::lld::{DeviceEntry, LldFormat, encode_entries, lld_key};
use crate::registry::DeviceRegistry;

/// Errors while emitting a single class.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("JSON encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sender failed for {key}: {message}")]
    Sender { key: String, message: String },
}

/// Quote a string the way zabbix_sender input files expect.
///
/// The result is wrapped in double quotes; `"` and `\` are backslash-escaped,
/// and non-printable characters use C-style escapes (`\n`, `\t`, `\x1b`,
/// `\u00a0`, `\U000e0001`).
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');

    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0B}' => out.push_str("\\v"),
            c if (c as u32) < 0x20 || c == '\u{7F}' => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if is_printable(c) => out.push(c),
            c if (c as u32) < 0x10000 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => {
                let _ = write!(out, "\\U{:08x}", c as u32);
            }
        }
    }

    out.push('"');
    out
}

/// Letters, marks, numbers, punctuation, symbols and the ASCII space.
///
/// Other separators (no-break space, line separator), format characters,
/// private-use and unassigned code points are escaped.
fn is_printable(c: char) -> bool {
    c == ' '
        || matches!(
            c.general_category_group(),
            GeneralCategoryGroup::Letter
                | GeneralCategoryGroup::Mark
                | GeneralCategoryGroup::Number
                | GeneralCategoryGroup::Punctuation
                | GeneralCategoryGroup::Symbol
        )
}

/// Format one sender line (without the trailing newline).
pub fn sender_line(host: &str, key: &str, value: &MetricValue) -> String {
    format!("{} {} {}", quote(host), quote(key), quote(&value.to_string()))
}

/// Destination for discovery records.
pub trait Sink {
    /// Deliver one `host key value` record.
    fn send(&mut self, host: &str, key: &str, value: &MetricValue) -> Result<(), EmitError>;
}

/// Writes sender lines to any writer, one per record.
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    /// Create a sink over a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Consume the sink and return the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterSink<std::io::Stdout> {
    /// Sink writing to the process stdout.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> Sink for WriterSink<W> {
    fn send(&mut self, host: &str, key: &str, value: &MetricValue) -> Result<(), EmitError> {
        writeln!(self.writer, "{}", sender_line(host, key, value))?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Host placeholder meaning "the host from the agent configuration".
const AGENT_HOST: &str = "-";

/// Runs the sender program once per record.
pub struct SenderCommandSink {
    config: SenderConfig,
}

impl SenderCommandSink {
    /// Create a sink from sender settings.
    pub fn new(config: SenderConfig) -> Self {
        Self { config }
    }

    /// Build the command line for one record.
    ///
    /// A host of `-` is left out of the arguments, so the sender takes the
    /// host name from its agent configuration file.
    pub fn command(&self, host: &str, key: &str, value: &MetricValue) -> Command {
        let mut cmd = Command::new(&self.config.path);

        if let Some(config_file) = &self.config.config_file {
            cmd.arg("-c").arg(config_file);
        }
        if let Some(server) = &self.config.server {
            cmd.arg("-z").arg(server);
        }
        if let Some(port) = self.config.port {
            cmd.arg("-p").arg(port.to_string());
        }

        if host != AGENT_HOST {
            cmd.arg("-s").arg(host);
        }

        cmd.arg("-k").arg(key).arg("-o").arg(value.to_string());
        cmd
    }
}

impl Sink for SenderCommandSink {
    fn send(&mut self, host: &str, key: &str, value: &MetricValue) -> Result<(), EmitError> {
        let output = self
            .command(host, key, value)
            .output()
            .map_err(|e| EmitError::Sender {
                key: key.to_string(),
                message: format!("failed to run {}: {}", self.config.path, e),
            })?;

        debug!(
            key = %key,
            stdout = %String::from_utf8_lossy(&output.stdout).trim(),
            "Sender finished"
        );

        if !output.status.success() {
            return Err(EmitError::Sender {
                key: key.to_string(),
                message: format!(
                    "{} ({})",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(())
    }
}

/// Outcome of an emission pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitReport {
    /// Classes delivered to the sink.
    pub emitted: usize,
    /// Classes skipped because of an error.
    pub failed: usize,
}

impl EmitReport {
    /// Check if every class was delivered.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Turns a registry into discovery records.
pub struct Emitter {
    host: String,
    format: LldFormat,
}

impl Emitter {
    /// Create an emitter for a Zabbix host.
    pub fn new(host: impl Into<String>, format: LldFormat) -> Self {
        Self {
            host: host.into(),
            format,
        }
    }

    /// Emit one record for a class.
    pub fn emit_class(
        &self,
        class: &str,
        entries: &[DeviceEntry],
        sink: &mut dyn Sink,
    ) -> Result<(), EmitError> {
        let payload = encode_entries(entries, self.format)?;
        let key = lld_key(class);
        sink.send(&self.host, &key, &MetricValue::Bytes(payload))
    }

    /// Emit one record per class of the registry.
    pub fn emit(&self, registry: &DeviceRegistry, sink: &mut dyn Sink) -> EmitReport {
        let mut report = EmitReport::default();

        for (class, entries) in registry {
            match self.emit_class(class, entries, sink) {
                Ok(()) => {
                    report.emitted += 1;
                    debug!(class = %class, devices = entries.len(), "Class emitted");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(class = %class, error = %e, "Skipping class");
                }
            }
        }

        report
    }
}
