use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;

/// Snapshot of every metric exposed by the exporter, keyed by MQTT topic.
///
/// A `BTreeMap` keeps iteration sorted by topic, so anything derived from a
/// snapshot (first-seen order of devices, for instance) is reproducible.
pub type MetricSnapshot = BTreeMap<String, MetricRecord>;

/// A single metric as published by the MQTT-to-HTTP exporter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Topic the value was received on.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub topic: String,

    /// Exporter-side type hint (e.g. "temperature", "switch").
    #[serde(
        rename = "type",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub kind: String,

    /// Last received value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<MetricValue>,

    /// Raw payload when the value could not be decoded.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub binary: String,

    /// Unix epoch seconds of the last update.
    #[serde(rename = "ts", default, deserialize_with = "null_as_default")]
    pub timestamp: i64,

    /// RFC 3339 rendering of `timestamp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rfc3339: Option<String>,
}

/// Exporters write `null` for fields they have nothing for; read it as empty.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Dynamically typed metric value.
///
/// Variant order matters for untagged decoding: integers are tried before
/// floats so that `42` stays an integer, and anything unrecognised lands in
/// [`MetricValue::Other`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Signed integer.
    Integer(i64),

    /// Floating-point number.
    Float(f64),

    /// Text value.
    Text(String),

    /// Raw bytes.
    Bytes(Vec<u8>),

    /// Anything else (booleans, objects, mixed arrays).
    Other(serde_json::Value),
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Integer(v)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for MetricValue {
    fn from(v: Vec<u8>) -> Self {
        MetricValue::Bytes(v)
    }
}

impl From<serde_json::Value> for MetricValue {
    fn from(v: serde_json::Value) -> Self {
        MetricValue::Other(v)
    }
}

/// Renders the value the way the sender expects it on the wire.
///
/// Floats always carry six decimal places; bytes are decoded as (lossy) UTF-8.
impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Integer(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{:.6}", v),
            MetricValue::Text(s) => f.write_str(s),
            MetricValue::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            MetricValue::Other(v) => write!(f, "{}", v),
        }
    }
}

/// Decode an exporter response body into a snapshot.
pub fn parse_snapshot(body: &[u8]) -> Result<MetricSnapshot> {
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snapshot() {
        let body = br#"{
            "/devices/wb-w1/controls/28-000000000001": {
                "topic": "/devices/wb-w1/controls/28-000000000001",
                "type": "temperature",
                "value": 25.5,
                "ts": 1234567890,
                "rfc3339": "2009-02-13T23:31:30Z"
            },
            "/devices/msu24hit_5/controls/0000000001": {
                "value": 3,
                "ts": 1234567891
            }
        }"#;

        let snapshot = parse_snapshot(body).unwrap();
        assert_eq!(snapshot.len(), 2);

        let w1 = &snapshot["/devices/wb-w1/controls/28-000000000001"];
        assert_eq!(w1.kind, "temperature");
        assert_eq!(w1.value, Some(MetricValue::Float(25.5)));
        assert_eq!(w1.rfc3339.as_deref(), Some("2009-02-13T23:31:30Z"));

        let msu = &snapshot["/devices/msu24hit_5/controls/0000000001"];
        assert_eq!(msu.value, Some(MetricValue::Integer(3)));
        assert!(msu.topic.is_empty());
    }

    #[test]
    fn test_parse_snapshot_rejects_garbage() {
        assert!(parse_snapshot(b"invalid json").is_err());
        assert!(parse_snapshot(b"[1, 2, 3]").is_err());
    }

    #[test]
    fn test_value_variants_decode() {
        let decode = |s: &str| serde_json::from_str::<MetricValue>(s).unwrap();

        assert_eq!(decode("42"), MetricValue::Integer(42));
        assert_eq!(decode("-1"), MetricValue::Integer(-1));
        assert_eq!(decode("2.5"), MetricValue::Float(2.5));
        assert_eq!(decode("\"on\""), MetricValue::Text("on".to_string()));
        assert_eq!(decode("[104, 105]"), MetricValue::Bytes(vec![104, 105]));
        assert_eq!(
            decode("true"),
            MetricValue::Other(serde_json::Value::Bool(true))
        );
    }

    #[test]
    fn test_value_display() {
        assert_eq!(MetricValue::Integer(7).to_string(), "7");
        assert_eq!(MetricValue::Float(25.5).to_string(), "25.500000");
        assert_eq!(MetricValue::from("open").to_string(), "open");
        assert_eq!(MetricValue::from(b"[{}]".to_vec()).to_string(), "[{}]");
        assert_eq!(
            MetricValue::from(serde_json::json!({"a": 1})).to_string(),
            r#"{"a":1}"#
        );
    }

    #[test]
    fn test_parse_snapshot_null_fields() {
        let body = br#"{
            "/devices/msu24hit_5/controls/0000000001": {
                "topic": null,
                "type": null,
                "value": null,
                "binary": null,
                "ts": null,
                "rfc3339": null
            },
            "/devices/msu24hit_6/controls/0000000001": {
                "topic": "/devices/msu24hit_6/controls/0000000001",
                "binary": null,
                "value": 1,
                "ts": 1
            }
        }"#;

        let snapshot = parse_snapshot(body).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot["/devices/msu24hit_5/controls/0000000001"],
            MetricRecord::default()
        );

        let msu = &snapshot["/devices/msu24hit_6/controls/0000000001"];
        assert_eq!(msu.topic, "/devices/msu24hit_6/controls/0000000001");
        assert!(msu.binary.is_empty());
        assert_eq!(msu.value, Some(MetricValue::Integer(1)));
    }
}
