//! Classification of MQTT topic keys into discoverable devices.
//!
//! Topics follow the Wiren Board convention:
//! `/devices/<device>/controls/<control>[/...]`. The device segment is
//! normally `<class>_<id>` (e.g. `msu24hit_5`); the one-wire bus `wb-w1` is
//! special in that each control is itself a device (a sensor address).

use thiserror::Error;

/// Maximum number of `/`-separated pieces a topic is split into.
pub const MAX_SEGMENTS: usize = 10;

/// Minimum number of pieces a topic must have to name a control.
pub const MIN_SEGMENTS: usize = 5;

/// Literal expected in the second topic segment.
pub const DEVICES_SEGMENT: &str = "devices";

/// Literal expected in the fourth topic segment.
pub const CONTROLS_SEGMENT: &str = "controls";

/// Device segment of the one-wire bus, whose controls are devices themselves.
pub const ONE_WIRE_CLASS: &str = "wb-w1";

/// Why a topic key was not classified as a device control.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("topic too short: {segments} segments, need at least {}", MIN_SEGMENTS)]
    TooShort { segments: usize },

    #[error("not a /devices/*/controls/ path")]
    NotDevicePath,

    #[error("no device identifier found in '{segment}'")]
    MissingDeviceId { segment: String },

    #[error("invalid device identifier '{id}'")]
    InvalidDeviceId { id: String },
}

/// A topic key recognised as a control of a discoverable device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified<'a> {
    /// Device class (the part of the device segment before the first `_`).
    pub class: &'a str,
    /// Canonical device token.
    pub device: &'a str,
    /// Numeric suffix as written in the topic, empty for one-wire sensors.
    pub id: &'a str,
}

/// Classify a topic key.
///
/// # Example
/// ```
/// use mqtt_lld_common::topic::classify;
///
/// let c = classify("/devices/wb-mcm16_1/controls/0005000001").unwrap();
/// assert_eq!(c.class, "wb-mcm16");
/// assert_eq!(c.device, "wb-mcm16_1");
/// assert_eq!(c.id, "1");
/// ```
pub fn classify(key: &str) -> Result<Classified<'_>, Rejection> {
    let parts: Vec<&str> = key.splitn(MAX_SEGMENTS, '/').collect();

    if parts.len() < MIN_SEGMENTS {
        return Err(Rejection::TooShort {
            segments: parts.len(),
        });
    }

    if parts[1] != DEVICES_SEGMENT || parts[3] != CONTROLS_SEGMENT {
        return Err(Rejection::NotDevicePath);
    }

    let segment = parts[2];
    if segment == ONE_WIRE_CLASS {
        return Ok(Classified {
            class: ONE_WIRE_CLASS,
            device: parts[4],
            id: "",
        });
    }

    let Some((class, id)) = segment.split_once('_') else {
        return Err(Rejection::MissingDeviceId {
            segment: segment.to_string(),
        });
    };

    if !is_device_id(id) {
        return Err(Rejection::InvalidDeviceId { id: id.to_string() });
    }

    Ok(Classified {
        class,
        device: segment,
        id,
    })
}

/// A device id is a non-empty run of ASCII digits that fits in a `u64`.
///
/// `str::parse` alone would also accept a leading `+`.
fn is_device_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) && id.parse::<u64>().is_ok()
}
