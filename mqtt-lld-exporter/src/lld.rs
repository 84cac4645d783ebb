//! Zabbix low-level discovery records.
//!
//! A class is discovered as a JSON array of [`DeviceEntry`] objects whose
//! field names are the LLD macros (`{#DEVICE}`, `{#MACRO}`, ...). Older
//! Zabbix servers expect the array wrapped as `{"data": [...]}` and the
//! numeric id in `{#DEVICE}`; see [`LldFormat::Legacy`].

use serde::{Deserialize, Serialize};

/// Suffix appended to a device class to form the item key.
pub const LLD_KEY_SUFFIX: &str = ".lld";

/// Prefix of every derived macro name.
pub const MACRO_PREFIX: &str = "N_";

/// One discovered device within a class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Canonical device token (e.g. `msu24hit_5`, or a one-wire sensor address).
    #[serde(rename = "{#DEVICE}")]
    pub device: String,

    /// Display name. Never derived from topics, kept for templates that use it.
    #[serde(rename = "{#NAME}", default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Macro name derived from the device token, see [`macro_name`].
    #[serde(rename = "{#MACRO}", default, skip_serializing_if = "String::is_empty")]
    pub macro_name: String,

    /// Numeric device suffix, empty when the device has none.
    #[serde(rename = "{#ID}", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
}

impl DeviceEntry {
    /// Create an entry, deriving the macro name from `device`.
    pub fn new(device: impl Into<String>, id: impl Into<String>) -> Self {
        let device = device.into();
        let macro_name = macro_name(&device);
        Self {
            device,
            name: String::new(),
            macro_name,
            id: id.into(),
        }
    }

    /// Two entries describe the same device when token and id match.
    pub fn same_device(&self, other: &DeviceEntry) -> bool {
        self.device == other.device && self.id == other.id
    }
}

/// Derive the macro name of a device token.
///
/// The result is `N_` followed by the upper-cased token, with `-` replaced
/// by `_` so it is usable as a Zabbix user macro.
pub fn macro_name(device: &str) -> String {
    format!("{}{}", MACRO_PREFIX, device)
        .to_uppercase()
        .replace('-', "_")
}

/// Build the item key for a device class.
pub fn lld_key(class: &str) -> String {
    format!("{}{}", class, LLD_KEY_SUFFIX)
}

/// Shape of the emitted discovery payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LldFormat {
    /// Bare JSON array of entries.
    #[default]
    Standard,
    /// `{"data": [...]}` with `{#DEVICE}` replaced by the numeric id.
    Legacy,
}

#[derive(Serialize)]
struct LegacyPayload {
    data: Vec<DeviceEntry>,
}

/// Rewrite entries for the legacy format.
///
/// Works on a copy: entries with an id get it as their device token, the
/// macro name is left untouched.
pub fn legacy_entries(entries: &[DeviceEntry]) -> Vec<DeviceEntry> {
    entries
        .iter()
        .cloned()
        .map(|mut entry| {
            if !entry.id.is_empty() {
                entry.device = entry.id.clone();
            }
            entry
        })
        .collect()
}

/// Serialize the entries of one class in the requested format.
pub fn encode_entries(
    entries: &[DeviceEntry],
    format: LldFormat,
) -> Result<Vec<u8>, serde_json::Error> {
    match format {
        LldFormat::Standard => serde_json::to_vec(entries),
        LldFormat::Legacy => serde_json::to_vec(&LegacyPayload {
            data: legacy_entries(entries),
        }),
    }
}
