//! Device registry that groups classified topics by device class.

use std::collections::BTreeMap;
use std::collections::btree_map;

use mqtt_lld_common::MetricSnapshot;
use mqtt_lld_common::topic::classify;
use tracing::{debug, trace};

use crate::config::FilterConfig;
use crate::lld::DeviceEntry;

/// Filter for device classes.
pub struct ClassFilter {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
}

impl ClassFilter {
    /// Create a new filter from configuration.
    ///
    /// Invalid patterns are skipped; [`crate::ExporterConfig::validate`]
    /// reports them before a filter is ever built.
    pub fn new(config: &FilterConfig) -> Self {
        let compile = |patterns: &[String]| -> Vec<glob::Pattern> {
            patterns
                .iter()
                .filter_map(|p| glob::Pattern::new(p).ok())
                .collect()
        };

        Self {
            include: compile(&config.include_classes),
            exclude: compile(&config.exclude_classes),
        }
    }

    /// Check if a class should be discovered.
    pub fn should_include(&self, class: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(class)) {
            return false;
        }

        !self.exclude.iter().any(|p| p.matches(class))
    }
}

impl Default for ClassFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

/// Registry statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Topic keys looked at.
    pub keys_seen: u64,
    /// Keys that did not name a device control.
    pub keys_rejected: u64,
    /// Keys whose class was filtered out.
    pub keys_filtered: u64,
    /// Distinct devices registered.
    pub devices_registered: u64,
    /// Registrations refused because the device was already known.
    pub duplicates: u64,
}

/// Discovered devices grouped by class.
///
/// Within a class, entries keep the order in which they were first seen and
/// no two share the same device token and id. Classes iterate in
/// lexicographic order.
#[derive(Default)]
pub struct DeviceRegistry {
    classes: BTreeMap<String, Vec<DeviceEntry>>,
    filter: ClassFilter,
    stats: RegistryStats,
}

impl DeviceRegistry {
    /// Create an empty registry that accepts every class.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry restricted by a class filter.
    pub fn with_filter(filter: ClassFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Add a device to a class.
    ///
    /// Returns `false`, leaving the class unchanged, if a device with the same
    /// token and id is already registered there.
    pub fn register(&mut self, class: &str, entry: DeviceEntry) -> bool {
        let entries = self.classes.entry(class.to_string()).or_default();

        if entries.iter().any(|existing| existing.same_device(&entry)) {
            self.stats.duplicates += 1;
            debug!(
                class = %class,
                device = %entry.device,
                "Device already exists in lld"
            );
            return false;
        }

        trace!(class = %class, device = %entry.device, id = %entry.id, "Device registered");
        entries.push(entry);
        self.stats.devices_registered += 1;
        true
    }

    /// Classify one topic key and register the device it names.
    ///
    /// Returns `true` only if a new device was added. Rejected and filtered
    /// keys are counted and logged, never fatal.
    pub fn record(&mut self, key: &str) -> bool {
        self.stats.keys_seen += 1;

        let classified = match classify(key) {
            Ok(c) => c,
            Err(reason) => {
                self.stats.keys_rejected += 1;
                debug!(key = %key, %reason, "Skipping topic");
                return false;
            }
        };

        if !self.filter.should_include(classified.class) {
            self.stats.keys_filtered += 1;
            trace!(key = %key, class = %classified.class, "Class filtered out");
            return false;
        }

        let entry = DeviceEntry::new(classified.device, classified.id);
        self.register(classified.class, entry)
    }

    /// Record every topic key of a snapshot, in key order.
    pub fn ingest(&mut self, snapshot: &MetricSnapshot) {
        for key in snapshot.keys() {
            self.record(key);
        }

        debug!(
            keys = snapshot.len(),
            classes = self.class_count(),
            "Snapshot ingested"
        );
    }

    /// Entries of a class, in first-seen order.
    pub fn entries(&self, class: &str) -> Option<&[DeviceEntry]> {
        self.classes.get(class).map(Vec::as_slice)
    }

    /// Iterate over classes and their entries.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Vec<DeviceEntry>> {
        self.classes.iter()
    }

    /// Number of classes with at least one device.
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Total number of registered devices.
    pub fn device_count(&self) -> usize {
        self.classes.values().map(Vec::len).sum()
    }

    /// Check if no device has been registered.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Get registry statistics.
    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }
}

impl<'a> IntoIterator for &'a DeviceRegistry {
    type Item = (&'a String, &'a Vec<DeviceEntry>);
    type IntoIter = btree_map::Iter<'a, String, Vec<DeviceEntry>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqtt_lld_common::{MetricRecord, MetricValue};

    fn snapshot(keys: &[&str]) -> MetricSnapshot {
        keys.iter()
            .map(|k| {
                let record = MetricRecord {
                    topic: k.to_string(),
                    value: Some(MetricValue::Float(1.5)),
                    ..Default::default()
                };
                (k.to_string(), record)
            })
            .collect()
    }

    #[test]
    fn test_register_and_duplicate() {
        let mut registry = DeviceRegistry::new();
        let device = DeviceEntry::new("testDevice", "");

        assert!(registry.register("testKey", device.clone()));
        assert_eq!(registry.entries("testKey").unwrap().len(), 1);
        assert_eq!(registry.entries("testKey").unwrap()[0].device, "testDevice");

        assert!(!registry.register("testKey", device));
        assert_eq!(registry.entries("testKey").unwrap().len(), 1);
        assert_eq!(registry.stats().duplicates, 1);
    }

    #[test]
    fn test_duplicate_is_not_overwritten() {
        let mut registry = DeviceRegistry::new();
        let mut first = DeviceEntry::new("msu24hit_5", "5");
        first.name = "first".to_string();
        let mut second = DeviceEntry::new("msu24hit_5", "5");
        second.name = "second".to_string();

        assert!(registry.register("msu24hit", first));
        assert!(!registry.register("msu24hit", second));
        assert_eq!(registry.entries("msu24hit").unwrap()[0].name, "first");
    }

    #[test]
    fn test_same_device_in_other_class_is_distinct() {
        let mut registry = DeviceRegistry::new();

        assert!(registry.register("a", DeviceEntry::new("x_1", "1")));
        assert!(registry.register("b", DeviceEntry::new("x_1", "1")));
        assert_eq!(registry.class_count(), 2);
        assert_eq!(registry.device_count(), 2);
    }

    #[test]
    fn test_insertion_order_within_class() {
        let mut registry = DeviceRegistry::new();
        registry.register("msu24hit", DeviceEntry::new("msu24hit_9", "9"));
        registry.register("msu24hit", DeviceEntry::new("msu24hit_2", "2"));
        registry.register("msu24hit", DeviceEntry::new("msu24hit_9", "9"));
        registry.register("msu24hit", DeviceEntry::new("msu24hit_4", "4"));

        let devices: Vec<_> = registry
            .entries("msu24hit")
            .unwrap()
            .iter()
            .map(|e| e.device.as_str())
            .collect();
        assert_eq!(devices, vec!["msu24hit_9", "msu24hit_2", "msu24hit_4"]);
    }

    #[test]
    fn test_record_builds_entry() {
        let mut registry = DeviceRegistry::new();

        assert!(registry.record("/devices/msu24hit_5/controls/0000000001"));

        let entry = &registry.entries("msu24hit").unwrap()[0];
        assert_eq!(entry.device, "msu24hit_5");
        assert_eq!(entry.id, "5");
        assert_eq!(entry.macro_name, "N_MSU24HIT_5");
    }

    #[test]
    fn test_ingest_mixed_snapshot() {
        let mut registry = DeviceRegistry::new();
        registry.ingest(&snapshot(&[
            "/devices/wb-w1/controls/28-000000000001",
            "/devices/wb-w2/controls/28-000000000001",
            "/devices/msu24hit_5/controls/0000000001",
            "/devices/msu24hit_6/controls/0000000001",
            "/devices/msu24hit_6/controls/0000000002",
            "/invalid/key/format",
            "///",
            "/devices/msu24hit_dda/controls/0000000001",
        ]));

        assert_eq!(registry.class_count(), 2);

        let w1 = registry.entries("wb-w1").unwrap();
        assert_eq!(w1.len(), 1);
        assert_eq!(w1[0].device, "28-000000000001");
        assert_eq!(w1[0].id, "");

        let msu = registry.entries("msu24hit").unwrap();
        assert_eq!(msu.len(), 2);
        assert_eq!(msu[0].device, "msu24hit_5");
        assert_eq!(msu[1].device, "msu24hit_6");

        let stats = registry.stats();
        assert_eq!(stats.keys_seen, 8);
        assert_eq!(stats.keys_rejected, 4);
        assert_eq!(stats.devices_registered, 3);
        assert_eq!(stats.duplicates, 1);
    }

    #[test]
    fn test_class_order_is_sorted() {
        let mut registry = DeviceRegistry::new();
        registry.register("wb-w1", DeviceEntry::new("28-1", ""));
        registry.register("msu24hit", DeviceEntry::new("msu24hit_1", "1"));
        registry.register("wb-mcm16", DeviceEntry::new("wb-mcm16_1", "1"));

        let classes: Vec<_> = registry.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(classes, vec!["msu24hit", "wb-mcm16", "wb-w1"]);
    }

    #[test]
    fn test_class_filter() {
        let filter = ClassFilter::new(&FilterConfig {
            include_classes: vec!["msu*".to_string(), "wb-*".to_string()],
            exclude_classes: vec!["wb-w1".to_string()],
        });

        assert!(filter.should_include("msu24hit"));
        assert!(filter.should_include("wb-mcm16"));
        assert!(!filter.should_include("wb-w1"));
        assert!(!filter.should_include("relay"));
        assert!(ClassFilter::default().should_include("anything"));
    }

    #[test]
    fn test_filtered_keys_are_counted() {
        let mut registry = DeviceRegistry::with_filter(ClassFilter::new(&FilterConfig {
            include_classes: vec![],
            exclude_classes: vec!["wb-w1".to_string()],
        }));

        assert!(!registry.record("/devices/wb-w1/controls/28-000000000001"));
        assert!(registry.record("/devices/wb-mcm16_1/controls/0005000001"));

        assert!(registry.entries("wb-w1").is_none());
        assert_eq!(registry.stats().keys_filtered, 1);
        assert_eq!(registry.class_count(), 1);
    }

    #[test]
    fn test_empty_registry() {
        let registry = DeviceRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.device_count(), 0);
        assert_eq!(registry.stats(), &RegistryStats::default());
    }
}
