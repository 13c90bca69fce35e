//! Data model for availability polling
//!
//! - [`WatchedConfig`]: one inventory query, fixed at startup
//! - [`AvailabilityEntry`]: one record returned by the availability API
//! - [`AvailabilityChange`]: what a notifier receives when a plan changes
//!
//! Change detection only ever looks at the typed `datacenters` list of each
//! entry. Everything else the API returns is carried along in
//! [`AvailabilityEntry::extra`] so it survives in the cache and in
//! notifications, but it never makes two responses "different".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A (plan code, server) pair polled on every tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedConfig {
    /// Plan code, also the cache key
    pub plan_code: String,

    /// Server identifier sent alongside the plan code
    pub server: String,

    /// Additional query parameters forwarded verbatim
    #[serde(default)]
    pub extra_params: BTreeMap<String, String>,
}

impl WatchedConfig {
    /// Create a new watched configuration
    pub fn new(plan_code: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            plan_code: plan_code.into(),
            server: server.into(),
            extra_params: BTreeMap::new(),
        }
    }

    /// Add an extra query parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }

    /// Query parameters identifying this configuration
    ///
    /// `planCode` and `server` come first, followed by the extra parameters
    /// in key order. An extra parameter cannot shadow the two identifiers.
    pub fn query_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("planCode".to_string(), self.plan_code.clone()),
            ("server".to_string(), self.server.clone()),
        ];
        params.extend(
            self.extra_params
                .iter()
                .filter(|(k, _)| k.as_str() != "planCode" && k.as_str() != "server")
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        params
    }
}

/// The configurations watched when nothing else is configured
pub fn default_watched_configs() -> Vec<WatchedConfig> {
    vec![
        WatchedConfig::new("20game01", "20game01"),
        WatchedConfig::new("20game02", "20game02"),
        WatchedConfig::new("19game01-sgp", "19game01-apac"),
        WatchedConfig::new("19game02-sgp", "19game02-apac"),
        WatchedConfig::new("20game03", "20game03"),
    ]
}

/// Availability of one plan in one datacenter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatacenterStatus {
    /// Datacenter code (e.g. "rbx", "gra", "sgp")
    pub datacenter: String,

    /// Availability label (e.g. "unavailable", "1H-high", "72H")
    pub availability: String,
}

impl DatacenterStatus {
    pub fn new(datacenter: impl Into<String>, availability: impl Into<String>) -> Self {
        Self {
            datacenter: datacenter.into(),
            availability: availability.into(),
        }
    }
}

/// One element of the availability API response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityEntry {
    /// Fully qualified name of the hardware configuration
    pub fqn: String,

    /// Per-datacenter availability, in API order
    pub datacenters: Vec<DatacenterStatus>,

    /// Remaining fields, owned by the API and ignored by change detection
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AvailabilityEntry {
    pub fn new(fqn: impl Into<String>, datacenters: Vec<DatacenterStatus>) -> Self {
        Self {
            fqn: fqn.into(),
            datacenters,
            extra: serde_json::Map::new(),
        }
    }
}

/// Difference found at one position of the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryChange {
    /// Both lists have an entry here and the datacenter lists differ
    Modified {
        index: usize,
        fqn: String,
        previous: Vec<DatacenterStatus>,
        current: Vec<DatacenterStatus>,
    },

    /// Only the new response has an entry here
    Added {
        index: usize,
        fqn: String,
        current: Vec<DatacenterStatus>,
    },

    /// Only the cached response had an entry here
    Removed {
        index: usize,
        fqn: String,
        previous: Vec<DatacenterStatus>,
    },
}

impl EntryChange {
    /// Position of the entry in its response
    pub fn index(&self) -> usize {
        match self {
            EntryChange::Modified { index, .. }
            | EntryChange::Added { index, .. }
            | EntryChange::Removed { index, .. } => *index,
        }
    }

    /// FQN of the affected entry
    pub fn fqn(&self) -> &str {
        match self {
            EntryChange::Modified { fqn, .. }
            | EntryChange::Added { fqn, .. }
            | EntryChange::Removed { fqn, .. } => fqn.as_str(),
        }
    }

    /// Datacenter list before the change (empty for additions)
    pub fn previous(&self) -> &[DatacenterStatus] {
        match self {
            EntryChange::Modified { previous, .. } | EntryChange::Removed { previous, .. } => {
                previous.as_slice()
            }
            EntryChange::Added { .. } => &[],
        }
    }

    /// Datacenter list after the change (empty for removals)
    pub fn current(&self) -> &[DatacenterStatus] {
        match self {
            EntryChange::Modified { current, .. } | EntryChange::Added { current, .. } => {
                current.as_slice()
            }
            EntryChange::Removed { .. } => &[],
        }
    }
}

/// Compare two responses for the same plan, entry by entry
///
/// Entries at the same index are compared on their `datacenters` lists only,
/// order- and value-sensitive. Entries present on one side only are reported
/// as [`EntryChange::Added`] or [`EntryChange::Removed`], so a response whose
/// length differs from the cached one always counts as changed.
///
/// An empty result means the two responses are equivalent.
pub fn compare_entries(
    previous: &[AvailabilityEntry],
    current: &[AvailabilityEntry],
) -> Vec<EntryChange> {
    let mut changes = Vec::new();

    for (index, (old, new)) in previous.iter().zip(current.iter()).enumerate() {
        if old.datacenters != new.datacenters {
            changes.push(EntryChange::Modified {
                index,
                fqn: new.fqn.clone(),
                previous: old.datacenters.clone(),
                current: new.datacenters.clone(),
            });
        }
    }

    let shared = previous.len().min(current.len());

    for (offset, new) in current.iter().skip(shared).enumerate() {
        changes.push(EntryChange::Added {
            index: shared + offset,
            fqn: new.fqn.clone(),
            current: new.datacenters.clone(),
        });
    }

    for (offset, old) in previous.iter().skip(shared).enumerate() {
        changes.push(EntryChange::Removed {
            index: shared + offset,
            fqn: old.fqn.clone(),
            previous: old.datacenters.clone(),
        });
    }

    changes
}

/// A detected change for one watched configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityChange {
    /// Plan code of the watched configuration
    pub plan_code: String,

    /// Server identifier of the watched configuration
    pub server: String,

    /// Cached response before the change
    pub previous: Vec<AvailabilityEntry>,

    /// Response that replaced it
    pub current: Vec<AvailabilityEntry>,

    /// Per-entry differences, never empty
    pub changes: Vec<EntryChange>,

    /// When the change was detected
    pub detected_at: chrono::DateTime<chrono::Utc>,
}

impl AvailabilityChange {
    /// All datacenters of the new response, flattened across entries
    pub fn current_datacenters(&self) -> Vec<&DatacenterStatus> {
        self.current.iter().flat_map(|e| e.datacenters.iter()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(fqn: &str, dcs: &[(&str, &str)]) -> AvailabilityEntry {
        AvailabilityEntry::new(
            fqn,
            dcs.iter()
                .map(|(dc, av)| DatacenterStatus::new(*dc, *av))
                .collect(),
        )
    }

    #[test]
    fn identical_responses_have_no_changes() {
        let a = vec![entry("20game01.ram-32g", &[("rbx", "unavailable"), ("gra", "1H-high")])];
        let b = a.clone();
        assert!(compare_entries(&a, &b).is_empty());
    }

    #[test]
    fn availability_value_change_is_detected() {
        let a = vec![entry("20game01.ram-32g", &[("rbx", "unavailable")])];
        let b = vec![entry("20game01.ram-32g", &[("rbx", "high")])];

        let changes = compare_entries(&a, &b);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].index(), 0);
        assert_eq!(changes[0].previous(), &[DatacenterStatus::new("rbx", "unavailable")]);
        assert_eq!(changes[0].current(), &[DatacenterStatus::new("rbx", "high")]);
    }

    #[test]
    fn reordered_datacenters_count_as_change() {
        let a = vec![entry("x", &[("rbx", "high"), ("gra", "high")])];
        let b = vec![entry("x", &[("gra", "high"), ("rbx", "high")])];
        assert_eq!(compare_entries(&a, &b).len(), 1);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let a = vec![entry("x", &[("rbx", "high")])];
        let mut b = a.clone();
        b[0].extra.insert("memory".into(), serde_json::json!("ram-64g"));
        assert!(compare_entries(&a, &b).is_empty());
    }

    #[test]
    fn longer_response_reports_added_entries() {
        let a = vec![entry("x", &[("rbx", "high")])];
        let b = vec![entry("x", &[("rbx", "high")]), entry("y", &[("gra", "low")])];

        let changes = compare_entries(&a, &b);
        assert_eq!(changes.len(), 1);
        assert!(matches!(&changes[0], EntryChange::Added { index: 1, fqn, .. } if fqn == "y"));
    }

    #[test]
    fn shorter_response_reports_removed_entries() {
        let a = vec![entry("x", &[("rbx", "high")]), entry("y", &[("gra", "low")])];
        let b = vec![entry("x", &[("rbx", "low")])];

        let changes = compare_entries(&a, &b);
        assert_eq!(changes.len(), 2);
        assert!(matches!(changes[0], EntryChange::Modified { index: 0, .. }));
        assert!(matches!(&changes[1], EntryChange::Removed { index: 1, fqn, .. } if fqn == "y"));
        assert!(changes[1].current().is_empty());
    }

    #[test]
    fn empty_cached_response_against_nonempty_is_change() {
        let b = vec![entry("x", &[])];
        assert_eq!(compare_entries(&[], &b).len(), 1);
    }

    #[test]
    fn entry_deserializes_from_api_shape() {
        let json = serde_json::json!([{
            "fqn": "20game01.ram-32g-ecc-2400.softraid-2x450nvme",
            "planCode": "20game01",
            "server": "20game01",
            "memory": "ram-32g-ecc-2400",
            "storage": "softraid-2x450nvme",
            "datacenters": [
                { "datacenter": "rbx", "availability": "unavailable" },
                { "datacenter": "gra", "availability": "1H-low" }
            ]
        }]);

        let entries: Vec<AvailabilityEntry> = serde_json::from_value(json).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].datacenters.len(), 2);
        assert_eq!(entries[0].extra["memory"], "ram-32g-ecc-2400");
    }

    #[test]
    fn entry_without_datacenters_is_rejected() {
        let json = serde_json::json!([{ "fqn": "20game01" }]);
        assert!(serde_json::from_value::<Vec<AvailabilityEntry>>(json).is_err());
    }

    #[test]
    fn query_params_put_identifiers_first() {
        let config = WatchedConfig::new("19game01-sgp", "19game01-apac")
            .with_param("memory", "ram-32g")
            .with_param("planCode", "ignored");

        let params = config.query_params();
        assert_eq!(
            params,
            vec![
                ("planCode".to_string(), "19game01-sgp".to_string()),
                ("server".to_string(), "19game01-apac".to_string()),
                ("memory".to_string(), "ram-32g".to_string()),
            ]
        );
    }

    #[test]
    fn default_list_is_keyed_by_unique_plan_codes() {
        let configs = default_watched_configs();
        let mut codes: Vec<_> = configs.iter().map(|c| c.plan_code.as_str()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), configs.len());
    }
}
