//! Spec Cache
//!
//! Static specification lookup (vCPUs, memory) for machine types and Cloud
//! SQL tiers. Built once per report execution per region from the distinct
//! keys observed in the fetched batch, so the number of specification calls
//! is bounded by the number of distinct types, not the number of resources.
//! Lookup is total: unknown keys resolve to a fallback entry that renders
//! as "N/A".

use crate::gcp::client::GcpClient;
use crate::resource::{append_query, extract_short_name};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Composite lookup key for a resource's specification
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpecKey {
    /// Compute Engine machine type name, e.g. "e2-medium"
    MachineType(String),
    /// Cloud SQL tier plus engine qualifier, e.g. ("db-custom-2-7680", "POSTGRES_15")
    DatabaseTier { tier: String, engine: String },
}

/// Static specification attributes for one key
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecEntry {
    pub vcpus: Option<u64>,
    pub memory_mb: Option<u64>,
}

impl SpecEntry {
    /// Render the vCPU count, or the sentinel when unknown
    pub fn vcpus_display(&self) -> String {
        self.vcpus
            .map(|v| v.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }

    /// Render the memory capacity in MB, or the sentinel when unknown
    pub fn memory_mb_display(&self) -> String {
        self.memory_mb
            .map(|v| v.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// Per-execution, immutable-after-build specification cache
pub struct SpecCache {
    entries: HashMap<SpecKey, SpecEntry>,
    fallback: SpecEntry,
}

impl SpecCache {
    /// An empty cache; every lookup resolves to the fallback entry
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            fallback: SpecEntry::default(),
        }
    }

    /// Pure, total lookup: a missing key resolves to the fallback entry
    pub fn lookup(&self, key: &SpecKey) -> &SpecEntry {
        self.entries.get(key).unwrap_or(&self.fallback)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve machine types for one region with a single batched listing.
    ///
    /// A failed lookup call degrades to an empty cache (every row falls back
    /// to "N/A") rather than aborting the report.
    pub async fn build_machine_types(
        client: &GcpClient,
        region: &str,
        names: &BTreeSet<String>,
    ) -> Self {
        if names.is_empty() {
            return Self::empty();
        }

        let filter = names
            .iter()
            .map(|name| format!("(name = \"{}\")", name))
            .collect::<Vec<_>>()
            .join(" OR ");
        let base_url =
            append_query(&client.compute_aggregated_url("machineTypes"), "filter", &filter);

        let mut entries = HashMap::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = match &page_token {
                Some(token) => append_query(&base_url, "pageToken", token),
                None => base_url.clone(),
            };
            let response = match client.get(&url).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("machine type lookup failed in {}: {}", region, e);
                    return Self::empty();
                }
            };

            for item in aggregated_items(&response) {
                let Some(name) = item.get("name").and_then(|v| v.as_str()) else {
                    continue;
                };
                if !zone_in_region(item, region) {
                    continue;
                }
                let key = SpecKey::MachineType(name.to_string());
                // Zones within a region agree on machine type shapes
                entries.entry(key).or_insert_with(|| SpecEntry {
                    vcpus: item.get("guestCpus").and_then(|v| v.as_u64()),
                    memory_mb: item.get("memoryMb").and_then(|v| v.as_u64()),
                });
            }

            page_token = next_page_token(&response);
            if page_token.is_none() {
                break;
            }
        }

        tracing::debug!(
            "spec cache: resolved {}/{} machine types in {}",
            entries.len(),
            names.len(),
            region
        );

        Self {
            entries,
            fallback: SpecEntry::default(),
        }
    }

    /// Resolve Cloud SQL tiers with a single tiers listing
    pub async fn build_database_tiers(
        client: &GcpClient,
        keys: &BTreeSet<(String, String)>,
    ) -> Self {
        if keys.is_empty() {
            return Self::empty();
        }

        let base_url = client.sqladmin_url("tiers");
        let mut by_tier: HashMap<String, SpecEntry> = HashMap::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = match &page_token {
                Some(token) => append_query(&base_url, "pageToken", token),
                None => base_url.clone(),
            };
            let response = match client.get(&url).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("database tier lookup failed: {}", e);
                    return Self::empty();
                }
            };

            if let Some(items) = response.get("items").and_then(|v| v.as_array()) {
                for item in items {
                    let Some(tier) = item.get("tier").and_then(|v| v.as_str()) else {
                        continue;
                    };
                    let ram_bytes = item
                        .get("RAM")
                        .and_then(|v| v.as_str())
                        .and_then(|s| s.parse::<u64>().ok());
                    let mut entry = SpecEntry {
                        vcpus: parse_custom_tier(tier).map(|(cpus, _)| cpus),
                        memory_mb: ram_bytes.map(|b| b / (1024 * 1024)),
                    };
                    if entry.memory_mb.is_none() {
                        entry.memory_mb = parse_custom_tier(tier).map(|(_, mb)| mb);
                    }
                    by_tier.insert(tier.to_string(), entry);
                }
            }

            page_token = next_page_token(&response);
            if page_token.is_none() {
                break;
            }
        }

        let mut entries = HashMap::new();
        for (tier, engine) in keys {
            let entry = by_tier
                .get(tier)
                .cloned()
                // Custom tiers encode their shape even when absent from the listing
                .or_else(|| {
                    parse_custom_tier(tier).map(|(cpus, mb)| SpecEntry {
                        vcpus: Some(cpus),
                        memory_mb: Some(mb),
                    })
                });
            if let Some(entry) = entry {
                entries.insert(
                    SpecKey::DatabaseTier {
                        tier: tier.clone(),
                        engine: engine.clone(),
                    },
                    entry,
                );
            }
        }

        Self {
            entries,
            fallback: SpecEntry::default(),
        }
    }
}

/// Distinct machine type names in one fetched batch
pub fn distinct_machine_types(items: &[Value]) -> BTreeSet<String> {
    items
        .iter()
        .filter_map(|item| item.get("machineType_short").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .collect()
}

/// Distinct (tier, engine) pairs in one fetched batch
pub fn distinct_database_tiers(items: &[Value]) -> BTreeSet<(String, String)> {
    items
        .iter()
        .filter_map(|item| {
            let tier = item
                .get("settings")
                .and_then(|s| s.get("tier"))
                .and_then(|v| v.as_str())?;
            let engine = item.get("databaseVersion").and_then(|v| v.as_str())?;
            Some((tier.to_string(), engine.to_string()))
        })
        .collect()
}

/// Parse a "db-custom-<cpus>-<memory_mb>" tier name
fn parse_custom_tier(tier: &str) -> Option<(u64, u64)> {
    let rest = tier.strip_prefix("db-custom-")?;
    let (cpus, mb) = rest.split_once('-')?;
    Some((cpus.parse().ok()?, mb.parse().ok()?))
}

/// Walk the aggregated machineTypes response
fn aggregated_items(response: &Value) -> Vec<&Value> {
    let Some(scopes) = response.get("items").and_then(|v| v.as_object()) else {
        return vec![];
    };

    let mut all = Vec::new();
    for scope_data in scopes.values() {
        if let Some(arr) = scope_data.get("machineTypes").and_then(|v| v.as_array()) {
            all.extend(arr.iter());
        }
    }
    all
}

fn next_page_token(response: &Value) -> Option<String> {
    response
        .get("nextPageToken")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn zone_in_region(item: &Value, region: &str) -> bool {
    item.get("zone")
        .and_then(|v| v.as_str())
        .map(extract_short_name)
        .and_then(|zone| zone.rsplit_once('-').map(|(r, _)| r.to_string()))
        .map(|r| r == region)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_falls_back_on_missing_key() {
        let cache = SpecCache::empty();
        let entry = cache.lookup(&SpecKey::MachineType("e2-medium".to_string()));
        assert_eq!(entry.vcpus_display(), "N/A");
        assert_eq!(entry.memory_mb_display(), "N/A");
    }

    #[test]
    fn test_lookup_is_deterministic() {
        let mut entries = HashMap::new();
        entries.insert(
            SpecKey::MachineType("e2-medium".to_string()),
            SpecEntry {
                vcpus: Some(2),
                memory_mb: Some(4096),
            },
        );
        let cache = SpecCache {
            entries,
            fallback: SpecEntry::default(),
        };

        let key = SpecKey::MachineType("e2-medium".to_string());
        let first = cache.lookup(&key).clone();
        let second = cache.lookup(&key).clone();
        assert_eq!(first, second);
        assert_eq!(first.vcpus, Some(2));
    }

    #[test]
    fn test_distinct_machine_types_dedupes() {
        let items = vec![
            json!({"machineType_short": "e2-medium"}),
            json!({"machineType_short": "e2-medium"}),
            json!({"machineType_short": "n1-standard-1"}),
            json!({"name": "no-type"}),
        ];
        let distinct = distinct_machine_types(&items);
        assert_eq!(distinct.len(), 2);
    }

    #[test]
    fn test_distinct_database_tiers_keyed_by_engine() {
        let items = vec![
            json!({"settings": {"tier": "db-custom-2-7680"}, "databaseVersion": "POSTGRES_15"}),
            json!({"settings": {"tier": "db-custom-2-7680"}, "databaseVersion": "MYSQL_8_0"}),
        ];
        let distinct = distinct_database_tiers(&items);
        assert_eq!(distinct.len(), 2);
    }

    #[test]
    fn test_parse_custom_tier() {
        assert_eq!(parse_custom_tier("db-custom-2-7680"), Some((2, 7680)));
        assert_eq!(parse_custom_tier("db-f1-micro"), None);
    }
}
