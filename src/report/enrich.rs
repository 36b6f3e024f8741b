//! Per-resource enrichment
//!
//! Adds derived specification and utilization fields to fetched resources
//! before row emission. Each enriched value is inserted into the item under
//! a stable key that the report's column contract references; unavailable
//! values are inserted as the "N/A" sentinel so every row stays complete.

use crate::gcp::client::GcpClient;
use crate::metrics::{
    self, fetch_metric, memory_utilization_pct, used_disk_gib, MetricQuery, MetricResult,
    ReportWindow, Statistic,
};
use crate::resource::{ReportDef, SpecLookup};
use super::ReportArgs;
use crate::specs::{SpecCache, SpecKey};
use futures::stream::{self, StreamExt};
use serde_json::Value;

/// Bounded concurrency for per-resource metric queries. `buffered` keeps
/// completion order equal to listing order, so output stays deterministic.
const METRIC_CONCURRENCY: usize = 4;

/// Enrich a fetched batch, preserving listing order
pub async fn enrich_items(
    client: &GcpClient,
    def: &ReportDef,
    items: Vec<Value>,
    cache: &SpecCache,
    args: &ReportArgs,
) -> Vec<Value> {
    stream::iter(items)
        .map(|item| enrich_item(client, def, item, cache, args))
        .buffered(METRIC_CONCURRENCY)
        .collect()
        .await
}

async fn enrich_item(
    client: &GcpClient,
    def: &ReportDef,
    item: Value,
    cache: &SpecCache,
    args: &ReportArgs,
) -> Value {
    match def.spec_lookup {
        Some(SpecLookup::MachineType) => enrich_instance(client, item, cache, args).await,
        Some(SpecLookup::DatabaseTier) => enrich_database(client, item, cache, args).await,
        None => item,
    }
}

async fn enrich_instance(
    client: &GcpClient,
    mut item: Value,
    cache: &SpecCache,
    args: &ReportArgs,
) -> Value {
    let name = str_field(&item, "name");
    let machine_type = str_field(&item, "machineType_short");

    let spec = cache.lookup(&SpecKey::MachineType(machine_type));
    let spec_vcpus = spec.vcpus_display();
    let spec_memory_mb = spec.memory_mb_display();
    let capacity_mb = spec.memory_mb;

    let disk = attached_disk_gib(&item, args.sum_disks);

    // Instance-scoped metrics only exist for running instances; skip the
    // backend entirely otherwise
    let (cpu, mem) = match args.window {
        Some(window) if str_field(&item, "status") == "RUNNING" => {
            let cpu = fetch_metric(client, &instance_cpu_query(&window, &name))
                .await
                .map(|fraction| fraction * 100.0);
            let free = fetch_metric(client, &instance_memory_free_query(&window, &name)).await;
            (cpu, memory_utilization_pct(free, capacity_mb))
        }
        _ => (MetricResult::Unavailable, MetricResult::Unavailable),
    };

    if let Value::Object(ref mut map) = item {
        map.insert("spec_vcpus".to_string(), Value::String(spec_vcpus));
        map.insert("spec_memory_mb".to_string(), Value::String(spec_memory_mb));
        map.insert("disk_gib".to_string(), Value::String(disk));
        map.insert("cpu_util_pct".to_string(), Value::String(cpu.render()));
        map.insert("mem_util_pct".to_string(), Value::String(mem.render()));
    }
    item
}

async fn enrich_database(
    client: &GcpClient,
    mut item: Value,
    cache: &SpecCache,
    args: &ReportArgs,
) -> Value {
    let name = str_field(&item, "name");
    let tier = path_field(&item, &["settings", "tier"]);
    let engine = str_field(&item, "databaseVersion");

    let spec = cache.lookup(&SpecKey::DatabaseTier { tier, engine });
    let spec_vcpus = spec.vcpus_display();
    let spec_memory_mb = spec.memory_mb_display();
    let capacity_mb = spec.memory_mb;

    let allocated_gib = item
        .get("settings")
        .and_then(|s| s.get("dataDiskSizeGb"))
        .and_then(|v| v.as_str().and_then(|s| s.parse::<f64>().ok()).or_else(|| v.as_f64()));

    let (cpu, mem, disk_used) = match args.window {
        Some(window) if str_field(&item, "state") == "RUNNABLE" => {
            let database_id = format!("{}:{}", client.project_id, name);
            let cpu = fetch_metric(client, &database_cpu_query(&window, &database_id))
                .await
                .map(|fraction| fraction * 100.0);
            let mem_free =
                fetch_metric(client, &database_memory_free_query(&window, &database_id)).await;
            let disk_free =
                fetch_metric(client, &database_disk_free_query(&window, &database_id)).await;
            let disk_used = match allocated_gib {
                Some(allocated) => used_disk_gib(allocated, disk_free),
                None => MetricResult::Unavailable,
            };
            (
                cpu,
                memory_utilization_pct(mem_free, capacity_mb),
                disk_used,
            )
        }
        _ => (
            MetricResult::Unavailable,
            MetricResult::Unavailable,
            MetricResult::Unavailable,
        ),
    };

    if let Value::Object(ref mut map) = item {
        map.insert("spec_vcpus".to_string(), Value::String(spec_vcpus));
        map.insert("spec_memory_mb".to_string(), Value::String(spec_memory_mb));
        map.insert("cpu_util_pct".to_string(), Value::String(cpu.render()));
        map.insert("mem_util_pct".to_string(), Value::String(mem.render()));
        map.insert(
            "disk_used_gib".to_string(),
            Value::String(disk_used.render()),
        );
    }
    item
}

/// Disk sizing for an instance: the boot disk's size, or the sum of all
/// attached disk sizes when the sum flag is set
fn attached_disk_gib(item: &Value, sum_disks: bool) -> String {
    let Some(disks) = item.get("disks").and_then(|v| v.as_array()) else {
        return "N/A".to_string();
    };
    if disks.is_empty() {
        return "N/A".to_string();
    }

    let size_of = |disk: &Value| -> Option<u64> {
        let size = disk.get("diskSizeGb")?;
        // diskSizeGb arrives as a string in attachedDisk entries
        size.as_str()
            .and_then(|s| s.parse::<u64>().ok())
            .or_else(|| size.as_u64())
    };

    let total: Option<u64> = if sum_disks {
        disks.iter().map(size_of).sum()
    } else {
        disks
            .iter()
            .find(|d| d.get("boot").and_then(|v| v.as_bool()).unwrap_or(false))
            .and_then(size_of)
    };

    total
        .map(|gib| gib.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn instance_cpu_query(window: &ReportWindow, name: &str) -> MetricQuery {
    MetricQuery {
        namespace: "compute.googleapis.com".to_string(),
        metric: "instance/cpu/utilization".to_string(),
        label: "metric.labels.instance_name".to_string(),
        label_value: name.to_string(),
        window: *window,
        period_secs: metrics::DEFAULT_PERIOD_SECS,
        statistic: Statistic::Average,
    }
}

fn instance_memory_free_query(window: &ReportWindow, name: &str) -> MetricQuery {
    MetricQuery {
        namespace: "agent.googleapis.com".to_string(),
        metric: "memory/bytes_free".to_string(),
        label: "metric.labels.instance_name".to_string(),
        label_value: name.to_string(),
        window: *window,
        period_secs: metrics::DEFAULT_PERIOD_SECS,
        statistic: Statistic::Average,
    }
}

fn database_cpu_query(window: &ReportWindow, database_id: &str) -> MetricQuery {
    MetricQuery {
        namespace: "cloudsql.googleapis.com".to_string(),
        metric: "database/cpu/utilization".to_string(),
        label: "resource.labels.database_id".to_string(),
        label_value: database_id.to_string(),
        window: *window,
        period_secs: metrics::DEFAULT_PERIOD_SECS,
        statistic: Statistic::Average,
    }
}

fn database_memory_free_query(window: &ReportWindow, database_id: &str) -> MetricQuery {
    MetricQuery {
        namespace: "cloudsql.googleapis.com".to_string(),
        metric: "database/memory/free".to_string(),
        label: "resource.labels.database_id".to_string(),
        label_value: database_id.to_string(),
        window: *window,
        period_secs: metrics::DEFAULT_PERIOD_SECS,
        statistic: Statistic::Average,
    }
}

fn database_disk_free_query(window: &ReportWindow, database_id: &str) -> MetricQuery {
    MetricQuery {
        namespace: "cloudsql.googleapis.com".to_string(),
        metric: "database/disk/bytes_free".to_string(),
        label: "resource.labels.database_id".to_string(),
        label_value: database_id.to_string(),
        window: *window,
        period_secs: metrics::DEFAULT_PERIOD_SECS,
        statistic: Statistic::Average,
    }
}

fn str_field(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn path_field(item: &Value, path: &[&str]) -> String {
    let mut current = item;
    for part in path {
        match current.get(part) {
            Some(v) => current = v,
            None => return String::new(),
        }
    }
    current.as_str().unwrap_or("").to_string()
}
