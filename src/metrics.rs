//! Metric Aggregator
//!
//! Issues Cloud Monitoring timeSeries queries over a configured window and
//! normalizes missing or partial data to the "N/A" sentinel. Also home of
//! the derived metrics (memory utilization percent, used disk capacity) and
//! their clamping rules.

use crate::gcp::client::GcpClient;
use crate::resource::append_query;
use anyhow::Result;
use chrono::NaiveDate;
use serde_json::Value;

/// Default alignment period for statistics queries (one point per hour)
pub const DEFAULT_PERIOD_SECS: u32 = 3600;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Inclusive date window for utilization queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportWindow {
    /// Window start: 00:00:00 UTC on the start date
    pub fn start_rfc3339(&self) -> String {
        format!("{}T00:00:00Z", self.start)
    }

    /// Window end: 23:59:59 UTC on the end date
    pub fn end_rfc3339(&self) -> String {
        format!("{}T23:59:59Z", self.end)
    }
}

/// How aligned points are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Average,
    Sum,
}

impl Statistic {
    fn aligner(&self) -> &'static str {
        match self {
            Statistic::Average => "ALIGN_MEAN",
            Statistic::Sum => "ALIGN_SUM",
        }
    }
}

/// One statistics query: stateless value object, issued per resource
#[derive(Debug, Clone)]
pub struct MetricQuery {
    /// Metric namespace, e.g. "compute.googleapis.com"
    pub namespace: String,
    /// Metric name under the namespace, e.g. "instance/cpu/utilization"
    pub metric: String,
    /// Label the query filters on, e.g. "metric.labels.instance_name"
    pub label: String,
    pub label_value: String,
    pub window: ReportWindow,
    pub period_secs: u32,
    pub statistic: Statistic,
}

impl MetricQuery {
    /// Cloud Monitoring filter expression for this query
    pub fn filter(&self) -> String {
        format!(
            "metric.type = \"{}/{}\" AND {} = \"{}\"",
            self.namespace, self.metric, self.label, self.label_value
        )
    }
}

/// A metric value or the explicit "unavailable" sentinel - never null,
/// never an empty string
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricResult {
    Value(f64),
    Unavailable,
}

impl MetricResult {
    /// Render for a report row: a fixed-precision number or exactly "N/A"
    pub fn render(&self) -> String {
        match self {
            MetricResult::Value(v) => format!("{:.2}", v),
            MetricResult::Unavailable => "N/A".to_string(),
        }
    }

    /// Apply a conversion to an available value, keeping the sentinel
    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            MetricResult::Value(v) => MetricResult::Value(f(v)),
            MetricResult::Unavailable => MetricResult::Unavailable,
        }
    }
}

/// Fetch one metric. A failed call degrades to the sentinel; it never
/// aborts processing of the remaining fields or resources.
pub async fn fetch_metric(client: &GcpClient, query: &MetricQuery) -> MetricResult {
    match try_fetch(client, query).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(
                "metric {}/{} unavailable for {}: {}",
                query.namespace,
                query.metric,
                query.label_value,
                e
            );
            MetricResult::Unavailable
        }
    }
}

async fn try_fetch(client: &GcpClient, query: &MetricQuery) -> Result<MetricResult> {
    let mut url = client.monitoring_timeseries_url();
    url = append_query(&url, "filter", &query.filter());
    url = append_query(&url, "interval.startTime", &query.window.start_rfc3339());
    url = append_query(&url, "interval.endTime", &query.window.end_rfc3339());
    url = append_query(
        &url,
        "aggregation.alignmentPeriod",
        &format!("{}s", query.period_secs),
    );
    url = append_query(
        &url,
        "aggregation.perSeriesAligner",
        query.statistic.aligner(),
    );

    let response = client.get(&url).await?;
    Ok(aggregate_response(&response, query.statistic))
}

/// Combine the points of the first returned series; no points means the
/// sentinel, not zero
fn aggregate_response(response: &Value, statistic: Statistic) -> MetricResult {
    let points: Vec<f64> = response
        .get("timeSeries")
        .and_then(|v| v.as_array())
        .and_then(|series| series.first())
        .and_then(|s| s.get("points"))
        .and_then(|v| v.as_array())
        .map(|points| points.iter().filter_map(point_value).collect())
        .unwrap_or_default();

    if points.is_empty() {
        return MetricResult::Unavailable;
    }

    let sum: f64 = points.iter().sum();
    match statistic {
        Statistic::Average => MetricResult::Value(sum / points.len() as f64),
        Statistic::Sum => MetricResult::Value(sum),
    }
}

/// Numeric value of one point; int64 values arrive as strings
fn point_value(point: &Value) -> Option<f64> {
    let value = point.get("value")?;
    if let Some(v) = value.get("doubleValue").and_then(|v| v.as_f64()) {
        return Some(v);
    }
    value
        .get("int64Value")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<f64>().ok())
}

/// Derived metric: memory utilization percent.
///
/// `percent = (1 - free_bytes / capacity_bytes) * 100`. Unknown or zero
/// capacity yields the sentinel (never a division by zero); negative
/// results from measurement skew clamp to 0.
pub fn memory_utilization_pct(free_bytes: MetricResult, capacity_mb: Option<u64>) -> MetricResult {
    let Some(capacity_mb) = capacity_mb.filter(|mb| *mb > 0) else {
        return MetricResult::Unavailable;
    };
    let MetricResult::Value(free) = free_bytes else {
        return MetricResult::Unavailable;
    };

    let capacity_bytes = capacity_mb as f64 * BYTES_PER_MIB;
    let pct = (1.0 - free / capacity_bytes) * 100.0;
    MetricResult::Value(pct.max(0.0))
}

/// Derived metric: used disk capacity in GiB.
///
/// `used = allocated_gib - free_gib`, clamped to 0 when free space exceeds
/// the allocation (measurement skew).
pub fn used_disk_gib(allocated_gib: f64, free_bytes: MetricResult) -> MetricResult {
    let MetricResult::Value(free) = free_bytes else {
        return MetricResult::Unavailable;
    };

    let used = allocated_gib - free / BYTES_PER_GIB;
    MetricResult::Value(used.max(0.0))
}
