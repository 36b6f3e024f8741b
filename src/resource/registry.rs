//! Report Registry - Load report definitions from JSON
//!
//! Report definitions (which listing API to call, the column contract, and
//! which CLI flags a report accepts) are embedded as JSON and loaded once.
//! New reports can be added without touching the pipeline code.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Embedded report JSON files (compiled into the binary)
const REPORT_FILES: &[&str] = &[
    include_str!("../resources/compute.json"),
    include_str!("../resources/sql.json"),
];

/// Reports run sequentially in this declared order
pub const REPORT_ORDER: &[&str] = &[
    "compute-instances",
    "compute-disks",
    "instance-summary",
    "sql-instances",
];

/// Column definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnDef {
    pub header: String,
    pub json_path: String,
}

/// CLI flags a report declares it accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFlag {
    Regions,
    Start,
    End,
    Sum,
    Output,
}

/// How rows are produced from the fetched listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportVariant {
    /// One row per resource
    #[default]
    Inventory,
    /// One row per counted category per region
    Summary,
}

/// Which specification lookup a report's resources need
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecLookup {
    MachineType,
    DatabaseTier,
}

/// Report definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ReportDef {
    pub display_name: String,
    pub service: String,
    pub sdk_method: String,
    pub response_path: String,
    pub id_field: String,
    #[serde(default)]
    pub variant: ReportVariant,
    #[serde(default)]
    pub spec_lookup: Option<SpecLookup>,
    /// json path of the field that summary reports count by
    #[serde(default)]
    pub summary_field: Option<String>,
    pub flags: Vec<ReportFlag>,
    pub columns: Vec<ColumnDef>,
}

impl ReportDef {
    /// Whether this report declares a flag
    pub fn accepts(&self, flag: ReportFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Reports that declare the window flags need utilization metrics
    pub fn needs_window(&self) -> bool {
        self.accepts(ReportFlag::Start) || self.accepts(ReportFlag::End)
    }

    /// Ordered headers for the CSV file
    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header.clone()).collect()
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub reports: HashMap<String, ReportDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ReportConfig> = OnceLock::new();

/// Get the report registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ReportConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ReportConfig {
            reports: HashMap::new(),
        };

        for content in REPORT_FILES {
            let partial: ReportConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded report JSON: {}", e));
            final_config.reports.extend(partial.reports);
        }

        final_config
    })
}

/// Get a report definition by key
pub fn get_report(key: &str) -> Option<&'static ReportDef> {
    get_registry().reports.get(key)
}

/// All report definitions in their declared run order
pub fn ordered_reports() -> Vec<(&'static str, &'static ReportDef)> {
    REPORT_ORDER
        .iter()
        .filter_map(|key| get_report(key).map(|def| (*key, def)))
        .collect()
}
