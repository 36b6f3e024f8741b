//! Report Orchestrator
//!
//! Reads the enablement configuration, filters the global argument set down
//! to what each report declares it accepts, and drives fetch -> spec cache ->
//! metrics -> emit for every region of every enabled report. Planning is
//! separated from execution so that usage errors (a utilization report with
//! no date window) surface before any network call or directory creation.
//!
//! Failure domains: a listing failure is isolated to one report kind in one
//! region; metric and spec lookup failures degrade single fields to "N/A".
//! Only configuration-level errors abort the run.

pub mod emit;
mod enrich;

use crate::config::{Config, RunConfig};
use crate::gcp::client::{format_gcp_error, GcpClient};
use crate::metrics::ReportWindow;
use crate::resource::{
    extract_json_value, fetch_resources, ordered_reports, ReportDef, ReportFlag, ReportVariant,
    SpecLookup,
};
use crate::specs::{distinct_database_tiers, distinct_machine_types, SpecCache};
use anyhow::{Context, Result};
use emit::CsvFile;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The argument subset one report declared it accepts
#[derive(Debug, Clone)]
pub struct ReportArgs {
    pub regions: Vec<String>,
    pub window: Option<ReportWindow>,
    pub sum_disks: bool,
    pub output_file: Option<String>,
}

/// One enabled report, validated and ready to run
#[derive(Debug)]
pub struct ReportPlan {
    pub key: &'static str,
    pub def: &'static ReportDef,
    pub args: ReportArgs,
}

/// Outcome of one invocation
pub struct RunSummary {
    pub run_dir: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Resolve the enabled reports and their filtered arguments.
///
/// Fails fast on usage errors so nothing touches the network or the
/// filesystem first.
pub fn plan(config: &Config, run: &RunConfig) -> Result<Vec<ReportPlan>> {
    let mut plans = Vec::new();

    for (key, def) in ordered_reports() {
        if !config.report_enabled(key) {
            tracing::debug!("report {} disabled by configuration", key);
            continue;
        }
        let args = filter_args(key, def, run)?;
        plans.push(ReportPlan { key, def, args });
    }

    if run.output_file.is_some() {
        let takers = plans
            .iter()
            .filter(|p| p.args.output_file.is_some())
            .count();
        anyhow::ensure!(
            takers <= 1,
            "-f names a single output file but {} enabled reports accept it; \
             disable the others in the configuration",
            takers
        );
    }

    Ok(plans)
}

/// Build the minimal argument subset a report declares it needs
fn filter_args(key: &str, def: &ReportDef, run: &RunConfig) -> Result<ReportArgs> {
    let window = if def.needs_window() {
        match run.window {
            Some(window) => Some(window),
            None => anyhow::bail!(
                "Report '{}' requires a start (-b) and end (-e) date",
                key
            ),
        }
    } else {
        None
    };

    Ok(ReportArgs {
        regions: if def.accepts(ReportFlag::Regions) {
            run.regions.clone()
        } else {
            Vec::new()
        },
        window,
        sum_disks: def.accepts(ReportFlag::Sum) && run.sum_disks,
        output_file: if def.accepts(ReportFlag::Output) {
            run.output_file.clone()
        } else {
            None
        },
    })
}

/// Run the planned reports sequentially, in declared order
pub async fn execute(
    client: &GcpClient,
    plans: &[ReportPlan],
    run: &RunConfig,
) -> Result<RunSummary> {
    let run_dir = run
        .output_root
        .join(format!("reports_{}", chrono::Utc::now().format("%Y-%m-%d")));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("Failed to create output directory {}", run_dir.display()))?;

    tracing::info!("writing reports to {}", run_dir.display());

    let mut files = Vec::new();
    for plan in plans {
        let path = run_report(client, plan, &run_dir).await?;
        files.push(path);
    }

    Ok(RunSummary { run_dir, files })
}

/// Run one report across its regions; returns the written file path
async fn run_report(
    client: &GcpClient,
    plan: &ReportPlan,
    run_dir: &std::path::Path,
) -> Result<PathBuf> {
    let file_name = plan
        .args
        .output_file
        .clone()
        .unwrap_or_else(|| format!("{}.csv", plan.key));
    let path = run_dir.join(file_name);

    let headers = plan.def.headers();
    let mut file = CsvFile::create(&path, &headers)?;

    tracing::info!("running report {}", plan.def.display_name);

    for region in &plan.args.regions {
        let items = match fetch_resources(client, plan.def, region).await {
            Ok(items) => items,
            Err(e) => {
                // Isolated failure domain: this kind in this region only
                tracing::warn!(
                    "{}: listing failed in {}: {}",
                    plan.key,
                    region,
                    format_gcp_error(&e)
                );
                continue;
            }
        };

        if items.is_empty() {
            tracing::info!("{}: no resources in {}", plan.key, region);
            continue;
        }

        match plan.def.variant {
            ReportVariant::Summary => write_summary_rows(&mut file, plan.def, region, &items)?,
            ReportVariant::Inventory => {
                let cache = build_cache(client, plan.def, region, &items).await;
                let enriched =
                    enrich::enrich_items(client, plan.def, items, &cache, &plan.args).await;
                for item in &enriched {
                    file.write_row(&render_row(plan.def, item))?;
                }
            }
        }
    }

    file.finish()
}

/// Build the spec cache for one region's batch from its distinct keys
async fn build_cache(
    client: &GcpClient,
    def: &ReportDef,
    region: &str,
    items: &[Value],
) -> SpecCache {
    match def.spec_lookup {
        Some(SpecLookup::MachineType) => {
            let names = distinct_machine_types(items);
            SpecCache::build_machine_types(client, region, &names).await
        }
        Some(SpecLookup::DatabaseTier) => {
            let keys = distinct_database_tiers(items);
            SpecCache::build_database_tiers(client, &keys).await
        }
        None => SpecCache::empty(),
    }
}

/// Walk the column contract; field count equals header count by construction
fn render_row(def: &ReportDef, item: &Value) -> Vec<String> {
    def.columns
        .iter()
        .map(|c| extract_json_value(item, &c.json_path))
        .collect()
}

/// One row per counted category, sorted for deterministic output
fn write_summary_rows(
    file: &mut CsvFile,
    def: &ReportDef,
    region: &str,
    items: &[Value],
) -> Result<()> {
    let field = def.summary_field.as_deref().unwrap_or("status");

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for item in items {
        *counts.entry(extract_json_value(item, field)).or_default() += 1;
    }

    for (value, count) in counts {
        let row_item = json!({
            "region_short": region,
            field: value,
            "count": count.to_string(),
        });
        file.write_row(&render_row(def, &row_item))?;
    }

    Ok(())
}
