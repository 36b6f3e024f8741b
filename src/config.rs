//! Configuration Management
//!
//! Two layers: the persistent config file (which reports are enabled, plus
//! defaults for project and output root), and the per-invocation `RunConfig`
//! assembled from CLI flags, the environment, and the config file. The
//! `RunConfig` is built once and threaded through the pipeline; components
//! never read globals.

use crate::metrics::ReportWindow;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Fixed region pair used when no region list is supplied
pub const DEFAULT_REGIONS: &[&str] = &["us-central1", "europe-west1"];

/// Environment variables inherited from a parent orchestrator process
pub const ENV_OUTPUT_DIR: &str = "GCPREP_OUTPUT_DIR";
pub const ENV_START_DATE: &str = "GCPREP_START_DATE";
pub const ENV_END_DATE: &str = "GCPREP_END_DATE";

/// Persistent user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Report enablement map: report name -> {0,1}. An absent report is
    /// treated as enabled, so an empty map runs everything.
    #[serde(default)]
    pub reports: HashMap<String, u8>,
    /// Default project ID
    #[serde(default)]
    pub project_id: Option<String>,
    /// Default output directory root
    #[serde(default)]
    pub output_dir: Option<String>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gcprep").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    fn load_from(path: &std::path::Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        match Self::config_path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Is this report enabled?
    pub fn report_enabled(&self, key: &str) -> bool {
        self.reports.get(key).map(|v| *v != 0).unwrap_or(true)
    }
}

/// Everything one invocation needs, assembled once by the orchestrator
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub project: String,
    pub regions: Vec<String>,
    /// Utilization window; None when neither flags nor environment supply one
    pub window: Option<ReportWindow>,
    /// Sum all attached disks instead of root-disk-only sizing
    pub sum_disks: bool,
    /// Output file name override (applies to reports that declare it)
    pub output_file: Option<String>,
    /// Directory the dated run directory is created under
    pub output_root: PathBuf,
}

impl RunConfig {
    /// Parse a comma-separated region list, falling back to the default pair
    pub fn parse_regions(raw: Option<&str>) -> Vec<String> {
        match raw {
            Some(list) => list
                .split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
            None => DEFAULT_REGIONS.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Build the utilization window from flag values with environment
    /// fallback. Returns None when neither date is supplied; errs when the
    /// dates are malformed or only one bound is present.
    pub fn parse_window(start: Option<&str>, end: Option<&str>) -> Result<Option<ReportWindow>> {
        let start = start
            .map(|s| s.to_string())
            .or_else(|| std::env::var(ENV_START_DATE).ok());
        let end = end
            .map(|s| s.to_string())
            .or_else(|| std::env::var(ENV_END_DATE).ok());

        match (start, end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => {
                let start = NaiveDate::parse_from_str(&start, "%Y-%m-%d")
                    .with_context(|| format!("Invalid start date '{}' (expected YYYY-MM-DD)", start))?;
                let end = NaiveDate::parse_from_str(&end, "%Y-%m-%d")
                    .with_context(|| format!("Invalid end date '{}' (expected YYYY-MM-DD)", end))?;
                anyhow::ensure!(start <= end, "Start date {} is after end date {}", start, end);
                Ok(Some(ReportWindow { start, end }))
            }
            (Some(_), None) => anyhow::bail!("Start date given without an end date (-e)"),
            (None, Some(_)) => anyhow::bail!("End date given without a start date (-b)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_map_enables_everything() {
        let config = Config::default();
        assert!(config.report_enabled("compute-instances"));
        assert!(config.report_enabled("sql-instances"));
    }

    #[test]
    fn test_zero_disables_a_report() {
        let mut config = Config::default();
        config.reports.insert("compute-disks".to_string(), 0);
        config.reports.insert("sql-instances".to_string(), 1);
        assert!(!config.report_enabled("compute-disks"));
        assert!(config.report_enabled("sql-instances"));
        assert!(config.report_enabled("compute-instances"));
    }

    #[test]
    fn test_config_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gcprep").join("config.json");

        let mut config = Config::default();
        config.project_id = Some("my-project".to_string());
        config.reports.insert("compute-disks".to_string(), 0);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded.project_id.as_deref(), Some("my-project"));
        assert!(!loaded.report_enabled("compute-disks"));
        assert!(loaded.report_enabled("compute-instances"));
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.json"));
        assert!(loaded.project_id.is_none());
        assert!(loaded.reports.is_empty());
    }

    #[test]
    fn test_parse_regions_default_pair() {
        assert_eq!(
            RunConfig::parse_regions(None),
            vec!["us-central1".to_string(), "europe-west1".to_string()]
        );
        assert_eq!(
            RunConfig::parse_regions(Some("us-east1, asia-east1")),
            vec!["us-east1".to_string(), "asia-east1".to_string()]
        );
    }

    #[test]
    fn test_parse_window_requires_both_bounds() {
        let window = RunConfig::parse_window(Some("2024-03-01"), Some("2024-03-07"))
            .unwrap()
            .unwrap();
        assert_eq!(window.start.to_string(), "2024-03-01");

        assert!(RunConfig::parse_window(Some("2024-03-01"), None).is_err());
        assert!(RunConfig::parse_window(Some("bad-date"), Some("2024-03-07")).is_err());
        assert!(RunConfig::parse_window(Some("2024-03-07"), Some("2024-03-01")).is_err());
    }
}
