//! gcprep - scriptable inventory and utilization reports for GCP resources
//!
//! The pipeline per enabled report and region: fetch the resource listing,
//! build a specification cache from the distinct type keys, query Cloud
//! Monitoring for utilization over the configured window, and emit CSV rows.
//! Data-fetch failures degrade to "N/A" fields; only configuration errors
//! abort a run.

pub mod config;
pub mod gcp;
pub mod metrics;
pub mod report;
pub mod resource;
pub mod specs;
