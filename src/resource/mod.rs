//! Resource abstraction layer
//!
//! A data-driven approach to report definitions: what to list, which columns
//! a report emits, and which CLI flags it accepts all live in JSON files
//! embedded at compile time, so new reports need no pipeline changes.
//!
//! - [`registry`] - Loads and caches report definitions from embedded JSON
//! - [`fetcher`] - Fetches resource listings with pagination and region scoping

mod fetcher;
mod registry;

pub use fetcher::{append_query, extract_json_value, extract_short_name, fetch_resources};
pub use registry::*;
