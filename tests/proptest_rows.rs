//! Property-based tests using proptest
//!
//! These verify the row emission contract (field count, escaping) and the
//! clamping/sentinel rules of the derived metrics under randomized inputs.

use proptest::prelude::*;
use serde_json::{json, Value};

use gcprep::metrics::{memory_utilization_pct, used_disk_gib, MetricResult};
use gcprep::report::emit::{build_csv_row, escape_csv};
use gcprep::resource::{extract_json_value, ordered_reports};

/// Generate arbitrary instance-like data
fn arb_instance() -> impl Strategy<Value = Value> {
    (
        "[a-z][a-z0-9-]{0,62}", // name
        prop_oneof!["RUNNING", "STOPPED", "TERMINATED", "PROVISIONING", "STAGING"],
        prop_oneof![
            "e2-medium",
            "n1-standard-1",
            "n2-standard-2",
            "c2-standard-4"
        ],
    )
        .prop_map(|(name, status, machine_type)| {
            json!({
                "name": name,
                "status": status,
                "region_short": "us-central1",
                "machineType_short": machine_type
            })
        })
}

/// Minimal CSV line parser for round-trip checks: every field is quoted
fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if !in_quotes => in_quotes = true,
            '"' if chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            '"' => in_quotes = false,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

proptest! {
    /// Escaping round-trips through a CSV parse, even with embedded quotes,
    /// commas, and unicode
    #[test]
    fn escape_round_trips(field in "\\PC*") {
        let line = build_csv_row(&[field.clone()]);
        let parsed = parse_csv_line(line.trim_end_matches('\n'));
        prop_assert_eq!(parsed, vec![field]);
    }

    /// Multi-field rows keep their field count through escaping
    #[test]
    fn row_field_count_survives_escaping(fields in prop::collection::vec("[^\r\n]*", 1..12)) {
        let line = build_csv_row(&fields);
        let parsed = parse_csv_line(line.trim_end_matches('\n'));
        prop_assert_eq!(parsed.len(), fields.len());
    }

    /// Every field is always quoted
    #[test]
    fn fields_are_always_quoted(field in "[^\"]*") {
        let escaped = escape_csv(&field);
        prop_assert!(escaped.starts_with('"') && escaped.ends_with('"'));
    }

    /// Walking any report's column contract over arbitrary items yields
    /// exactly one field per declared column, never an empty string
    #[test]
    fn rows_match_header_width(items in prop::collection::vec(arb_instance(), 0..50)) {
        for (_, def) in ordered_reports() {
            let headers = def.headers();
            for item in &items {
                let row: Vec<String> = def
                    .columns
                    .iter()
                    .map(|c| extract_json_value(item, &c.json_path))
                    .collect();
                prop_assert_eq!(row.len(), headers.len());
                prop_assert!(row.iter().all(|f| !f.is_empty()));
            }
        }
    }

    /// Used disk is never negative, whatever the backend reports
    #[test]
    fn used_disk_never_negative(
        allocated in 0.0f64..65536.0,
        free_bytes in 0.0f64..1.0e15,
    ) {
        match used_disk_gib(allocated, MetricResult::Value(free_bytes)) {
            MetricResult::Value(used) => prop_assert!(used >= 0.0),
            MetricResult::Unavailable => prop_assert!(false, "inputs were available"),
        }
    }

    /// Memory percent stays in [0, 100] for non-negative free readings and
    /// degrades to the sentinel for unusable capacities
    #[test]
    fn memory_pct_bounded_or_sentinel(
        free_bytes in 0.0f64..1.0e13,
        capacity_mb in prop::option::of(0u64..1_000_000),
    ) {
        let result = memory_utilization_pct(MetricResult::Value(free_bytes), capacity_mb);
        match capacity_mb {
            None | Some(0) => prop_assert_eq!(result, MetricResult::Unavailable),
            Some(_) => match result {
                MetricResult::Value(pct) => prop_assert!((0.0..=100.0).contains(&pct)),
                MetricResult::Unavailable => prop_assert!(false, "capacity was known"),
            },
        }
    }

    /// The sentinel renders as exactly "N/A" and values never render empty
    #[test]
    fn render_is_never_empty(value in prop::option::of(-1.0e9f64..1.0e9)) {
        let result = match value {
            Some(v) => MetricResult::Value(v),
            None => MetricResult::Unavailable,
        };
        let rendered = result.render();
        prop_assert!(!rendered.is_empty());
        if value.is_none() {
            prop_assert_eq!(rendered, "N/A");
        }
    }
}
