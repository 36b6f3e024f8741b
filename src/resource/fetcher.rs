//! Resource Fetcher
//!
//! Fetches raw resource listings for one report kind in one region, driven
//! by the report definitions in the registry. Zonal Compute Engine kinds are
//! listed through the aggregated endpoint and filtered to the target region
//! client-side; Cloud SQL instances list globally and carry a `region` field.

use super::registry::ReportDef;
use crate::gcp::client::GcpClient;
use anyhow::Result;
use serde_json::Value;

/// Result of a paginated fetch
struct PaginatedResult {
    items: Vec<Value>,
    next_token: Option<String>,
}

/// Fetch all resources of a report's kind in one region (auto-paginate)
///
/// An empty result is not an error. Each invocation re-fetches; nothing is
/// cached across calls.
pub async fn fetch_resources(
    client: &GcpClient,
    def: &ReportDef,
    region: &str,
) -> Result<Vec<Value>> {
    let mut all_items = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let result = fetch_page(client, def, page_token.as_deref()).await?;
        all_items.extend(result.items);

        if result.next_token.is_none() {
            break;
        }
        page_token = result.next_token;
    }

    let items: Vec<Value> = all_items
        .into_iter()
        .filter(|item| in_region(item, region))
        .map(|item| post_process_item(item, region))
        .collect();

    tracing::debug!(
        "fetched {} {} resources in {}",
        items.len(),
        def.display_name,
        region
    );

    Ok(items)
}

/// Fetch one page of resources
async fn fetch_page(
    client: &GcpClient,
    def: &ReportDef,
    page_token: Option<&str>,
) -> Result<PaginatedResult> {
    let url = listing_url(client, def)?;
    let url = match page_token {
        Some(token) => append_query(&url, "pageToken", token),
        None => url,
    };

    let response = client.get(&url).await?;

    // Aggregated compute responses nest items per zone; flatten first
    let response = if def.service == "compute" {
        flatten_aggregated_response(response)
    } else {
        response
    };

    let items = extract_items(&response, &def.response_path);

    let next_token = response
        .get("nextPageToken")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Ok(PaginatedResult { items, next_token })
}

/// Map a report's declared SDK method to a listing URL
fn listing_url(client: &GcpClient, def: &ReportDef) -> Result<String> {
    match (def.service.as_str(), def.sdk_method.as_str()) {
        ("compute", "list_instances") => Ok(client.compute_aggregated_url("instances")),
        ("compute", "list_disks") => Ok(client.compute_aggregated_url("disks")),
        ("sqladmin", "list_database_instances") => Ok(client.sqladmin_url("instances")),
        (service, method) => Err(anyhow::anyhow!(
            "Unknown listing method: {}.{}",
            service,
            method
        )),
    }
}

/// Does this resource belong to the target region?
fn in_region(item: &Value, region: &str) -> bool {
    // Cloud SQL instances carry the region directly
    if let Some(item_region) = item.get("region").and_then(|v| v.as_str()) {
        return extract_short_name(item_region) == region;
    }

    // Zonal resources: the zone short name is "<region>-<zone letter>"
    if let Some(zone) = item.get("zone").and_then(|v| v.as_str()) {
        let zone_short = extract_short_name(zone);
        return zone_short
            .rsplit_once('-')
            .map(|(zone_region, _)| zone_region == region)
            .unwrap_or(false);
    }

    false
}

/// Extract items from a response using the response_path
fn extract_items(response: &Value, path: &str) -> Vec<Value> {
    if path.is_empty() {
        return response.as_array().cloned().unwrap_or_default();
    }

    let mut current = response;
    for part in path.split('.') {
        current = match current.get(part) {
            Some(v) => v,
            None => return vec![],
        };
    }

    current.as_array().cloned().unwrap_or_default()
}

/// Post-process an item to add computed/derived fields
fn post_process_item(mut item: Value, region: &str) -> Value {
    if let Value::Object(ref mut map) = item {
        map.insert("region_short".to_string(), Value::String(region.to_string()));

        // Extract short names from full URLs
        if let Some(zone) = map.get("zone").and_then(|v| v.as_str()) {
            let short = extract_short_name(zone);
            map.insert("zone_short".to_string(), Value::String(short));
        }

        if let Some(machine_type) = map.get("machineType").and_then(|v| v.as_str()) {
            let short = extract_short_name(machine_type);
            map.insert("machineType_short".to_string(), Value::String(short));
        }

        if let Some(disk_type) = map.get("type").and_then(|v| v.as_str()) {
            let short = extract_short_name(disk_type);
            map.insert("type_short".to_string(), Value::String(short));
        }

        // Attachment info for disks; read before inserting so the map is
        // not borrowed during mutation
        let attachment = map.get("users").and_then(|v| v.as_array()).map(|users| {
            let first = users
                .first()
                .and_then(|v| v.as_str())
                .map(extract_short_name)
                .unwrap_or_else(|| "N/A".to_string());
            (users.len().to_string(), first)
        });
        if let Some((count, first)) = attachment {
            map.insert("users_count".to_string(), Value::String(count));
            map.insert("users_short".to_string(), Value::String(first));
        } else if map.get("type").is_some() {
            // Disk resource with no users array: unattached
            map.insert("users_count".to_string(), Value::String("0".to_string()));
            map.insert("users_short".to_string(), Value::String("N/A".to_string()));
        }

        // Format timestamps
        if let Some(created) = map.get("creationTimestamp").and_then(|v| v.as_str()) {
            let short = format_timestamp_short(created);
            map.insert("creationTimestamp_short".to_string(), Value::String(short));
        }
    }

    item
}

/// Extract short name from a GCP resource URL
/// e.g., ".../projects/my-project/zones/us-central1-a" -> "us-central1-a"
pub fn extract_short_name(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

/// Format an RFC3339 timestamp to its date part
fn format_timestamp_short(timestamp: &str) -> String {
    if timestamp.len() >= 10 {
        timestamp[..10].to_string()
    } else {
        timestamp.to_string()
    }
}

/// Append a query parameter to a URL
pub fn append_query(url: &str, key: &str, value: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", url, sep, key, urlencoding::encode(value))
}

/// Flatten an aggregated API response into a standard list response.
/// Aggregated responses have format:
/// `{ "items": { "zones/us-central1-a": { "instances": [...] }, ... } }`
/// We flatten to: `{ "items": [...all instances...] }`
fn flatten_aggregated_response(response: Value) -> Value {
    let Some(items) = response.get("items").and_then(|v| v.as_object()) else {
        // Already flat (or empty); pass through
        if response.get("items").map(|v| v.is_array()).unwrap_or(false) {
            return response;
        }
        return serde_json::json!({ "items": [] });
    };

    let mut all_items: Vec<Value> = Vec::new();

    for (_scope_key, scope_data) in items {
        if let Some(obj) = scope_data.as_object() {
            for (key, value) in obj {
                if key == "warning" {
                    continue;
                }
                if let Some(arr) = value.as_array() {
                    all_items.extend(arr.iter().cloned());
                }
            }
        }
    }

    let mut flat = serde_json::json!({ "items": all_items });
    if let Some(token) = response.get("nextPageToken") {
        flat["nextPageToken"] = token.clone();
    }
    flat
}

/// Extract a value from JSON using a dot-notation path
///
/// Missing values resolve to the "N/A" sentinel so rows stay well-formed.
pub fn extract_json_value(item: &Value, path: &str) -> String {
    let mut current = item;

    for part in path.split('.') {
        // Handle array index
        if let Ok(idx) = part.parse::<usize>() {
            current = match current.get(idx) {
                Some(v) => v,
                None => return "N/A".to_string(),
            };
        } else {
            current = match current.get(part) {
                Some(v) => v,
                None => return "N/A".to_string(),
            };
        }
    }

    match current {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "N/A".to_string(),
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(_) => "[object]".to_string(),
    }
}
