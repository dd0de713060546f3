//! Subscription report merge across leaf hubs.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::models::subscription::SubscriptionReportRecord;

/// Merges the per-hub reports of one subscription into a single report.
///
/// Reports are taken in the order given. Returns `None` when there is
/// nothing to merge.
pub fn merge_subscription_reports(reports: &[SubscriptionReportRecord]) -> Option<Value> {
    let (first, rest) = reports.split_first()?;
    let mut merged = first.payload.clone();

    for report in rest {
        merge_summary(&mut merged, &report.payload);
        append_results(&mut merged, &report.payload);
        keep_newest(&mut merged, &report.payload, "resourceVersion");
        keep_newest(&mut merged, &report.payload, "creationTimestamp");
    }

    let resources = union_resources(reports.iter().map(|r| &r.payload));
    if let Some(root) = merged.as_object_mut() {
        if !resources.is_empty() || root.contains_key("resources") {
            root.insert("resources".into(), Value::Array(resources));
        }
    }
    Some(merged)
}

/// Adds each decimal-string counter of `other.summary` into `merged`.
fn merge_summary(merged: &mut Value, other: &Value) {
    let Some(incoming) = other.get("summary").and_then(Value::as_object) else {
        return;
    };
    let Some(root) = merged.as_object_mut() else {
        return;
    };
    let summary = root
        .entry("summary")
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(summary) = summary.as_object_mut() else {
        return;
    };

    for (field, value) in incoming {
        let add = counter(value);
        let total = summary.get(field).map_or(0, counter).saturating_add(add);
        summary.insert(field.clone(), Value::String(total.to_string()));
    }
}

fn counter(value: &Value) -> u64 {
    match value {
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Number(n) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

fn append_results(merged: &mut Value, other: &Value) {
    let Some(incoming) = other.get("results").and_then(Value::as_array) else {
        return;
    };
    let Some(root) = merged.as_object_mut() else {
        return;
    };
    if let Some(results) = root
        .entry("results")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
    {
        results.extend(incoming.iter().cloned());
    }
}

fn union_resources<'a>(payloads: impl Iterator<Item = &'a Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for resource in payloads
        .filter_map(|p| p.get("resources").and_then(Value::as_array))
        .flatten()
    {
        let key = ["kind", "namespace", "name", "apiVersion"]
            .map(|f| resource.get(f).and_then(Value::as_str).unwrap_or_default().to_string());
        if seen.insert(key) {
            out.push(resource.clone());
        }
    }
    out
}

/// Replaces `metadata.<field>` in `merged` when `other` carries a newer one.
fn keep_newest(merged: &mut Value, other: &Value, field: &str) {
    let Some(candidate) = other
        .get("metadata")
        .and_then(|m| m.get(field))
        .and_then(Value::as_str)
    else {
        return;
    };
    let Some(metadata) = merged.get_mut("metadata").and_then(Value::as_object_mut) else {
        return;
    };
    let newer = match metadata.get(field).and_then(Value::as_str) {
        Some(current) => compare_versions(candidate, current) == Ordering::Greater,
        None => true,
    };
    if newer {
        metadata.insert(field.into(), Value::String(candidate.into()));
    }
}

/// Numeric when both sides are integers (resource versions), otherwise
/// lexical (RFC 3339 timestamps sort lexically).
fn compare_versions(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}
