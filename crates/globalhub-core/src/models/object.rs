//! Accessors for Kubernetes-shaped JSON payloads.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Label map of a resource. Ordered so rendered output is stable.
pub type Labels = BTreeMap<String, String>;

pub fn name(obj: &Value) -> Option<&str> {
    obj.pointer("/metadata/name").and_then(Value::as_str)
}

pub fn namespace(obj: &Value) -> Option<&str> {
    obj.pointer("/metadata/namespace").and_then(Value::as_str)
}

pub fn uid(obj: &Value) -> Option<&str> {
    obj.pointer("/metadata/uid").and_then(Value::as_str)
}

/// The creation timestamp exactly as stored, `null` when absent.
pub fn creation_timestamp(obj: &Value) -> Value {
    obj.pointer("/metadata/creationTimestamp")
        .cloned()
        .unwrap_or(Value::Null)
}

/// String-valued labels of `obj`. Non-string values are skipped.
pub fn labels(obj: &Value) -> Labels {
    obj.pointer("/metadata/labels")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Replaces `metadata.labels`; an empty map removes the field.
pub fn set_labels(obj: &mut Value, labels: &Labels) {
    let Some(metadata) = metadata_mut(obj) else {
        return;
    };
    if labels.is_empty() {
        metadata.remove("labels");
        return;
    }
    let map: Map<String, Value> = labels
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    metadata.insert("labels".into(), Value::Object(map));
}

/// Typed Kubernetes objects always serialize `creationTimestamp`, so
/// payloads without one get an explicit `null`.
pub fn ensure_creation_timestamp(obj: &mut Value) {
    if let Some(metadata) = metadata_mut(obj) {
        metadata
            .entry("creationTimestamp")
            .or_insert(Value::Null);
    }
}

fn metadata_mut(obj: &mut Value) -> Option<&mut Map<String, Value>> {
    let root = obj.as_object_mut()?;
    root.entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_metadata_fields() {
        let obj = json!({
            "metadata": {
                "name": "mc1",
                "namespace": "default",
                "uid": "2aa5547c-c172-47ed-b70b-db468c84d327",
                "labels": {"cloud": "Other", "weird": 3}
            }
        });
        assert_eq!(name(&obj), Some("mc1"));
        assert_eq!(namespace(&obj), Some("default"));
        assert_eq!(uid(&obj), Some("2aa5547c-c172-47ed-b70b-db468c84d327"));
        assert_eq!(creation_timestamp(&obj), Value::Null);

        let labels = labels(&obj);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels["cloud"], "Other");
    }

    #[test]
    fn set_labels_replaces_and_clears() {
        let mut obj = json!({"metadata": {"name": "mc1", "labels": {"a": "1"}}});

        let mut next = Labels::new();
        next.insert("b".into(), "2".into());
        set_labels(&mut obj, &next);
        assert_eq!(obj["metadata"]["labels"], json!({"b": "2"}));

        set_labels(&mut obj, &Labels::new());
        assert!(obj["metadata"].get("labels").is_none());
    }

    #[test]
    fn creation_timestamp_defaults_to_null_but_keeps_existing() {
        let mut bare = json!({"metadata": {"name": "p"}});
        ensure_creation_timestamp(&mut bare);
        assert_eq!(bare["metadata"]["creationTimestamp"], Value::Null);

        let mut stamped = json!({"metadata": {"creationTimestamp": "2022-10-13T05:58:32Z"}});
        ensure_creation_timestamp(&mut stamped);
        assert_eq!(
            stamped["metadata"]["creationTimestamp"],
            "2022-10-13T05:58:32Z"
        );
    }
}
