//! JSON-Patch application restricted to `/metadata/labels/<key>`.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{HubError, HubResult};
use crate::models::object::Labels;

const LABELS_PREFIX: &str = "/metadata/labels/";

/// A single validated label edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelOp {
    Set { key: String, value: String },
    Remove { key: String },
}

#[derive(Debug, Deserialize)]
struct RawOperation {
    op: String,
    path: String,
    #[serde(default)]
    value: Option<Value>,
}

/// Parses a JSON-Patch document into label edits.
///
/// Any operation outside the labels subtree, or any op other than
/// `add`/`replace`/`remove`, rejects the whole patch.
pub fn parse(body: &[u8]) -> HubResult<Vec<LabelOp>> {
    let raw: Vec<RawOperation> = serde_json::from_slice(body)
        .map_err(|e| HubError::InvalidPatch(format!("expected a JSON-Patch array: {e}")))?;

    raw.into_iter().map(into_label_op).collect()
}

fn into_label_op(raw: RawOperation) -> HubResult<LabelOp> {
    let key = raw
        .path
        .strip_prefix(LABELS_PREFIX)
        .filter(|k| !k.is_empty() && !k.contains('/'))
        .map(unescape_pointer)
        .ok_or_else(|| HubError::UnsupportedPatchPath {
            path: raw.path.clone(),
        })?;

    match raw.op.as_str() {
        "add" | "replace" => match raw.value {
            Some(Value::String(value)) => Ok(LabelOp::Set { key, value }),
            other => Err(HubError::InvalidPatch(format!(
                "label {key:?} needs a string value, got {}",
                other.map_or_else(|| "nothing".to_string(), |v| v.to_string())
            ))),
        },
        "remove" => Ok(LabelOp::Remove { key }),
        _ => Err(HubError::UnsupportedPatchPath { path: raw.path }),
    }
}

/// JSON-pointer token unescaping (RFC 6901).
fn unescape_pointer(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Applies `ops` in order to an overlay's label state.
pub fn apply(ops: &[LabelOp], labels: &mut Labels, deleted_keys: &mut BTreeSet<String>) {
    for op in ops {
        match op {
            LabelOp::Set { key, value } => {
                labels.insert(key.clone(), value.clone());
                deleted_keys.remove(key);
            }
            LabelOp::Remove { key } => {
                labels.remove(key);
                deleted_keys.insert(key.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_label_operations() {
        let ops = parse(
            br#"[
                {"op": "add", "path": "/metadata/labels/foo", "value": "bar"},
                {"op": "replace", "path": "/metadata/labels/app.io~1tier", "value": "web"},
                {"op": "remove", "path": "/metadata/labels/cloud"}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            ops,
            vec![
                LabelOp::Set {
                    key: "foo".into(),
                    value: "bar".into()
                },
                LabelOp::Set {
                    key: "app.io/tier".into(),
                    value: "web".into()
                },
                LabelOp::Remove {
                    key: "cloud".into()
                },
            ]
        );
    }

    #[test]
    fn rejects_paths_outside_labels() {
        for body in [
            r#"[{"op": "add", "path": "/metadata/annotations/foo", "value": "x"}]"#,
            r#"[{"op": "add", "path": "/spec/hubAcceptsClient", "value": "x"}]"#,
            r#"[{"op": "remove", "path": "/metadata/labels"}]"#,
            r#"[{"op": "remove", "path": "/metadata/labels/"}]"#,
            r#"[{"op": "move", "path": "/metadata/labels/a", "from": "/metadata/labels/b"}]"#,
        ] {
            assert!(
                matches!(
                    parse(body.as_bytes()),
                    Err(HubError::UnsupportedPatchPath { .. })
                ),
                "{body}"
            );
        }
    }

    #[test]
    fn rejects_malformed_bodies() {
        assert!(matches!(parse(b"{}"), Err(HubError::InvalidPatch(_))));
        assert!(matches!(
            parse(br#"[{"op": "add", "path": "/metadata/labels/a", "value": 1}]"#),
            Err(HubError::InvalidPatch(_))
        ));
        assert!(matches!(
            parse(br#"[{"op": "add", "path": "/metadata/labels/a"}]"#),
            Err(HubError::InvalidPatch(_))
        ));
    }

    #[test]
    fn apply_moves_keys_between_labels_and_deleted_set() {
        let mut labels = Labels::new();
        let mut deleted = BTreeSet::from(["foo".to_string()]);

        apply(
            &[LabelOp::Set {
                key: "foo".into(),
                value: "bar".into(),
            }],
            &mut labels,
            &mut deleted,
        );
        assert_eq!(labels.get("foo").map(String::as_str), Some("bar"));
        assert!(deleted.is_empty());

        apply(
            &[LabelOp::Remove { key: "foo".into() }],
            &mut labels,
            &mut deleted,
        );
        assert!(labels.is_empty());
        assert!(deleted.contains("foo"));
    }

    #[test]
    fn applying_same_add_twice_is_idempotent_on_labels() {
        let op = LabelOp::Set {
            key: "foo".into(),
            value: "bar".into(),
        };
        let mut labels = Labels::new();
        let mut deleted = BTreeSet::new();
        apply(std::slice::from_ref(&op), &mut labels, &mut deleted);
        apply(std::slice::from_ref(&op), &mut labels, &mut deleted);
        assert_eq!(labels.len(), 1);
        assert!(deleted.is_empty());
    }
}
