//! Policy status assembly from per-cluster compliance rows.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::models::compliance::{ComplianceRecord, ComplianceState};
use crate::models::object;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub placement: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<ClusterCompliance>,
    pub summary: ComplianceSummary,
    /// Absent while no cluster has reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliant: Option<ComplianceState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCompliance {
    pub compliant: ComplianceState,
    pub clustername: String,
    pub clusternamespace: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSummary {
    pub compliance_cluster_number: u32,
    pub non_compliance_cluster_number: u32,
}

/// Builds the status of one policy.
///
/// `rows` are the compliance rows sharing the policy id, already in
/// display order. `placement` comes from [`policy_placements`].
pub fn assemble_policy_status(rows: &[ComplianceRecord], placement: Vec<Value>) -> PolicyStatus {
    let status: Vec<ClusterCompliance> = rows
        .iter()
        .map(|row| ClusterCompliance {
            compliant: row.compliance,
            clustername: row.cluster_name.clone(),
            clusternamespace: row.cluster_name.clone(),
        })
        .collect();

    let count = |state| status.iter().filter(|s| s.compliant == state).count() as u32;
    let summary = ComplianceSummary {
        compliance_cluster_number: count(ComplianceState::Compliant),
        non_compliance_cluster_number: count(ComplianceState::NonCompliant),
    };

    // Non-compliance dominates.
    let compliant = if status.is_empty() {
        None
    } else if summary.non_compliance_cluster_number > 0 {
        Some(ComplianceState::NonCompliant)
    } else if summary.compliance_cluster_number as usize == status.len() {
        Some(ComplianceState::Compliant)
    } else {
        Some(ComplianceState::Unknown)
    };

    PolicyStatus {
        placement,
        status,
        summary,
        compliant,
    }
}

/// Placement decisions of a policy.
///
/// Uses the stored `status.placement` verbatim when present; otherwise
/// derives one entry per placement binding that lists the policy as a
/// subject.
pub fn policy_placements(policy: &Value, bindings: &[Value]) -> Vec<Value> {
    if let Some(stored) = policy
        .pointer("/status/placement")
        .and_then(Value::as_array)
        .filter(|p| !p.is_empty())
    {
        return stored.clone();
    }

    let Some(policy_name) = object::name(policy) else {
        return Vec::new();
    };
    let policy_ns = object::namespace(policy);

    bindings
        .iter()
        .filter(|b| object::namespace(b) == policy_ns)
        .filter(|b| binds_policy(b, policy_name))
        .filter_map(|b| {
            let binding_name = object::name(b)?;
            let placement_ref = b.get("placementRef")?;
            let ref_name = placement_ref.get("name")?.as_str()?;
            let field = match placement_ref.get("kind").and_then(Value::as_str) {
                Some("Placement") => "placement",
                _ => "placementRule",
            };
            let mut entry = Map::new();
            entry.insert("placementBinding".into(), json!(binding_name));
            entry.insert(field.into(), json!(ref_name));
            Some(Value::Object(entry))
        })
        .collect()
}

fn binds_policy(binding: &Value, policy_name: &str) -> bool {
    binding
        .get("subjects")
        .and_then(Value::as_array)
        .is_some_and(|subjects| {
            subjects.iter().any(|s| {
                s.get("kind").and_then(Value::as_str) == Some("Policy")
                    && s.get("name").and_then(Value::as_str) == Some(policy_name)
            })
        })
}

/// The full policy object as listed: stored payload with the assembled
/// status in place of the stored one.
pub fn policy_with_status(payload: &Value, status: &PolicyStatus) -> Value {
    let mut obj = payload.clone();
    object::ensure_creation_timestamp(&mut obj);
    if let Some(root) = obj.as_object_mut() {
        root.insert("status".into(), json!(status));
    }
    obj
}

/// The status sub-resource: type meta, metadata and status only.
pub fn policy_status_object(payload: &Value, status: &PolicyStatus) -> Value {
    let mut metadata = payload.get("metadata").cloned().unwrap_or_else(|| json!({}));
    if let Some(m) = metadata.as_object_mut() {
        m.entry("creationTimestamp").or_insert(Value::Null);
    }
    json!({
        "apiVersion": payload.get("apiVersion").cloned().unwrap_or(Value::Null),
        "kind": payload.get("kind").cloned().unwrap_or(Value::Null),
        "metadata": metadata,
        "status": status,
    })
}
