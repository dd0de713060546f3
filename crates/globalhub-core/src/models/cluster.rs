//! Managed cluster status rows and the user label overlay.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::object::{self, Labels};

/// Hub connectivity at the time a status row was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorState {
    #[default]
    None,
    Disconnected,
}

impl ErrorState {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorState::None => "none",
            ErrorState::Disconnected => "disconnected",
        }
    }
}

impl FromStr for ErrorState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ErrorState::None),
            "disconnected" => Ok(ErrorState::Disconnected),
            other => Err(format!("unknown error state {other:?}")),
        }
    }
}

/// A managed cluster as reported by one leaf hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedClusterStatus {
    /// Derived from `payload.metadata.uid`.
    pub id: Uuid,
    pub leaf_hub_name: String,
    pub payload: serde_json::Value,
    pub error: ErrorState,
}

impl ManagedClusterStatus {
    pub fn name(&self) -> &str {
        object::name(&self.payload).unwrap_or_default()
    }
}

/// User-applied label edits for one managed cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelOverlay {
    /// Equal to the managed cluster uid.
    pub id: Uuid,
    pub leaf_hub_name: String,
    pub managed_cluster_name: String,
    pub labels: Labels,
    pub deleted_label_keys: BTreeSet<String>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

/// Input for persisting an overlay. The store assigns `updated_at` and
/// bumps `version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertLabelOverlay {
    pub id: Uuid,
    pub leaf_hub_name: String,
    pub managed_cluster_name: String,
    pub labels: Labels,
    pub deleted_label_keys: BTreeSet<String>,
}

impl UpsertLabelOverlay {
    /// Starts from the overlay currently stored for `cluster`, if any.
    pub fn for_cluster(cluster: &ManagedClusterStatus, current: Option<&LabelOverlay>) -> Self {
        Self {
            id: cluster.id,
            leaf_hub_name: cluster.leaf_hub_name.clone(),
            managed_cluster_name: cluster.name().to_string(),
            labels: current.map(|o| o.labels.clone()).unwrap_or_default(),
            deleted_label_keys: current
                .map(|o| o.deleted_label_keys.clone())
                .unwrap_or_default(),
        }
    }
}
