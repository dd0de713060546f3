//! Per-cluster policy compliance rows reported by leaf hubs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cluster::ErrorState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplianceState {
    Compliant,
    NonCompliant,
    Unknown,
}

impl ComplianceState {
    /// Column value in the store.
    pub const fn as_str(self) -> &'static str {
        match self {
            ComplianceState::Compliant => "compliant",
            ComplianceState::NonCompliant => "non_compliant",
            ComplianceState::Unknown => "unknown",
        }
    }

    /// Value rendered in policy status objects.
    pub const fn display(self) -> &'static str {
        match self {
            ComplianceState::Compliant => "Compliant",
            ComplianceState::NonCompliant => "NonCompliant",
            ComplianceState::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ComplianceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

impl FromStr for ComplianceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compliant" => Ok(ComplianceState::Compliant),
            "non_compliant" => Ok(ComplianceState::NonCompliant),
            "unknown" => Ok(ComplianceState::Unknown),
            other => Err(format!("unknown compliance value {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceRecord {
    pub policy_id: Uuid,
    pub cluster_name: String,
    pub leaf_hub_name: String,
    pub error: ErrorState,
    pub compliance: ComplianceState,
}
