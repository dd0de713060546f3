//! Spec resource records: policies, placement rules/bindings and
//! subscriptions as authored on the global hub.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The resource kinds persisted in the spec tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecKind {
    Policy,
    PlacementRule,
    PlacementBinding,
    Subscription,
}

impl SpecKind {
    pub const ALL: [SpecKind; 4] = [
        SpecKind::Policy,
        SpecKind::PlacementRule,
        SpecKind::PlacementBinding,
        SpecKind::Subscription,
    ];

    /// Backing table name.
    pub const fn table(self) -> &'static str {
        match self {
            SpecKind::Policy => "spec_policies",
            SpecKind::PlacementRule => "spec_placementrules",
            SpecKind::PlacementBinding => "spec_placementbindings",
            SpecKind::Subscription => "spec_subscriptions",
        }
    }

    pub const fn kind(self) -> &'static str {
        match self {
            SpecKind::Policy => "Policy",
            SpecKind::PlacementRule => "PlacementRule",
            SpecKind::PlacementBinding => "PlacementBinding",
            SpecKind::Subscription => "Subscription",
        }
    }

    pub const fn api_version(self) -> &'static str {
        match self {
            SpecKind::Policy | SpecKind::PlacementBinding => "policy.open-cluster-management.io/v1",
            SpecKind::PlacementRule | SpecKind::Subscription => "apps.open-cluster-management.io/v1",
        }
    }

    /// Entity name used in log fields and not-found errors.
    pub const fn entity(self) -> &'static str {
        match self {
            SpecKind::Policy => "policy",
            SpecKind::PlacementRule => "placementrule",
            SpecKind::PlacementBinding => "placementbinding",
            SpecKind::Subscription => "subscription",
        }
    }
}

impl fmt::Display for SpecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// A row of one of the spec tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: Uuid,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete flag. Reads never return rows with this set.
    pub deleted: bool,
}

impl ResourceRecord {
    pub fn name(&self) -> &str {
        super::object::name(&self.payload).unwrap_or_default()
    }
}
