//! Subscription reports, one row per reporting leaf hub.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionReportRecord {
    pub id: Uuid,
    pub leaf_hub_name: String,
    pub payload: serde_json::Value,
}
