//! Read-side joins that assemble one logical object out of many rows.
//!
//! Nothing here touches the store; callers fetch rows and hand them in.

pub mod cluster;
pub mod policy;
pub mod subscription;

pub use cluster::merge_label_overlay;
pub use policy::{PolicyStatus, assemble_policy_status, policy_placements};
pub use subscription::merge_subscription_reports;
