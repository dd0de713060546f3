//! Label overlay merge for managed clusters.

use serde_json::Value;

use crate::models::cluster::{LabelOverlay, ManagedClusterStatus};
use crate::models::object;

/// Returns the cluster payload with the user overlay applied on top of
/// the hub-reported labels.
pub fn merge_label_overlay(cluster: &ManagedClusterStatus, overlay: Option<&LabelOverlay>) -> Value {
    let mut payload = cluster.payload.clone();
    let Some(overlay) = overlay else {
        return payload;
    };

    let mut labels = object::labels(&payload);
    labels.extend(
        overlay
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    labels.retain(|k, _| !overlay.deleted_label_keys.contains(k));
    object::set_labels(&mut payload, &labels);
    payload
}
