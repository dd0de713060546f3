//! SurrealDB implementations of [`ManagedClusterRepository`] and
//! [`LabelOverlayRepository`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use globalhub_core::error::HubResult;
use globalhub_core::models::cluster::{LabelOverlay, ManagedClusterStatus, UpsertLabelOverlay};
use globalhub_core::models::object::Labels;
use globalhub_core::pagination::{ContinueToken, Page, PageRequest};
use globalhub_core::repository::{LabelOverlayRepository, ManagedClusterRepository};
use serde_json::json;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};
use uuid::Uuid;

use super::{into_page, parse_uuid, scan_params, scan_query};
use crate::error::DbError;
use crate::retry::RetryPolicy;

// ---------------------------------------------------------------------------
// Managed cluster status
// ---------------------------------------------------------------------------

const CLUSTER_PROJECTION: &str = "meta::id(id) AS record_id, name, leaf_hub_name, payload, error";

#[derive(Debug, SurrealValue)]
struct ClusterRow {
    record_id: String,
    name: String,
    leaf_hub_name: String,
    payload: serde_json::Value,
    error: String,
}

impl ClusterRow {
    fn try_into_status(self) -> Result<ManagedClusterStatus, DbError> {
        Ok(ManagedClusterStatus {
            id: parse_uuid(&self.record_id, "managed cluster")?,
            leaf_hub_name: self.leaf_hub_name,
            payload: self.payload,
            error: self.error.parse().map_err(DbError::Decode)?,
        })
    }
}

/// SurrealDB implementation of the managed cluster status repository.
#[derive(Clone)]
pub struct SurrealManagedClusterRepository<C: Connection> {
    db: Surreal<C>,
    retry: RetryPolicy,
}

impl<C: Connection> SurrealManagedClusterRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            db,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_page(&self, page: &PageRequest) -> Result<Vec<ClusterRow>, DbError> {
        let query = scan_query(CLUSTER_PROJECTION, "status_managed_clusters", None, page);
        let (last_name, last_id, limit) = scan_params(page);
        let mut result = self
            .db
            .query(query)
            .bind(("last_name", last_name))
            .bind(("last_id", last_id))
            .bind(("limit", limit))
            .await?;
        result.take(0).map_err(DbError::response)
    }

    async fn fetch_one(&self, id: Uuid) -> Result<Option<ClusterRow>, DbError> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {CLUSTER_PROJECTION} FROM \
                 type::record('status_managed_clusters', $id)"
            ))
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<ClusterRow> = result.take(0).map_err(DbError::response)?;
        Ok(rows.into_iter().next())
    }
}

impl<C: Connection> ManagedClusterRepository for SurrealManagedClusterRepository<C> {
    async fn list(&self, page: PageRequest) -> HubResult<Page<ManagedClusterStatus>> {
        let rows = self
            .retry
            .read("clusters.list", || self.fetch_page(&page))
            .await?;
        debug!(rows = rows.len(), "Scanned managed clusters");

        let page = into_page(rows, &page, |r| ContinueToken::new(&r.name, &r.record_id));
        let items = page
            .items
            .into_iter()
            .map(ClusterRow::try_into_status)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(Page {
            items,
            next: page.next,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> HubResult<ManagedClusterStatus> {
        let row = self
            .retry
            .read("clusters.get", || self.fetch_one(id))
            .await?
            .ok_or_else(|| DbError::NotFound {
                entity: "managedcluster".into(),
                id: id.to_string(),
            })?;
        Ok(row.try_into_status()?)
    }

    async fn upsert(&self, status: ManagedClusterStatus) -> HubResult<ManagedClusterStatus> {
        let result = self
            .db
            .query(format!(
                "UPSERT type::record('status_managed_clusters', $id) SET \
                 name = $name, leaf_hub_name = $leaf_hub_name, \
                 payload = $payload, error = $error; \
                 SELECT {CLUSTER_PROJECTION} FROM \
                 type::record('status_managed_clusters', $id);"
            ))
            .bind(("id", status.id.to_string()))
            .bind(("name", status.name().to_string()))
            .bind(("leaf_hub_name", status.leaf_hub_name.clone()))
            .bind(("payload", status.payload.clone()))
            .bind(("error", status.error.as_str()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ClusterRow> = result.take(1).map_err(DbError::response)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "managedcluster".into(),
            id: status.id.to_string(),
        })?;
        Ok(row.try_into_status()?)
    }
}

// ---------------------------------------------------------------------------
// Label overlay
// ---------------------------------------------------------------------------

const OVERLAY_PROJECTION: &str = "meta::id(id) AS record_id, leaf_hub_name, \
     managed_cluster_name, labels, deleted_label_keys, updated_at, version";

#[derive(Debug, SurrealValue)]
struct OverlayRow {
    record_id: String,
    leaf_hub_name: String,
    managed_cluster_name: String,
    labels: serde_json::Value,
    deleted_label_keys: serde_json::Value,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl OverlayRow {
    fn try_into_overlay(self) -> Result<LabelOverlay, DbError> {
        let labels: Labels = serde_json::from_value(self.labels)
            .map_err(|e| DbError::Decode(format!("overlay labels: {e}")))?;
        let deleted_label_keys: BTreeSet<String> =
            serde_json::from_value(self.deleted_label_keys)
                .map_err(|e| DbError::Decode(format!("overlay deleted keys: {e}")))?;
        Ok(LabelOverlay {
            id: parse_uuid(&self.record_id, "overlay")?,
            leaf_hub_name: self.leaf_hub_name,
            managed_cluster_name: self.managed_cluster_name,
            labels,
            deleted_label_keys,
            updated_at: self.updated_at,
            version: self.version,
        })
    }
}

/// SurrealDB implementation of the label overlay repository.
#[derive(Clone)]
pub struct SurrealLabelOverlayRepository<C: Connection> {
    db: Surreal<C>,
    retry: RetryPolicy,
}

impl<C: Connection> SurrealLabelOverlayRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            db,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch(&self, ids: &[Uuid]) -> Result<Vec<OverlayRow>, DbError> {
        let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let mut result = self
            .db
            .query(format!(
                "SELECT {OVERLAY_PROJECTION} FROM spec_managed_clusters_labels \
                 WHERE meta::id(id) IN $ids"
            ))
            .bind(("ids", json!(ids)))
            .await?;
        result.take(0).map_err(DbError::response)
    }
}

impl<C: Connection> LabelOverlayRepository for SurrealLabelOverlayRepository<C> {
    async fn get(&self, id: Uuid) -> HubResult<Option<LabelOverlay>> {
        let rows = self.retry.read("overlays.get", || self.fetch(std::slice::from_ref(&id))).await?;
        Ok(rows
            .into_iter()
            .next()
            .map(OverlayRow::try_into_overlay)
            .transpose()?)
    }

    async fn list_by_ids(&self, ids: &[Uuid]) -> HubResult<Vec<LabelOverlay>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.retry.read("overlays.list", || self.fetch(ids)).await?;
        rows.into_iter()
            .map(OverlayRow::try_into_overlay)
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }

    async fn upsert(&self, input: UpsertLabelOverlay) -> HubResult<LabelOverlay> {
        let id = input.id.to_string();
        let result = self
            .db
            .query(format!(
                "UPSERT type::record('spec_managed_clusters_labels', $id) SET \
                 leaf_hub_name = $leaf_hub_name, \
                 managed_cluster_name = $managed_cluster_name, \
                 labels = $labels, deleted_label_keys = $deleted_label_keys, \
                 version = (version ?? 0) + 1, updated_at = time::now(); \
                 SELECT {OVERLAY_PROJECTION} FROM \
                 type::record('spec_managed_clusters_labels', $id);"
            ))
            .bind(("id", id.clone()))
            .bind(("leaf_hub_name", input.leaf_hub_name))
            .bind(("managed_cluster_name", input.managed_cluster_name))
            .bind(("labels", json!(input.labels)))
            .bind(("deleted_label_keys", json!(input.deleted_label_keys)))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<OverlayRow> = result.take(1).map_err(DbError::response)?;
        let overlay = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "labels".into(),
                id: id.clone(),
            })?
            .try_into_overlay()?;

        info!(
            cluster = %overlay.managed_cluster_name,
            id = %id,
            version = overlay.version,
            "Label overlay updated"
        );
        Ok(overlay)
    }
}
