//! SurrealDB implementation of [`SpecRepository`].

use chrono::{DateTime, Utc};
use globalhub_core::error::HubResult;
use globalhub_core::models::object;
use globalhub_core::models::resource::{ResourceRecord, SpecKind};
use globalhub_core::pagination::{ContinueToken, Page, PageRequest};
use globalhub_core::repository::SpecRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use super::{into_page, parse_uuid, scan_params, scan_query};
use crate::error::DbError;
use crate::retry::RetryPolicy;

const PROJECTION: &str =
    "meta::id(id) AS record_id, name, payload, created_at, updated_at, deleted";

#[derive(Debug, SurrealValue)]
struct SpecRow {
    record_id: String,
    name: String,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted: bool,
}

impl SpecRow {
    fn try_into_record(self) -> Result<ResourceRecord, DbError> {
        Ok(ResourceRecord {
            id: parse_uuid(&self.record_id, "resource")?,
            payload: self.payload,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted: self.deleted,
        })
    }
}

/// SurrealDB implementation of the spec tables repository.
#[derive(Clone)]
pub struct SurrealSpecRepository<C: Connection> {
    db: Surreal<C>,
    retry: RetryPolicy,
}

impl<C: Connection> SurrealSpecRepository<C> {
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

    async fn fetch_page(&self, kind: SpecKind, page: &PageRequest) -> Result<Vec<SpecRow>, DbError> {
        let query = scan_query(PROJECTION, kind.table(), Some("deleted = false"), page);
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

    async fn fetch_one(&self, kind: SpecKind, id: Uuid) -> Result<Option<SpecRow>, DbError> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {PROJECTION} FROM type::record($table, $id) WHERE deleted = false"
            ))
            .bind(("table", kind.table()))
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<SpecRow> = result.take(0).map_err(DbError::response)?;
        Ok(rows.into_iter().next())
    }
}

impl<C: Connection> SpecRepository for SurrealSpecRepository<C> {
    async fn list(&self, kind: SpecKind, page: PageRequest) -> HubResult<Page<ResourceRecord>> {
        let rows = self
            .retry
            .read("spec.list", || self.fetch_page(kind, &page))
            .await?;
        debug!(kind = %kind, rows = rows.len(), "Scanned spec table");

        let page = into_page(rows, &page, |r| ContinueToken::new(&r.name, &r.record_id));
        let items = page
            .items
            .into_iter()
            .map(SpecRow::try_into_record)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(Page {
            items,
            next: page.next,
        })
    }

    async fn get_by_id(&self, kind: SpecKind, id: Uuid) -> HubResult<ResourceRecord> {
        let row = self
            .retry
            .read("spec.get", || self.fetch_one(kind, id))
            .await?
            .ok_or_else(|| DbError::NotFound {
                entity: kind.entity().into(),
                id: id.to_string(),
            })?;
        Ok(row.try_into_record()?)
    }

    async fn upsert(
        &self,
        kind: SpecKind,
        id: Uuid,
        payload: serde_json::Value,
    ) -> HubResult<ResourceRecord> {
        let name = object::name(&payload).unwrap_or_default().to_string();
        let namespace = object::namespace(&payload).map(str::to_string);

        let result = self
            .db
            .query(format!(
                "UPSERT type::record($table, $id) SET \
                 name = $name, namespace = $namespace, payload = $payload, \
                 deleted = false, updated_at = time::now(); \
                 SELECT {PROJECTION} FROM type::record($table, $id);"
            ))
            .bind(("table", kind.table()))
            .bind(("id", id.to_string()))
            .bind(("name", name))
            .bind(("namespace", namespace))
            .bind(("payload", payload))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<SpecRow> = result.take(1).map_err(DbError::response)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: kind.entity().into(),
            id: id.to_string(),
        })?;
        Ok(row.try_into_record()?)
    }

    async fn soft_delete(&self, kind: SpecKind, id: Uuid) -> HubResult<()> {
        let result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id FROM type::record($table, $id) \
                 WHERE deleted = false; \
                 UPDATE type::record($table, $id) SET deleted = true, \
                 updated_at = time::now() RETURN NONE;",
            )
            .bind(("table", kind.table()))
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let live: Vec<IdRow> = result.take(0).map_err(DbError::response)?;
        if live.is_empty() {
            return Err(DbError::NotFound {
                entity: kind.entity().into(),
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[derive(Debug, SurrealValue)]
struct IdRow {
    #[allow(dead_code)]
    record_id: String,
}
