//! SurrealDB repository implementations.

mod cluster;
mod spec;
mod status;

pub use cluster::{SurrealLabelOverlayRepository, SurrealManagedClusterRepository};
pub use spec::SurrealSpecRepository;
pub use status::{SurrealComplianceRepository, SurrealSubscriptionReportRepository};

use globalhub_core::pagination::{ContinueToken, Page, PageRequest};
use globalhub_core::repository::Repositories;
use surrealdb::{Connection, Surreal};
use uuid::Uuid;

use crate::error::DbError;
use crate::retry::RetryPolicy;

/// Every repository over one shared store handle.
#[derive(Clone)]
pub struct SurrealRepositories<C: Connection> {
    spec: SurrealSpecRepository<C>,
    clusters: SurrealManagedClusterRepository<C>,
    overlays: SurrealLabelOverlayRepository<C>,
    compliance: SurrealComplianceRepository<C>,
    reports: SurrealSubscriptionReportRepository<C>,
}

impl<C: Connection> SurrealRepositories<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            spec: SurrealSpecRepository::new(db.clone()),
            clusters: SurrealManagedClusterRepository::new(db.clone()),
            overlays: SurrealLabelOverlayRepository::new(db.clone()),
            compliance: SurrealComplianceRepository::new(db.clone()),
            reports: SurrealSubscriptionReportRepository::new(db),
        }
    }

    pub fn with_retry(self, retry: RetryPolicy) -> Self {
        Self {
            spec: self.spec.with_retry(retry),
            clusters: self.clusters.with_retry(retry),
            overlays: self.overlays.with_retry(retry),
            compliance: self.compliance.with_retry(retry),
            reports: self.reports.with_retry(retry),
        }
    }
}

impl<C: Connection> Repositories for SurrealRepositories<C> {
    type Spec = SurrealSpecRepository<C>;
    type Clusters = SurrealManagedClusterRepository<C>;
    type Overlays = SurrealLabelOverlayRepository<C>;
    type Compliance = SurrealComplianceRepository<C>;
    type Reports = SurrealSubscriptionReportRepository<C>;

    fn spec(&self) -> &Self::Spec {
        &self.spec
    }

    fn clusters(&self) -> &Self::Clusters {
        &self.clusters
    }

    fn overlays(&self) -> &Self::Overlays {
        &self.overlays
    }

    fn compliance(&self) -> &Self::Compliance {
        &self.compliance
    }

    fn reports(&self) -> &Self::Reports {
        &self.reports
    }
}

// ---------------------------------------------------------------------------
// Keyset scans shared by the name-ordered tables
// ---------------------------------------------------------------------------

/// Builds a name-ordered scan. `projection` must select `name` and
/// `meta::id(id) AS record_id`; `$last_name`, `$last_id` and `$limit`
/// come from [`scan_params`].
fn scan_query(projection: &str, table: &str, filter: Option<&str>, page: &PageRequest) -> String {
    let mut conditions: Vec<&str> = filter.into_iter().collect();
    if page.after.is_some() {
        conditions
            .push("(name > $last_name OR (name = $last_name AND meta::id(id) > $last_id))");
    }
    let mut query = format!("SELECT {projection} FROM {table}");
    if !conditions.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(&conditions.join(" AND "));
    }
    query.push_str(" ORDER BY name ASC, record_id ASC");
    if page.limit.is_some() {
        query.push_str(" LIMIT $limit");
    }
    query
}

/// Values for the `$last_name`, `$last_id` and `$limit` parameters of
/// [`scan_query`].
fn scan_params(page: &PageRequest) -> (String, String, u64) {
    let (last_name, last_id) = page
        .after
        .as_ref()
        .map(|t| (t.last_name.clone(), t.last_id.clone()))
        .unwrap_or_default();
    // One extra row tells whether another page exists.
    let limit = page.limit.map_or(0, |l| l + 1);
    (last_name, last_id, limit)
}

/// Cuts the over-fetched row and derives the cursor for the next page.
fn into_page<T>(mut rows: Vec<T>, page: &PageRequest, key: impl Fn(&T) -> ContinueToken) -> Page<T> {
    let next = match page.limit {
        Some(limit) if rows.len() as u64 > limit => {
            rows.truncate(limit as usize);
            rows.last().map(key)
        }
        _ => None,
    };
    Page { items: rows, next }
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Decode(format!("invalid {what} UUID {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_scan_has_no_limit_or_cursor() {
        let q = scan_query("name", "spec_policies", Some("deleted = false"), &PageRequest::default());
        assert_eq!(
            q,
            "SELECT name FROM spec_policies WHERE deleted = false ORDER BY name ASC, record_id ASC"
        );
    }

    #[test]
    fn resumed_scan_filters_after_cursor() {
        let page = PageRequest::default()
            .with_limit(2)
            .after(ContinueToken::new("mc1", "a"));
        let q = scan_query("name", "status_managed_clusters", None, &page);
        assert!(q.contains("WHERE (name > $last_name OR"));
        assert!(q.ends_with("LIMIT $limit"));
    }

    #[test]
    fn page_cursor_points_at_last_kept_row() {
        let page = PageRequest::default().with_limit(2);
        let rows = vec![("a", "1"), ("b", "2"), ("c", "3")];
        let out = into_page(rows, &page, |(n, id)| ContinueToken::new(*n, *id));
        assert_eq!(out.items.len(), 2);
        assert_eq!(out.next, Some(ContinueToken::new("b", "2")));

        let exact = into_page(vec![("a", "1")], &page, |(n, id)| ContinueToken::new(*n, *id));
        assert_eq!(exact.next, None);
    }
}
