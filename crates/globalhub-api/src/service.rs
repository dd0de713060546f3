//! Resource service: list, get, patch and watch per resource kind.
//!
//! Every read goes store → aggregation → label filter, and returns plain
//! JSON objects. Rendering (list envelope or table) is left to the caller.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use globalhub_core::aggregate::{
    self, assemble_policy_status, merge_label_overlay, merge_subscription_reports,
    policy_placements,
};
use globalhub_core::error::{HubError, HubResult};
use globalhub_core::models::cluster::UpsertLabelOverlay;
use globalhub_core::models::compliance::ComplianceRecord;
use globalhub_core::models::object;
use globalhub_core::models::resource::{ResourceRecord, SpecKind};
use globalhub_core::pagination::{ContinueToken, PageRequest};
use globalhub_core::patch;
use globalhub_core::repository::{
    ComplianceRepository, LabelOverlayRepository, ManagedClusterRepository, Repositories,
    SpecRepository, SubscriptionReportRepository,
};
use globalhub_core::selector::Selector;
use globalhub_core::table::{self, Table};
use serde_json::{Value, json};
use tracing::{debug, info};
use uuid::Uuid;

use crate::query::ListQuery;
use crate::watch::{SnapshotFn, WatchController, WatchHandle};

/// The kinds served by the list/get endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    ManagedCluster,
    Spec(SpecKind),
}

impl ResourceKind {
    pub const fn kind(self) -> &'static str {
        match self {
            ResourceKind::ManagedCluster => "ManagedCluster",
            ResourceKind::Spec(kind) => kind.kind(),
        }
    }

    pub const fn api_version(self) -> &'static str {
        match self {
            ResourceKind::ManagedCluster => "cluster.open-cluster-management.io/v1",
            ResourceKind::Spec(kind) => kind.api_version(),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// One page of objects of a single kind.
#[derive(Debug, Clone)]
pub struct ObjectList {
    pub kind: ResourceKind,
    pub items: Vec<Value>,
    /// Encoded cursor for the next page.
    pub continue_token: Option<String>,
}

impl ObjectList {
    /// The `<Kind>List` envelope.
    pub fn into_json(self) -> Value {
        let mut metadata = serde_json::Map::new();
        if let Some(token) = self.continue_token {
            metadata.insert("continue".into(), Value::String(token));
        }
        json!({
            "kind": format!("{}List", self.kind.kind()),
            "apiVersion": self.kind.api_version(),
            "metadata": metadata,
            "items": self.items,
        })
    }

    pub fn into_table(self) -> Table {
        let mut table = table::render(self.items);
        table.metadata.continue_token = self.continue_token;
        table
    }
}

/// What a watch stream re-renders on each tick.
#[derive(Debug, Clone)]
pub enum WatchTarget {
    /// Emits the items array of the list.
    List { kind: ResourceKind, query: ListQuery },
    /// Emits the status object of one policy.
    PolicyStatus(Uuid),
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchTarget::List { kind, .. } => write!(f, "{kind}List"),
            WatchTarget::PolicyStatus(id) => write!(f, "Policy/{id}/status"),
        }
    }
}

/// Read and patch operations over the store.
pub struct ResourceService<R: Repositories> {
    repos: R,
}

impl<R: Repositories> ResourceService<R> {
    pub fn new(repos: R) -> Self {
        Self { repos }
    }

    pub fn repositories(&self) -> &R {
        &self.repos
    }

    // -----------------------------------------------------------------------
    // List
    // -----------------------------------------------------------------------

    /// Lists one page of `kind`. The label selector applies after paging,
    /// so a page may hold fewer than `limit` items while a cursor remains.
    pub async fn list(&self, kind: ResourceKind, query: &ListQuery) -> HubResult<ObjectList> {
        let (items, next) = match kind {
            ResourceKind::ManagedCluster => self.cluster_page(query.page.clone()).await?,
            ResourceKind::Spec(SpecKind::Policy) => self.policy_page(query.page.clone()).await?,
            ResourceKind::Spec(spec) => {
                let page = self.repos.spec().list(spec, query.page.clone()).await?;
                let items = page.items.into_iter().map(spec_object).collect();
                (items, page.next)
            }
        };

        let fetched = items.len();
        let items = filter_by_selector(items, &query.selector);
        debug!(
            kind = %kind,
            fetched,
            returned = items.len(),
            selector = %query.selector,
            "Listed resources"
        );
        Ok(ObjectList {
            kind,
            items,
            continue_token: next.map(|t| t.encode()),
        })
    }

    async fn cluster_page(
        &self,
        page: PageRequest,
    ) -> HubResult<(Vec<Value>, Option<ContinueToken>)> {
        let page = self.repos.clusters().list(page).await?;
        let ids: Vec<Uuid> = page.items.iter().map(|c| c.id).collect();
        let overlays: HashMap<Uuid, _> = self
            .repos
            .overlays()
            .list_by_ids(&ids)
            .await?
            .into_iter()
            .map(|o| (o.id, o))
            .collect();

        let items = page
            .items
            .iter()
            .map(|c| merge_label_overlay(c, overlays.get(&c.id)))
            .collect();
        Ok((items, page.next))
    }

    async fn policy_page(
        &self,
        page: PageRequest,
    ) -> HubResult<(Vec<Value>, Option<ContinueToken>)> {
        let page = self.repos.spec().list(SpecKind::Policy, page).await?;
        let ids: Vec<Uuid> = page.items.iter().map(|p| p.id).collect();
        let mut compliance: HashMap<Uuid, Vec<ComplianceRecord>> = HashMap::new();
        for row in self.repos.compliance().list_by_policies(&ids).await? {
            compliance.entry(row.policy_id).or_default().push(row);
        }
        let bindings = self.bindings_for(&page.items).await?;

        let items = page
            .items
            .iter()
            .map(|policy| {
                let rows = compliance.get(&policy.id).map(Vec::as_slice).unwrap_or_default();
                let placement = policy_placements(&policy.payload, &bindings);
                let status = assemble_policy_status(rows, placement);
                aggregate::policy::policy_with_status(&policy.payload, &status)
            })
            .collect();
        Ok((items, page.next))
    }

    /// Placement bindings, fetched only when some policy carries no
    /// placement of its own.
    async fn bindings_for(&self, policies: &[ResourceRecord]) -> HubResult<Vec<Value>> {
        let needed = policies.iter().any(|p| {
            p.payload
                .pointer("/status/placement")
                .and_then(Value::as_array)
                .is_none_or(Vec::is_empty)
        });
        if !needed {
            return Ok(Vec::new());
        }
        let bindings = self
            .repos
            .spec()
            .list(SpecKind::PlacementBinding, PageRequest::default())
            .await?;
        Ok(bindings.items.into_iter().map(|b| b.payload).collect())
    }

    // -----------------------------------------------------------------------
    // Get
    // -----------------------------------------------------------------------

    /// One object of `kind`, shaped exactly like its list item.
    pub async fn get(&self, kind: ResourceKind, id: Uuid) -> HubResult<Value> {
        match kind {
            ResourceKind::ManagedCluster => {
                let cluster = self.repos.clusters().get_by_id(id).await?;
                let overlay = self.repos.overlays().get(id).await?;
                Ok(merge_label_overlay(&cluster, overlay.as_ref()))
            }
            ResourceKind::Spec(SpecKind::Policy) => {
                let (policy, status) = self.policy_status_parts(id).await?;
                Ok(aggregate::policy::policy_with_status(&policy.payload, &status))
            }
            ResourceKind::Spec(spec) => {
                let record = self.repos.spec().get_by_id(spec, id).await?;
                Ok(spec_object(record))
            }
        }
    }

    /// The status sub-resource of one policy.
    pub async fn policy_status(&self, id: Uuid) -> HubResult<Value> {
        let (policy, status) = self.policy_status_parts(id).await?;
        Ok(aggregate::policy::policy_status_object(&policy.payload, &status))
    }

    async fn policy_status_parts(
        &self,
        id: Uuid,
    ) -> HubResult<(ResourceRecord, aggregate::PolicyStatus)> {
        let policy = self.repos.spec().get_by_id(SpecKind::Policy, id).await?;
        let rows = self.repos.compliance().list_by_policy(id).await?;
        let bindings = self.bindings_for(std::slice::from_ref(&policy)).await?;
        let placement = policy_placements(&policy.payload, &bindings);
        let status = assemble_policy_status(&rows, placement);
        Ok((policy, status))
    }

    /// The per-hub reports of a subscription merged into one report.
    pub async fn subscription_report(&self, id: Uuid) -> HubResult<Value> {
        let subscription = self.repos.spec().get_by_id(SpecKind::Subscription, id).await?;
        let name = object::name(&subscription.payload).unwrap_or_default();
        let namespace = object::namespace(&subscription.payload);

        let reports = self
            .repos
            .reports()
            .list_for_subscription(namespace, name)
            .await?;
        debug!(subscription = name, reports = reports.len(), "Merging subscription reports");
        merge_subscription_reports(&reports)
            .ok_or_else(|| HubError::not_found("subscriptionreport", id))
    }

    // -----------------------------------------------------------------------
    // Patch
    // -----------------------------------------------------------------------

    /// Applies a JSON-Patch of labels to a managed cluster's overlay and
    /// returns the merged cluster.
    pub async fn patch_cluster_labels(&self, id: Uuid, body: &[u8]) -> HubResult<Value> {
        let ops = patch::parse(body)?;
        let cluster = self.repos.clusters().get_by_id(id).await?;
        let current = self.repos.overlays().get(id).await?;

        let mut input = UpsertLabelOverlay::for_cluster(&cluster, current.as_ref());
        patch::apply(&ops, &mut input.labels, &mut input.deleted_label_keys);
        let overlay = self.repos.overlays().upsert(input).await?;

        info!(
            cluster = cluster.name(),
            operations = ops.len(),
            version = overlay.version,
            "Patched cluster labels"
        );
        Ok(merge_label_overlay(&cluster, Some(&overlay)))
    }

    // -----------------------------------------------------------------------
    // Watch
    // -----------------------------------------------------------------------

    /// The document a watch on `target` emits on each tick.
    pub async fn snapshot(&self, target: &WatchTarget) -> HubResult<Value> {
        match target {
            WatchTarget::List { kind, query } => {
                let list = self.list(*kind, query).await?;
                Ok(Value::Array(list.items))
            }
            WatchTarget::PolicyStatus(id) => self.policy_status(*id).await,
        }
    }

    /// Opens a polling watch on `target`.
    pub fn watch(
        self: &Arc<Self>,
        target: WatchTarget,
        controller: &WatchController,
    ) -> WatchHandle {
        let name = target.to_string();
        let service = Arc::clone(self);
        let target = Arc::new(target);
        let producer: SnapshotFn = Arc::new(move || {
            let service = Arc::clone(&service);
            let target = Arc::clone(&target);
            Box::pin(async move { service.snapshot(&target).await })
        });
        controller.spawn(name, producer)
    }
}

/// A spec row as served: payload with `creationTimestamp` always present.
fn spec_object(record: ResourceRecord) -> Value {
    let mut payload = record.payload;
    object::ensure_creation_timestamp(&mut payload);
    payload
}

fn filter_by_selector(items: Vec<Value>, selector: &Selector) -> Vec<Value> {
    if selector.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| selector.matches(&object::labels(item)))
        .collect()
}
