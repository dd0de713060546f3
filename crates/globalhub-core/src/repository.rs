//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Reads never return soft-deleted
//! rows. Only the label overlay is written through the API; the other
//! write methods exist for the status transport and for fixtures.

use serde_json::Value;
use uuid::Uuid;

use crate::error::HubResult;
use crate::models::{
    cluster::{LabelOverlay, ManagedClusterStatus, UpsertLabelOverlay},
    compliance::ComplianceRecord,
    resource::{ResourceRecord, SpecKind},
    subscription::SubscriptionReportRecord,
};
use crate::pagination::{Page, PageRequest};

// ---------------------------------------------------------------------------
// Spec tables
// ---------------------------------------------------------------------------

pub trait SpecRepository: Send + Sync {
    /// Lists live records of `kind` ordered by name, then id.
    fn list(
        &self,
        kind: SpecKind,
        page: PageRequest,
    ) -> impl Future<Output = HubResult<Page<ResourceRecord>>> + Send;
    fn get_by_id(
        &self,
        kind: SpecKind,
        id: Uuid,
    ) -> impl Future<Output = HubResult<ResourceRecord>> + Send;
    fn upsert(
        &self,
        kind: SpecKind,
        id: Uuid,
        payload: Value,
    ) -> impl Future<Output = HubResult<ResourceRecord>> + Send;
    fn soft_delete(&self, kind: SpecKind, id: Uuid) -> impl Future<Output = HubResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Status tables
// ---------------------------------------------------------------------------

pub trait ManagedClusterRepository: Send + Sync {
    /// Lists cluster rows ordered by cluster name, then uid.
    fn list(
        &self,
        page: PageRequest,
    ) -> impl Future<Output = HubResult<Page<ManagedClusterStatus>>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = HubResult<ManagedClusterStatus>> + Send;
    fn upsert(
        &self,
        status: ManagedClusterStatus,
    ) -> impl Future<Output = HubResult<ManagedClusterStatus>> + Send;
}

pub trait LabelOverlayRepository: Send + Sync {
    fn get(&self, id: Uuid) -> impl Future<Output = HubResult<Option<LabelOverlay>>> + Send;
    fn list_by_ids(&self, ids: &[Uuid])
    -> impl Future<Output = HubResult<Vec<LabelOverlay>>> + Send;
    /// Creates or replaces the overlay, bumping its version by one.
    fn upsert(
        &self,
        input: UpsertLabelOverlay,
    ) -> impl Future<Output = HubResult<LabelOverlay>> + Send;
}

pub trait ComplianceRepository: Send + Sync {
    /// Rows of one policy ordered by cluster name, then leaf hub.
    fn list_by_policy(
        &self,
        policy_id: Uuid,
    ) -> impl Future<Output = HubResult<Vec<ComplianceRecord>>> + Send;
    fn list_by_policies(
        &self,
        policy_ids: &[Uuid],
    ) -> impl Future<Output = HubResult<Vec<ComplianceRecord>>> + Send;
    fn upsert(&self, record: ComplianceRecord) -> impl Future<Output = HubResult<()>> + Send;
}

pub trait SubscriptionReportRepository: Send + Sync {
    /// Per-hub reports for the named subscription, ordered by leaf hub.
    fn list_for_subscription(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> impl Future<Output = HubResult<Vec<SubscriptionReportRecord>>> + Send;
    fn upsert(
        &self,
        record: SubscriptionReportRecord,
    ) -> impl Future<Output = HubResult<()>> + Send;
}

/// The full set of repositories the resource service reads from.
pub trait Repositories: Send + Sync + 'static {
    type Spec: SpecRepository;
    type Clusters: ManagedClusterRepository;
    type Overlays: LabelOverlayRepository;
    type Compliance: ComplianceRepository;
    type Reports: SubscriptionReportRepository;

    fn spec(&self) -> &Self::Spec;
    fn clusters(&self) -> &Self::Clusters;
    fn overlays(&self) -> &Self::Overlays;
    fn compliance(&self) -> &Self::Compliance;
    fn reports(&self) -> &Self::Reports;
}
