//! SurrealDB implementations of [`ComplianceRepository`] and
//! [`SubscriptionReportRepository`].

use globalhub_core::error::HubResult;
use globalhub_core::models::compliance::ComplianceRecord;
use globalhub_core::models::object;
use globalhub_core::models::subscription::SubscriptionReportRecord;
use globalhub_core::repository::{ComplianceRepository, SubscriptionReportRepository};
use serde_json::json;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::DbError;
use crate::retry::RetryPolicy;

// ---------------------------------------------------------------------------
// Compliance
// ---------------------------------------------------------------------------

const COMPLIANCE_PROJECTION: &str = "policy_id, cluster_name, leaf_hub_name, error, compliance";

#[derive(Debug, SurrealValue)]
struct ComplianceRow {
    policy_id: String,
    cluster_name: String,
    leaf_hub_name: String,
    error: String,
    compliance: String,
}

impl ComplianceRow {
    fn try_into_record(self) -> Result<ComplianceRecord, DbError> {
        Ok(ComplianceRecord {
            policy_id: parse_uuid(&self.policy_id, "policy")?,
            cluster_name: self.cluster_name,
            leaf_hub_name: self.leaf_hub_name,
            error: self.error.parse().map_err(DbError::Decode)?,
            compliance: self.compliance.parse().map_err(DbError::Decode)?,
        })
    }
}

fn into_records(rows: Vec<ComplianceRow>) -> HubResult<Vec<ComplianceRecord>> {
    rows.into_iter()
        .map(ComplianceRow::try_into_record)
        .collect::<Result<Vec<_>, DbError>>()
        .map_err(Into::into)
}

/// SurrealDB implementation of the compliance repository.
#[derive(Clone)]
pub struct SurrealComplianceRepository<C: Connection> {
    db: Surreal<C>,
    retry: RetryPolicy,
}

impl<C: Connection> SurrealComplianceRepository<C> {
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

    async fn fetch(&self, policy_ids: &[Uuid]) -> Result<Vec<ComplianceRow>, DbError> {
        let ids: Vec<String> = policy_ids.iter().map(Uuid::to_string).collect();
        let mut result = self
            .db
            .query(format!(
                "SELECT {COMPLIANCE_PROJECTION} FROM status_compliance \
                 WHERE policy_id IN $policy_ids \
                 ORDER BY policy_id ASC, cluster_name ASC, leaf_hub_name ASC"
            ))
            .bind(("policy_ids", json!(ids)))
            .await?;
        result.take(0).map_err(DbError::response)
    }
}

impl<C: Connection> ComplianceRepository for SurrealComplianceRepository<C> {
    async fn list_by_policy(&self, policy_id: Uuid) -> HubResult<Vec<ComplianceRecord>> {
        let rows = self
            .retry
            .read("compliance.by_policy", || self.fetch(std::slice::from_ref(&policy_id)))
            .await?;
        into_records(rows)
    }

    async fn list_by_policies(&self, policy_ids: &[Uuid]) -> HubResult<Vec<ComplianceRecord>> {
        if policy_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .retry
            .read("compliance.by_policies", || self.fetch(policy_ids))
            .await?;
        into_records(rows)
    }

    async fn upsert(&self, record: ComplianceRecord) -> HubResult<()> {
        let policy_id = record.policy_id.to_string();
        self.db
            .query(
                "UPSERT type::record('status_compliance', \
                 [$policy_id, $cluster_name, $leaf_hub_name]) SET \
                 policy_id = $policy_id, cluster_name = $cluster_name, \
                 leaf_hub_name = $leaf_hub_name, error = $error, \
                 compliance = $compliance RETURN NONE",
            )
            .bind(("policy_id", policy_id))
            .bind(("cluster_name", record.cluster_name))
            .bind(("leaf_hub_name", record.leaf_hub_name))
            .bind(("error", record.error.as_str()))
            .bind(("compliance", record.compliance.as_str()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Subscription reports
// ---------------------------------------------------------------------------

#[derive(Debug, SurrealValue)]
struct ReportRow {
    record_id: String,
    leaf_hub_name: String,
    payload: serde_json::Value,
}

impl ReportRow {
    fn try_into_record(self) -> Result<SubscriptionReportRecord, DbError> {
        Ok(SubscriptionReportRecord {
            id: parse_uuid(&self.record_id, "subscription report")?,
            leaf_hub_name: self.leaf_hub_name,
            payload: self.payload,
        })
    }
}

/// SurrealDB implementation of the subscription report repository.
#[derive(Clone)]
pub struct SurrealSubscriptionReportRepository<C: Connection> {
    db: Surreal<C>,
    retry: RetryPolicy,
}

impl<C: Connection> SurrealSubscriptionReportRepository<C> {
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

    async fn fetch(&self, namespace: Option<&str>, name: &str) -> Result<Vec<ReportRow>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, leaf_hub_name, payload \
                 FROM status_subscription_reports \
                 WHERE name = $name AND namespace = $namespace \
                 ORDER BY leaf_hub_name ASC",
            )
            .bind(("name", name.to_string()))
            .bind(("namespace", namespace.map(str::to_string)))
            .await?;
        result.take(0).map_err(DbError::response)
    }
}

impl<C: Connection> SubscriptionReportRepository for SurrealSubscriptionReportRepository<C> {
    async fn list_for_subscription(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> HubResult<Vec<SubscriptionReportRecord>> {
        let rows = self
            .retry
            .read("reports.for_subscription", || self.fetch(namespace, name))
            .await?;
        rows.into_iter()
            .map(ReportRow::try_into_record)
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }

    async fn upsert(&self, record: SubscriptionReportRecord) -> HubResult<()> {
        let name = object::name(&record.payload).unwrap_or_default().to_string();
        let namespace = object::namespace(&record.payload).map(str::to_string);
        self.db
            .query(
                "UPSERT type::record('status_subscription_reports', $id) SET \
                 name = $name, namespace = $namespace, \
                 leaf_hub_name = $leaf_hub_name, payload = $payload RETURN NONE",
            )
            .bind(("id", record.id.to_string()))
            .bind(("name", name))
            .bind(("namespace", namespace))
            .bind(("leaf_hub_name", record.leaf_hub_name))
            .bind(("payload", record.payload))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }
}
