//! Schema definitions and migration runner for SurrealDB.
//!
//! Every table mirrors one logical table of the hub database: a record id
//! (UUID string, or a composite key for compliance rows), a few typed
//! columns and a flexible JSON `payload`. The `name`/`namespace` columns
//! are copied out of `payload.metadata` on write so scans can be ordered
//! and filtered without touching the payload.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Spec tables (authored on the global hub, soft-deleted)
-- =======================================================================
DEFINE TABLE spec_policies SCHEMAFULL;
DEFINE FIELD name ON TABLE spec_policies TYPE string;
DEFINE FIELD namespace ON TABLE spec_policies TYPE option<string>;
DEFINE FIELD payload ON TABLE spec_policies TYPE object FLEXIBLE;
DEFINE FIELD deleted ON TABLE spec_policies TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE spec_policies TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE spec_policies TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_spec_policies_name ON TABLE spec_policies COLUMNS name;

DEFINE TABLE spec_placementrules SCHEMAFULL;
DEFINE FIELD name ON TABLE spec_placementrules TYPE string;
DEFINE FIELD namespace ON TABLE spec_placementrules TYPE option<string>;
DEFINE FIELD payload ON TABLE spec_placementrules TYPE object FLEXIBLE;
DEFINE FIELD deleted ON TABLE spec_placementrules TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE spec_placementrules TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE spec_placementrules TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_spec_placementrules_name ON TABLE spec_placementrules COLUMNS name;

DEFINE TABLE spec_placementbindings SCHEMAFULL;
DEFINE FIELD name ON TABLE spec_placementbindings TYPE string;
DEFINE FIELD namespace ON TABLE spec_placementbindings TYPE option<string>;
DEFINE FIELD payload ON TABLE spec_placementbindings TYPE object FLEXIBLE;
DEFINE FIELD deleted ON TABLE spec_placementbindings TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE spec_placementbindings TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE spec_placementbindings TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_spec_placementbindings_name ON TABLE spec_placementbindings COLUMNS name;

DEFINE TABLE spec_subscriptions SCHEMAFULL;
DEFINE FIELD name ON TABLE spec_subscriptions TYPE string;
DEFINE FIELD namespace ON TABLE spec_subscriptions TYPE option<string>;
DEFINE FIELD payload ON TABLE spec_subscriptions TYPE object FLEXIBLE;
DEFINE FIELD deleted ON TABLE spec_subscriptions TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE spec_subscriptions TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE spec_subscriptions TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_spec_subscriptions_name ON TABLE spec_subscriptions COLUMNS name;

-- =======================================================================
-- Label overlay (record id = managed cluster uid)
-- =======================================================================
DEFINE TABLE spec_managed_clusters_labels SCHEMAFULL;
DEFINE FIELD leaf_hub_name ON TABLE spec_managed_clusters_labels \
    TYPE string;
DEFINE FIELD managed_cluster_name ON TABLE spec_managed_clusters_labels \
    TYPE string;
DEFINE FIELD labels ON TABLE spec_managed_clusters_labels \
    TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD deleted_label_keys ON TABLE spec_managed_clusters_labels \
    TYPE array<string> DEFAULT [];
DEFINE FIELD version ON TABLE spec_managed_clusters_labels TYPE int \
    DEFAULT 0 ASSERT $value >= 0;
DEFINE FIELD updated_at ON TABLE spec_managed_clusters_labels \
    TYPE datetime DEFAULT time::now();

-- =======================================================================
-- Managed cluster status (record id = cluster uid)
-- =======================================================================
DEFINE TABLE status_managed_clusters SCHEMAFULL;
DEFINE FIELD name ON TABLE status_managed_clusters TYPE string;
DEFINE FIELD leaf_hub_name ON TABLE status_managed_clusters TYPE string;
DEFINE FIELD payload ON TABLE status_managed_clusters TYPE object FLEXIBLE;
DEFINE FIELD error ON TABLE status_managed_clusters TYPE string \
    DEFAULT 'none' ASSERT $value IN ['none', 'disconnected'];
DEFINE INDEX idx_status_managed_clusters_name ON TABLE \
    status_managed_clusters COLUMNS name;

-- =======================================================================
-- Compliance (record id = [policy_id, cluster_name, leaf_hub_name])
-- =======================================================================
DEFINE TABLE status_compliance SCHEMAFULL;
DEFINE FIELD policy_id ON TABLE status_compliance TYPE string;
DEFINE FIELD cluster_name ON TABLE status_compliance TYPE string;
DEFINE FIELD leaf_hub_name ON TABLE status_compliance TYPE string;
DEFINE FIELD error ON TABLE status_compliance TYPE string \
    DEFAULT 'none' ASSERT $value IN ['none', 'disconnected'];
DEFINE FIELD compliance ON TABLE status_compliance TYPE string \
    ASSERT $value IN ['compliant', 'non_compliant', 'unknown'];
DEFINE INDEX idx_status_compliance_policy ON TABLE status_compliance \
    COLUMNS policy_id;

-- =======================================================================
-- Subscription reports (one per leaf hub)
-- =======================================================================
DEFINE TABLE status_subscription_reports SCHEMAFULL;
DEFINE FIELD name ON TABLE status_subscription_reports TYPE string;
DEFINE FIELD namespace ON TABLE status_subscription_reports \
    TYPE option<string>;
DEFINE FIELD leaf_hub_name ON TABLE status_subscription_reports \
    TYPE string;
DEFINE FIELD payload ON TABLE status_subscription_reports \
    TYPE object FLEXIBLE;
DEFINE INDEX idx_status_subscription_reports_name ON TABLE \
    status_subscription_reports COLUMNS namespace, name;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0).map_err(DbError::response)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;
    use globalhub_core::models::resource::SpecKind;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(window[0].version < window[1].version);
        }
    }

    #[test]
    fn every_spec_kind_has_a_table() {
        for kind in SpecKind::ALL {
            assert!(
                SCHEMA_V1.contains(&format!("DEFINE TABLE {} SCHEMAFULL", kind.table())),
                "missing table for {kind}"
            );
        }
    }
}
