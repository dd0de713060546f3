//! Integration tests for the SurrealDB repositories using in-memory
//! SurrealDB.

use std::collections::BTreeSet;

use globalhub_core::error::HubError;
use globalhub_core::models::cluster::{ErrorState, ManagedClusterStatus, UpsertLabelOverlay};
use globalhub_core::models::compliance::{ComplianceRecord, ComplianceState};
use globalhub_core::models::resource::SpecKind;
use globalhub_core::models::subscription::SubscriptionReportRecord;
use globalhub_core::pagination::PageRequest;
use globalhub_core::repository::{
    ComplianceRepository, LabelOverlayRepository, ManagedClusterRepository, Repositories,
    SpecRepository, SubscriptionReportRepository,
};
use globalhub_db::{DbError, SurrealRepositories};
use serde_json::{Value, json};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

/// Helper: spin up in-memory DB and run migrations.
async fn setup() -> SurrealRepositories<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    globalhub_db::run_migrations(&db).await.unwrap();
    SurrealRepositories::new(db)
}

fn policy(name: &str) -> Value {
    json!({
        "apiVersion": "policy.open-cluster-management.io/v1",
        "kind": "Policy",
        "metadata": {"name": name, "namespace": "default"},
        "spec": {"disabled": false}
    })
}

fn cluster(name: &str, hub: &str) -> ManagedClusterStatus {
    let id = Uuid::new_v4();
    ManagedClusterStatus {
        id,
        leaf_hub_name: hub.into(),
        payload: json!({
            "apiVersion": "cluster.open-cluster-management.io/v1",
            "kind": "ManagedCluster",
            "metadata": {
                "name": name,
                "uid": id.to_string(),
                "labels": {"cloud": "Other", "vendor": "Other"}
            },
            "spec": {"hubAcceptsClient": true}
        }),
        error: ErrorState::None,
    }
}

// -----------------------------------------------------------------------
// Spec tables
// -----------------------------------------------------------------------

#[tokio::test]
async fn upsert_and_get_policy() {
    let repos = setup().await;
    let id = Uuid::new_v4();

    let created = repos
        .spec()
        .upsert(SpecKind::Policy, id, policy("policy-config-audit"))
        .await
        .unwrap();
    assert_eq!(created.id, id);
    assert_eq!(created.name(), "policy-config-audit");
    assert!(!created.deleted);

    let fetched = repos.spec().get_by_id(SpecKind::Policy, id).await.unwrap();
    assert_eq!(fetched.payload, policy("policy-config-audit"));
}

#[tokio::test]
async fn kinds_do_not_share_tables() {
    let repos = setup().await;
    let id = Uuid::new_v4();
    repos
        .spec()
        .upsert(SpecKind::Policy, id, policy("p"))
        .await
        .unwrap();

    let err = repos
        .spec()
        .get_by_id(SpecKind::PlacementRule, id)
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::NotFound { ref entity, .. } if entity == "placementrule"));
}

#[tokio::test]
async fn soft_deleted_records_are_invisible() {
    let repos = setup().await;
    let kept = Uuid::new_v4();
    let gone = Uuid::new_v4();
    repos
        .spec()
        .upsert(SpecKind::Policy, kept, policy("kept"))
        .await
        .unwrap();
    repos
        .spec()
        .upsert(SpecKind::Policy, gone, policy("gone"))
        .await
        .unwrap();

    repos.spec().soft_delete(SpecKind::Policy, gone).await.unwrap();

    let page = repos
        .spec()
        .list(SpecKind::Policy, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, kept);
    assert!(matches!(
        repos.spec().get_by_id(SpecKind::Policy, gone).await,
        Err(HubError::NotFound { .. })
    ));
    // Deleting twice reports the record as missing.
    assert!(matches!(
        repos.spec().soft_delete(SpecKind::Policy, gone).await,
        Err(HubError::NotFound { .. })
    ));
}

#[tokio::test]
async fn list_orders_by_name() {
    let repos = setup().await;
    for name in ["charlie", "alpha", "bravo"] {
        repos
            .spec()
            .upsert(SpecKind::Subscription, Uuid::new_v4(), policy(name))
            .await
            .unwrap();
    }

    let page = repos
        .spec()
        .list(SpecKind::Subscription, PageRequest::default())
        .await
        .unwrap();
    let names: Vec<_> = page.items.iter().map(|r| r.name().to_string()).collect();
    assert_eq!(names, ["alpha", "bravo", "charlie"]);
    assert!(page.next.is_none());
}

#[tokio::test]
async fn paging_until_exhausted_yields_the_full_listing() {
    let repos = setup().await;
    // Duplicate names exercise the id tie-break.
    for name in ["a", "b", "b", "c", "d", "d", "d", "e"] {
        repos
            .spec()
            .upsert(SpecKind::Policy, Uuid::new_v4(), policy(name))
            .await
            .unwrap();
    }
    let full: Vec<Uuid> = repos
        .spec()
        .list(SpecKind::Policy, PageRequest::default())
        .await
        .unwrap()
        .items
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(full.len(), 8);

    for limit in 1..=9 {
        let mut seen = Vec::new();
        let mut request = PageRequest::default().with_limit(limit);
        loop {
            let page = repos
                .spec()
                .list(SpecKind::Policy, request.clone())
                .await
                .unwrap();
            assert!(page.items.len() as u64 <= limit);
            seen.extend(page.items.iter().map(|r| r.id));
            match page.next {
                Some(token) => request = PageRequest::default().with_limit(limit).after(token),
                None => break,
            }
        }
        assert_eq!(seen, full, "limit {limit}");
    }
}

// -----------------------------------------------------------------------
// Managed clusters and overlays
// -----------------------------------------------------------------------

#[tokio::test]
async fn clusters_page_with_cursor() {
    let repos = setup().await;
    for name in ["mc3", "mc1", "mc2"] {
        repos.clusters().upsert(cluster(name, "hub1")).await.unwrap();
    }

    let first = repos
        .clusters()
        .list(PageRequest::default().with_limit(2))
        .await
        .unwrap();
    let names: Vec<_> = first.items.iter().map(|c| c.name().to_string()).collect();
    assert_eq!(names, ["mc1", "mc2"]);
    let token = first.next.expect("more clusters remain");
    assert_eq!(token.last_name, "mc2");
    assert_eq!(token.last_id, first.items[1].id.to_string());

    let second = repos
        .clusters()
        .list(PageRequest::default().with_limit(2).after(token))
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].name(), "mc3");
    assert!(second.next.is_none());
}

#[tokio::test]
async fn get_cluster_by_uid() {
    let repos = setup().await;
    let mut c = cluster("mc1", "hub1");
    c.error = ErrorState::Disconnected;
    repos.clusters().upsert(c.clone()).await.unwrap();

    let fetched = repos.clusters().get_by_id(c.id).await.unwrap();
    assert_eq!(fetched.leaf_hub_name, "hub1");
    assert_eq!(fetched.error, ErrorState::Disconnected);
    assert_eq!(fetched.payload, c.payload);

    assert!(matches!(
        repos.clusters().get_by_id(Uuid::new_v4()).await,
        Err(HubError::NotFound { .. })
    ));
}

#[tokio::test]
async fn overlay_upsert_bumps_version() {
    let repos = setup().await;
    let c = cluster("mc1", "hub1");
    assert!(repos.overlays().get(c.id).await.unwrap().is_none());

    let mut input = UpsertLabelOverlay::for_cluster(&c, None);
    input.labels.insert("foo".into(), "bar".into());
    input.deleted_label_keys.insert("cloud".into());

    let first = repos.overlays().upsert(input.clone()).await.unwrap();
    assert_eq!(first.version, 1);
    assert_eq!(first.managed_cluster_name, "mc1");
    assert_eq!(first.labels.get("foo").map(String::as_str), Some("bar"));
    assert_eq!(first.deleted_label_keys, BTreeSet::from(["cloud".to_string()]));

    let second = repos.overlays().upsert(input).await.unwrap();
    assert_eq!(second.version, 2);
    assert_eq!(second.labels, first.labels);
    assert!(second.updated_at >= first.updated_at);

    let stored = repos.overlays().get(c.id).await.unwrap().unwrap();
    assert_eq!(stored, second);
}

#[tokio::test]
async fn overlays_by_ids() {
    let repos = setup().await;
    let a = cluster("a", "hub1");
    let b = cluster("b", "hub2");
    let c = cluster("c", "hub2");
    for cl in [&a, &b] {
        repos
            .overlays()
            .upsert(UpsertLabelOverlay::for_cluster(cl, None))
            .await
            .unwrap();
    }

    let found = repos.overlays().list_by_ids(&[a.id, c.id]).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, a.id);
    assert!(repos.overlays().list_by_ids(&[]).await.unwrap().is_empty());
}

// -----------------------------------------------------------------------
// Compliance and subscription reports
// -----------------------------------------------------------------------

#[tokio::test]
async fn compliance_rows_ordered_by_cluster_then_hub() {
    let repos = setup().await;
    let policy_id = Uuid::new_v4();
    let other = Uuid::new_v4();
    for (cluster_name, hub, state) in [
        ("mc2", "hub1", ComplianceState::Compliant),
        ("mc1", "hub2", ComplianceState::NonCompliant),
        ("mc1", "hub1", ComplianceState::Unknown),
    ] {
        repos
            .compliance()
            .upsert(ComplianceRecord {
                policy_id,
                cluster_name: cluster_name.into(),
                leaf_hub_name: hub.into(),
                error: ErrorState::None,
                compliance: state,
            })
            .await
            .unwrap();
    }
    repos
        .compliance()
        .upsert(ComplianceRecord {
            policy_id: other,
            cluster_name: "mc9".into(),
            leaf_hub_name: "hub1".into(),
            error: ErrorState::None,
            compliance: ComplianceState::Compliant,
        })
        .await
        .unwrap();

    let rows = repos.compliance().list_by_policy(policy_id).await.unwrap();
    let keys: Vec<_> = rows
        .iter()
        .map(|r| (r.cluster_name.as_str(), r.leaf_hub_name.as_str()))
        .collect();
    assert_eq!(keys, [("mc1", "hub1"), ("mc1", "hub2"), ("mc2", "hub1")]);
    assert_eq!(rows[1].compliance, ComplianceState::NonCompliant);

    let both = repos
        .compliance()
        .list_by_policies(&[policy_id, other])
        .await
        .unwrap();
    assert_eq!(both.len(), 4);
}

#[tokio::test]
async fn compliance_upsert_replaces_row() {
    let repos = setup().await;
    let policy_id = Uuid::new_v4();
    let mut row = ComplianceRecord {
        policy_id,
        cluster_name: "mc1".into(),
        leaf_hub_name: "hub1".into(),
        error: ErrorState::None,
        compliance: ComplianceState::Unknown,
    };
    repos.compliance().upsert(row.clone()).await.unwrap();
    row.compliance = ComplianceState::Compliant;
    repos.compliance().upsert(row).await.unwrap();

    let rows = repos.compliance().list_by_policy(policy_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].compliance, ComplianceState::Compliant);
}

#[tokio::test]
async fn reports_match_on_name_and_namespace() {
    let repos = setup().await;
    let report = |hub: &str, ns: &str| SubscriptionReportRecord {
        id: Uuid::new_v4(),
        leaf_hub_name: hub.into(),
        payload: json!({
            "kind": "SubscriptionReport",
            "metadata": {"name": "helloworld-appsub", "namespace": ns}
        }),
    };
    for r in [
        report("hub2", "helloworld"),
        report("hub1", "helloworld"),
        report("hub1", "elsewhere"),
    ] {
        repos.reports().upsert(r).await.unwrap();
    }

    let found = repos
        .reports()
        .list_for_subscription(Some("helloworld"), "helloworld-appsub")
        .await
        .unwrap();
    let hubs: Vec<_> = found.iter().map(|r| r.leaf_hub_name.as_str()).collect();
    assert_eq!(hubs, ["hub1", "hub2"]);

    assert!(
        repos
            .reports()
            .list_for_subscription(Some("helloworld"), "missing")
            .await
            .unwrap()
            .is_empty()
    );
}

// -----------------------------------------------------------------------
// Failure classification
// -----------------------------------------------------------------------

#[tokio::test]
async fn unreadable_rows_are_internal_errors() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    globalhub_db::run_migrations(&db).await.unwrap();
    db.query(
        "CREATE type::record('spec_policies', 'not-a-uuid') SET \
         name = 'broken', payload = {}, deleted = false",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    let repos = SurrealRepositories::new(db);
    let err = repos
        .spec()
        .list(SpecKind::Policy, PageRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::Internal(_)), "got {err:?}");
}

#[tokio::test]
async fn failed_statements_are_not_transient() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    let mut response = db.query("THROW 'boom'").await.unwrap();
    let err = response
        .take::<Option<String>>(0)
        .map_err(DbError::response)
        .unwrap_err();
    assert!(!err.is_transient());
    assert!(matches!(HubError::from(err), HubError::Internal(_)));
}
