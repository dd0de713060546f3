//! Axum routes of the resource API.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get};
use axum::{Json, Router};
use globalhub_core::error::HubError;
use globalhub_core::models::resource::SpecKind;
use globalhub_core::repository::Repositories;
use globalhub_core::table;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::query::{ListParams, wants_table};
use crate::service::{ResourceKind, ResourceService, WatchTarget};
use crate::watch::{WatchController, WatchHandle};

/// Shared state of every handler.
pub struct AppState<R: Repositories> {
    service: Arc<ResourceService<R>>,
    watches: WatchController,
}

impl<R: Repositories> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            watches: self.watches.clone(),
        }
    }
}

/// Builds the router: resource routes under `config.base_path`, plus
/// `/healthz` at the root. Watches stop when `shutdown` fires.
pub fn router<R: Repositories>(
    service: Arc<ResourceService<R>>,
    config: &ApiConfig,
    shutdown: CancellationToken,
) -> Router {
    let state = AppState {
        service,
        watches: WatchController::new(config.watch, shutdown),
    };

    let managed_cluster = ResourceKind::ManagedCluster;
    let api = Router::new()
        .route("/managedclusters", list_route(managed_cluster))
        .route(
            "/managedclusters/:id",
            get_route(managed_cluster).patch(patch_cluster_labels::<R>),
        )
        .route("/policies/:id/status", get(policy_status::<R>))
        .route("/subscriptionreport/:id", get(subscription_report::<R>));
    let api = SpecKind::ALL.into_iter().fold(api, |api, spec| {
        let kind = ResourceKind::Spec(spec);
        let collection = format!("/{}", collection_path(spec));
        let item = format!("{collection}/:id");
        api.route(&collection, list_route(kind))
            .route(&item, get_route(kind))
    });

    let base = config.base_path.trim_end_matches('/');
    let app = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    app.route("/healthz", get(healthz))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

fn collection_path(kind: SpecKind) -> &'static str {
    match kind {
        SpecKind::Policy => "policies",
        SpecKind::PlacementRule => "placementrules",
        SpecKind::PlacementBinding => "placementbindings",
        SpecKind::Subscription => "subscriptions",
    }
}

fn list_route<R: Repositories>(kind: ResourceKind) -> MethodRouter<AppState<R>> {
    get(
        move |State(state): State<AppState<R>>,
              Query(params): Query<ListParams>,
              headers: HeaderMap| async move { list(state, kind, params, headers).await },
    )
}

fn get_route<R: Repositories>(kind: ResourceKind) -> MethodRouter<AppState<R>> {
    get(
        move |State(state): State<AppState<R>>, Path(id): Path<String>, headers: HeaderMap| async move {
            let id = parse_id(kind.kind(), &id)?;
            let object = state.service.get(kind, id).await?;
            Ok::<_, ApiError>(render_one(object, &headers))
        },
    )
}

async fn list<R: Repositories>(
    state: AppState<R>,
    kind: ResourceKind,
    params: ListParams,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let query = params.parse()?;
    if params.is_watch() {
        let handle = state
            .service
            .watch(WatchTarget::List { kind, query }, &state.watches);
        return Ok(stream_response(handle));
    }

    let list = state.service.list(kind, &query).await?;
    Ok(if wants_table(&headers) {
        Json(list.into_table()).into_response()
    } else {
        Json(list.into_json()).into_response()
    })
}

async fn policy_status<R: Repositories>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let id = parse_id("Policy", &id)?;
    if params.is_watch() {
        // Fail fast on an unknown policy instead of streaming errors.
        state.service.policy_status(id).await?;
        let handle = state
            .service
            .watch(WatchTarget::PolicyStatus(id), &state.watches);
        return Ok(stream_response(handle));
    }
    let status = state.service.policy_status(id).await?;
    Ok(render_one(status, &headers))
}

async fn subscription_report<R: Repositories>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id("SubscriptionReport", &id)?;
    Ok(Json(state.service.subscription_report(id).await?))
}

async fn patch_cluster_labels<R: Repositories>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let id = parse_id("ManagedCluster", &id)?;
    Ok(Json(state.service.patch_cluster_labels(id, &body).await?))
}

async fn healthz() -> &'static str {
    "ok"
}

/// Ids that are not UUIDs name nothing in the store.
fn parse_id(entity: &str, raw: &str) -> Result<Uuid, HubError> {
    Uuid::parse_str(raw).map_err(|_| HubError::not_found(entity, raw))
}

fn render_one(object: Value, headers: &HeaderMap) -> Response {
    if wants_table(headers) {
        Json(table::render(vec![object])).into_response()
    } else {
        Json(object).into_response()
    }
}

fn stream_response(handle: WatchHandle) -> Response {
    (
        [(CONTENT_TYPE, "application/json")],
        Body::from_stream(handle.stream),
    )
        .into_response()
}
