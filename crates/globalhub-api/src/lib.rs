//! HTTP resource API of the Global Hub.
//!
//! Serves managed clusters, policies, placement rules, placement bindings,
//! subscriptions and subscription reports from the hub store, shaped like
//! their Kubernetes counterparts.

pub mod config;
pub mod error;
pub mod query;
pub mod router;
pub mod service;
pub mod watch;

pub use config::{ApiConfig, WatchConfig};
pub use error::{ApiError, ApiResult};
pub use router::router;
pub use service::{ObjectList, ResourceKind, ResourceService, WatchTarget};
pub use watch::{StopReason, WatchController, WatchHandle, WatchState};
