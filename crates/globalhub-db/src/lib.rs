//! Global Hub Database: SurrealDB connection management, schema bootstrap
//! and repository implementations.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Repositories for the `globalhub-core` traits ([`repository`])
//! - Read retry ([`RetryPolicy`]) and error types ([`DbError`])

mod connection;
mod error;
pub mod repository;
mod retry;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use repository::SurrealRepositories;
pub use retry::RetryPolicy;
pub use schema::{run_migrations, schema_v1};
