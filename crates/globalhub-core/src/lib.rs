//! Global Hub core: domain models, errors and the pure resource-shaping
//! pieces of the resource facade.
//!
//! This crate performs no I/O. It provides:
//! - Domain models ([`models`]) and the error taxonomy ([`HubError`])
//! - Repository traits implemented by the store adapter ([`repository`])
//! - Label selectors ([`selector`]) and continuation tokens ([`pagination`])
//! - Cross-table aggregation ([`aggregate`]), table rendering ([`table`])
//!   and label patches ([`patch`])

pub mod aggregate;
pub mod error;
pub mod models;
pub mod pagination;
pub mod patch;
pub mod repository;
pub mod selector;
pub mod table;

pub use error::{HubError, HubResult};
