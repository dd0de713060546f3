//! Domain models for the Global Hub resource facade.
//!
//! Rows are carried as they are stored: an identity, a few typed columns
//! and an opaque JSON payload shaped like the Kubernetes object it mirrors.

pub mod cluster;
pub mod compliance;
pub mod object;
pub mod resource;
pub mod subscription;
