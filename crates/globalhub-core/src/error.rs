//! Error types for the Global Hub resource facade.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Malformed label selector {selector:?}: {reason}")]
    MalformedSelector { selector: String, reason: String },

    #[error("Invalid continue token: {0}")]
    InvalidContinueToken(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unsupported patch path {path:?}: only /metadata/labels/<key> may be patched")]
    UnsupportedPatchPath { path: String },

    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HubError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Client-side errors are caused by the request and never by the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedSelector { .. }
                | Self::InvalidContinueToken(_)
                | Self::NotFound { .. }
                | Self::UnsupportedPatchPath { .. }
                | Self::InvalidPatch(_)
        )
    }
}

pub type HubResult<T> = Result<T, HubError>;
