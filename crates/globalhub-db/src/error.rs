//! Database-specific error types and conversions.

use globalhub_core::error::HubError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The request never got a response: connection, transport or engine
    /// failure.
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    /// A statement failed, or its result did not fit the row type.
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Failed to decode row: {0}")]
    Decode(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl DbError {
    /// Wraps an error taken out of a query response. The store answered,
    /// so the connection is fine.
    pub fn response(err: surrealdb::Error) -> Self {
        DbError::Query(err.to_string())
    }

    /// Errors worth another attempt on an idempotent read.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Surreal(_))
    }
}

impl From<DbError> for HubError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => HubError::NotFound { entity, id },
            DbError::Query(msg) | DbError::Decode(msg) => HubError::Internal(msg),
            other => HubError::StoreUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_and_decode_failures_are_internal() {
        for err in [
            DbError::Query("THROW: boom".into()),
            DbError::Decode("invalid uuid".into()),
        ] {
            assert!(!err.is_transient());
            assert!(matches!(HubError::from(err), HubError::Internal(_)));
        }
    }

    #[test]
    fn missing_records_stay_not_found() {
        let err = DbError::NotFound {
            entity: "policy".into(),
            id: "p1".into(),
        };
        assert!(!err.is_transient());
        assert!(matches!(HubError::from(err), HubError::NotFound { .. }));
    }

    #[test]
    fn migration_failures_mean_the_store_is_unusable() {
        assert!(matches!(
            HubError::from(DbError::Migration("v1".into())),
            HubError::StoreUnavailable(_)
        ));
    }
}
