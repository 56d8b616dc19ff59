//! Database-specific error types and conversions.

use watchdesk_core::error::WatchdeskError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Corrupt row in {table}: {reason}")]
    Decode { table: &'static str, reason: String },

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl DbError {
    pub(crate) fn decode(table: &'static str, reason: impl Into<String>) -> Self {
        DbError::Decode {
            table,
            reason: reason.into(),
        }
    }
}

impl From<DbError> for WatchdeskError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => WatchdeskError::NotFound { entity, id },
            DbError::Surreal(e) => WatchdeskError::Persistence(e.to_string()),
            other => WatchdeskError::Database(other.to_string()),
        }
    }
}
