//! Error types for the Watchdesk system.

use thiserror::Error;

use crate::validation::ValidationErrors;

#[derive(Debug, Error)]
pub enum WatchdeskError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Database error: {0}")]
    Database(String),

    /// The backing store could not be reached or refused a write.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl WatchdeskError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        WatchdeskError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WatchdeskError::NotFound { .. })
    }
}

impl From<ValidationErrors> for WatchdeskError {
    fn from(errors: ValidationErrors) -> Self {
        WatchdeskError::Validation(errors)
    }
}

pub type WatchdeskResult<T> = Result<T, WatchdeskError>;
