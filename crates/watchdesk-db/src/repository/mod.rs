//! SurrealDB repository implementations.

mod audit;
mod drift;
mod handoff;
mod incident;

pub use audit::SurrealAuditLogRepository;
pub use drift::SurrealDriftLedger;
pub use handoff::SurrealHandoffSessionRepository;
pub use incident::SurrealIncidentRepository;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_uuid(table: &'static str, field: &str, value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::decode(table, format!("invalid {field} UUID: {e}")))
}

fn parse_opt_uuid(
    table: &'static str,
    field: &str,
    value: Option<&str>,
) -> Result<Option<Uuid>, DbError> {
    value.map(|v| parse_uuid(table, field, v)).transpose()
}
