//! SurrealDB implementation of [`AuditLogRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use watchdesk_core::error::WatchdeskResult;
use watchdesk_core::models::audit::{ActorType, AuditLogEntry, AuditOutcome, CreateAuditLogEntry};
use watchdesk_core::repository::{
    AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination,
};

use super::{CountRow, parse_opt_uuid, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AuditRowWithId {
    record_id: String,
    tenant_id: Option<String>,
    actor_id: Option<String>,
    actor_type: String,
    action: String,
    resource_id: Option<String>,
    outcome: String,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
}

impl AuditRowWithId {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        let table = "audit_log";
        let actor_type = ActorType::parse(&self.actor_type).ok_or_else(|| {
            DbError::decode(table, format!("unknown actor type: {}", self.actor_type))
        })?;
        let outcome = AuditOutcome::parse(&self.outcome)
            .ok_or_else(|| DbError::decode(table, format!("unknown outcome: {}", self.outcome)))?;
        Ok(AuditLogEntry {
            id: parse_uuid(table, "record", &self.record_id)?,
            tenant_id: parse_opt_uuid(table, "tenant", self.tenant_id.as_deref())?,
            actor_id: parse_opt_uuid(table, "actor", self.actor_id.as_deref())?,
            actor_type,
            action: self.action,
            resource_id: parse_opt_uuid(table, "resource", self.resource_id.as_deref())?,
            outcome,
            metadata: self.metadata,
            timestamp: self.timestamp,
        })
    }
}

/// SurrealDB implementation of the append-only audit log.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

fn where_clause(filter: &AuditLogFilter) -> String {
    let mut conditions = Vec::new();
    if filter.tenant_id.is_some() {
        conditions.push("tenant_id = $tenant_id");
    }
    if filter.actor_id.is_some() {
        conditions.push("actor_id = $actor_id");
    }
    if filter.action.is_some() {
        conditions.push("action = $action");
    }
    if filter.resource_id.is_some() {
        conditions.push("resource_id = $resource_id");
    }
    if filter.from.is_some() {
        conditions.push("timestamp >= $from");
    }
    if filter.to.is_some() {
        conditions.push("timestamp <= $to");
    }

    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditLogEntry) -> WatchdeskResult<AuditLogEntry> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let metadata = input
            .metadata
            .unwrap_or(serde_json::Value::Object(Default::default()));

        let result = self
            .db
            .query(
                "CREATE type::record('audit_log', $id) SET \
                 tenant_id = $tenant_id, \
                 actor_id = $actor_id, \
                 actor_type = $actor_type, \
                 action = $action, \
                 resource_id = $resource_id, \
                 outcome = $outcome, \
                 metadata = $metadata, \
                 timestamp = $timestamp; \
                 SELECT meta::id(id) AS record_id, * FROM type::record('audit_log', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.map(|u| u.to_string())))
            .bind(("actor_id", input.actor_id.map(|u| u.to_string())))
            .bind(("actor_type", input.actor_type.as_str()))
            .bind(("action", input.action))
            .bind(("resource_id", input.resource_id.map(|u| u.to_string())))
            .bind(("outcome", input.outcome.as_str()))
            .bind(("metadata", metadata))
            .bind(("timestamp", input.timestamp))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<AuditRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_log".into(),
            id: id_str,
        })?;

        Ok(row.try_into_entry()?)
    }

    async fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> WatchdeskResult<PaginatedResult<AuditLogEntry>> {
        let clause = where_clause(&filter);
        let query = format!(
            "SELECT count() AS total FROM audit_log {clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM audit_log {clause} \
             ORDER BY timestamp ASC \
             LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(tenant_id) = filter.tenant_id {
            builder = builder.bind(("tenant_id", tenant_id.to_string()));
        }
        if let Some(actor_id) = filter.actor_id {
            builder = builder.bind(("actor_id", actor_id.to_string()));
        }
        if let Some(action) = filter.action {
            builder = builder.bind(("action", action));
        }
        if let Some(resource_id) = filter.resource_id {
            builder = builder.bind(("resource_id", resource_id.to_string()));
        }
        if let Some(from) = filter.from {
            builder = builder.bind(("from", from));
        }
        if let Some(to) = filter.to {
            builder = builder.bind(("to", to));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let rows: Vec<AuditRowWithId> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_entry())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_has_no_where_clause() {
        assert_eq!(where_clause(&AuditLogFilter::default()), "");
    }

    #[test]
    fn filter_conditions_are_joined() {
        let filter = AuditLogFilter {
            resource_id: Some(Uuid::nil()),
            action: Some("handoff.accepted".into()),
            ..Default::default()
        };
        assert_eq!(
            where_clause(&filter),
            "WHERE action = $action AND resource_id = $resource_id"
        );
    }
}
