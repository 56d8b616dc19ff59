//! SurrealDB implementation of [`HandoffSessionRepository`].
//!
//! A session is stored as one `handoff_session` row plus one
//! `handoff_record` row per incident, written in a single transaction.
//! The open-incident snapshot shared by every record is stored once, on
//! the session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;
use watchdesk_core::error::WatchdeskResult;
use watchdesk_core::models::handoff::{
    ContextBrief, HandoffRecord, HandoffSession, HandoffSessionStatus, IncidentSnapshot,
    RecordStatus, SystemHealth,
};
use watchdesk_core::models::incident::IncidentSeverity;
use watchdesk_core::repository::HandoffSessionRepository;

use super::parse_uuid;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct SessionRow {
    tenant_id: String,
    from_admin: String,
    to_admin: String,
    status: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    accepted_at: Option<DateTime<Utc>>,
    system_health: serde_json::Value,
    incident_snapshot: serde_json::Value,
    briefing_notes: Option<String>,
    completion_notes: Option<String>,
}

#[derive(Debug, SurrealValue)]
struct RecordRowWithId {
    record_id: String,
    incident_id: String,
    incident_title: String,
    severity: String,
    from_admin: String,
    to_admin: String,
    status: String,
    context_brief: serde_json::Value,
    escalation_path: String,
    next_actions: serde_json::Value,
}

/// Rows returned by status transitions; only the tenant is needed.
#[derive(Debug, SurrealValue)]
struct TenantRow {
    tenant_id: String,
}

#[derive(Debug, SurrealValue)]
struct RecordStatusRow {
    #[allow(dead_code)]
    status: String,
}

fn from_json<T: serde::de::DeserializeOwned>(
    table: &'static str,
    field: &str,
    value: serde_json::Value,
) -> Result<T, DbError> {
    serde_json::from_value(value)
        .map_err(|e| DbError::decode(table, format!("invalid {field}: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(value).map_err(|e| DbError::Query(format!("serialization failed: {e}")))
}

impl RecordRowWithId {
    fn try_into_record(
        self,
        session_id: Uuid,
        active_incidents: &Arc<[IncidentSnapshot]>,
    ) -> Result<HandoffRecord, DbError> {
        let table = "handoff_record";
        let severity = IncidentSeverity::parse(&self.severity)
            .ok_or_else(|| DbError::decode(table, format!("unknown severity: {}", self.severity)))?;
        let status = RecordStatus::parse(&self.status)
            .ok_or_else(|| DbError::decode(table, format!("unknown status: {}", self.status)))?;
        let context_brief: ContextBrief = from_json(table, "context_brief", self.context_brief)?;
        let next_actions: Vec<String> = from_json(table, "next_actions", self.next_actions)?;

        Ok(HandoffRecord {
            id: parse_uuid(table, "record", &self.record_id)?,
            session_id,
            incident_id: parse_uuid(table, "incident", &self.incident_id)?,
            incident_title: self.incident_title,
            severity,
            from_admin: parse_uuid(table, "from_admin", &self.from_admin)?,
            to_admin: parse_uuid(table, "to_admin", &self.to_admin)?,
            status,
            context_brief,
            escalation_path: self.escalation_path,
            next_actions,
            active_incidents: Arc::clone(active_incidents),
        })
    }
}

fn status_list<'a>(statuses: impl IntoIterator<Item = &'a str>) -> String {
    statuses
        .into_iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// SurrealDB implementation of the handoff session store.
#[derive(Clone)]
pub struct SurrealHandoffSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealHandoffSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn transition(
        &self,
        id: Uuid,
        next: HandoffSessionStatus,
        sets: &str,
        bindings: Vec<(&'static str, serde_json::Value)>,
        at: DateTime<Utc>,
    ) -> Result<Option<Uuid>, DbError> {
        let from = HandoffSessionStatus::predecessors(next);
        let query = format!(
            "UPDATE type::record('handoff_session', $id) SET \
             status = $next, {sets} \
             WHERE status INSIDE [{}]",
            status_list(from.iter().map(|s| s.as_str()))
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("next", next.as_str()))
            .bind(("at", at));
        for binding in bindings {
            builder = builder.bind(binding);
        }

        let result = builder.await?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<TenantRow> = result.take(0)?;

        rows.into_iter()
            .next()
            .map(|row| parse_uuid("handoff_session", "tenant", &row.tenant_id))
            .transpose()
    }
}

impl<C: Connection> HandoffSessionRepository for SurrealHandoffSessionRepository<C> {
    async fn create(&self, session: &HandoffSession) -> WatchdeskResult<()> {
        let id_str = session.id.to_string();

        // All records share one snapshot; the first carries it.
        let snapshot: &[IncidentSnapshot] = session
            .incidents
            .first()
            .map(|r| &r.active_incidents[..])
            .unwrap_or(&[]);

        let records = session
            .incidents
            .iter()
            .enumerate()
            .map(|(ordinal, record)| {
                Ok(json!({
                    "id": record.id.to_string(),
                    "incident_id": record.incident_id.to_string(),
                    "ordinal": ordinal,
                    "incident_title": record.incident_title,
                    "severity": record.severity.as_str(),
                    "from_admin": record.from_admin.to_string(),
                    "to_admin": record.to_admin.to_string(),
                    "status": record.status.as_str(),
                    "context_brief": to_json(&record.context_brief)?,
                    "escalation_path": record.escalation_path,
                    "next_actions": record.next_actions,
                }))
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        let result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 CREATE type::record('handoff_session', $id) SET \
                 tenant_id = $tenant_id, \
                 from_admin = $from_admin, \
                 to_admin = $to_admin, \
                 status = $status, \
                 start_time = $start_time, \
                 end_time = $end_time, \
                 accepted_at = $accepted_at, \
                 system_health = $system_health, \
                 incident_snapshot = $incident_snapshot, \
                 briefing_notes = $briefing_notes, \
                 completion_notes = $completion_notes; \
                 FOR $r IN $records { \
                     CREATE type::record('handoff_record', $r.id) SET \
                     session_id = $id, \
                     incident_id = $r.incident_id, \
                     ordinal = $r.ordinal, \
                     incident_title = $r.incident_title, \
                     severity = $r.severity, \
                     from_admin = $r.from_admin, \
                     to_admin = $r.to_admin, \
                     status = $r.status, \
                     context_brief = $r.context_brief, \
                     escalation_path = $r.escalation_path, \
                     next_actions = $r.next_actions; \
                 }; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", session.tenant_id.to_string()))
            .bind(("from_admin", session.from_admin.to_string()))
            .bind(("to_admin", session.to_admin.to_string()))
            .bind(("status", session.status.as_str()))
            .bind(("start_time", session.start_time))
            .bind(("end_time", session.end_time))
            .bind(("accepted_at", session.accepted_at))
            .bind(("system_health", to_json(&session.system_health)?))
            .bind(("incident_snapshot", json!({ "incidents": to_json(&snapshot)? })))
            .bind(("briefing_notes", session.briefing_notes.clone()))
            .bind(("completion_notes", session.completion_notes.clone()))
            .bind(("records", serde_json::Value::Array(records)))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        debug!(
            session_id = %session.id,
            records = session.incidents.len(),
            "Handoff session stored"
        );
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> WatchdeskResult<HandoffSession> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('handoff_session', $id); \
                 SELECT meta::id(id) AS record_id, * FROM handoff_record \
                 WHERE session_id = $id ORDER BY ordinal ASC;",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let sessions: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        let row = sessions.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "handoff_session".into(),
            id: id_str,
        })?;
        let record_rows: Vec<RecordRowWithId> = result.take(1).map_err(DbError::from)?;

        let table = "handoff_session";
        let status = HandoffSessionStatus::parse(&row.status)
            .ok_or_else(|| DbError::decode(table, format!("unknown status: {}", row.status)))?;
        let system_health: SystemHealth = from_json(table, "system_health", row.system_health)?;
        let snapshot: Vec<IncidentSnapshot> = match row.incident_snapshot.get("incidents") {
            Some(incidents) => from_json(table, "incident_snapshot", incidents.clone())?,
            None => Vec::new(),
        };
        let active_incidents: Arc<[IncidentSnapshot]> = snapshot.into();

        let incidents = record_rows
            .into_iter()
            .map(|r| r.try_into_record(id, &active_incidents))
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(HandoffSession {
            id,
            tenant_id: parse_uuid(table, "tenant", &row.tenant_id)?,
            from_admin: parse_uuid(table, "from_admin", &row.from_admin)?,
            to_admin: parse_uuid(table, "to_admin", &row.to_admin)?,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            incidents,
            system_health,
            briefing_notes: row.briefing_notes,
            accepted_at: row.accepted_at,
            completion_notes: row.completion_notes,
        })
    }

    async fn mark_accepted(
        &self,
        id: Uuid,
        accepted_by: Uuid,
        at: DateTime<Utc>,
    ) -> WatchdeskResult<Option<Uuid>> {
        let tenant = self
            .transition(
                id,
                HandoffSessionStatus::Accepted,
                "accepted_by = $accepted_by, accepted_at = $at",
                vec![("accepted_by", json!(accepted_by.to_string()))],
                at,
            )
            .await?;
        Ok(tenant)
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        notes: &str,
        at: DateTime<Utc>,
    ) -> WatchdeskResult<Option<Uuid>> {
        let tenant = self
            .transition(
                id,
                HandoffSessionStatus::Completed,
                "end_time = $at, completion_notes = $notes",
                vec![("notes", json!(notes))],
                at,
            )
            .await?;
        Ok(tenant)
    }

    async fn set_record_status(
        &self,
        session_id: Uuid,
        incident_id: Uuid,
        status: RecordStatus,
    ) -> WatchdeskResult<bool> {
        let from = RecordStatus::predecessors(status);
        if from.is_empty() {
            return Ok(false);
        }
        let query = format!(
            "UPDATE handoff_record SET status = $status \
             WHERE session_id = $session_id \
             AND incident_id = $incident_id \
             AND status INSIDE [{}]",
            status_list(from.iter().map(|s| s.as_str()))
        );

        let result = self
            .db
            .query(query)
            .bind(("session_id", session_id.to_string()))
            .bind(("incident_id", incident_id.to_string()))
            .bind(("status", status.as_str()))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<RecordStatusRow> = result.take(0).map_err(DbError::from)?;
        Ok(!rows.is_empty())
    }
}
