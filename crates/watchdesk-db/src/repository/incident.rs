//! SurrealDB implementation of [`IncidentRepository`].
//!
//! Incidents belong to the incident-management service. Besides the read
//! trait, this repository exposes the few writes needed to seed and evolve
//! incidents in a shared database.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;
use watchdesk_core::error::WatchdeskResult;
use watchdesk_core::models::handoff::SystemHealth;
use watchdesk_core::models::incident::{
    CreateEscalation, CreateIncident, EscalationEntry, Incident, IncidentSeverity, IncidentStatus,
    handoff_order,
};
use watchdesk_core::repository::IncidentRepository;

use super::{CountRow, parse_opt_uuid, parse_uuid};
use crate::error::DbError;

const NOT_TERMINAL: &str = "status NOTINSIDE ['resolved', 'closed']";

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct IncidentRowWithId {
    record_id: String,
    tenant_id: String,
    title: String,
    description: String,
    severity: String,
    status: String,
    escalation_level: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IncidentRowWithId {
    fn try_into_incident(self) -> Result<Incident, DbError> {
        let severity = IncidentSeverity::parse(&self.severity).ok_or_else(|| {
            DbError::decode("incident", format!("unknown severity: {}", self.severity))
        })?;
        let status = IncidentStatus::parse(&self.status).ok_or_else(|| {
            DbError::decode("incident", format!("unknown status: {}", self.status))
        })?;
        Ok(Incident {
            id: parse_uuid("incident", "record", &self.record_id)?,
            tenant_id: parse_uuid("incident", "tenant", &self.tenant_id)?,
            title: self.title,
            description: self.description,
            severity,
            status,
            escalation_level: self.escalation_level,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct EscalationRowWithId {
    record_id: String,
    incident_id: String,
    from_level: u32,
    to_level: u32,
    reason: Option<String>,
    escalated_by: Option<String>,
    created_at: DateTime<Utc>,
}

impl EscalationRowWithId {
    fn try_into_entry(self) -> Result<EscalationEntry, DbError> {
        Ok(EscalationEntry {
            id: parse_uuid("escalation", "record", &self.record_id)?,
            incident_id: parse_uuid("escalation", "incident", &self.incident_id)?,
            from_level: self.from_level,
            to_level: self.to_level,
            reason: self.reason,
            escalated_by: parse_opt_uuid(
                "escalation",
                "escalated_by",
                self.escalated_by.as_deref(),
            )?,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the Incident repository.
#[derive(Clone)]
pub struct SurrealIncidentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealIncidentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: CreateIncident) -> WatchdeskResult<Incident> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let mut sets = vec![
            "tenant_id = $tenant_id",
            "title = $title",
            "description = $description",
            "severity = $severity",
            "status = $status",
        ];
        if input.created_at.is_some() {
            sets.push("created_at = $created_at");
            sets.push("updated_at = $created_at");
        }
        let query = format!(
            "CREATE type::record('incident', $id) SET {}; \
             SELECT meta::id(id) AS record_id, * FROM type::record('incident', $id);",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("title", input.title))
            .bind(("description", input.description))
            .bind(("severity", input.severity.as_str()))
            .bind(("status", input.status.as_str()));
        if let Some(created_at) = input.created_at {
            builder = builder.bind(("created_at", created_at));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        // Statement 0 is the CREATE, statement 1 re-reads it with its id.
        let rows: Vec<IncidentRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "incident".into(),
            id: id_str,
        })?;

        Ok(row.try_into_incident()?)
    }

    pub async fn update_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: IncidentStatus,
    ) -> WatchdeskResult<Incident> {
        let id_str = id.to_string();
        let result = self
            .db
            .query(
                "UPDATE type::record('incident', $id) SET \
                 status = $status, updated_at = time::now() \
                 WHERE tenant_id = $tenant_id; \
                 SELECT meta::id(id) AS record_id, * FROM type::record('incident', $id) \
                 WHERE tenant_id = $tenant_id;",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("status", status.as_str()))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<IncidentRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "incident".into(),
            id: id_str,
        })?;

        Ok(row.try_into_incident()?)
    }

    /// Append an escalation step and raise the incident to `to_level`.
    ///
    /// The incident's status becomes `escalated`.
    pub async fn record_escalation(
        &self,
        input: CreateEscalation,
    ) -> WatchdeskResult<EscalationEntry> {
        let incident = self.get_by_id(input.tenant_id, input.incident_id).await?;

        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('escalation', $id) SET \
                 tenant_id = $tenant_id, \
                 incident_id = $incident_id, \
                 from_level = $from_level, \
                 to_level = $to_level, \
                 reason = $reason, \
                 escalated_by = $escalated_by; \
                 UPDATE type::record('incident', $incident_id) SET \
                 escalation_level = $to_level, status = 'escalated', \
                 updated_at = time::now(); \
                 SELECT meta::id(id) AS record_id, * FROM type::record('escalation', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("incident_id", input.incident_id.to_string()))
            .bind(("from_level", incident.escalation_level))
            .bind(("to_level", input.to_level))
            .bind(("reason", input.reason))
            .bind(("escalated_by", input.escalated_by.map(|u| u.to_string())))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<EscalationRowWithId> = result.take(2).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "escalation".into(),
            id: id_str,
        })?;

        debug!(
            incident_id = %input.incident_id,
            from_level = incident.escalation_level,
            to_level = input.to_level,
            "Escalation recorded"
        );

        Ok(row.try_into_entry()?)
    }

    async fn count(
        &self,
        query: String,
        tenant_id: &str,
        sla_cutoff: DateTime<Utc>,
    ) -> Result<u64, DbError> {
        let mut result = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("sla_cutoff", sla_cutoff))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}

impl<C: Connection> IncidentRepository for SurrealIncidentRepository<C> {
    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> WatchdeskResult<Incident> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM type::record('incident', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IncidentRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "incident".into(),
            id: id_str,
        })?;

        Ok(row.try_into_incident()?)
    }

    async fn list_open(&self, tenant_id: Uuid) -> WatchdeskResult<Vec<Incident>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM incident \
                 WHERE tenant_id = $tenant_id AND {NOT_TERMINAL}"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IncidentRowWithId> = result.take(0).map_err(DbError::from)?;
        let mut incidents = rows
            .into_iter()
            .map(|row| row.try_into_incident())
            .collect::<Result<Vec<_>, DbError>>()?;

        // Severity is stored as a label, so rank it here.
        incidents.sort_by(handoff_order);
        Ok(incidents)
    }

    async fn health_snapshot(
        &self,
        tenant_id: Uuid,
        sla_cutoff: DateTime<Utc>,
    ) -> WatchdeskResult<SystemHealth> {
        let tenant_id = tenant_id.to_string();
        let base = format!(
            "SELECT count() AS total FROM incident \
             WHERE tenant_id = $tenant_id AND {NOT_TERMINAL}"
        );

        let open_incidents = self
            .count(format!("{base} GROUP ALL"), &tenant_id, sla_cutoff)
            .await?;
        let escalated_incidents = self
            .count(
                format!("{base} AND status = 'escalated' GROUP ALL"),
                &tenant_id,
                sla_cutoff,
            )
            .await?;
        let sla_at_risk = self
            .count(
                format!("{base} AND created_at < $sla_cutoff GROUP ALL"),
                &tenant_id,
                sla_cutoff,
            )
            .await?;
        let critical_alerts = self
            .count(
                format!("{base} AND severity = 'critical' GROUP ALL"),
                &tenant_id,
                sla_cutoff,
            )
            .await?;

        Ok(SystemHealth {
            open_incidents,
            escalated_incidents,
            sla_at_risk,
            critical_alerts,
        })
    }

    async fn escalation_history(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
    ) -> WatchdeskResult<Vec<EscalationEntry>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM escalation \
                 WHERE tenant_id = $tenant_id AND incident_id = $incident_id \
                 ORDER BY created_at ASC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("incident_id", incident_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<EscalationRowWithId> = result.take(0).map_err(DbError::from)?;
        let entries = rows
            .into_iter()
            .map(|row| row.try_into_entry())
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(entries)
    }
}
