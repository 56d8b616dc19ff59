//! SurrealDB implementation of the [`DriftLedger`].
//!
//! `clock_drift_log` is append-only: the schema forbids update and delete,
//! and this repository exposes no path to either.

use chrono::{DateTime, Utc};
use serde_json::json;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;
use watchdesk_core::error::WatchdeskResult;
use watchdesk_core::models::drift::{
    AttendanceIntegrityFlag, ClockDriftObservation, CreateDriftObservation,
    DriftSeverity, FlagSeverity, IntegrityFlagType, TenantDriftStats,
};
use watchdesk_core::repository::DriftLedger;

use super::{parse_opt_uuid, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ObservationRowWithId {
    record_id: String,
    request_id: String,
    user_id: String,
    tenant_id: Option<String>,
    client_timestamp: DateTime<Utc>,
    server_timestamp: DateTime<Utc>,
    drift_seconds: i64,
    severity: String,
    action_type: Option<String>,
    action_id: Option<String>,
}

fn parse_severity(s: &str) -> Result<DriftSeverity, DbError> {
    DriftSeverity::parse(s)
        .ok_or_else(|| DbError::decode("clock_drift_log", format!("unknown severity: {s}")))
}

impl ObservationRowWithId {
    fn try_into_observation(self) -> Result<ClockDriftObservation, DbError> {
        Ok(ClockDriftObservation {
            id: parse_uuid("clock_drift_log", "record", &self.record_id)?,
            request_id: self.request_id,
            user_id: parse_uuid("clock_drift_log", "user", &self.user_id)?,
            tenant_id: parse_opt_uuid("clock_drift_log", "tenant", self.tenant_id.as_deref())?,
            client_timestamp: self.client_timestamp,
            server_timestamp: self.server_timestamp,
            drift_seconds: self.drift_seconds,
            severity: parse_severity(&self.severity)?,
            action_type: self.action_type,
            action_id: self.action_id,
        })
    }
}

/// Just the columns the statistics need.
#[derive(Debug, SurrealValue)]
struct SampleRow {
    user_id: String,
    drift_seconds: i64,
    severity: String,
}

#[derive(Debug, SurrealValue)]
struct FlagRowWithId {
    record_id: String,
    attendance_record_id: String,
    observation_id: String,
    flag_type: String,
    severity: String,
    details: serde_json::Value,
    reviewed: bool,
    created_at: DateTime<Utc>,
}

impl FlagRowWithId {
    fn try_into_flag(self) -> Result<AttendanceIntegrityFlag, DbError> {
        let table = "attendance_integrity_flag";
        let flag_type = IntegrityFlagType::parse(&self.flag_type).ok_or_else(|| {
            DbError::decode(table, format!("unknown flag type: {}", self.flag_type))
        })?;
        let severity = FlagSeverity::parse(&self.severity)
            .ok_or_else(|| DbError::decode(table, format!("unknown severity: {}", self.severity)))?;
        Ok(AttendanceIntegrityFlag {
            id: parse_uuid(table, "record", &self.record_id)?,
            attendance_record_id: parse_uuid(
                table,
                "attendance record",
                &self.attendance_record_id,
            )?,
            observation_id: parse_uuid(table, "observation", &self.observation_id)?,
            flag_type,
            severity,
            details: self.details,
            reviewed: self.reviewed,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the drift ledger.
#[derive(Clone)]
pub struct SurrealDriftLedger<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealDriftLedger<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn select_observations(
        &self,
        query: &'static str,
        bindings: Vec<(&'static str, String)>,
        limit: u64,
    ) -> Result<Vec<ClockDriftObservation>, DbError> {
        let mut builder = self.db.query(query).bind(("limit", limit));
        for binding in bindings {
            builder = builder.bind(binding);
        }
        let mut result = builder.await?;
        let rows: Vec<ObservationRowWithId> = result.take(0)?;
        rows.into_iter()
            .map(|row| row.try_into_observation())
            .collect()
    }
}

impl<C: Connection> DriftLedger for SurrealDriftLedger<C> {
    async fn record(
        &self,
        input: CreateDriftObservation,
    ) -> WatchdeskResult<ClockDriftObservation> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('clock_drift_log', $id) SET \
                 request_id = $request_id, \
                 user_id = $user_id, \
                 tenant_id = $tenant_id, \
                 client_timestamp = $client_timestamp, \
                 server_timestamp = $server_timestamp, \
                 drift_seconds = $drift_seconds, \
                 severity = $severity, \
                 action_type = $action_type, \
                 action_id = $action_id; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('clock_drift_log', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("request_id", input.request_id))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("tenant_id", input.tenant_id.map(|t| t.to_string())))
            .bind(("client_timestamp", input.client_timestamp))
            .bind(("server_timestamp", input.server_timestamp))
            .bind(("drift_seconds", input.drift_seconds))
            .bind(("severity", input.severity.as_str()))
            .bind(("action_type", input.action_type))
            .bind(("action_id", input.action_id))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ObservationRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "clock_drift_log".into(),
            id: id_str,
        })?;

        let observation = row.try_into_observation()?;
        debug!(
            observation_id = %observation.id,
            drift_seconds = observation.drift_seconds,
            severity = observation.severity.as_str(),
            "Drift observation recorded"
        );
        Ok(observation)
    }

    async fn history(
        &self,
        user_id: Uuid,
        limit: u64,
    ) -> WatchdeskResult<Vec<ClockDriftObservation>> {
        let observations = self
            .select_observations(
                "SELECT meta::id(id) AS record_id, * FROM clock_drift_log \
                 WHERE user_id = $user_id \
                 ORDER BY server_timestamp DESC \
                 LIMIT $limit",
                vec![("user_id", user_id.to_string())],
                limit,
            )
            .await?;
        Ok(observations)
    }

    async fn tenant_stats(&self, tenant_id: Uuid) -> WatchdeskResult<TenantDriftStats> {
        let mut result = self
            .db
            .query(
                "SELECT user_id, drift_seconds, severity FROM clock_drift_log \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SampleRow> = result.take(0).map_err(DbError::from)?;
        let samples = rows
            .into_iter()
            .map(|row| {
                Ok((
                    parse_uuid("clock_drift_log", "user", &row.user_id)?,
                    row.drift_seconds,
                    parse_severity(&row.severity)?,
                ))
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(TenantDriftStats::from_samples(tenant_id, samples))
    }

    async fn critical_attendance_events(
        &self,
        marker: &str,
        limit: u64,
    ) -> WatchdeskResult<Vec<ClockDriftObservation>> {
        let observations = self
            .select_observations(
                "SELECT meta::id(id) AS record_id, * FROM clock_drift_log \
                 WHERE severity = 'CRITICAL' \
                 AND string::contains(string::lowercase(action_type ?? ''), $marker) \
                 ORDER BY server_timestamp DESC \
                 LIMIT $limit",
                vec![("marker", marker.to_ascii_lowercase())],
                limit,
            )
            .await?;
        Ok(observations)
    }

    async fn flag(
        &self,
        attendance_record_id: Uuid,
        observation: &ClockDriftObservation,
    ) -> WatchdeskResult<AttendanceIntegrityFlag> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let flag_type = IntegrityFlagType::ClockDriftViolation;
        let severity = FlagSeverity::from(observation.severity);
        let details = json!({
            "request_id": observation.request_id,
            "user_id": observation.user_id.to_string(),
            "drift_seconds": observation.drift_seconds,
            "drift_severity": observation.severity.as_str(),
            "action_type": observation.action_type,
            "client_timestamp": observation.client_timestamp.to_rfc3339(),
            "server_timestamp": observation.server_timestamp.to_rfc3339(),
        });

        let result = self
            .db
            .query(
                "CREATE type::record('attendance_integrity_flag', $id) SET \
                 attendance_record_id = $attendance_record_id, \
                 observation_id = $observation_id, \
                 flag_type = $flag_type, \
                 severity = $severity, \
                 details = $details; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('attendance_integrity_flag', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("attendance_record_id", attendance_record_id.to_string()))
            .bind(("observation_id", observation.id.to_string()))
            .bind(("flag_type", flag_type.as_str()))
            .bind(("severity", severity.as_str()))
            .bind(("details", details))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<FlagRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "attendance_integrity_flag".into(),
            id: id_str,
        })?;

        Ok(row.try_into_flag()?)
    }

    async fn list_flags(
        &self,
        attendance_record_id: Uuid,
    ) -> WatchdeskResult<Vec<AttendanceIntegrityFlag>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM attendance_integrity_flag \
                 WHERE attendance_record_id = $attendance_record_id \
                 ORDER BY created_at DESC",
            )
            .bind(("attendance_record_id", attendance_record_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<FlagRowWithId> = result.take(0).map_err(DbError::from)?;
        let flags = rows
            .into_iter()
            .map(|row| row.try_into_flag())
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(flags)
    }
}
