//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Incident reads are tenant-scoped;
//! handoff sessions and drift observations are addressed by their own ids.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::WatchdeskResult;
use crate::models::{
    audit::{AuditLogEntry, CreateAuditLogEntry},
    drift::{
        AttendanceIntegrityFlag, ClockDriftObservation, CreateDriftObservation, TenantDriftStats,
    },
    handoff::{HandoffSession, RecordStatus, SystemHealth},
    incident::{EscalationEntry, Incident},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Incidents (read side, tenant-scoped)
// ---------------------------------------------------------------------------

pub trait IncidentRepository: Send + Sync {
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = WatchdeskResult<Incident>> + Send;

    /// All non-terminal incidents, most severe first, oldest first within
    /// a severity.
    fn list_open(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = WatchdeskResult<Vec<Incident>>> + Send;

    /// Health counters for a tenant. Open incidents created before
    /// `sla_cutoff` count as SLA-at-risk.
    fn health_snapshot(
        &self,
        tenant_id: Uuid,
        sla_cutoff: DateTime<Utc>,
    ) -> impl Future<Output = WatchdeskResult<SystemHealth>> + Send;

    /// Escalation history, oldest first.
    fn escalation_history(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
    ) -> impl Future<Output = WatchdeskResult<Vec<EscalationEntry>>> + Send;
}

// ---------------------------------------------------------------------------
// Drift ledger (append-only)
// ---------------------------------------------------------------------------

pub trait DriftLedger: Send + Sync {
    /// Append an observation. No update or delete operations exist.
    fn record(
        &self,
        input: CreateDriftObservation,
    ) -> impl Future<Output = WatchdeskResult<ClockDriftObservation>> + Send;

    /// Most recent observations for a user, newest first.
    fn history(
        &self,
        user_id: Uuid,
        limit: u64,
    ) -> impl Future<Output = WatchdeskResult<Vec<ClockDriftObservation>>> + Send;

    fn tenant_stats(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = WatchdeskResult<TenantDriftStats>> + Send;

    /// CRITICAL observations whose action type contains `marker`
    /// (case-insensitive), newest first.
    fn critical_attendance_events(
        &self,
        marker: &str,
        limit: u64,
    ) -> impl Future<Output = WatchdeskResult<Vec<ClockDriftObservation>>> + Send;

    /// Raise an integrity flag on an attendance record.
    fn flag(
        &self,
        attendance_record_id: Uuid,
        observation: &ClockDriftObservation,
    ) -> impl Future<Output = WatchdeskResult<AttendanceIntegrityFlag>> + Send;

    fn list_flags(
        &self,
        attendance_record_id: Uuid,
    ) -> impl Future<Output = WatchdeskResult<Vec<AttendanceIntegrityFlag>>> + Send;
}

// ---------------------------------------------------------------------------
// Handoff sessions
// ---------------------------------------------------------------------------

pub trait HandoffSessionRepository: Send + Sync {
    /// Persist a session together with its records.
    fn create(&self, session: &HandoffSession) -> impl Future<Output = WatchdeskResult<()>> + Send;

    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WatchdeskResult<HandoffSession>> + Send;

    /// Move `InProgress → Accepted`. Returns the session's tenant when the
    /// transition happened, `None` when no session was in a state that
    /// allows it.
    fn mark_accepted(
        &self,
        id: Uuid,
        accepted_by: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = WatchdeskResult<Option<Uuid>>> + Send;

    /// Move `InProgress | Accepted → Completed`. Same return contract as
    /// [`mark_accepted`](Self::mark_accepted).
    fn mark_completed(
        &self,
        id: Uuid,
        notes: &str,
        at: DateTime<Utc>,
    ) -> impl Future<Output = WatchdeskResult<Option<Uuid>>> + Send;

    /// Decide a pending per-incident record. Returns `false` when the
    /// record does not exist or was already decided.
    fn set_record_status(
        &self,
        session_id: Uuid,
        incident_id: Uuid,
        status: RecordStatus,
    ) -> impl Future<Output = WatchdeskResult<bool>> + Send;
}

// ---------------------------------------------------------------------------
// Audit (append-only)
// ---------------------------------------------------------------------------

/// Query filters for audit log entries.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub tenant_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append a new audit log entry. No update or delete operations exist.
    fn append(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = WatchdeskResult<AuditLogEntry>> + Send;
    fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = WatchdeskResult<PaginatedResult<AuditLogEntry>>> + Send;
}
