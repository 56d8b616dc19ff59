//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "incident_store_and_audit",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "drift_ledger_and_handoff",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1 — incidents, escalations, audit log
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Incidents (tenant scope)
-- =======================================================================
DEFINE TABLE incident SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE incident TYPE string;
DEFINE FIELD title ON TABLE incident TYPE string;
DEFINE FIELD description ON TABLE incident TYPE string DEFAULT '';
DEFINE FIELD severity ON TABLE incident TYPE string \
    ASSERT $value IN ['low', 'medium', 'high', 'critical'];
DEFINE FIELD status ON TABLE incident TYPE string \
    ASSERT $value IN ['open', 'acknowledged', 'investigating', \
    'escalated', 'mitigating', 'resolved', 'closed'];
DEFINE FIELD escalation_level ON TABLE incident TYPE int DEFAULT 0;
DEFINE FIELD created_at ON TABLE incident TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE incident TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_incident_tenant_status ON TABLE incident \
    COLUMNS tenant_id, status;

-- =======================================================================
-- Escalation history (tenant scope)
-- =======================================================================
DEFINE TABLE escalation SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE escalation TYPE string;
DEFINE FIELD incident_id ON TABLE escalation TYPE string;
DEFINE FIELD from_level ON TABLE escalation TYPE int;
DEFINE FIELD to_level ON TABLE escalation TYPE int;
DEFINE FIELD reason ON TABLE escalation TYPE option<string>;
DEFINE FIELD escalated_by ON TABLE escalation TYPE option<string>;
DEFINE FIELD created_at ON TABLE escalation TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_escalation_incident ON TABLE escalation \
    COLUMNS incident_id, created_at;

-- =======================================================================
-- Audit Logs (append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD tenant_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD actor_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD actor_type ON TABLE audit_log TYPE string \
    ASSERT $value IN ['User', 'System'];
DEFINE FIELD action ON TABLE audit_log TYPE string;
DEFINE FIELD resource_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD outcome ON TABLE audit_log TYPE string \
    ASSERT $value IN ['Success', 'Failure', 'Denied'];
DEFINE FIELD metadata ON TABLE audit_log TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_tenant_time ON TABLE audit_log \
    COLUMNS tenant_id, timestamp;
DEFINE INDEX idx_audit_resource ON TABLE audit_log \
    COLUMNS resource_id;
";

// -----------------------------------------------------------------------
// Schema v2 — drift ledger, integrity flags, handoff sessions
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
-- =======================================================================
-- Clock drift log (append-only)
-- =======================================================================
DEFINE TABLE clock_drift_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD request_id ON TABLE clock_drift_log TYPE string;
DEFINE FIELD user_id ON TABLE clock_drift_log TYPE string;
DEFINE FIELD tenant_id ON TABLE clock_drift_log TYPE option<string>;
DEFINE FIELD client_timestamp ON TABLE clock_drift_log TYPE datetime;
DEFINE FIELD server_timestamp ON TABLE clock_drift_log TYPE datetime;
DEFINE FIELD drift_seconds ON TABLE clock_drift_log TYPE int;
DEFINE FIELD severity ON TABLE clock_drift_log TYPE string \
    ASSERT $value IN ['INFO', 'WARNING', 'CRITICAL'];
DEFINE FIELD action_type ON TABLE clock_drift_log TYPE option<string>;
DEFINE FIELD action_id ON TABLE clock_drift_log TYPE option<string>;
DEFINE FIELD created_at ON TABLE clock_drift_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_drift_user_time ON TABLE clock_drift_log \
    COLUMNS user_id, server_timestamp;
DEFINE INDEX idx_drift_tenant ON TABLE clock_drift_log \
    COLUMNS tenant_id;
DEFINE INDEX idx_drift_severity_time ON TABLE clock_drift_log \
    COLUMNS severity, server_timestamp;

-- =======================================================================
-- Attendance integrity flags (closed only by manual review)
-- =======================================================================
DEFINE TABLE attendance_integrity_flag SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update FULL
        FOR delete NONE;
DEFINE FIELD attendance_record_id ON TABLE attendance_integrity_flag \
    TYPE string;
DEFINE FIELD observation_id ON TABLE attendance_integrity_flag \
    TYPE string;
DEFINE FIELD flag_type ON TABLE attendance_integrity_flag TYPE string \
    ASSERT $value IN ['CLOCK_DRIFT_VIOLATION'];
DEFINE FIELD severity ON TABLE attendance_integrity_flag TYPE string \
    ASSERT $value IN ['HIGH', 'MEDIUM'];
DEFINE FIELD details ON TABLE attendance_integrity_flag \
    TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD reviewed ON TABLE attendance_integrity_flag TYPE bool \
    DEFAULT false;
DEFINE FIELD created_at ON TABLE attendance_integrity_flag \
    TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_flag_attendance_record ON TABLE attendance_integrity_flag \
    COLUMNS attendance_record_id;

-- =======================================================================
-- Handoff sessions
-- =======================================================================
DEFINE TABLE handoff_session SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE handoff_session TYPE string;
DEFINE FIELD from_admin ON TABLE handoff_session TYPE string;
DEFINE FIELD to_admin ON TABLE handoff_session TYPE string;
DEFINE FIELD status ON TABLE handoff_session TYPE string \
    ASSERT $value IN ['in-progress', 'accepted', 'completed'];
DEFINE FIELD start_time ON TABLE handoff_session TYPE datetime;
DEFINE FIELD end_time ON TABLE handoff_session TYPE option<datetime>;
DEFINE FIELD accepted_by ON TABLE handoff_session TYPE option<string>;
DEFINE FIELD accepted_at ON TABLE handoff_session \
    TYPE option<datetime>;
DEFINE FIELD system_health ON TABLE handoff_session \
    TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD incident_snapshot ON TABLE handoff_session \
    TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD briefing_notes ON TABLE handoff_session \
    TYPE option<string>;
DEFINE FIELD completion_notes ON TABLE handoff_session \
    TYPE option<string>;
DEFINE INDEX idx_handoff_session_tenant ON TABLE handoff_session \
    COLUMNS tenant_id, start_time;

-- =======================================================================
-- Handoff records (one per incident in a session)
-- =======================================================================
DEFINE TABLE handoff_record SCHEMAFULL;
DEFINE FIELD session_id ON TABLE handoff_record TYPE string;
DEFINE FIELD incident_id ON TABLE handoff_record TYPE string;
DEFINE FIELD ordinal ON TABLE handoff_record TYPE int;
DEFINE FIELD incident_title ON TABLE handoff_record TYPE string;
DEFINE FIELD severity ON TABLE handoff_record TYPE string \
    ASSERT $value IN ['low', 'medium', 'high', 'critical'];
DEFINE FIELD from_admin ON TABLE handoff_record TYPE string;
DEFINE FIELD to_admin ON TABLE handoff_record TYPE string;
DEFINE FIELD status ON TABLE handoff_record TYPE string \
    ASSERT $value IN ['pending', 'accepted', 'rejected'];
DEFINE FIELD context_brief ON TABLE handoff_record \
    TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD escalation_path ON TABLE handoff_record TYPE string;
DEFINE FIELD next_actions ON TABLE handoff_record TYPE array;
DEFINE FIELD next_actions.* ON TABLE handoff_record TYPE string;
DEFINE INDEX idx_handoff_record_session ON TABLE handoff_record \
    COLUMNS session_id, incident_id UNIQUE;
";

// -----------------------------------------------------------------------
// Runner
// -----------------------------------------------------------------------

/// Highest applied migration version, `0` on a fresh database.
pub async fn current_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version, name FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let applied: Vec<MigrationRecord> = result.take(0)?;
    Ok(applied.first().map_or(0, |m| m.version))
}

async fn apply<C: Connection>(db: &Surreal<C>, migration: &Migration) -> Result<(), DbError> {
    let failed = |stage: &str, e: surrealdb::Error| {
        DbError::Migration(format!(
            "v{} '{}' {stage}: {e}",
            migration.version, migration.name
        ))
    };

    db.query(migration.sql)
        .await?
        .check()
        .map_err(|e| failed("failed", e))?;
    db.query("CREATE _migration SET version = $version, name = $name")
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| failed("could not be recorded", e))?;
    Ok(())
}

/// Apply every migration newer than the database's current version.
///
/// Returns the versions applied by this call; empty when the schema was
/// already up to date.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<Vec<u32>, DbError> {
    let from = current_version(db).await?;
    let mut applied = Vec::new();

    for migration in MIGRATIONS.iter().filter(|m| m.version > from) {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        apply(db, migration).await?;
        applied.push(migration.version);
    }

    if applied.is_empty() {
        debug!(version = from, "Schema up to date");
    }
    Ok(applied)
}

/// DDL of one migration version.
pub fn schema_ddl(version: u32) -> Option<&'static str> {
    MIGRATIONS
        .iter()
        .find(|m| m.version == version)
        .map(|m| m.sql)
}

/// Latest schema version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_version_has_ddl() {
        for version in 1..=latest_version() {
            assert!(schema_ddl(version).is_some_and(|ddl| !ddl.is_empty()));
        }
        assert_eq!(schema_ddl(latest_version() + 1), None);
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn append_only_tables_forbid_mutation() {
        for table in ["audit_log", "clock_drift_log"] {
            let ddl = if table == "audit_log" { SCHEMA_V1 } else { SCHEMA_V2 };
            let start = ddl
                .find(&format!("DEFINE TABLE {table} SCHEMAFULL"))
                .expect("table defined");
            let block = &ddl[start..];
            let end = block.find(';').expect("statement terminated");
            assert!(block[..end].contains("FOR delete NONE"), "{table}");
            assert!(block[..end].contains("FOR update NONE"), "{table}");
        }
    }
}
