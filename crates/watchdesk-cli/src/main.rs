//! Watchdesk operator CLI.

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use watchdesk_core::error::WatchdeskError;
use watchdesk_core::models::handoff::RecordStatus;
use watchdesk_core::repository::{AuditLogFilter, AuditLogRepository, DriftLedger, Pagination};
use watchdesk_core::SystemClock;
use watchdesk_db::{DbConfig, DbError, DbManager};
use watchdesk_handoff::{HandoffConfig, HandoffService, InitiateHandoff};
use watchdesk_time::{DriftCheckInput, TimeAuthority, TimeAuthorityConfig, extract_client_timestamp};

#[derive(Parser)]
#[command(name = "watchdesk", version, about = "Operations desk time authority and shift handoff")]
struct Cli {
    #[command(flatten)]
    db: DbArgs,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args)]
struct DbArgs {
    #[arg(long, env = "WATCHDESK_DB_URL", default_value = "127.0.0.1:8000")]
    db_url: String,
    #[arg(long, env = "WATCHDESK_DB_NAMESPACE", default_value = "watchdesk")]
    db_namespace: String,
    #[arg(long, env = "WATCHDESK_DB_NAME", default_value = "opsdesk")]
    db_name: String,
    #[arg(long, env = "WATCHDESK_DB_USER", default_value = "root")]
    db_user: String,
    #[arg(long, env = "WATCHDESK_DB_PASSWORD", default_value = "root", hide_env_values = true)]
    db_password: String,
}

impl From<DbArgs> for DbConfig {
    fn from(args: DbArgs) -> Self {
        DbConfig {
            url: args.db_url,
            namespace: args.db_namespace,
            database: args.db_name,
            username: args.db_user,
            password: args.db_password,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending schema migrations.
    Migrate,
    /// Go / no-go recommendation for a shift handoff.
    Recommend {
        #[arg(long)]
        tenant: Uuid,
    },
    /// Start a handoff session.
    Initiate {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        from: Uuid,
        #[arg(long)]
        to: Uuid,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Print the briefing document of a session.
    Brief {
        #[arg(long)]
        session: Uuid,
    },
    Accept {
        #[arg(long)]
        session: Uuid,
        #[arg(long)]
        admin: Uuid,
    },
    Complete {
        #[arg(long)]
        session: Uuid,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Accept or reject one incident of a session.
    Acknowledge {
        #[arg(long)]
        session: Uuid,
        #[arg(long)]
        incident: Uuid,
        #[arg(long)]
        admin: Uuid,
        #[arg(long, value_enum)]
        decision: Decision,
    },
    /// Measure a client timestamp against server time.
    CheckDrift {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        tenant: Option<Uuid>,
        /// Epoch milliseconds or RFC 3339. Missing or unreadable means no
        /// claim.
        #[arg(long)]
        claim: Option<String>,
        #[arg(long)]
        action: Option<String>,
        #[arg(long)]
        attendance_record: Option<Uuid>,
    },
    DriftStats {
        #[arg(long)]
        tenant: Uuid,
    },
    DriftHistory {
        #[arg(long)]
        user: Uuid,
        #[arg(long, default_value_t = 20)]
        limit: u64,
    },
    CriticalAttendance {
        #[arg(long, default_value_t = 50)]
        limit: u64,
    },
    /// Integrity flags raised on an attendance record.
    Flags {
        #[arg(long)]
        attendance_record: Uuid,
    },
    AuditLog {
        #[arg(long)]
        tenant: Option<Uuid>,
        #[arg(long)]
        action: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long, default_value_t = 50)]
        limit: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Decision {
    Accept,
    Reject,
}

impl From<Decision> for RecordStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accept => RecordStatus::Accepted,
            Decision::Reject => RecordStatus::Rejected,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Watchdesk(#[from] WatchdeskError),

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("watchdesk=info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let db = DbManager::connect(&cli.db.into()).await?;

    let handoff = || {
        HandoffService::new(
            db.incidents(),
            db.handoff_sessions(),
            db.audit_log(),
            SystemClock,
            HandoffConfig::default(),
        )
    };

    let time_authority = || {
        TimeAuthority::new(
            db.drift_ledger(),
            SystemClock,
            TimeAuthorityConfig::default(),
        )
    };

    match cli.cmd {
        Command::Migrate => {
            let applied = db.migrate().await?;
            info!(?applied, "Migrations applied");
            print_json(&json!({ "applied": applied }))?;
        }
        Command::Recommend { tenant } => print_json(&handoff().recommend(tenant).await)?,
        Command::Initiate {
            tenant,
            from,
            to,
            notes,
        } => {
            let session = handoff()
                .initiate(InitiateHandoff {
                    from_admin: from,
                    to_admin: to,
                    tenant_id: tenant,
                    briefing_notes: notes,
                })
                .await?;
            print_json(&session)?;
        }
        Command::Brief { session } => println!("{}", handoff().brief(session).await?),
        Command::Accept { session, admin } => {
            print_json(&handoff().accept(session, admin).await)?
        }
        Command::Complete { session, notes } => {
            print_json(&handoff().complete(session, &notes).await)?
        }
        Command::Acknowledge {
            session,
            incident,
            admin,
            decision,
        } => {
            let outcome = handoff()
                .acknowledge_incident(session, incident, decision.into(), admin)
                .await?;
            print_json(&outcome)?;
        }
        Command::CheckDrift {
            user,
            tenant,
            claim,
            action,
            attendance_record,
        } => {
            let outcome = time_authority()
                .check(DriftCheckInput {
                    request_id: Uuid::new_v4().to_string(),
                    user_id: user,
                    tenant_id: tenant,
                    client_timestamp: extract_client_timestamp(claim.as_deref(), None),
                    action_type: action,
                    action_id: None,
                    attendance_record_id: attendance_record,
                })
                .await;
            print_json(&outcome)?;
        }
        Command::DriftStats { tenant } => {
            print_json(&db.drift_ledger().tenant_stats(tenant).await?)?
        }
        Command::DriftHistory { user, limit } => {
            print_json(&db.drift_ledger().history(user, limit).await?)?
        }
        Command::CriticalAttendance { limit } => {
            print_json(&time_authority().critical_attendance_events(limit).await?)?
        }
        Command::Flags { attendance_record } => {
            print_json(&db.drift_ledger().list_flags(attendance_record).await?)?
        }
        Command::AuditLog {
            tenant,
            action,
            offset,
            limit,
        } => {
            let page = db
                .audit_log()
                .list(
                    AuditLogFilter {
                        tenant_id: tenant,
                        action,
                        ..Default::default()
                    },
                    Pagination { offset, limit },
                )
                .await?;
            print_json(&json!({
                "total": page.total,
                "offset": page.offset,
                "limit": page.limit,
                "items": page.items,
            }))?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_drift_claim(args: &[&str]) -> Option<String> {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.cmd {
            Command::CheckDrift { claim, .. } => claim,
            _ => panic!("expected check-drift"),
        }
    }

    #[test]
    fn check_drift_claim_is_optional() {
        let user = Uuid::new_v4().to_string();
        let claim = check_drift_claim(&["watchdesk", "check-drift", "--user", &user]);
        assert_eq!(claim, None);
        assert_eq!(extract_client_timestamp(claim.as_deref(), None), None);
    }

    #[test]
    fn unreadable_claim_means_no_claim() {
        let user = Uuid::new_v4().to_string();
        let claim = check_drift_claim(&[
            "watchdesk",
            "check-drift",
            "--user",
            &user,
            "--claim",
            "yesterday-ish",
            "--action",
            "attendance_checkin",
        ]);
        assert_eq!(claim.as_deref(), Some("yesterday-ish"));
        assert_eq!(extract_client_timestamp(claim.as_deref(), None), None);
    }

    #[test]
    fn epoch_millis_claim_is_read() {
        let user = Uuid::new_v4().to_string();
        let claim = check_drift_claim(&[
            "watchdesk",
            "check-drift",
            "--user",
            &user,
            "--claim",
            "1772436600000",
        ]);
        let ts = extract_client_timestamp(claim.as_deref(), None).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_772_436_600_000);
    }
}
