//! Time authority facade: one call per time-sensitive request.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;
use watchdesk_core::error::WatchdeskResult;
use watchdesk_core::models::drift::{ClockDriftObservation, CreateDriftObservation, DriftSeverity};
use watchdesk_core::repository::DriftLedger;
use watchdesk_core::{BestEffort, Clock};

use crate::config::TimeAuthorityConfig;
use crate::evaluator::{BlockPolicy, DriftEvaluator, DriftValidation, compute_drift};

/// Input for a drift check.
#[derive(Debug, Clone)]
pub struct DriftCheckInput {
    pub request_id: String,
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    /// The client's claimed instant, if the request carried a readable one.
    pub client_timestamp: Option<DateTime<Utc>>,
    pub action_type: Option<String>,
    pub action_id: Option<String>,
    /// Attendance record to flag when the action is blocked.
    pub attendance_record_id: Option<Uuid>,
}

/// Outcome of a drift check. Blocking is a value, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftDecision {
    /// `None` when there was no claim to measure.
    pub drift_seconds: Option<i64>,
    pub severity: Option<DriftSeverity>,
    pub block: bool,
    pub reason: Option<String>,
    pub observation_id: Option<Uuid>,
    pub flag_id: Option<Uuid>,
}

impl DriftDecision {
    fn no_claim() -> Self {
        Self {
            drift_seconds: None,
            severity: None,
            block: false,
            reason: None,
            observation_id: None,
            flag_id: None,
        }
    }
}

/// Time authority service.
///
/// Generic over the ledger so the decision logic has no dependency on the
/// database crate.
pub struct TimeAuthority<L: DriftLedger, C: Clock> {
    ledger: L,
    evaluator: DriftEvaluator<C>,
    config: TimeAuthorityConfig,
}

impl<L: DriftLedger, C: Clock> TimeAuthority<L, C> {
    pub fn new(ledger: L, clock: C, config: TimeAuthorityConfig) -> Self {
        let policy = BlockPolicy::from_config(&config);
        Self {
            ledger,
            evaluator: DriftEvaluator::new(clock, policy),
            config,
        }
    }

    /// Validate a claim against the configured maximum drift.
    pub fn validate(&self, client: DateTime<Utc>) -> DriftValidation {
        self.evaluator
            .validate(client, self.config.max_acceptable_drift_secs)
    }

    /// CRITICAL observations on actions this authority treats as
    /// attendance, newest first.
    pub async fn critical_attendance_events(
        &self,
        limit: u64,
    ) -> WatchdeskResult<Vec<ClockDriftObservation>> {
        self.ledger
            .critical_attendance_events(&self.evaluator.policy().attendance_marker, limit)
            .await
    }

    /// Measure the request's claim, decide whether to block, and ledger
    /// the observation.
    ///
    /// Ledger failures never change the decision; they come back as
    /// warnings.
    pub async fn check(&self, input: DriftCheckInput) -> BestEffort<DriftDecision> {
        let Some(client) = input.client_timestamp else {
            return BestEffort::new(DriftDecision::no_claim());
        };

        let server = self.evaluator.now();
        let drift_seconds = compute_drift(client, server);
        let block = self
            .evaluator
            .should_block(drift_seconds, input.action_type.as_deref());

        let mut outcome = BestEffort::new(DriftDecision {
            drift_seconds: Some(drift_seconds),
            severity: Some(block.severity),
            block: block.block,
            reason: block.reason.clone(),
            observation_id: None,
            flag_id: None,
        });

        if block.block {
            warn!(
                request_id = %input.request_id,
                user_id = %input.user_id,
                drift_seconds,
                action_type = input.action_type.as_deref().unwrap_or(""),
                "Blocking attendance action for clock drift"
            );
        }

        if !block.block && block.severity < self.config.log_threshold {
            return outcome;
        }

        let observation = match self
            .ledger
            .record(CreateDriftObservation {
                request_id: input.request_id.clone(),
                user_id: input.user_id,
                tenant_id: input.tenant_id,
                client_timestamp: client,
                server_timestamp: server,
                drift_seconds,
                severity: block.severity,
                action_type: input.action_type.clone(),
                action_id: input.action_id.clone(),
            })
            .await
        {
            Ok(observation) => observation,
            Err(e) => {
                warn!(
                    request_id = %input.request_id,
                    error = %e,
                    "Failed to record drift observation"
                );
                outcome.warn("clock_drift_log.record", e);
                if block.block {
                    outcome.warn(
                        "attendance_integrity_flag.create",
                        "skipped: drift observation was not recorded",
                    );
                }
                return outcome;
            }
        };
        outcome.value.observation_id = Some(observation.id);

        if !block.block {
            return outcome;
        }

        match input.attendance_record_id {
            Some(record_id) => match self.ledger.flag(record_id, &observation).await {
                Ok(flag) => {
                    debug!(
                        flag_id = %flag.id,
                        attendance_record_id = %record_id,
                        "Attendance record flagged"
                    );
                    outcome.value.flag_id = Some(flag.id);
                }
                Err(e) => {
                    warn!(
                        attendance_record_id = %record_id,
                        error = %e,
                        "Failed to flag attendance record"
                    );
                    outcome.warn("attendance_integrity_flag.create", e);
                }
            },
            None => {
                warn!(
                    request_id = %input.request_id,
                    "Blocked attendance action carries no attendance record to flag"
                );
                outcome.warn(
                    "attendance_integrity_flag.create",
                    "no attendance record id supplied",
                );
            }
        }

        outcome
    }
}
