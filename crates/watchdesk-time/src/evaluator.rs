//! Clock-drift evaluation.
//!
//! Pure computations over instants: measure drift, classify it, and decide
//! whether an action must be blocked. The only input that is not an
//! argument is "now", read from the injected [`Clock`] on every call.

use chrono::{DateTime, Utc};
use serde::Serialize;
use watchdesk_core::Clock;
use watchdesk_core::models::drift::{ATTENDANCE_MARKER, DriftSeverity};

use crate::config::TimeAuthorityConfig;

/// Largest |drift| still classified as INFO.
pub const INFO_MAX_SECS: i64 = 5;
/// Largest |drift| still classified as WARNING.
pub const WARNING_MAX_SECS: i64 = 60;
/// Attendance actions block strictly above this |drift|.
pub const ATTENDANCE_BLOCK_SECS: i64 = 300;
pub const DEFAULT_MAX_DRIFT_SECS: i64 = 300;

/// Signed drift in whole seconds; positive when the client is ahead.
///
/// Half-seconds round toward positive infinity.
pub fn compute_drift(client: DateTime<Utc>, server: DateTime<Utc>) -> i64 {
    let ms = client.signed_duration_since(server).num_milliseconds();
    ms.saturating_add(500).div_euclid(1000)
}

/// Severity depends only on magnitude. Band boundaries belong to the lower
/// band.
pub fn classify(drift_seconds: i64) -> DriftSeverity {
    match drift_seconds.unsigned_abs() {
        d if d <= INFO_MAX_SECS as u64 => DriftSeverity::Info,
        d if d <= WARNING_MAX_SECS as u64 => DriftSeverity::Warning,
        _ => DriftSeverity::Critical,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockDecision {
    pub block: bool,
    pub reason: Option<String>,
    pub severity: DriftSeverity,
}

/// When an action is refused for drift.
///
/// Only attendance actions ever block; severity and blocking are
/// independent.
#[derive(Debug, Clone)]
pub struct BlockPolicy {
    pub threshold_secs: i64,
    pub attendance_marker: String,
}

impl Default for BlockPolicy {
    fn default() -> Self {
        Self {
            threshold_secs: ATTENDANCE_BLOCK_SECS,
            attendance_marker: ATTENDANCE_MARKER.into(),
        }
    }
}

impl BlockPolicy {
    pub fn from_config(config: &TimeAuthorityConfig) -> Self {
        Self {
            threshold_secs: config.attendance_block_threshold_secs,
            attendance_marker: config.attendance_marker.to_ascii_lowercase(),
        }
    }

    pub fn is_attendance(&self, action_type: Option<&str>) -> bool {
        action_type.is_some_and(|a| {
            a.to_ascii_lowercase()
                .contains(self.attendance_marker.as_str())
        })
    }

    pub fn evaluate(&self, drift_seconds: i64, action_type: Option<&str>) -> BlockDecision {
        let severity = classify(drift_seconds);
        let exceeds = drift_seconds.unsigned_abs() > self.threshold_secs.unsigned_abs();

        if exceeds && self.is_attendance(action_type) {
            BlockDecision {
                block: true,
                reason: Some(format!(
                    "Clock drift of {drift_seconds}s exceeds the {}s limit for attendance actions",
                    self.threshold_secs
                )),
                severity,
            }
        } else {
            BlockDecision {
                block: false,
                reason: None,
                severity,
            }
        }
    }
}

/// [`BlockPolicy::evaluate`] with the default policy.
pub fn should_block(drift_seconds: i64, action_type: Option<&str>) -> BlockDecision {
    BlockPolicy::default().evaluate(drift_seconds, action_type)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftValidation {
    pub valid: bool,
    pub drift_seconds: i64,
    pub severity: DriftSeverity,
    pub message: String,
}

/// Measures client claims against the server clock.
pub struct DriftEvaluator<C: Clock> {
    clock: C,
    policy: BlockPolicy,
}

impl<C: Clock> DriftEvaluator<C> {
    pub fn new(clock: C, policy: BlockPolicy) -> Self {
        Self { clock, policy }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Drift of `client` against the current server instant. Repeated calls
    /// with the same claim drift apart as the clock advances.
    pub fn validate(
        &self,
        client: DateTime<Utc>,
        max_acceptable_drift_secs: i64,
    ) -> DriftValidation {
        let drift_seconds = compute_drift(client, self.clock.now());
        let severity = classify(drift_seconds);
        let valid = drift_seconds.unsigned_abs() <= max_acceptable_drift_secs.unsigned_abs();

        let direction = if drift_seconds > 0 { "ahead of" } else { "behind" };
        let message = if drift_seconds == 0 {
            "Client clock is in sync with server time".to_string()
        } else if valid {
            format!(
                "Client clock is {}s {direction} server time",
                drift_seconds.unsigned_abs()
            )
        } else {
            format!(
                "Client clock is {}s {direction} server time, exceeding the {}s limit",
                drift_seconds.unsigned_abs(),
                max_acceptable_drift_secs
            )
        };

        DriftValidation {
            valid,
            drift_seconds,
            severity,
            message,
        }
    }

    pub fn policy(&self) -> &BlockPolicy {
        &self.policy
    }

    pub fn should_block(&self, drift_seconds: i64, action_type: Option<&str>) -> BlockDecision {
        self.policy.evaluate(drift_seconds, action_type)
    }
}
