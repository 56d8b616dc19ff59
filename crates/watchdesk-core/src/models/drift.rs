//! Clock-drift observation and attendance integrity flag models.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Marker that identifies attendance-affecting action types.
pub const ATTENDANCE_MARKER: &str = "attendance";

/// Number of users reported in [`TenantDriftStats::top_users`].
pub const TOP_USERS_LIMIT: usize = 10;

/// Severity bucket derived from the magnitude of a drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftSeverity {
    Info,
    Warning,
    Critical,
}

impl DriftSeverity {
    pub const ALL: [DriftSeverity; 3] = [
        DriftSeverity::Info,
        DriftSeverity::Warning,
        DriftSeverity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DriftSeverity::Info => "INFO",
            DriftSeverity::Warning => "WARNING",
            DriftSeverity::Critical => "CRITICAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INFO" => Some(DriftSeverity::Info),
            "WARNING" => Some(DriftSeverity::Warning),
            "CRITICAL" => Some(DriftSeverity::Critical),
            _ => None,
        }
    }
}

/// A single, immutable drift measurement.
///
/// `drift_seconds` is signed: positive means the client is ahead of the
/// server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockDriftObservation {
    pub id: Uuid,
    pub request_id: String,
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub client_timestamp: DateTime<Utc>,
    /// Always taken from the server clock, never from the caller.
    pub server_timestamp: DateTime<Utc>,
    pub drift_seconds: i64,
    pub severity: DriftSeverity,
    pub action_type: Option<String>,
    pub action_id: Option<String>,
}

/// Fields required to append a drift observation to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDriftObservation {
    pub request_id: String,
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub client_timestamp: DateTime<Utc>,
    pub server_timestamp: DateTime<Utc>,
    pub drift_seconds: i64,
    pub severity: DriftSeverity,
    pub action_type: Option<String>,
    pub action_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityFlagType {
    ClockDriftViolation,
}

impl IntegrityFlagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrityFlagType::ClockDriftViolation => "CLOCK_DRIFT_VIOLATION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CLOCK_DRIFT_VIOLATION" => Some(IntegrityFlagType::ClockDriftViolation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagSeverity {
    High,
    Medium,
}

impl FlagSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagSeverity::High => "HIGH",
            FlagSeverity::Medium => "MEDIUM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HIGH" => Some(FlagSeverity::High),
            "MEDIUM" => Some(FlagSeverity::Medium),
            _ => None,
        }
    }
}

impl From<DriftSeverity> for FlagSeverity {
    fn from(severity: DriftSeverity) -> Self {
        match severity {
            DriftSeverity::Critical => FlagSeverity::High,
            DriftSeverity::Warning | DriftSeverity::Info => FlagSeverity::Medium,
        }
    }
}

/// Marks an attendance record as suspect pending manual review.
///
/// Flags are never removed automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceIntegrityFlag {
    pub id: Uuid,
    pub attendance_record_id: Uuid,
    pub observation_id: Uuid,
    pub flag_type: IntegrityFlagType,
    pub severity: FlagSeverity,
    pub details: serde_json::Value,
    pub reviewed: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityStats {
    pub severity: DriftSeverity,
    pub count: u64,
    pub average_abs_drift: f64,
    pub max_abs_drift: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDriftSummary {
    pub user_id: Uuid,
    pub total_count: u64,
    pub critical_count: u64,
    pub warning_count: u64,
    pub average_abs_drift: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantDriftStats {
    pub tenant_id: Uuid,
    pub total_observations: u64,
    /// One entry per severity that occurred, ordered INFO, WARNING, CRITICAL.
    pub by_severity: Vec<SeverityStats>,
    /// Ranked by critical count, then total count, both descending.
    pub top_users: Vec<UserDriftSummary>,
}

#[derive(Default)]
struct Accumulator {
    count: u64,
    abs_sum: u64,
    max_abs: i64,
}

impl Accumulator {
    fn add(&mut self, drift: i64) {
        let abs = drift.unsigned_abs();
        self.count = self.count.saturating_add(1);
        self.abs_sum = self.abs_sum.saturating_add(abs);
        self.max_abs = self.max_abs.max(abs.min(i64::MAX as u64) as i64);
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.abs_sum as f64 / self.count as f64
        }
    }
}

impl TenantDriftStats {
    /// Aggregate `(user_id, drift_seconds, severity)` samples for a tenant.
    pub fn from_samples<I>(tenant_id: Uuid, samples: I) -> Self
    where
        I: IntoIterator<Item = (Uuid, i64, DriftSeverity)>,
    {
        let mut by_severity: HashMap<DriftSeverity, Accumulator> = HashMap::new();
        let mut by_user: HashMap<Uuid, (Accumulator, u64, u64)> = HashMap::new();
        let mut total = 0u64;

        for (user_id, drift, severity) in samples {
            total = total.saturating_add(1);
            by_severity.entry(severity).or_default().add(drift);

            let entry = by_user.entry(user_id).or_default();
            entry.0.add(drift);
            match severity {
                DriftSeverity::Critical => entry.1 = entry.1.saturating_add(1),
                DriftSeverity::Warning => entry.2 = entry.2.saturating_add(1),
                DriftSeverity::Info => {}
            }
        }

        let by_severity = DriftSeverity::ALL
            .iter()
            .filter_map(|severity| {
                by_severity.get(severity).map(|acc| SeverityStats {
                    severity: *severity,
                    count: acc.count,
                    average_abs_drift: acc.mean(),
                    max_abs_drift: acc.max_abs,
                })
            })
            .collect();

        let mut top_users: Vec<UserDriftSummary> = by_user
            .into_iter()
            .map(|(user_id, (acc, critical, warning))| UserDriftSummary {
                user_id,
                total_count: acc.count,
                critical_count: critical,
                warning_count: warning,
                average_abs_drift: acc.mean(),
            })
            .collect();
        top_users.sort_by(|a, b| {
            b.critical_count
                .cmp(&a.critical_count)
                .then(b.total_count.cmp(&a.total_count))
                .then(a.user_id.cmp(&b.user_id))
        });
        top_users.truncate(TOP_USERS_LIMIT);

        Self {
            tenant_id,
            total_observations: total,
            by_severity,
            top_users,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_severity_mapping() {
        assert_eq!(FlagSeverity::from(DriftSeverity::Critical), FlagSeverity::High);
        assert_eq!(FlagSeverity::from(DriftSeverity::Warning), FlagSeverity::Medium);
        assert_eq!(FlagSeverity::from(DriftSeverity::Info), FlagSeverity::Medium);
    }

    #[test]
    fn severity_strings_round_trip() {
        for severity in DriftSeverity::ALL {
            assert_eq!(DriftSeverity::parse(severity.as_str()), Some(severity));
        }
        assert_eq!(DriftSeverity::parse("info"), None);
    }

    #[test]
    fn stats_rank_users_by_critical_then_total() {
        let tenant = Uuid::new_v4();
        let noisy = Uuid::new_v4();
        let critical = Uuid::new_v4();

        let mut samples = Vec::new();
        for _ in 0..5 {
            samples.push((noisy, 10, DriftSeverity::Warning));
        }
        samples.push((critical, -400, DriftSeverity::Critical));
        samples.push((critical, 2, DriftSeverity::Info));

        let stats = TenantDriftStats::from_samples(tenant, samples);

        assert_eq!(stats.total_observations, 7);
        assert_eq!(stats.top_users[0].user_id, critical);
        assert_eq!(stats.top_users[0].critical_count, 1);
        assert_eq!(stats.top_users[1].user_id, noisy);
        assert_eq!(stats.top_users[1].total_count, 5);

        let severities: Vec<_> = stats.by_severity.iter().map(|s| s.severity).collect();
        assert_eq!(
            severities,
            vec![DriftSeverity::Info, DriftSeverity::Warning, DriftSeverity::Critical]
        );
        let critical_stats = &stats.by_severity[2];
        assert_eq!(critical_stats.max_abs_drift, 400);
        assert_eq!(critical_stats.average_abs_drift, 400.0);
    }

    #[test]
    fn extreme_drifts_saturate_instead_of_overflowing() {
        let user = Uuid::new_v4();
        let samples = [i64::MIN, i64::MAX, i64::MIN + 1]
            .into_iter()
            .map(|d| (user, d, DriftSeverity::Critical));
        let stats = TenantDriftStats::from_samples(Uuid::new_v4(), samples);

        let critical = &stats.by_severity[0];
        assert_eq!(critical.count, 3);
        assert_eq!(critical.max_abs_drift, i64::MAX);
        assert_eq!(critical.average_abs_drift, u64::MAX as f64 / 3.0);
        assert_eq!(stats.top_users[0].critical_count, 3);
    }

    #[test]
    fn top_users_capped_at_ten() {
        let samples = (0..15).map(|_| (Uuid::new_v4(), 30, DriftSeverity::Warning));
        let stats = TenantDriftStats::from_samples(Uuid::new_v4(), samples);
        assert_eq!(stats.top_users.len(), TOP_USERS_LIMIT);
        assert_eq!(stats.total_observations, 15);
    }
}
