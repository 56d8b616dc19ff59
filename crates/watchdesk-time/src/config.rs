//! Time authority configuration.

use watchdesk_core::models::drift::{ATTENDANCE_MARKER, DriftSeverity};

/// Configuration for the time authority.
#[derive(Debug, Clone)]
pub struct TimeAuthorityConfig {
    /// Largest |drift| in seconds that `validate` still accepts (default: 300).
    pub max_acceptable_drift_secs: i64,
    /// Attendance actions block when |drift| exceeds this many seconds
    /// (default: 300, exclusive).
    pub attendance_block_threshold_secs: i64,
    /// Case-insensitive substring that marks an action type as
    /// attendance-affecting.
    pub attendance_marker: String,
    /// Observations at or above this severity are written to the ledger.
    /// Blocking observations are always written.
    pub log_threshold: DriftSeverity,
}

impl Default for TimeAuthorityConfig {
    fn default() -> Self {
        Self {
            max_acceptable_drift_secs: 300,
            attendance_block_threshold_secs: 300,
            attendance_marker: ATTENDANCE_MARKER.into(),
            log_threshold: DriftSeverity::Warning,
        }
    }
}
