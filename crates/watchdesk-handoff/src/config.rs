//! Handoff configuration.

use chrono::Duration;

#[derive(Debug, Clone)]
pub struct HandoffConfig {
    /// More open incidents than this is a high-load risk (default: 10).
    pub high_load_threshold: u64,
    /// More risk factors than this makes the system status critical
    /// (default: 2).
    pub critical_status_threshold: usize,
    /// Open incidents older than this count as SLA-at-risk (default: 4h).
    pub sla_window: Duration,
    /// Maximum length of briefing notes in characters (default: 4000).
    pub max_briefing_notes_len: usize,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            high_load_threshold: 10,
            critical_status_threshold: 2,
            sla_window: Duration::hours(4),
            max_briefing_notes_len: 4000,
        }
    }
}
