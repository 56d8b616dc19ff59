//! Escalation advisor.
//!
//! Advisory data for a handoff record. Reads that fail degrade to a neutral
//! value and are logged; they never fail the handoff.

use tracing::warn;
use uuid::Uuid;
use watchdesk_core::models::incident::{EscalationEntry, IncidentSeverity, IncidentStatus};
use watchdesk_core::repository::IncidentRepository;

pub const NO_ESCALATIONS: &str = "No escalations yet";
pub const UNKNOWN_PATH: &str = "Unknown";

/// Renders escalation history oldest first as `1. Level 1 (reason) → 2. Level 2`.
pub fn render_escalation_path(history: &[EscalationEntry]) -> String {
    if history.is_empty() {
        return NO_ESCALATIONS.to_string();
    }
    history
        .iter()
        .enumerate()
        .map(|(i, entry)| match entry.reason.as_deref() {
            Some(reason) if !reason.trim().is_empty() => {
                format!("{}. Level {} ({})", i + 1, entry.to_level, reason.trim())
            }
            _ => format!("{}. Level {}", i + 1, entry.to_level),
        })
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Canned next actions for an incident in `status`.
pub fn next_actions_for(status: IncidentStatus, severity: IncidentSeverity) -> Vec<String> {
    let actions: &[&str] = match status {
        IncidentStatus::Open => &[
            "Review incident description",
            "Assign investigation owner",
            "Acknowledge incident",
        ],
        IncidentStatus::Acknowledged => {
            let mut actions = vec![
                "Start investigation".to_string(),
                "Assign root cause if obvious".to_string(),
            ];
            if severity == IncidentSeverity::Critical {
                actions.push("Consider escalation to level_2+".to_string());
            }
            return actions;
        }
        IncidentStatus::Investigating => &[
            "Continue investigation",
            "Document root cause",
            "Prepare mitigation plan",
        ],
        IncidentStatus::Escalated => &[
            "Await escalation authority response",
            "Continue parallel investigation",
            "Prepare mitigation options",
        ],
        IncidentStatus::Mitigating => &[
            "Monitor mitigation effectiveness",
            "Prepare resolution summary",
            "Document remediation steps",
        ],
        IncidentStatus::Resolved | IncidentStatus::Closed => &["Review incident details"],
    };
    actions.iter().map(|a| a.to_string()).collect()
}

pub struct EscalationAdvisor<'a, I: IncidentRepository> {
    incidents: &'a I,
}

impl<'a, I: IncidentRepository> EscalationAdvisor<'a, I> {
    pub fn new(incidents: &'a I) -> Self {
        Self { incidents }
    }

    /// Escalation trail of an incident, or [`UNKNOWN_PATH`] if it cannot
    /// be read.
    pub async fn build_escalation_path(&self, tenant_id: Uuid, incident_id: Uuid) -> String {
        match self.incidents.escalation_history(tenant_id, incident_id).await {
            Ok(history) => render_escalation_path(&history),
            Err(e) => {
                warn!(%incident_id, error = %e, "Failed to read escalation history");
                UNKNOWN_PATH.to_string()
            }
        }
    }

    /// Suggested next actions; empty when the incident cannot be read.
    pub async fn suggest_next_actions(&self, tenant_id: Uuid, incident_id: Uuid) -> Vec<String> {
        match self.incidents.get_by_id(tenant_id, incident_id).await {
            Ok(incident) => next_actions_for(incident.status, incident.severity),
            Err(e) => {
                warn!(%incident_id, error = %e, "Failed to read incident for next actions");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(to_level: u32, reason: Option<&str>) -> EscalationEntry {
        EscalationEntry {
            id: Uuid::new_v4(),
            incident_id: Uuid::new_v4(),
            from_level: to_level.saturating_sub(1),
            to_level,
            reason: reason.map(String::from),
            escalated_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_history() {
        assert_eq!(render_escalation_path(&[]), "No escalations yet");
    }

    #[test]
    fn numbered_arrow_trail() {
        let path = render_escalation_path(&[
            entry(1, Some("no response from site")),
            entry(2, None),
            entry(3, Some("  ")),
        ]);
        assert_eq!(
            path,
            "1. Level 1 (no response from site) → 2. Level 2 → 3. Level 3"
        );
    }

    #[test]
    fn acknowledged_critical_adds_escalation_hint() {
        let high = next_actions_for(IncidentStatus::Acknowledged, IncidentSeverity::High);
        let critical = next_actions_for(IncidentStatus::Acknowledged, IncidentSeverity::Critical);
        assert_eq!(high.len(), 2);
        assert_eq!(critical.len(), 3);
        assert_eq!(critical[2], "Consider escalation to level_2+");
    }

    #[test]
    fn every_status_has_actions() {
        for status in [
            IncidentStatus::Open,
            IncidentStatus::Acknowledged,
            IncidentStatus::Investigating,
            IncidentStatus::Escalated,
            IncidentStatus::Mitigating,
            IncidentStatus::Resolved,
            IncidentStatus::Closed,
        ] {
            assert!(!next_actions_for(status, IncidentSeverity::Low).is_empty());
        }
        assert_eq!(
            next_actions_for(IncidentStatus::Closed, IncidentSeverity::Critical),
            vec!["Review incident details".to_string()]
        );
        assert_eq!(
            next_actions_for(IncidentStatus::Open, IncidentSeverity::Low)[0],
            "Review incident description"
        );
    }
}
