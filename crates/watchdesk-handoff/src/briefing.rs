//! Plain-text briefing for a handoff session.

use watchdesk_core::models::handoff::HandoffSession;

const RULE: &str = "------------------------------------------------------------";

/// Render a session as a fixed-layout document: header, system health, one
/// block per incident, notes.
pub fn render_briefing(session: &HandoffSession) -> String {
    let mut lines = vec![
        "SHIFT HANDOFF BRIEFING".to_string(),
        RULE.to_string(),
        format!("Session:    {}", session.id),
        format!("Tenant:     {}", session.tenant_id),
        format!("From admin: {}", session.from_admin),
        format!("To admin:   {}", session.to_admin),
        format!("Status:     {}", session.status.as_str()),
        format!("Started:    {}", session.start_time.to_rfc3339()),
    ];
    if let Some(accepted_at) = session.accepted_at {
        lines.push(format!("Accepted:   {}", accepted_at.to_rfc3339()));
    }
    if let Some(end_time) = session.end_time {
        lines.push(format!("Ended:      {}", end_time.to_rfc3339()));
    }

    let health = &session.system_health;
    lines.extend([
        String::new(),
        "SYSTEM HEALTH".to_string(),
        RULE.to_string(),
        format!("Open incidents:      {}", health.open_incidents),
        format!("Escalated incidents: {}", health.escalated_incidents),
        format!("SLA at risk:         {}", health.sla_at_risk),
        format!("Critical alerts:     {}", health.critical_alerts),
        String::new(),
        format!("INCIDENTS ({})", session.incidents.len()),
        RULE.to_string(),
    ]);

    if session.incidents.is_empty() {
        lines.push("No open incidents at handoff time.".to_string());
    }
    for (i, record) in session.incidents.iter().enumerate() {
        lines.push(format!(
            "{}. [{}] {}",
            i + 1,
            record.severity.as_str().to_uppercase(),
            record.incident_title
        ));
        lines.push(format!("   Incident:        {}", record.incident_id));
        lines.push(format!("   Acknowledgement: {}", record.status.as_str()));
        lines.push(format!("   Context:         {}", record.context_brief.summary()));
        lines.push(format!("   Escalation path: {}", record.escalation_path));
        lines.push("   Next actions:".to_string());
        if record.next_actions.is_empty() {
            lines.push("     (none)".to_string());
        }
        for action in &record.next_actions {
            lines.push(format!("     - {action}"));
        }
        lines.push(String::new());
    }

    lines.extend([
        String::new(),
        "NOTES".to_string(),
        RULE.to_string(),
        format!(
            "Briefing:   {}",
            session.briefing_notes.as_deref().unwrap_or("(none)")
        ),
        format!(
            "Completion: {}",
            session.completion_notes.as_deref().unwrap_or("(none)")
        ),
    ]);

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use uuid::Uuid;
    use watchdesk_core::models::handoff::{
        ContextBrief, HandoffRecord, HandoffSessionStatus, RecordStatus, SystemHealth,
    };
    use watchdesk_core::models::incident::{IncidentSeverity, IncidentStatus};

    use super::*;

    fn session() -> HandoffSession {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap();
        let id = Uuid::new_v4();
        HandoffSession {
            id,
            tenant_id: Uuid::new_v4(),
            from_admin: Uuid::new_v4(),
            to_admin: Uuid::new_v4(),
            start_time: start,
            end_time: None,
            status: HandoffSessionStatus::InProgress,
            incidents: vec![HandoffRecord {
                id: Uuid::new_v4(),
                session_id: id,
                incident_id: Uuid::new_v4(),
                incident_title: "Turnstile B offline".into(),
                severity: IncidentSeverity::Critical,
                from_admin: Uuid::new_v4(),
                to_admin: Uuid::new_v4(),
                status: RecordStatus::Pending,
                context_brief: ContextBrief {
                    status: IncidentStatus::Investigating,
                    created_at: start,
                    escalation_level: 1,
                },
                escalation_path: "1. Level 1".into(),
                next_actions: vec!["Continue investigation".into()],
                active_incidents: Arc::from(Vec::new()),
            }],
            system_health: SystemHealth {
                open_incidents: 1,
                escalated_incidents: 0,
                sla_at_risk: 0,
                critical_alerts: 1,
            },
            briefing_notes: Some("Contractor on site until 22:00".into()),
            accepted_at: None,
            completion_notes: None,
        }
    }

    #[test]
    fn contains_required_sections() {
        let session = session();
        let doc = render_briefing(&session);

        assert!(doc.contains(&session.id.to_string()));
        assert!(doc.contains("SYSTEM HEALTH"));
        assert!(doc.contains("Critical alerts:     1"));
        assert!(doc.contains("1. [CRITICAL] Turnstile B offline"));
        assert!(doc.contains("Escalation path: 1. Level 1"));
        assert!(doc.contains("     - Continue investigation"));
        assert!(doc.contains("Briefing:   Contractor on site until 22:00"));
        assert!(doc.contains("Completion: (none)"));
    }

    #[test]
    fn empty_session_says_so() {
        let mut session = session();
        session.incidents.clear();
        let doc = render_briefing(&session);
        assert!(doc.contains("INCIDENTS (0)"));
        assert!(doc.contains("No open incidents at handoff time."));
    }
}
