//! Incident read models.
//!
//! Incidents are owned by the incident-management service; this crate only
//! reads them. The types here describe the fields the handoff workflow
//! relies on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Incident severity. Variant order is ascending urgency, so `Ord`
/// compares by urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl IncidentSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentSeverity::Low => "low",
            IncidentSeverity::Medium => "medium",
            IncidentSeverity::High => "high",
            IncidentSeverity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(IncidentSeverity::Low),
            "medium" => Some(IncidentSeverity::Medium),
            "high" => Some(IncidentSeverity::High),
            "critical" => Some(IncidentSeverity::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    Acknowledged,
    Investigating,
    Escalated,
    Mitigating,
    Resolved,
    Closed,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "open",
            IncidentStatus::Acknowledged => "acknowledged",
            IncidentStatus::Investigating => "investigating",
            IncidentStatus::Escalated => "escalated",
            IncidentStatus::Mitigating => "mitigating",
            IncidentStatus::Resolved => "resolved",
            IncidentStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(IncidentStatus::Open),
            "acknowledged" => Some(IncidentStatus::Acknowledged),
            "investigating" => Some(IncidentStatus::Investigating),
            "escalated" => Some(IncidentStatus::Escalated),
            "mitigating" => Some(IncidentStatus::Mitigating),
            "resolved" => Some(IncidentStatus::Resolved),
            "closed" => Some(IncidentStatus::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub description: String,
    pub severity: IncidentSeverity,
    pub status: IncidentStatus,
    pub escalation_level: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to register an incident in the incident store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIncident {
    pub tenant_id: Uuid,
    pub title: String,
    pub description: String,
    pub severity: IncidentSeverity,
    pub status: IncidentStatus,
    /// Overrides the store's creation time (imports, fixtures).
    pub created_at: Option<DateTime<Utc>>,
}

/// One step in an incident's escalation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationEntry {
    pub id: Uuid,
    pub incident_id: Uuid,
    pub from_level: u32,
    pub to_level: u32,
    pub reason: Option<String>,
    pub escalated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEscalation {
    pub tenant_id: Uuid,
    pub incident_id: Uuid,
    pub to_level: u32,
    pub reason: Option<String>,
    pub escalated_by: Option<Uuid>,
}

/// Sort key placing the most severe, oldest incidents first.
pub fn handoff_order(a: &Incident, b: &Incident) -> std::cmp::Ordering {
    b.severity
        .cmp(&a.severity)
        .then(a.created_at.cmp(&b.created_at))
}
