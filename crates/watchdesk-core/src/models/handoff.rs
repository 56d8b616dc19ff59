//! Admin handoff domain model.
//!
//! A [`HandoffSession`] transfers responsibility for every open incident
//! from one operator to another. Each incident gets a [`HandoffRecord`]
//! carrying a frozen snapshot of its context at handoff time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::incident::{Incident, IncidentSeverity, IncidentStatus};

/// Session-level lifecycle.
///
/// `InProgress → Accepted → Completed`, with `InProgress → Completed`
/// allowed for handoffs that are closed without an explicit accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandoffSessionStatus {
    InProgress,
    Accepted,
    Completed,
}

impl HandoffSessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandoffSessionStatus::InProgress => "in-progress",
            HandoffSessionStatus::Accepted => "accepted",
            HandoffSessionStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in-progress" => Some(HandoffSessionStatus::InProgress),
            "accepted" => Some(HandoffSessionStatus::Accepted),
            "completed" => Some(HandoffSessionStatus::Completed),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: HandoffSessionStatus) -> bool {
        use HandoffSessionStatus::*;
        matches!(
            (self, next),
            (InProgress, Accepted) | (InProgress, Completed) | (Accepted, Completed)
        )
    }

    /// Every status from which `next` is reachable in one step.
    pub fn predecessors(next: HandoffSessionStatus) -> Vec<HandoffSessionStatus> {
        use HandoffSessionStatus::*;
        [InProgress, Accepted, Completed]
            .into_iter()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }
}

/// Per-incident acknowledgement by the incoming operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Accepted => "accepted",
            RecordStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RecordStatus::Pending),
            "accepted" => Some(RecordStatus::Accepted),
            "rejected" => Some(RecordStatus::Rejected),
            _ => None,
        }
    }

    /// Records only leave `Pending`; a decision is final.
    pub fn can_transition_to(&self, next: RecordStatus) -> bool {
        *self == RecordStatus::Pending && next != RecordStatus::Pending
    }

    /// Every status a record may be decided from. Empty when `next` is not
    /// a decision.
    pub fn predecessors(next: RecordStatus) -> Vec<RecordStatus> {
        use RecordStatus::*;
        [Pending, Accepted, Rejected]
            .into_iter()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }
}

/// Point-in-time counters taken when a session is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub open_incidents: u64,
    pub escalated_incidents: u64,
    pub sla_at_risk: u64,
    pub critical_alerts: u64,
}

/// Summary of an incident as it stood at handoff time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentSnapshot {
    pub incident_id: Uuid,
    pub title: String,
    pub severity: IncidentSeverity,
    pub status: IncidentStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&Incident> for IncidentSnapshot {
    fn from(incident: &Incident) -> Self {
        Self {
            incident_id: incident.id,
            title: incident.title.clone(),
            severity: incident.severity,
            status: incident.status,
            created_at: incident.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBrief {
    pub status: IncidentStatus,
    pub created_at: DateTime<Utc>,
    pub escalation_level: u32,
}

impl ContextBrief {
    pub fn summary(&self) -> String {
        format!(
            "Current status: {}. Created: {}. Escalation level: {}.",
            self.status.as_str(),
            self.created_at.to_rfc3339(),
            self.escalation_level
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub incident_id: Uuid,
    pub incident_title: String,
    pub severity: IncidentSeverity,
    pub from_admin: Uuid,
    pub to_admin: Uuid,
    pub status: RecordStatus,
    pub context_brief: ContextBrief,
    /// Rendered escalation trail, oldest step first.
    pub escalation_path: String,
    pub next_actions: Vec<String>,
    /// Every open incident at session creation. The same snapshot is
    /// shared by all records of a session.
    pub active_incidents: Arc<[IncidentSnapshot]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffSession {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub from_admin: Uuid,
    pub to_admin: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: HandoffSessionStatus,
    /// Ordered by severity descending, then creation time ascending.
    pub incidents: Vec<HandoffRecord>,
    pub system_health: SystemHealth,
    pub briefing_notes: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completion_notes: Option<String>,
}

/// Result of closing a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffCompletion {
    pub session_id: Uuid,
    pub status: HandoffSessionStatus,
    pub completed_at: DateTime<Utc>,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Proceed,
    Delay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    Normal,
    Elevated,
    Critical,
    /// Health could not be read.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffRecommendation {
    pub recommended_action: RecommendedAction,
    pub system_status: SystemStatus,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
}
