//! Handoff session manager.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;
use watchdesk_core::error::{WatchdeskError, WatchdeskResult};
use watchdesk_core::models::audit::{ActorType, AuditOutcome, CreateAuditLogEntry};
use watchdesk_core::models::handoff::{
    ContextBrief, HandoffCompletion, HandoffRecommendation, HandoffRecord, HandoffSession,
    HandoffSessionStatus, IncidentSnapshot, RecordStatus,
};
use watchdesk_core::models::incident::handoff_order;
use watchdesk_core::repository::{AuditLogRepository, HandoffSessionRepository, IncidentRepository};
use watchdesk_core::{BestEffort, Clock, ValidationErrors};

use crate::advisor::EscalationAdvisor;
use crate::briefing::render_briefing;
use crate::config::HandoffConfig;
use crate::recommendation;

/// Input for starting a handoff.
#[derive(Debug, Clone, Deserialize)]
pub struct InitiateHandoff {
    pub from_admin: Uuid,
    pub to_admin: Uuid,
    pub tenant_id: Uuid,
    pub briefing_notes: Option<String>,
}

impl InitiateHandoff {
    /// Every problem with the request, not just the first.
    pub fn validate(&self, config: &HandoffConfig) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.from_admin.is_nil() {
            errors.push("from_admin", "is required");
        }
        if self.to_admin.is_nil() {
            errors.push("to_admin", "is required");
        }
        if self.tenant_id.is_nil() {
            errors.push("tenant_id", "is required");
        }
        if !self.from_admin.is_nil() && self.from_admin == self.to_admin {
            errors.push("to_admin", "must differ from from_admin");
        }
        if let Some(notes) = &self.briefing_notes {
            let len = notes.chars().count();
            if len > config.max_briefing_notes_len {
                errors.push(
                    "briefing_notes",
                    format!(
                        "must be at most {} characters (got {len})",
                        config.max_briefing_notes_len
                    ),
                );
            }
        }
        errors.into_result()
    }
}

/// Handoff session manager.
///
/// Generic over repository implementations so that the handoff logic has
/// no dependency on the database crate.
pub struct HandoffService<I, H, A, C>
where
    I: IncidentRepository,
    H: HandoffSessionRepository,
    A: AuditLogRepository,
    C: Clock,
{
    incidents: I,
    sessions: H,
    audit: A,
    clock: C,
    config: HandoffConfig,
}

impl<I, H, A, C> HandoffService<I, H, A, C>
where
    I: IncidentRepository,
    H: HandoffSessionRepository,
    A: AuditLogRepository,
    C: Clock,
{
    pub fn new(incidents: I, sessions: H, audit: A, clock: C, config: HandoffConfig) -> Self {
        Self {
            incidents,
            sessions,
            audit,
            clock,
            config,
        }
    }

    /// Start a handoff: snapshot health and open incidents and build one
    /// record per incident.
    ///
    /// The returned session is authoritative even when storing it failed;
    /// such failures come back as warnings.
    pub async fn initiate(
        &self,
        request: InitiateHandoff,
    ) -> WatchdeskResult<BestEffort<HandoffSession>> {
        request.validate(&self.config)?;

        let now = self.clock.now();
        let tenant_id = request.tenant_id;
        let (health, open) = futures::join!(
            self.incidents
                .health_snapshot(tenant_id, now - self.config.sla_window),
            self.incidents.list_open(tenant_id),
        );
        let health = health?;
        let mut open = open?;
        open.sort_by(handoff_order);

        let active: Arc<[IncidentSnapshot]> = open.iter().map(IncidentSnapshot::from).collect();

        let advisor = EscalationAdvisor::new(&self.incidents);
        let advice = join_all(open.iter().map(|incident| {
            let advisor = &advisor;
            async move {
                futures::join!(
                    advisor.build_escalation_path(tenant_id, incident.id),
                    advisor.suggest_next_actions(tenant_id, incident.id),
                )
            }
        }))
        .await;

        let session_id = Uuid::new_v4();
        let records = open
            .iter()
            .zip(advice)
            .map(|(incident, (escalation_path, next_actions))| HandoffRecord {
                id: Uuid::new_v4(),
                session_id,
                incident_id: incident.id,
                incident_title: incident.title.clone(),
                severity: incident.severity,
                from_admin: request.from_admin,
                to_admin: request.to_admin,
                status: RecordStatus::Pending,
                context_brief: ContextBrief {
                    status: incident.status,
                    created_at: incident.created_at,
                    escalation_level: incident.escalation_level,
                },
                escalation_path,
                next_actions,
                active_incidents: Arc::clone(&active),
            })
            .collect::<Vec<_>>();

        let session = HandoffSession {
            id: session_id,
            tenant_id,
            from_admin: request.from_admin,
            to_admin: request.to_admin,
            start_time: now,
            end_time: None,
            status: HandoffSessionStatus::InProgress,
            incidents: records,
            system_health: health,
            briefing_notes: request.briefing_notes,
            accepted_at: None,
            completion_notes: None,
        };

        let mut outcome = BestEffort::new(());
        let stored = self.sessions.create(&session).await.inspect_err(|e| {
            warn!(%session_id, error = %e, "Failed to store handoff session");
        });
        outcome.absorb("handoff_session.create", stored);

        self.record_audit(
            &mut outcome,
            CreateAuditLogEntry {
                tenant_id: Some(tenant_id),
                actor_id: Some(request.from_admin),
                actor_type: ActorType::User,
                action: "handoff.initiated".into(),
                resource_id: Some(session_id),
                outcome: AuditOutcome::Success,
                metadata: Some(json!({
                    "to_admin": request.to_admin.to_string(),
                    "incident_count": session.incidents.len(),
                    "system_health": session.system_health,
                })),
                timestamp: now,
            },
        )
        .await;

        info!(
            %session_id,
            %tenant_id,
            incidents = session.incidents.len(),
            degraded = outcome.is_degraded(),
            "Handoff session initiated"
        );

        Ok(outcome.map(|()| session))
    }

    /// The incoming admin accepts the session.
    pub async fn accept(&self, session_id: Uuid, to_admin: Uuid) -> BestEffort<()> {
        let now = self.clock.now();
        let mut outcome = BestEffort::new(());

        let tenant_id = self
            .transition(
                &mut outcome,
                session_id,
                HandoffSessionStatus::Accepted,
                self.sessions.mark_accepted(session_id, to_admin, now),
            )
            .await;

        self.record_audit(
            &mut outcome,
            CreateAuditLogEntry {
                tenant_id,
                actor_id: Some(to_admin),
                actor_type: ActorType::User,
                action: "handoff.accepted".into(),
                resource_id: Some(session_id),
                outcome: audit_outcome(tenant_id),
                metadata: None,
                timestamp: now,
            },
        )
        .await;

        outcome
    }

    /// Close the session. The summary is produced whether or not the store
    /// accepted the transition. Completion names no actor and is audited as
    /// a system event.
    pub async fn complete(
        &self,
        session_id: Uuid,
        completion_notes: &str,
    ) -> BestEffort<HandoffCompletion> {
        let now = self.clock.now();
        let mut outcome = BestEffort::new(());

        let tenant_id = self
            .transition(
                &mut outcome,
                session_id,
                HandoffSessionStatus::Completed,
                self.sessions.mark_completed(session_id, completion_notes, now),
            )
            .await;

        self.record_audit(
            &mut outcome,
            CreateAuditLogEntry {
                tenant_id,
                actor_id: None,
                actor_type: ActorType::System,
                action: "handoff.completed".into(),
                resource_id: Some(session_id),
                outcome: audit_outcome(tenant_id),
                metadata: Some(json!({ "completion_notes": completion_notes })),
                timestamp: now,
            },
        )
        .await;

        outcome.map(|()| HandoffCompletion {
            session_id,
            status: HandoffSessionStatus::Completed,
            completed_at: now,
            summary: completion_summary(session_id, now, completion_notes),
        })
    }

    /// Advisory go / no-go. Never fails: an unreadable store yields an
    /// `unknown` status carrying the error.
    pub async fn recommend(&self, tenant_id: Uuid) -> HandoffRecommendation {
        let cutoff = self.clock.now() - self.config.sla_window;
        match self.incidents.health_snapshot(tenant_id, cutoff).await {
            Ok(health) => recommendation::assess(&health, &self.config),
            Err(e) => {
                warn!(%tenant_id, error = %e, "Failed to read system health for recommendation");
                recommendation::unknown(e)
            }
        }
    }

    /// Render the stored session as a briefing document.
    pub async fn brief(&self, session_id: Uuid) -> WatchdeskResult<String> {
        let session = self.sessions.get_by_id(session_id).await?;
        Ok(render_briefing(&session))
    }

    pub async fn get_session(&self, session_id: Uuid) -> WatchdeskResult<HandoffSession> {
        self.sessions.get_by_id(session_id).await
    }

    /// Accept or reject a single incident of a session.
    ///
    /// Returns `false` when the record had already been decided.
    pub async fn acknowledge_incident(
        &self,
        session_id: Uuid,
        incident_id: Uuid,
        decision: RecordStatus,
        actor_id: Uuid,
    ) -> WatchdeskResult<BestEffort<bool>> {
        if RecordStatus::predecessors(decision).is_empty() {
            let mut errors = ValidationErrors::new();
            errors.push("decision", "must be accepted or rejected");
            return Err(errors.into());
        }

        let session = self.sessions.get_by_id(session_id).await?;
        if !session.incidents.iter().any(|r| r.incident_id == incident_id) {
            return Err(WatchdeskError::not_found("handoff_record", incident_id));
        }

        let changed = self
            .sessions
            .set_record_status(session_id, incident_id, decision)
            .await?;

        let mut outcome = BestEffort::new(());
        let action = match decision {
            RecordStatus::Rejected => "handoff.incident_rejected",
            _ => "handoff.incident_accepted",
        };
        self.record_audit(
            &mut outcome,
            CreateAuditLogEntry {
                tenant_id: Some(session.tenant_id),
                actor_id: Some(actor_id),
                actor_type: ActorType::User,
                action: action.into(),
                resource_id: Some(session_id),
                outcome: if changed {
                    AuditOutcome::Success
                } else {
                    AuditOutcome::Denied
                },
                metadata: Some(json!({ "incident_id": incident_id.to_string() })),
                timestamp: self.clock.now(),
            },
        )
        .await;

        Ok(outcome.map(|()| changed))
    }

    /// Run a status transition, turning refusal and store failure into
    /// warnings. Returns the session's tenant when the transition landed.
    async fn transition<T>(
        &self,
        outcome: &mut BestEffort<T>,
        session_id: Uuid,
        next: HandoffSessionStatus,
        write: impl Future<Output = WatchdeskResult<Option<Uuid>>>,
    ) -> Option<Uuid> {
        let operation = format!("handoff_session.{}", next.as_str());
        match write.await {
            Ok(Some(tenant_id)) => {
                info!(%session_id, status = next.as_str(), "Handoff session transitioned");
                Some(tenant_id)
            }
            Ok(None) => {
                warn!(%session_id, status = next.as_str(), "Handoff session transition refused");
                outcome.warn(
                    operation,
                    format!("session {session_id} cannot move to {}", next.as_str()),
                );
                None
            }
            Err(e) => {
                warn!(%session_id, error = %e, "Failed to store handoff session transition");
                outcome.warn(operation, e);
                None
            }
        }
    }

    async fn record_audit<T>(&self, outcome: &mut BestEffort<T>, entry: CreateAuditLogEntry) {
        let action = entry.action.clone();
        let appended = self.audit.append(entry).await.inspect_err(|e| {
            warn!(%action, error = %e, "Failed to append audit entry");
        });
        outcome.absorb("audit_log.append", appended);
    }
}

fn audit_outcome(tenant_id: Option<Uuid>) -> AuditOutcome {
    if tenant_id.is_some() {
        AuditOutcome::Success
    } else {
        AuditOutcome::Failure
    }
}

fn completion_summary(session_id: Uuid, completed_at: DateTime<Utc>, notes: &str) -> String {
    let notes = notes.trim();
    if notes.is_empty() {
        format!(
            "Handoff session {session_id} completed at {}.",
            completed_at.to_rfc3339()
        )
    } else {
        format!(
            "Handoff session {session_id} completed at {}. Notes: {notes}",
            completed_at.to_rfc3339()
        )
    }
}
