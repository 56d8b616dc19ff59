//! Integration tests for the handoff session manager.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;
use watchdesk_core::error::{WatchdeskError, WatchdeskResult};
use watchdesk_core::models::audit::ActorType;
use watchdesk_core::models::handoff::{
    HandoffSession, HandoffSessionStatus, RecommendedAction, RecordStatus, SystemHealth,
    SystemStatus,
};
use watchdesk_core::models::incident::{
    CreateEscalation, CreateIncident, EscalationEntry, Incident, IncidentSeverity,
    IncidentStatus,
};
use watchdesk_core::repository::{
    AuditLogFilter, AuditLogRepository, HandoffSessionRepository, IncidentRepository, Pagination,
};
use watchdesk_core::ManualClock;
use watchdesk_db::repository::{
    SurrealAuditLogRepository, SurrealHandoffSessionRepository, SurrealIncidentRepository,
};
use watchdesk_handoff::{EscalationAdvisor, HandoffConfig, HandoffService, InitiateHandoff};

type Service<H> = HandoffService<
    SurrealIncidentRepository<Db>,
    H,
    SurrealAuditLogRepository<Db>,
    Arc<ManualClock>,
>;

struct Fixture {
    db: Surreal<Db>,
    clock: Arc<ManualClock>,
    tenant_id: Uuid,
    from_admin: Uuid,
    to_admin: Uuid,
}

impl Fixture {
    async fn new() -> Self {
        let db = Surreal::new::<Mem>(()).await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        watchdesk_db::run_migrations(&db).await.unwrap();
        Self {
            db,
            clock: Arc::new(ManualClock::new(Utc::now())),
            tenant_id: Uuid::new_v4(),
            from_admin: Uuid::new_v4(),
            to_admin: Uuid::new_v4(),
        }
    }

    fn incidents(&self) -> SurrealIncidentRepository<Db> {
        SurrealIncidentRepository::new(self.db.clone())
    }

    fn audit(&self) -> SurrealAuditLogRepository<Db> {
        SurrealAuditLogRepository::new(self.db.clone())
    }

    fn service(&self) -> Service<SurrealHandoffSessionRepository<Db>> {
        self.service_with(SurrealHandoffSessionRepository::new(self.db.clone()))
    }

    fn service_with<H: HandoffSessionRepository>(&self, sessions: H) -> Service<H> {
        self.service_over(self.incidents(), sessions)
    }

    fn service_over<I: IncidentRepository, H: HandoffSessionRepository>(
        &self,
        incidents: I,
        sessions: H,
    ) -> HandoffService<I, H, SurrealAuditLogRepository<Db>, Arc<ManualClock>> {
        HandoffService::new(
            incidents,
            sessions,
            self.audit(),
            Arc::clone(&self.clock),
            HandoffConfig::default(),
        )
    }

    /// Move time on so audit entries order deterministically.
    fn tick(&self) {
        self.clock.advance(Duration::seconds(1));
    }

    fn request(&self) -> InitiateHandoff {
        InitiateHandoff {
            from_admin: self.from_admin,
            to_admin: self.to_admin,
            tenant_id: self.tenant_id,
            briefing_notes: Some("Fire drill scheduled for 06:00".into()),
        }
    }

    async fn incident(
        &self,
        title: &str,
        severity: IncidentSeverity,
        status: IncidentStatus,
        age: Duration,
    ) -> Uuid {
        self.incidents()
            .create(CreateIncident {
                tenant_id: self.tenant_id,
                title: title.into(),
                description: String::new(),
                severity,
                status,
                created_at: Some(Utc::now() - age),
            })
            .await
            .unwrap()
            .id
    }

    async fn audit_actions(&self) -> Vec<String> {
        self.audit()
            .list(AuditLogFilter::default(), Pagination::default())
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|e| e.action)
            .collect()
    }
}

/// A session store that is never reachable.
struct OfflineSessions;

fn offline<T>() -> WatchdeskResult<T> {
    Err(WatchdeskError::Persistence("handoff store offline".into()))
}

impl HandoffSessionRepository for OfflineSessions {
    async fn create(&self, _: &HandoffSession) -> WatchdeskResult<()> {
        offline()
    }
    async fn get_by_id(&self, _: Uuid) -> WatchdeskResult<HandoffSession> {
        offline()
    }
    async fn mark_accepted(
        &self,
        _: Uuid,
        _: Uuid,
        _: DateTime<Utc>,
    ) -> WatchdeskResult<Option<Uuid>> {
        offline()
    }
    async fn mark_completed(
        &self,
        _: Uuid,
        _: &str,
        _: DateTime<Utc>,
    ) -> WatchdeskResult<Option<Uuid>> {
        offline()
    }
    async fn set_record_status(&self, _: Uuid, _: Uuid, _: RecordStatus) -> WatchdeskResult<bool> {
        offline()
    }
}

/// An incident store whose per-incident reads fail. With `lists` set, the
/// tenant-wide reads still go to the real store; without it every read
/// fails.
struct FlakyIncidents {
    lists: Option<SurrealIncidentRepository<Db>>,
}

fn incidents_offline<T>() -> WatchdeskResult<T> {
    Err(WatchdeskError::Persistence("incident store offline".into()))
}

impl IncidentRepository for FlakyIncidents {
    async fn get_by_id(&self, _: Uuid, _: Uuid) -> WatchdeskResult<Incident> {
        incidents_offline()
    }
    async fn list_open(&self, tenant_id: Uuid) -> WatchdeskResult<Vec<Incident>> {
        match &self.lists {
            Some(store) => store.list_open(tenant_id).await,
            None => incidents_offline(),
        }
    }
    async fn health_snapshot(
        &self,
        tenant_id: Uuid,
        sla_cutoff: DateTime<Utc>,
    ) -> WatchdeskResult<SystemHealth> {
        match &self.lists {
            Some(store) => store.health_snapshot(tenant_id, sla_cutoff).await,
            None => incidents_offline(),
        }
    }
    async fn escalation_history(&self, _: Uuid, _: Uuid) -> WatchdeskResult<Vec<EscalationEntry>> {
        incidents_offline()
    }
}

#[tokio::test]
async fn initiate_orders_records_and_shares_snapshot() {
    let fx = Fixture::new().await;
    fx.incident("A", IncidentSeverity::Low, IncidentStatus::Open, Duration::minutes(20))
        .await;
    let b = fx
        .incident(
            "B",
            IncidentSeverity::Critical,
            IncidentStatus::Acknowledged,
            Duration::minutes(30),
        )
        .await;
    fx.incident("C", IncidentSeverity::Critical, IncidentStatus::Open, Duration::minutes(10))
        .await;
    fx.incidents()
        .record_escalation(CreateEscalation {
            tenant_id: fx.tenant_id,
            incident_id: b,
            to_level: 1,
            reason: Some("site unreachable".into()),
            escalated_by: Some(fx.from_admin),
        })
        .await
        .unwrap();

    let outcome = fx.service().initiate(fx.request()).await.unwrap();
    assert!(!outcome.is_degraded(), "{:?}", outcome.warnings);
    let session = outcome.value;

    let titles: Vec<_> = session
        .incidents
        .iter()
        .map(|r| r.incident_title.as_str())
        .collect();
    assert_eq!(titles, vec!["B", "C", "A"]);
    assert_eq!(session.status, HandoffSessionStatus::InProgress);
    assert_eq!(session.system_health.open_incidents, 3);
    assert_eq!(session.system_health.escalated_incidents, 1);
    assert_eq!(session.system_health.critical_alerts, 2);

    let b_record = &session.incidents[0];
    assert_eq!(b_record.status, RecordStatus::Pending);
    assert_eq!(b_record.escalation_path, "1. Level 1 (site unreachable)");
    assert_eq!(b_record.context_brief.escalation_level, 1);
    assert_eq!(session.incidents[1].escalation_path, "No escalations yet");
    assert_eq!(session.incidents[1].next_actions[0], "Review incident description");

    for record in &session.incidents {
        assert_eq!(record.active_incidents.len(), 3);
    }

    assert_eq!(fx.audit_actions().await, vec!["handoff.initiated"]);
}

#[tokio::test]
async fn initiate_rejects_invalid_request_with_all_errors() {
    let fx = Fixture::new().await;
    let mut request = fx.request();
    request.tenant_id = Uuid::nil();
    request.to_admin = request.from_admin;

    let err = fx.service().initiate(request).await.unwrap_err();
    match err {
        WatchdeskError::Validation(errors) => {
            assert_eq!(errors.len(), 2);
            assert!(errors.has_field("tenant_id"));
            assert!(errors.has_field("to_admin"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn initiate_survives_session_store_outage() {
    let fx = Fixture::new().await;
    fx.incident("Only", IncidentSeverity::High, IncidentStatus::Open, Duration::minutes(5))
        .await;

    let outcome = fx
        .service_with(OfflineSessions)
        .initiate(fx.request())
        .await
        .unwrap();

    assert_eq!(outcome.value.incidents.len(), 1);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].operation, "handoff_session.create");
}

#[tokio::test]
async fn accept_and_complete_lifecycle() {
    let fx = Fixture::new().await;
    fx.incident("Gate", IncidentSeverity::Medium, IncidentStatus::Open, Duration::minutes(5))
        .await;
    let service = fx.service();
    let session = service.initiate(fx.request()).await.unwrap().value;

    fx.tick();
    let accepted = service.accept(session.id, fx.to_admin).await;
    assert!(!accepted.is_degraded(), "{:?}", accepted.warnings);

    fx.tick();
    let completion = service.complete(session.id, "handed off cleanly").await;
    assert!(!completion.is_degraded(), "{:?}", completion.warnings);
    assert_eq!(completion.value.status, HandoffSessionStatus::Completed);
    assert!(completion.value.summary.contains("handed off cleanly"));

    let stored = service.get_session(session.id).await.unwrap();
    assert_eq!(stored.status, HandoffSessionStatus::Completed);
    assert_eq!(stored.completion_notes.as_deref(), Some("handed off cleanly"));

    // A second accept is refused but still audited.
    fx.tick();
    let again = service.accept(session.id, fx.to_admin).await;
    assert_eq!(again.warnings.len(), 1);
    assert_eq!(again.warnings[0].operation, "handoff_session.accepted");

    assert_eq!(
        fx.audit_actions().await,
        vec![
            "handoff.initiated",
            "handoff.accepted",
            "handoff.completed",
            "handoff.accepted"
        ]
    );

    let completed = fx
        .audit()
        .list(
            AuditLogFilter {
                action: Some("handoff.completed".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(completed.items.len(), 1);
    assert_eq!(completed.items[0].actor_type, ActorType::System);
    assert_eq!(completed.items[0].actor_id, None);
    assert_eq!(completed.items[0].tenant_id, Some(fx.tenant_id));
}

#[tokio::test]
async fn complete_returns_summary_when_store_fails() {
    let fx = Fixture::new().await;
    let session_id = Uuid::new_v4();

    let outcome = fx
        .service_with(OfflineSessions)
        .complete(session_id, "handed off cleanly")
        .await;

    assert!(outcome.value.summary.contains(&session_id.to_string()));
    assert!(outcome.value.summary.contains("handed off cleanly"));
    assert_eq!(outcome.value.status, HandoffSessionStatus::Completed);
    assert!(outcome.is_degraded());
    assert_eq!(outcome.warnings[0].operation, "handoff_session.completed");
}

#[tokio::test]
async fn recommend_follows_policy() {
    let fx = Fixture::new().await;
    let service = fx.service();

    let quiet = service.recommend(fx.tenant_id).await;
    assert_eq!(quiet.system_status, SystemStatus::Normal);
    assert_eq!(quiet.recommended_action, RecommendedAction::Proceed);

    for i in 0..11 {
        fx.incident(
            &format!("load {i}"),
            IncidentSeverity::Low,
            IncidentStatus::Open,
            Duration::minutes(i),
        )
        .await;
    }
    let busy = service.recommend(fx.tenant_id).await;
    assert_eq!(busy.risk_factors.len(), 1);
    assert_eq!(busy.system_status, SystemStatus::Elevated);
    assert_eq!(busy.recommended_action, RecommendedAction::Delay);

    fx.incident("esc", IncidentSeverity::Critical, IncidentStatus::Escalated, Duration::zero())
        .await;
    let critical = service.recommend(fx.tenant_id).await;
    assert_eq!(critical.risk_factors.len(), 3);
    assert_eq!(critical.system_status, SystemStatus::Critical);
    assert_eq!(critical.recommended_action, RecommendedAction::Delay);
}

#[tokio::test]
async fn brief_renders_stored_session() {
    let fx = Fixture::new().await;
    fx.incident(
        "Badge printer down",
        IncidentSeverity::High,
        IncidentStatus::Investigating,
        Duration::minutes(45),
    )
    .await;
    let service = fx.service();
    let session = service.initiate(fx.request()).await.unwrap().value;

    let doc = service.brief(session.id).await.unwrap();
    assert!(doc.contains(&session.id.to_string()));
    assert!(doc.contains("[HIGH] Badge printer down"));
    assert!(doc.contains("Continue investigation"));
    assert!(doc.contains("Fire drill scheduled for 06:00"));
}

#[tokio::test]
async fn brief_unknown_session_is_not_found() {
    let fx = Fixture::new().await;
    let err = fx.service().brief(Uuid::new_v4()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn acknowledge_incident_decides_once() {
    let fx = Fixture::new().await;
    let gate = fx
        .incident("Gate", IncidentSeverity::High, IncidentStatus::Open, Duration::minutes(5))
        .await;
    let service = fx.service();
    let session = service.initiate(fx.request()).await.unwrap().value;

    fx.tick();
    let first = service
        .acknowledge_incident(session.id, gate, RecordStatus::Accepted, fx.to_admin)
        .await
        .unwrap();
    assert!(first.value);

    fx.tick();
    let second = service
        .acknowledge_incident(session.id, gate, RecordStatus::Rejected, fx.to_admin)
        .await
        .unwrap();
    assert!(!second.value);

    let stored = service.get_session(session.id).await.unwrap();
    assert_eq!(stored.incidents[0].status, RecordStatus::Accepted);

    let pending = service
        .acknowledge_incident(session.id, gate, RecordStatus::Pending, fx.to_admin)
        .await
        .unwrap_err();
    assert!(matches!(pending, WatchdeskError::Validation(_)));

    let unknown = service
        .acknowledge_incident(session.id, Uuid::new_v4(), RecordStatus::Accepted, fx.to_admin)
        .await
        .unwrap_err();
    assert!(unknown.is_not_found());

    let actions = fx.audit_actions().await;
    assert_eq!(
        actions,
        vec![
            "handoff.initiated",
            "handoff.incident_accepted",
            "handoff.incident_rejected"
        ]
    );
}

#[tokio::test]
async fn advisor_degrades_to_neutral_values_on_read_failure() {
    let fx = Fixture::new().await;
    let incidents = FlakyIncidents { lists: None };
    let advisor = EscalationAdvisor::new(&incidents);

    let path = advisor
        .build_escalation_path(fx.tenant_id, Uuid::new_v4())
        .await;
    assert_eq!(path, "Unknown");

    let actions = advisor
        .suggest_next_actions(fx.tenant_id, Uuid::new_v4())
        .await;
    assert!(actions.is_empty());
}

#[tokio::test]
async fn initiate_survives_failing_advisor_reads() {
    let fx = Fixture::new().await;
    fx.incident("Gate", IncidentSeverity::Critical, IncidentStatus::Open, Duration::minutes(15))
        .await;
    fx.incident("Lift", IncidentSeverity::Low, IncidentStatus::Open, Duration::minutes(5))
        .await;

    let service = fx.service_over(
        FlakyIncidents {
            lists: Some(fx.incidents()),
        },
        SurrealHandoffSessionRepository::new(fx.db.clone()),
    );
    let outcome = service.initiate(fx.request()).await.unwrap();
    assert!(!outcome.is_degraded(), "{:?}", outcome.warnings);

    let session = outcome.value;
    let titles: Vec<_> = session
        .incidents
        .iter()
        .map(|r| r.incident_title.as_str())
        .collect();
    assert_eq!(titles, vec!["Gate", "Lift"]);
    assert_eq!(session.system_health.open_incidents, 2);
    for record in &session.incidents {
        assert_eq!(record.escalation_path, "Unknown");
        assert!(record.next_actions.is_empty());
        assert_eq!(record.active_incidents.len(), 2);
    }

    let stored = service.get_session(session.id).await.unwrap();
    assert_eq!(stored.incidents.len(), 2);
}

#[tokio::test]
async fn recommend_is_unknown_when_health_is_unreadable() {
    let fx = Fixture::new().await;
    let service = fx.service_over(
        FlakyIncidents { lists: None },
        SurrealHandoffSessionRepository::new(fx.db.clone()),
    );

    let recommendation = service.recommend(fx.tenant_id).await;
    assert_eq!(recommendation.system_status, SystemStatus::Unknown);
    assert_eq!(recommendation.recommended_action, RecommendedAction::Delay);
    assert_eq!(recommendation.risk_factors.len(), 1);
    assert!(recommendation.risk_factors[0].contains("incident store offline"));
}

#[tokio::test]
async fn initiate_fails_when_incidents_cannot_be_listed() {
    let fx = Fixture::new().await;
    let service = fx.service_over(
        FlakyIncidents { lists: None },
        SurrealHandoffSessionRepository::new(fx.db.clone()),
    );

    let err = service.initiate(fx.request()).await.unwrap_err();
    assert!(matches!(err, WatchdeskError::Persistence(_)));
    assert!(fx.audit_actions().await.is_empty());
}
