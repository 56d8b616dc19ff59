//! Watchdesk Handoff — operator shift handoff.
//!
//! Snapshots system health and the open incidents of a tenant, derives
//! escalation trails and next actions per incident, and walks the session
//! through acceptance and completion with an audit trail.

pub mod advisor;
pub mod briefing;
pub mod config;
pub mod recommendation;
pub mod service;

pub use advisor::EscalationAdvisor;
pub use briefing::render_briefing;
pub use config::HandoffConfig;
pub use recommendation::assess;
pub use service::{HandoffService, InitiateHandoff};
