//! Go / no-go policy for a handoff.

use watchdesk_core::models::handoff::{
    HandoffRecommendation, RecommendedAction, SystemHealth, SystemStatus,
};

use crate::config::HandoffConfig;

/// Assess whether now is a good time to hand off.
pub fn assess(health: &SystemHealth, config: &HandoffConfig) -> HandoffRecommendation {
    let mut risk_factors = Vec::new();
    let mut recommendations = Vec::new();

    if health.open_incidents > config.high_load_threshold {
        risk_factors.push(format!(
            "High load: {} open incidents",
            health.open_incidents
        ));
        recommendations.push("Stagger the handoff across operators".to_string());
    }
    if health.escalated_incidents > 0 {
        risk_factors.push(format!(
            "Escalated incidents present: {}",
            health.escalated_incidents
        ));
        recommendations.push("Hold a pre-handoff briefing on escalated incidents".to_string());
    }
    if health.critical_alerts > 0 {
        risk_factors.push(format!(
            "Critical incident active: {}",
            health.critical_alerts
        ));
        recommendations.push("Do not hand off until critical incidents are stable".to_string());
    }

    let system_status = match risk_factors.len() {
        0 => SystemStatus::Normal,
        n if n > config.critical_status_threshold => SystemStatus::Critical,
        _ => SystemStatus::Elevated,
    };
    let recommended_action = if system_status == SystemStatus::Normal {
        recommendations.push("System is stable; proceed with the handoff".to_string());
        RecommendedAction::Proceed
    } else {
        RecommendedAction::Delay
    };

    HandoffRecommendation {
        recommended_action,
        system_status,
        risk_factors,
        recommendations,
    }
}

/// The recommendation when health could not be read.
pub fn unknown(reason: impl ToString) -> HandoffRecommendation {
    HandoffRecommendation {
        recommended_action: RecommendedAction::Delay,
        system_status: SystemStatus::Unknown,
        risk_factors: vec![reason.to_string()],
        recommendations: Vec::new(),
    }
}
