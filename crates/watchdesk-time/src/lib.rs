//! Watchdesk Time — server-authoritative time for time-sensitive actions.
//!
//! The server clock is the only source of truth. Client-claimed instants
//! are measured against it, classified by drift, and attendance actions
//! with excessive drift are blocked and flagged.

pub mod claim;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod service;

pub use claim::extract_client_timestamp;
pub use config::TimeAuthorityConfig;
pub use error::ClaimError;
pub use evaluator::{BlockDecision, BlockPolicy, DriftEvaluator, DriftValidation};
pub use service::{DriftCheckInput, DriftDecision, TimeAuthority};
