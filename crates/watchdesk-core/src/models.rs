//! Domain models for Watchdesk.
//!
//! These are the core types shared across all crates.

pub mod audit;
pub mod drift;
pub mod handoff;
pub mod incident;
