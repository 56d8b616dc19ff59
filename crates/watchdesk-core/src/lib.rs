//! Watchdesk Core — domain models, repository traits and shared
//! building blocks for the operations-desk services.
//!
//! Nothing in this crate performs I/O. Storage is reached through the
//! traits in [`repository`]; server time through [`clock::Clock`].

pub mod clock;
pub mod error;
pub mod models;
pub mod outcome;
pub mod repository;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{WatchdeskError, WatchdeskResult};
pub use outcome::{BestEffort, PersistenceWarning};
pub use validation::{FieldError, ValidationErrors};
