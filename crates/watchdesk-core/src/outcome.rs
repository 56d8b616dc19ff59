//! Best-effort results.
//!
//! Secondary writes (audit entries, drift logs, session persistence) must
//! never block the primary result. Instead of swallowing their failures,
//! operations return a [`BestEffort`] carrying the value plus a warning for
//! every secondary write that did not land.

use std::fmt;

use serde::Serialize;

/// A secondary write that failed without affecting the primary result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistenceWarning {
    /// Short operation name, e.g. `handoff_session.create`.
    pub operation: String,
    pub message: String,
}

impl fmt::Display for PersistenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.message)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BestEffort<T> {
    pub value: T,
    pub warnings: Vec<PersistenceWarning>,
}

impl<T> BestEffort<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, operation: impl Into<String>, error: impl fmt::Display) {
        self.warnings.push(PersistenceWarning {
            operation: operation.into(),
            message: error.to_string(),
        });
    }

    /// Record the error of a secondary write, if any, and discard its value.
    pub fn absorb<U, E: fmt::Display>(
        &mut self,
        operation: impl Into<String>,
        result: Result<U, E>,
    ) -> Option<U> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.warn(operation, e);
                None
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> BestEffort<U> {
        BestEffort {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_keeps_value_and_records_error() {
        let mut outcome = BestEffort::new(7);
        let ok: Result<u8, String> = Ok(1);
        let err: Result<u8, String> = Err("store offline".into());

        assert_eq!(outcome.absorb("first", ok), Some(1));
        assert_eq!(outcome.absorb("second", err), None);

        assert!(outcome.is_degraded());
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].to_string(), "second: store offline");
        assert_eq!(outcome.map(|v| v * 2).value, 14);
    }
}
