//! Client-claim parsing errors.
//!
//! These never reach callers of the time authority: an unreadable claim is
//! treated as no claim at all.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClaimError {
    #[error("empty timestamp")]
    Empty,

    #[error("unrecognised timestamp format: {0}")]
    Format(String),

    #[error("epoch milliseconds out of range: {0}")]
    OutOfRange(i64),

    #[error("expected a string or number, found {0}")]
    UnexpectedType(&'static str),
}
