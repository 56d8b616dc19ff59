//! Client-claimed timestamps.
//!
//! A request may carry the client's idea of "now" in a header or in its
//! body. Either form may be epoch milliseconds or RFC 3339. Anything that
//! does not parse is treated as no claim.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::error::ClaimError;

/// Body fields checked, in order.
const BODY_FIELDS: [&str; 2] = ["clientTimestamp", "client_timestamp"];

/// Header first, then body. `None` means there is nothing to measure.
pub fn extract_client_timestamp(
    header: Option<&str>,
    body: Option<&Value>,
) -> Option<DateTime<Utc>> {
    if let Some(raw) = header {
        match parse_claim(raw) {
            Ok(ts) => return Some(ts),
            Err(e) => debug!(error = %e, "Ignoring unparsable client timestamp header"),
        }
    }

    let body = body?;
    let value = BODY_FIELDS.iter().find_map(|field| body.get(field))?;
    match parse_claim_value(value) {
        Ok(ts) => Some(ts),
        Err(e) => {
            debug!(error = %e, "Ignoring unparsable client timestamp field");
            None
        }
    }
}

/// Parse a textual claim: epoch milliseconds or RFC 3339.
pub fn parse_claim(raw: &str) -> Result<DateTime<Utc>, ClaimError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ClaimError::Empty);
    }
    if let Ok(ms) = raw.parse::<i64>() {
        return from_epoch_millis(ms);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| ClaimError::Format(raw.to_string()))
}

fn parse_claim_value(value: &Value) -> Result<DateTime<Utc>, ClaimError> {
    match value {
        Value::String(s) => parse_claim(s),
        Value::Number(n) => match n.as_i64() {
            Some(ms) => from_epoch_millis(ms),
            // Fractional milliseconds are truncated.
            None => n
                .as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .ok_or_else(|| ClaimError::Format(n.to_string()))
                .and_then(|f| from_epoch_millis(f as i64)),
        },
        Value::Null => Err(ClaimError::UnexpectedType("null")),
        Value::Bool(_) => Err(ClaimError::UnexpectedType("boolean")),
        Value::Array(_) => Err(ClaimError::UnexpectedType("array")),
        Value::Object(_) => Err(ClaimError::UnexpectedType("object")),
    }
}

fn from_epoch_millis(ms: i64) -> Result<DateTime<Utc>, ClaimError> {
    DateTime::from_timestamp_millis(ms).ok_or(ClaimError::OutOfRange(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 7, 30, 0).unwrap()
    }

    #[test]
    fn header_wins_over_body() {
        let body = json!({ "clientTimestamp": 0 });
        let ts = extract_client_timestamp(Some("2026-03-02T07:30:00Z"), Some(&body));
        assert_eq!(ts, Some(t0()));
    }

    #[test]
    fn unparsable_header_falls_back_to_body() {
        let body = json!({ "client_timestamp": t0().timestamp_millis() });
        let ts = extract_client_timestamp(Some("yesterday"), Some(&body));
        assert_eq!(ts, Some(t0()));
    }

    #[test]
    fn epoch_millis_as_string_and_number() {
        let ms = t0().timestamp_millis();
        assert_eq!(parse_claim(&ms.to_string()), Ok(t0()));

        let body = json!({ "clientTimestamp": ms.to_string() });
        assert_eq!(extract_client_timestamp(None, Some(&body)), Some(t0()));
    }

    #[test]
    fn rfc3339_with_offset_is_normalised() {
        assert_eq!(parse_claim("2026-03-02T09:30:00+02:00"), Ok(t0()));
    }

    #[test]
    fn absent_or_garbage_is_no_claim() {
        assert_eq!(extract_client_timestamp(None, None), None);
        assert_eq!(extract_client_timestamp(Some("  "), None), None);

        let body = json!({ "clientTimestamp": true });
        assert_eq!(extract_client_timestamp(None, Some(&body)), None);

        let body = json!({ "other": 1 });
        assert_eq!(extract_client_timestamp(None, Some(&body)), None);

        assert_eq!(parse_claim(""), Err(ClaimError::Empty));
        assert_eq!(
            parse_claim(&i64::MAX.to_string()),
            Err(ClaimError::OutOfRange(i64::MAX))
        );
    }
}
