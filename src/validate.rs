use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::errors::RecordError;

/// Coerces a raw duration measurement into whole seconds.
///
/// The collector hands over values exactly as the infrastructure API
/// reported them, so the type check happens here, at assignment: JSON null
/// means unset, non-negative numbers are truncated to whole seconds, and
/// everything else is rejected so an invalid value never reaches a record's
/// field map.
pub(crate) fn duration_from_value(
    field: &'static str,
    value: &Value,
) -> Result<Option<u64>, RecordError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            if let Some(secs) = n.as_u64() {
                return Ok(Some(secs));
            }
            match n.as_f64() {
                Some(secs) if secs.is_finite() && secs >= 0.0 => Ok(Some(secs.trunc() as u64)),
                _ => Err(RecordError::InvalidValue {
                    field,
                    reason: format!("duration must be a non-negative number, got {n}"),
                }),
            }
        }
        other => Err(RecordError::InvalidValue {
            field,
            reason: format!("duration must be a number, got {other}"),
        }),
    }
}

/// Coerces a raw timestamp measurement into a structured date-time.
///
/// Accepts JSON null (unset) or an RFC 3339 string; bare numbers are not
/// dates and are rejected.
pub(crate) fn timestamp_from_value(
    field: &'static str,
    value: &Value,
) -> Result<Option<DateTime<Utc>>, RecordError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| RecordError::InvalidValue {
                field,
                reason: format!("timestamps must be RFC 3339 date-times: {e}"),
            }),
        other => Err(RecordError::InvalidValue {
            field,
            reason: format!("timestamps must be RFC 3339 date-times, got {other}"),
        }),
    }
}
