use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::errors::RecordError;

/// Schema-versioned projection to the canonical accounting field map.
///
/// Each record type declares its known schema versions and the field list
/// belonging to each one; the version lookup, filtering and JSON encoding
/// live in the provided methods so they exist once rather than per record
/// type.
pub trait VersionedRecord {
    /// Version used when the caller does not ask for one. Always the
    /// newest schema the record type knows.
    const DEFAULT_VERSION: &'static str;

    /// Canonical field names valid for `version`, or None when the version
    /// is unknown to this record type.
    fn field_names(version: &str) -> Option<&'static [&'static str]>;

    /// The complete canonical projection of this record. Derived fields
    /// are recomputed on every call; nothing is cached, so mutations are
    /// reflected immediately.
    fn full_map(&self) -> Map<String, Value>;

    /// Returns the record as a canonical field map, filtered to the
    /// requested schema version (the default version when None). Every
    /// field of the version is present, null where unset; no field
    /// outside the version's list ever appears.
    fn as_dict(&self, version: Option<&str>) -> Result<Map<String, Value>, RecordError> {
        let version = version.unwrap_or(Self::DEFAULT_VERSION);
        let fields = Self::field_names(version)
            .ok_or_else(|| RecordError::UnknownSchemaVersion(version.to_string()))?;
        let full = self.full_map();
        let mut filtered = Map::with_capacity(fields.len());
        for name in fields {
            let value = full.get(*name).cloned().unwrap_or(Value::Null);
            filtered.insert((*name).to_string(), value);
        }
        Ok(filtered)
    }

    /// Returns the record as a JSON string for the requested version.
    fn as_json(&self, version: Option<&str>) -> Result<String, RecordError> {
        Ok(serde_json::to_string(&self.as_dict(version)?)?)
    }
}

/// Unix epoch seconds for an optional timestamp, null when unset.
pub(crate) fn epoch_seconds(time: Option<DateTime<Utc>>) -> Value {
    match time {
        Some(t) => Value::from(t.timestamp()),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_epoch_seconds_utc() {
        let t = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(epoch_seconds(Some(t)), Value::from(1609459200));
        assert_eq!(epoch_seconds(None), Value::Null);
    }
}
