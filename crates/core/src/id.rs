//! Identifiers used across the domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Identifier of the user a transaction belongs to.
///
/// Callers may send any JSON value. Strings are kept as-is; anything else is
/// stored as its compact JSON text, so `42` and `"42"` address the same
/// history record and `null` becomes `"null"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => Self(s.clone()),
            other => Self(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Record key used by the history store (`user_<id>`).
    pub fn history_key(&self) -> String {
        format!("user_{}", self.0)
    }
}

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|v| Self::from_json(&v))
    }
}

/// Cosmetic reference handed back on submission.
///
/// Derived from wall-clock seconds, so two submissions within the same second
/// share a reference. Never use it as an identity key; the job id is the
/// authoritative handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionRef(String);

impl TransactionRef {
    pub fn from_clock(now: DateTime<Utc>) -> Self {
        Self(now.timestamp().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn user_id_accepts_any_json_value() {
        let a: UserId = serde_json::from_value(serde_json::json!("u1")).unwrap();
        let b: UserId = serde_json::from_value(serde_json::json!(42)).unwrap();
        let c: UserId = serde_json::from_value(serde_json::json!(4.5)).unwrap();
        let d: UserId = serde_json::from_value(serde_json::json!(null)).unwrap();

        assert_eq!(a.as_str(), "u1");
        assert_eq!(b, UserId::new("42"));
        assert_eq!(b.history_key(), "user_42");
        assert_eq!(c.as_str(), "4.5");
        assert_eq!(d.as_str(), "null");
    }

    #[test]
    fn user_id_serialises_as_a_string() {
        assert_eq!(serde_json::to_value(UserId::new("42")).unwrap(), serde_json::json!("42"));
    }

    #[test]
    fn transaction_ref_is_unix_seconds() {
        let now = Utc.timestamp_opt(1_700_000_000, 999_000_000).unwrap();
        assert_eq!(TransactionRef::from_clock(now).as_str(), "1700000000");
    }
}
