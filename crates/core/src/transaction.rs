//! Submitted transaction and boundary validation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DomainError, DomainResult};
use crate::id::UserId;

/// Fields every submission must carry.
pub const REQUIRED_FIELDS: [&str; 5] = ["user_id", "amount", "merchant", "location", "timestamp"];

/// A financial transaction submitted for analysis.
///
/// Only the presence of the required fields is checked. Their values are
/// kept exactly as sent (`"100.00"` and `100` are both valid amounts) and
/// handed to the model verbatim. Caller-supplied fields beyond the required
/// five are kept in `extra` and travel with the transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub user_id: UserId,
    pub amount: Value,
    pub merchant: Value,
    pub location: Value,
    pub timestamp: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Transaction {
    /// Build a transaction from a raw JSON body.
    ///
    /// Fails only when the body is not an object or lacks one of the
    /// [`REQUIRED_FIELDS`]; a field present with `null` counts as present.
    pub fn from_json(body: Value) -> DomainResult<Self> {
        let Value::Object(fields) = body else {
            return Err(DomainError::validation("request body must be a JSON object"));
        };

        let missing = missing_fields(&fields);
        if !missing.is_empty() {
            return Err(DomainError::MissingFields(missing));
        }

        serde_json::from_value(Value::Object(fields))
            .map_err(|e| DomainError::validation(e.to_string()))
    }
}

/// Required fields absent from `fields`, in declaration order.
pub fn missing_fields(fields: &Map<String, Value>) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|name| !fields.contains_key(*name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_required_and_extra_fields() {
        let tx = Transaction::from_json(json!({
            "user_id": "u1",
            "amount": 100,
            "merchant": "Acme",
            "location": "NY",
            "timestamp": 1700000000,
            "card_last4": "4242"
        }))
        .unwrap();

        assert_eq!(tx.user_id.as_str(), "u1");
        assert_eq!(tx.merchant, json!("Acme"));
        assert_eq!(tx.timestamp, json!(1_700_000_000));
        assert_eq!(tx.extra.get("card_last4"), Some(&json!("4242")));
    }

    #[test]
    fn serialises_back_to_a_flat_object() {
        let body = json!({
            "user_id": "u1",
            "amount": 12.5,
            "merchant": "Acme",
            "location": "NY",
            "timestamp": "2024-01-01T00:00:00Z",
            "channel": "web"
        });
        let tx = Transaction::from_json(body.clone()).unwrap();

        assert_eq!(serde_json::to_value(&tx).unwrap(), body);
    }

    #[test]
    fn reports_every_missing_field() {
        let err = Transaction::from_json(json!({ "user_id": "u1", "merchant": "Acme" })).unwrap_err();

        assert_eq!(
            err,
            DomainError::MissingFields(vec!["amount", "location", "timestamp"])
        );
    }

    #[test]
    fn values_are_kept_as_sent() {
        let tx = Transaction::from_json(json!({
            "user_id": null,
            "amount": "100.00",
            "merchant": 7,
            "location": ["NY", "US"],
            "timestamp": true
        }))
        .unwrap();

        assert_eq!(tx.user_id.as_str(), "null");
        assert_eq!(tx.amount, json!("100.00"));
        assert_eq!(tx.merchant, json!(7));
        assert_eq!(tx.location, json!(["NY", "US"]));
        assert_eq!(tx.timestamp, json!(true));
    }

    #[test]
    fn null_counts_as_present() {
        let tx = Transaction::from_json(json!({
            "user_id": "u1",
            "amount": null,
            "merchant": null,
            "location": null,
            "timestamp": null
        }))
        .unwrap();

        assert_eq!(tx.amount, Value::Null);
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(matches!(
            Transaction::from_json(json!([1, 2, 3])),
            Err(DomainError::Validation(_))
        ));
    }
}
