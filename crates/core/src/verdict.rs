//! Fraud verdict produced by the inference service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification returned by the model for one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_fraud: bool,
    /// Risk in \[0, 1\].
    pub risk_score: f64,
    pub reason: String,
}

impl Verdict {
    /// Interpret whatever JSON the model answered with.
    ///
    /// Small models are loose about types, so this never fails:
    /// - `is_fraud` accepts booleans, `"true"`/`"false"`-like strings and
    ///   numbers (non-zero is fraud); anything else reads as `false`
    /// - `risk_score` accepts numbers and numeric strings, clamped into
    ///   \[0, 1\]; anything else reads as `0.0`
    /// - `reason` keeps strings as-is and other values as JSON text
    ///
    /// An answer that is valid JSON but not an object becomes a benign
    /// verdict whose reason is that answer.
    pub fn from_model_output(output: &Value) -> Self {
        let Value::Object(fields) = output else {
            return Self {
                is_fraud: false,
                risk_score: 0.0,
                reason: text_of(output),
            };
        };

        Self {
            is_fraud: fields.get("is_fraud").is_some_and(truthy),
            risk_score: fields.get("risk_score").map_or(0.0, score),
            reason: fields.get("reason").map(text_of).unwrap_or_default(),
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    }
}

fn score(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(f) if f.is_finite() => f.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_well_formed_output() {
        let v = Verdict::from_model_output(&json!({
            "is_fraud": true,
            "risk_score": 0.87,
            "reason": "amount far above usual spend"
        }));

        assert!(v.is_fraud);
        assert_eq!(v.risk_score, 0.87);
        assert_eq!(v.reason, "amount far above usual spend");
    }

    #[test]
    fn clamps_score_and_defaults_missing_fields() {
        let v = Verdict::from_model_output(&json!({ "risk_score": 7 }));

        assert!(!v.is_fraud);
        assert_eq!(v.risk_score, 1.0);
        assert_eq!(v.reason, "");
    }

    #[test]
    fn coerces_string_typed_fields() {
        let v = Verdict::from_model_output(&json!({
            "is_fraud": "false",
            "risk_score": "0.2",
            "reason": "ok"
        }));
        assert_eq!(
            v,
            Verdict {
                is_fraud: false,
                risk_score: 0.2,
                reason: "ok".to_string()
            }
        );

        let v = Verdict::from_model_output(&json!({ "is_fraud": "True", "risk_score": " 0.95 " }));
        assert!(v.is_fraud);
        assert_eq!(v.risk_score, 0.95);
    }

    #[test]
    fn unreadable_fields_fall_back_to_benign_values() {
        let v = Verdict::from_model_output(&json!({
            "is_fraud": ["maybe"],
            "risk_score": "high",
            "reason": { "code": 3 }
        }));

        assert!(!v.is_fraud);
        assert_eq!(v.risk_score, 0.0);
        assert_eq!(v.reason, r#"{"code":3}"#);
    }

    #[test]
    fn non_object_answer_becomes_the_reason() {
        let v = Verdict::from_model_output(&json!("looks fine"));

        assert!(!v.is_fraud);
        assert_eq!(v.reason, "looks fine");
    }
}
