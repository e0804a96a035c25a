//! Prompt construction for the fraud analysis model.

use fraudwatch_core::{HISTORY_LIMIT, Transaction};

use crate::error::AiError;

/// Build the instruction sent to the model.
///
/// Transaction and history are embedded as pretty-printed JSON and the model
/// is asked to answer with a strict JSON object.
pub fn build_prompt(transaction: &Transaction, history: &[Transaction]) -> Result<String, AiError> {
    let transaction_json = serde_json::to_string_pretty(transaction)
        .map_err(|e| AiError::InvalidInput(format!("transaction: {e}")))?;
    let history_json = serde_json::to_string_pretty(history)
        .map_err(|e| AiError::InvalidInput(format!("history: {e}")))?;

    Ok(format!(
        r#"
You are a fraud detection assistant for a FinTech company.
Analyze the following transaction and user history to determine if it is likely fraudulent.

Transaction: {transaction_json}

User's recent transaction history (last {HISTORY_LIMIT}):
{history_json}

Answer in JSON format only:
{{
  "is_fraud": true/false,
  "risk_score": 0.0 to 1.0,
  "reason": "brief explanation"
}}
"#
    ))
}
