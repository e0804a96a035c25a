use serde::Serialize;

use fraudwatch_core::{TransactionRef, UserId, Verdict};
use fraudwatch_infra::{AnalysisStatus, JobState};

// -------------------------
// Response DTOs
// -------------------------

pub const PROCESSING_MESSAGE: &str = "Fraud analysis in progress. Poll /result/<task_id> for result.";

/// Body of a 202 from `POST /detect-fraud`.
#[derive(Debug, Serialize)]
pub struct SubmissionAccepted {
    pub transaction_id: TransactionRef,
    pub user_id: UserId,
    pub task_id: String,
    pub status: &'static str,
    pub message: &'static str,
}

impl SubmissionAccepted {
    pub fn new(transaction_id: TransactionRef, user_id: UserId, task_id: String) -> Self {
        Self {
            transaction_id,
            user_id,
            task_id,
            status: "processing",
            message: PROCESSING_MESSAGE,
        }
    }
}

/// Body of `GET /result/{task_id}`.
#[derive(Debug, Serialize)]
pub struct TaskResult {
    pub state: &'static str,
    /// Progress message, `Completed`, or the failure description.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Verdict>,
    pub attempts: u32,
}

impl From<AnalysisStatus> for TaskResult {
    fn from(s: AnalysisStatus) -> Self {
        let status = match s.state {
            JobState::Waiting => "Task is waiting to be processed...".to_string(),
            JobState::Running => "Task is running...".to_string(),
            JobState::Succeeded => "Completed".to_string(),
            JobState::Failed => s
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "Unknown error occurred.".to_string()),
        };

        Self {
            state: s.state.as_str(),
            status,
            result: s.verdict,
            attempts: s.attempts,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(state: JobState) -> AnalysisStatus {
        AnalysisStatus {
            state,
            verdict: None,
            error: None,
            attempts: 0,
        }
    }

    #[test]
    fn waiting_has_progress_message_and_no_result() {
        let body = serde_json::to_value(TaskResult::from(status(JobState::Waiting))).unwrap();
        assert_eq!(
            body,
            json!({"state": "waiting", "status": "Task is waiting to be processed...", "attempts": 0})
        );
    }

    #[test]
    fn failure_reports_error_text() {
        let mut s = status(JobState::Failed);
        s.error = Some("inference service error (500): boom".to_string());
        s.attempts = 3;

        let body = TaskResult::from(s);
        assert_eq!(body.state, "failed");
        assert_eq!(body.status, "inference service error (500): boom");
        assert_eq!(body.attempts, 3);
    }

    #[test]
    fn failure_without_text_is_unknown_error() {
        assert_eq!(TaskResult::from(status(JobState::Failed)).status, "Unknown error occurred.");
    }

    #[test]
    fn success_embeds_verdict() {
        let mut s = status(JobState::Succeeded);
        s.verdict = Some(Verdict {
            is_fraud: true,
            risk_score: 0.8,
            reason: "new country".to_string(),
        });

        let body = serde_json::to_value(TaskResult::from(s)).unwrap();
        assert_eq!(body["status"], "Completed");
        assert_eq!(body["result"]["is_fraud"], true);
    }
}
