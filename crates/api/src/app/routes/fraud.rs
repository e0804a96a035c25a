use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use fraudwatch_core::{Transaction, TransactionRef};
use fraudwatch_infra::JobStoreError;
use fraudwatch_infra::jobs::JobId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// `POST /detect-fraud`: validate, snapshot history, enqueue, then record.
pub async fn detect_fraud(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<Value>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::json_error(rejection.status(), "invalid_json", rejection.body_text()),
    };

    let transaction = match Transaction::from_json(body) {
        Ok(tx) => tx,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let user_id = transaction.user_id.clone();

    // History and queue calls are blocking IO.
    let submitted = tokio::task::spawn_blocking(move || submit(&services, transaction)).await;

    let task_id = match submitted {
        Ok(Ok(task_id)) => task_id,
        Ok(Err(e)) => return errors::queue_error_to_response(e),
        Err(e) => {
            return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string());
        }
    };

    info!(task_id = %task_id, user_id = %user_id, "fraud analysis queued");

    (
        StatusCode::ACCEPTED,
        Json(dto::SubmissionAccepted::new(
            TransactionRef::from_clock(Utc::now()),
            user_id,
            task_id.to_string(),
        )),
    )
        .into_response()
}

/// The job sees the history as it was before this transaction.
fn submit(services: &AppServices, transaction: Transaction) -> Result<JobId, JobStoreError> {
    let user_id = transaction.user_id.clone();
    let history = services.history.get_history(&user_id);

    let task_id = services.queue.submit(&transaction, &history)?;

    if let Err(e) = services.history.append_history(&user_id, transaction) {
        warn!(user_id = %user_id, error = %e, "history update failed; transaction not recorded");
    }

    Ok(task_id)
}
