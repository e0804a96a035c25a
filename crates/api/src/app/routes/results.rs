use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// `GET /result/{task_id}`: never waits for the job.
pub async fn get_result(
    Extension(services): Extension<Arc<AppServices>>,
    Path(task_id): Path<String>,
) -> axum::response::Response {
    let status = tokio::task::spawn_blocking(move || services.queue.get_status(&task_id)).await;

    match status {
        Ok(Ok(status)) => (StatusCode::OK, Json(dto::TaskResult::from(status))).into_response(),
        Ok(Err(e)) => errors::queue_error_to_response(e),
        Err(e) => errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string()),
    }
}
