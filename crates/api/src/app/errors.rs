use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use fraudwatch_core::DomainError;
use fraudwatch_infra::JobStoreError;

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::MissingFields(missing) => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({
                "error": "Missing required fields",
                "missing": missing,
            })),
        )
            .into_response(),
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
    }
}

pub fn queue_error_to_response(err: JobStoreError) -> axum::response::Response {
    tracing::error!(error = %err, "job queue unavailable");
    json_error(StatusCode::SERVICE_UNAVAILABLE, "queue_unavailable", err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
