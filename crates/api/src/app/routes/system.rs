use axum::{Json, http::StatusCode};

use crate::app::{dto, errors};

/// Liveness only; dependencies are not checked.
pub async fn health() -> Json<dto::Health> {
    Json(dto::Health { status: "OK" })
}

pub async fn not_found() -> axum::response::Response {
    errors::json_error(StatusCode::NOT_FOUND, "not_found", "no such route")
}
