//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: history store, job queue and embedded workers
//! - `routes/`: HTTP handlers (submission, result polling, health)
//! - `dto.rs`: response bodies
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, Runtime, StartupError};

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/detect-fraud", post(routes::fraud::detect_fraud))
        .route("/result/:task_id", get(routes::results::get_result))
        .route("/health", get(routes::system::health))
        .fallback(routes::system::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(services)),
        )
}
