//! HTTP API: routing, request validation and response mapping for the
//! fraud detection service.

pub mod app;
