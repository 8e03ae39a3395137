//! API request handlers.

use axum::Json;
use serde::Serialize;

pub mod bot;
pub mod client;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Insert `date` (Unix seconds) into an object payload that lacks one.
pub(crate) fn stamp_date(payload: &mut serde_json::Value, now_millis: i64) {
    if let Some(object) = payload.as_object_mut() {
        object
            .entry("date")
            .or_insert_with(|| serde_json::Value::from(now_millis / 1000));
    }
}
