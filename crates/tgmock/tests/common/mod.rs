//! Test utilities and common setup.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::Value;
use tgmock::api::{self, AppState};
use tgmock::clock::ManualClock;
use tgmock::store::UpdateStore;
use tgmock::webhook::WebhookRegistry;
use tower::ServiceExt;

pub const BOT_TOKEN: &str = "123456:test-token";

/// Router over a fresh store whose clock starts at `start_millis`.
pub fn test_app_at(start_millis: i64) -> (Router, Arc<UpdateStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_millis));
    let store = Arc::new(UpdateStore::with_clock(clock.clone()));
    let state = AppState::new(store.clone(), Arc::new(WebhookRegistry::new()));
    (api::create_router(state), store, clock)
}

/// Router over a fresh store.
pub fn test_app() -> (Router, Arc<UpdateStore>) {
    let (app, store, _) = test_app_at(1_700_000_000_000);
    (app, store)
}

/// POST a JSON body and return status plus parsed response.
pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .method(Method::POST)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    read(response).await
}

/// GET `uri` and return status plus parsed response.
pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    read(response).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

/// Path of a Bot API method for [`BOT_TOKEN`].
pub fn bot_uri(method: &str) -> String {
    format!("/bot{BOT_TOKEN}/{method}")
}
