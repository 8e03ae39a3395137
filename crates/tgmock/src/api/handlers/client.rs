//! Endpoints for tests acting as the chat user.

use axum::{
    Json,
    extract::{Request, State},
};
use serde_json::Value;
use tgmock_protocol::{ApiResponse, TokenRequest, Update};
use tracing::{debug, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::api::format;
use crate::api::params::parse_params;
use crate::api::state::AppState;
use crate::store::Origin;

use super::stamp_date;

/// Store a user message (plain text or command) for its bot.
///
/// The payload must name the bot in `botToken`. Responds with the update
/// the bot will receive.
#[instrument(skip_all)]
pub async fn send_message(
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<Json<ApiResponse<Update>>> {
    let mut payload: Value = parse_params(request).await?;
    if !payload.is_object() {
        return Err(ApiError::bad_request("message must be a JSON object"));
    }
    stamp_date(&mut payload, state.store.clock().now_millis());

    let record = state.store.append_user_message(payload).await?;
    debug!(update_id = record.update_id, "user message stored");
    Ok(Json(ApiResponse::ok(format::user_update(&record))))
}

/// Store an inline-button press for its bot.
#[instrument(skip_all)]
pub async fn send_callback(
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<Json<ApiResponse<Update>>> {
    let mut payload: Value = parse_params(request).await?;
    let Some(object) = payload.as_object_mut() else {
        return Err(ApiError::bad_request("callback must be a JSON object"));
    };
    if !object.contains_key("data") {
        return Err(ApiError::bad_request("callback must contain `data`"));
    }
    object.insert("callbackQuery".to_string(), Value::Bool(true));
    stamp_date(&mut payload, state.store.clock().now_millis());

    let record = state.store.append_user_message(payload).await?;
    debug!(update_id = record.update_id, "user callback stored");
    Ok(Json(ApiResponse::ok(format::user_update(&record))))
}

/// Hand the bot's messages for `token` to the user.
///
/// Returned messages are consumed; a later call only sees newer ones.
#[instrument(skip_all)]
pub async fn get_updates(
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<Json<ApiResponse<Vec<Update>>>> {
    let TokenRequest { token } = parse_params(request).await?;

    let updates = state
        .store
        .take(Origin::Bot, &token)
        .await
        .iter()
        .map(format::to_update)
        .collect();
    Ok(Json(ApiResponse::ok(updates)))
}

/// Every stored message of `token`'s conversation, both directions, by date.
#[instrument(skip_all)]
pub async fn get_updates_history(
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<Json<ApiResponse<Vec<Update>>>> {
    let TokenRequest { token } = parse_params(request).await?;

    let updates = state
        .store
        .query_history(&token)
        .await
        .iter()
        .map(format::to_update)
        .collect();
    Ok(Json(ApiResponse::ok(updates)))
}
