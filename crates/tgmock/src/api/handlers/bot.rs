//! Bot API methods, reached as `/bot<token>/<method>`.

use std::time::Duration;

use axum::{
    Json,
    extract::{Path, Request, State},
};
use serde::Serialize;
use serde_json::Value;
use tgmock_protocol::{
    ApiResponse, DeleteMessageParams, GetUpdatesParams, SendMessageParams, SetWebhookParams,
    Update, WebhookInfo,
};
use tracing::{debug, info, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::api::format;
use crate::api::params::parse_params;
use crate::api::state::AppState;
use crate::poll::wait_for_updates;
use crate::store::{MessageRecord, Origin};
use crate::webhook::Webhook;

use super::stamp_date;

/// Upper bound of the `limit` parameter.
const MAX_UPDATES_LIMIT: usize = 100;

/// Longest `getUpdates` long-poll, in seconds.
const MAX_POLL_TIMEOUT_SECS: u64 = 50;

type BotReply = ApiResult<Json<ApiResponse<Value>>>;

fn reply<T: Serialize>(result: T) -> BotReply {
    Ok(Json(ApiResponse::ok(serde_json::to_value(result)?)))
}

/// Route a Bot API call to its method handler.
#[instrument(skip_all, fields(method = %method))]
pub async fn dispatch(
    State(state): State<AppState>,
    Path((bot_segment, method)): Path<(String, String)>,
    request: Request,
) -> BotReply {
    let token = bot_segment
        .strip_prefix("bot")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::not_found("unknown endpoint"))?
        .to_string();

    match method.to_ascii_lowercase().as_str() {
        "getme" => reply(format::bot_user(&token)),
        "sendmessage" => send_message(&state, &token, parse_params(request).await?).await,
        "getupdates" => get_updates(&state, &token, parse_params(request).await?).await,
        "deletemessage" => delete_message(&state, parse_params(request).await?).await,
        "setwebhook" => set_webhook(&state, &token, parse_params(request).await?),
        "deletewebhook" => {
            state.webhooks.remove(&token);
            reply(true)
        }
        "getwebhookinfo" => get_webhook_info(&state, &token).await,
        // Accepted for compatibility, nothing to simulate.
        "answercallbackquery" | "setmycommands" | "deletemycommands" | "sendchataction" => {
            reply(true)
        }
        _ => Err(ApiError::not_found("method not found")),
    }
}

async fn send_message(state: &AppState, token: &str, params: SendMessageParams) -> BotReply {
    if params.text.trim().is_empty() {
        return Err(ApiError::bad_request("message text is empty"));
    }

    let mut payload = serde_json::to_value(&params)?;
    stamp_date(&mut payload, state.store.clock().now_millis());

    let record = state.store.append_bot_message(payload, token).await;
    debug!(
        update_id = record.update_id,
        message_id = record.message_id,
        "bot message stored"
    );
    reply(format::bot_message(&record))
}

async fn get_updates(state: &AppState, token: &str, params: GetUpdatesParams) -> BotReply {
    if state.webhooks.get(token).is_some() {
        return Err(ApiError::conflict(
            "can't use getUpdates method while webhook is active; use deleteWebhook to delete the webhook first",
        ));
    }

    let limit = params
        .limit
        .unwrap_or(MAX_UPDATES_LIMIT)
        .clamp(1, MAX_UPDATES_LIMIT);
    let offset = params.offset.unwrap_or(0);

    // A positive offset confirms every earlier update.
    if offset > 0 {
        state.store.acknowledge(Origin::User, token, offset).await;
    } else if offset < 0 {
        let pending = state.store.query(Origin::User, Some(token)).await;
        let keep_from = pending.len().saturating_sub(offset.unsigned_abs() as usize);
        if let Some(first_kept) = pending.get(keep_from) {
            state
                .store
                .acknowledge(Origin::User, token, first_kept.update_id)
                .await;
        }
    }

    let timeout_secs = params.timeout.unwrap_or(0).min(MAX_POLL_TIMEOUT_SECS);
    let timeout = Duration::from_secs(timeout_secs);
    let records: Vec<MessageRecord> =
        wait_for_updates(state.store.notifier(), Origin::User, timeout, || {
            let store = state.store.clone();
            async move {
                store
                    .query(Origin::User, Some(token))
                    .await
                    .into_iter()
                    .take(limit)
                    .collect::<Vec<_>>()
            }
        })
        .await;

    let delivered: Vec<i64> = records.iter().map(|r| r.update_id).collect();
    state.store.mark_read(Origin::User, &delivered).await;

    let updates: Vec<Update> = records.iter().map(format::user_update).collect();
    reply(updates)
}

async fn delete_message(state: &AppState, params: DeleteMessageParams) -> BotReply {
    let chat_id = params
        .chat_id
        .as_i64()
        .ok_or_else(|| ApiError::bad_request("chat not found"))?;

    if state.store.delete_message(chat_id, params.message_id).await {
        reply(true)
    } else {
        Err(ApiError::bad_request("message to delete not found"))
    }
}

fn set_webhook(state: &AppState, token: &str, params: SetWebhookParams) -> BotReply {
    if params.url.trim().is_empty() {
        state.webhooks.remove(token);
        return reply(true);
    }

    let url = reqwest::Url::parse(&params.url)
        .map_err(|e| ApiError::bad_request(format!("bad webhook: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::bad_request(
            "bad webhook: HTTP or HTTPS URL must be provided",
        ));
    }

    info!(url = %url, "webhook registered");
    state.webhooks.set(
        token,
        Webhook {
            url: url.to_string(),
            secret_token: params.secret_token,
        },
    );
    reply(true)
}

async fn get_webhook_info(state: &AppState, token: &str) -> BotReply {
    let pending = state.store.query(Origin::User, Some(token)).await.len();
    let info = WebhookInfo {
        url: state
            .webhooks
            .get(token)
            .map(|hook| hook.url)
            .unwrap_or_default(),
        has_custom_certificate: false,
        pending_update_count: pending,
    };
    reply(info)
}
