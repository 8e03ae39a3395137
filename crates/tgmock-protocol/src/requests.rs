//! Request parameters for bot methods and the simulated-user endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{Chat, MessageEntity, User};

/// Target chat: numeric id or `@channelusername`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    Id(i64),
    Username(String),
}

impl ChatId {
    /// Numeric id, accepting numeric strings (form-encoded bodies send those).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Username(name) => name.trim().parse().ok(),
        }
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

/// `sendMessage` parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageParams {
    pub chat_id: ChatId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `getUpdates` parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetUpdatesParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Long-poll timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// JSON array, or its string encoding when sent as a form field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_updates: Option<Value>,
}

/// `deleteMessage` parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteMessageParams {
    pub chat_id: ChatId,
    pub message_id: i64,
}

/// `setWebhook` parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetWebhookParams {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<String>,
}

/// Body of the simulated-user retrieval endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

/// A message typed by the simulated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    #[serde(rename = "botToken")]
    pub bot_token: String,
    pub from: User,
    pub chat: Chat,
    /// Unix seconds.
    pub date: i64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<MessageEntity>>,
}

/// An inline-keyboard button press by the simulated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCallback {
    #[serde(rename = "botToken")]
    pub bot_token: String,
    pub from: User,
    pub chat: Chat,
    /// Unix seconds.
    pub date: i64,
    pub data: String,
    /// The bot message carrying the pressed button, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    /// Marks the stored payload as a callback query rather than a message.
    #[serde(rename = "callbackQuery")]
    pub callback_query: bool,
}
