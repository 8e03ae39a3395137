//! Rendering stored records as Bot API objects.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tgmock_protocol::{CallbackQuery, Chat, Message, Update, User};

use crate::store::{MessageRecord, Origin};

/// Payload keys that are mapped onto typed fields or are store bookkeeping.
const RESERVED_KEYS: &[&str] = &[
    "botToken",
    "callbackQuery",
    "chat",
    "chat_id",
    "data",
    "date",
    "entities",
    "from",
    "message_id",
    "reply_markup",
    "text",
];

/// Numeric bot id, i.e. the part of the token before the colon.
pub fn bot_id(bot_token: &str) -> i64 {
    bot_token
        .split(':')
        .next()
        .and_then(|id| id.parse().ok())
        .unwrap_or(0)
}

/// The `User` object the test double answers `getMe` with.
pub fn bot_user(bot_token: &str) -> User {
    User {
        id: bot_id(bot_token),
        is_bot: true,
        first_name: "Test Bot".to_string(),
        last_name: None,
        username: Some("test_bot".to_string()),
        language_code: None,
    }
}

fn field<T: DeserializeOwned>(payload: &Value, key: &str) -> Option<T> {
    payload
        .get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn text(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

fn extra_fields(payload: &Value) -> Map<String, Value> {
    let mut extra = payload.as_object().cloned().unwrap_or_default();
    for key in RESERVED_KEYS {
        extra.remove(*key);
    }
    extra
}

/// Form-encoded requests carry `reply_markup` as a JSON string.
fn reply_markup(payload: &Value) -> Option<Value> {
    match payload.get("reply_markup")? {
        Value::String(raw) => {
            Some(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone())))
        }
        other => Some(other.clone()),
    }
}

fn chat_for(record: &MessageRecord) -> Chat {
    field::<Chat>(&record.payload, "chat").unwrap_or_else(|| {
        let id = record.chat_id().unwrap_or_default();
        let mut chat = Chat::private(id);
        if id < 0 {
            chat.kind = "group".to_string();
        }
        chat
    })
}

fn placeholder_user(id: i64) -> User {
    User {
        id,
        is_bot: false,
        first_name: "TestName".to_string(),
        last_name: None,
        username: None,
        language_code: None,
    }
}

/// A bot-sent record as the `Message` Telegram would return for it.
pub fn bot_message(record: &MessageRecord) -> Message {
    Message {
        message_id: record.message_id,
        date: record.date(),
        chat: chat_for(record),
        from: Some(bot_user(&record.bot_token)),
        text: text(&record.payload, "text"),
        entities: field(&record.payload, "entities"),
        reply_markup: reply_markup(&record.payload),
        extra: extra_fields(&record.payload),
    }
}

/// A user-sent record as the `Update` the bot receives.
pub fn user_update(record: &MessageRecord) -> Update {
    let chat = chat_for(record);
    let from = field::<User>(&record.payload, "from").unwrap_or_else(|| placeholder_user(chat.id));

    if record.is_callback() {
        let message = field::<i64>(&record.payload, "message_id").map(|message_id| Message {
            message_id,
            date: record.date(),
            chat: chat.clone(),
            from: Some(bot_user(&record.bot_token)),
            text: None,
            entities: None,
            reply_markup: None,
            extra: Map::new(),
        });
        return Update {
            update_id: record.update_id,
            message: None,
            callback_query: Some(CallbackQuery {
                id: record.update_id.to_string(),
                from,
                message,
                chat_instance: chat.id.to_string(),
                data: text(&record.payload, "data"),
            }),
        };
    }

    Update {
        update_id: record.update_id,
        message: Some(Message {
            message_id: record.message_id,
            date: record.date(),
            chat,
            from: Some(from),
            text: text(&record.payload, "text"),
            entities: field(&record.payload, "entities"),
            reply_markup: None,
            extra: extra_fields(&record.payload),
        }),
        callback_query: None,
    }
}

/// Any record as an `Update`, whichever side sent it.
pub fn to_update(record: &MessageRecord) -> Update {
    match record.origin {
        Origin::Bot => Update {
            update_id: record.update_id,
            message: Some(bot_message(record)),
            callback_query: None,
        },
        Origin::User => user_update(record),
    }
}
