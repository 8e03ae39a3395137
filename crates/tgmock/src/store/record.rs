//! Stored message plus its store-assigned metadata.

use std::fmt;

use serde_json::Value;

/// Which side sent a message, and therefore which log holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Bot,
    User,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bot => f.write_str("bot"),
            Self::User => f.write_str("user"),
        }
    }
}

/// One message held by the [`UpdateStore`](super::UpdateStore).
///
/// Records are immutable once appended apart from `is_read`.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    /// Log the record lives in.
    pub origin: Origin,
    /// Creation time in epoch milliseconds. Only used for eviction.
    pub stored_at: i64,
    /// Bot whose conversation this record belongs to.
    pub bot_token: String,
    /// Message body exactly as the sender supplied it (plus a `date` stamp).
    pub payload: Value,
    /// Unique across both logs; the deletion handle and delivery order.
    pub update_id: i64,
    /// Unique across both logs; the message's identity inside its chat.
    pub message_id: i64,
    /// Set once the record has been handed to the other side.
    pub is_read: bool,
}

impl MessageRecord {
    /// Payload `date` in Unix seconds, `0` when absent.
    pub fn date(&self) -> i64 {
        self.payload.get("date").and_then(value_as_i64).unwrap_or(0)
    }

    /// Chat the message was sent to.
    ///
    /// Bot sends carry a top-level `chat_id`; user sends carry a `chat` object.
    pub fn chat_id(&self) -> Option<i64> {
        self.payload
            .get("chat_id")
            .and_then(value_as_i64)
            .or_else(|| {
                self.payload
                    .get("chat")
                    .and_then(|chat| chat.get("id"))
                    .and_then(value_as_i64)
            })
    }

    /// Whether the payload is a simulated inline-button press.
    pub fn is_callback(&self) -> bool {
        self.payload
            .get("callbackQuery")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
