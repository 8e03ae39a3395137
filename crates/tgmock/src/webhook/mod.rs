//! Webhook delivery of user updates.
//!
//! Once a bot calls `setWebhook`, user updates for its token are pushed to
//! the registered URL instead of waiting for `getUpdates`.

mod dispatcher;

pub use dispatcher::WebhookDispatcher;

use dashmap::DashMap;

/// Header carrying the secret passed to `setWebhook`.
pub const SECRET_TOKEN_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// A registered webhook target.
#[derive(Debug, Clone, PartialEq)]
pub struct Webhook {
    pub url: String,
    pub secret_token: Option<String>,
}

/// Bot token -> webhook.
#[derive(Debug, Default)]
pub struct WebhookRegistry {
    hooks: DashMap<String, Webhook>,
}

impl WebhookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, bot_token: &str, webhook: Webhook) {
        self.hooks.insert(bot_token.to_string(), webhook);
    }

    pub fn get(&self, bot_token: &str) -> Option<Webhook> {
        self.hooks.get(bot_token).map(|hook| hook.value().clone())
    }

    pub fn remove(&self, bot_token: &str) -> Option<Webhook> {
        self.hooks.remove(bot_token).map(|(_, hook)| hook)
    }

    pub fn clear(&self) {
        self.hooks.clear();
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
