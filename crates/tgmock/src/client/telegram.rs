//! HTTP client for the simulated-user endpoints.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tgmock_protocol::{
    ApiResponse, Chat, MessageEntity, TokenRequest, Update, User, UserCallback, UserMessage,
};

use crate::clock::{Clock, SystemClock};
use crate::poll::{self, PollConfig};

use super::error::{ClientError, ClientResult};

/// Identity of the simulated user and their polling schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    pub user_id: i64,
    pub first_name: String,
    pub user_name: String,
    pub chat_id: i64,
    pub chat_title: String,
    pub chat_type: String,
    /// Pause between empty polls in [`TelegramClient::get_updates`].
    pub interval: Duration,
    /// Give up on [`TelegramClient::get_updates`] after this long.
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        let poll = PollConfig::default();
        Self {
            user_id: 1,
            first_name: "TestName".to_string(),
            user_name: "testUserName".to_string(),
            chat_id: 1,
            chat_title: "Test Name".to_string(),
            chat_type: "private".to_string(),
            interval: poll.interval,
            timeout: poll.timeout,
        }
    }
}

impl ClientOptions {
    fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: self.interval,
            timeout: self.timeout,
        }
    }
}

/// A chat user talking to one bot through the mock server.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    /// Base URL of the server, without a trailing slash.
    base_url: String,
    bot_token: String,
    options: ClientOptions,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .field("bot_token", &self.bot_token)
            .field("options", &self.options)
            .finish()
    }
}

impl TelegramClient {
    pub fn new(
        base_url: impl Into<String>,
        bot_token: impl Into<String>,
        options: ClientOptions,
    ) -> ClientResult<Self> {
        Self::with_clock(base_url, bot_token, options, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new) with an explicit time source for dates and
    /// polling.
    pub fn with_clock(
        base_url: impl Into<String>,
        bot_token: impl Into<String>,
        options: ClientOptions,
        clock: Arc<dyn Clock>,
    ) -> ClientResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            bot_token: bot_token.into(),
            options,
            clock,
        })
    }

    pub fn bot_token(&self) -> &str {
        &self.bot_token
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    fn user(&self) -> User {
        User {
            id: self.options.user_id,
            is_bot: false,
            first_name: self.options.first_name.clone(),
            last_name: None,
            username: Some(self.options.user_name.clone()),
            language_code: None,
        }
    }

    fn chat(&self) -> Chat {
        Chat {
            id: self.options.chat_id,
            kind: self.options.chat_type.clone(),
            title: Some(self.options.chat_title.clone()),
            username: None,
            first_name: None,
        }
    }

    fn now_secs(&self) -> i64 {
        self.clock.now_millis() / 1000
    }

    /// Build a plain text message from this user.
    pub fn make_message(&self, text: impl Into<String>) -> UserMessage {
        UserMessage {
            bot_token: self.bot_token.clone(),
            from: self.user(),
            chat: self.chat(),
            date: self.now_secs(),
            text: text.into(),
            entities: None,
        }
    }

    /// Build a command message. The whole text is tagged as a `bot_command`.
    pub fn make_command(&self, command: impl Into<String>) -> UserMessage {
        let mut message = self.make_message(command);
        let length = message.text.encode_utf16().count();
        message.entities = Some(vec![MessageEntity::bot_command(length)]);
        message
    }

    /// Build a press of the inline button carrying `data`.
    pub fn make_callback_query(&self, data: impl Into<String>) -> UserCallback {
        UserCallback {
            bot_token: self.bot_token.clone(),
            from: self.user(),
            chat: self.chat(),
            date: self.now_secs(),
            data: data.into(),
            message_id: None,
            callback_query: true,
        }
    }

    pub async fn send_message(&self, message: &UserMessage) -> ClientResult<Update> {
        self.post("sendMessage", message).await
    }

    pub async fn send_command(&self, command: &UserMessage) -> ClientResult<Update> {
        self.post("sendCommand", command).await
    }

    pub async fn send_callback(&self, callback: &UserCallback) -> ClientResult<Update> {
        self.post("sendCallback", callback).await
    }

    /// Wait for the bot's replies.
    ///
    /// Polls on the configured interval until at least one message arrives,
    /// and fails with [`ClientError::Timeout`] once the timeout has passed.
    /// Returned messages are consumed on the server.
    pub async fn get_updates(&self) -> ClientResult<Vec<Update>> {
        let request = self.token_request();
        poll::poll_until_nonempty(self.clock.as_ref(), self.options.poll_config(), || {
            self.post::<_, Vec<Update>>("getUpdates", &request)
        })
        .await
    }

    /// The whole conversation with this bot, oldest first. Does not consume.
    pub async fn get_updates_history(&self) -> ClientResult<Vec<Update>> {
        self.post("getUpdatesHistory", &self.token_request()).await
    }

    fn token_request(&self) -> TokenRequest {
        TokenRequest {
            token: self.bot_token.clone(),
        }
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        debug!("POST {}", url);
        let response = self.client.post(&url).json(body).send().await?;

        let text = response.text().await?;
        let parsed: ApiResponse<T> =
            serde_json::from_str(&text).map_err(|e| ClientError::ParseError(e.to_string()))?;
        parsed
            .into_result()
            .map_err(|(code, description)| ClientError::Api { code, description })
    }
}
