//! The two message logs, their identity counters and TTL eviction.

use std::sync::Arc;

use log::debug;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::clock::{Clock, SystemClock};

use super::notifier::{Notifier, StoreEvent};
use super::record::{MessageRecord, Origin};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the store. None of them leave partial state behind.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    /// A required field is missing from the payload.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Logs and counters, always mutated together under one lock.
#[derive(Debug)]
struct StoreState {
    bot_log: Vec<MessageRecord>,
    user_log: Vec<MessageRecord>,
    next_update_id: i64,
    next_message_id: i64,
}

impl StoreState {
    fn new() -> Self {
        Self {
            bot_log: Vec::new(),
            user_log: Vec::new(),
            next_update_id: 1,
            next_message_id: 1,
        }
    }

    fn log(&self, origin: Origin) -> &Vec<MessageRecord> {
        match origin {
            Origin::Bot => &self.bot_log,
            Origin::User => &self.user_log,
        }
    }

    fn log_mut(&mut self, origin: Origin) -> &mut Vec<MessageRecord> {
        match origin {
            Origin::Bot => &mut self.bot_log,
            Origin::User => &mut self.user_log,
        }
    }

    fn remove_update(&mut self, origin: Origin, update_id: i64) -> bool {
        let log = self.log_mut(origin);
        match log.iter().position(|r| r.update_id == update_id) {
            Some(pos) => {
                log.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// In-memory, TTL-bounded store of bot and user messages.
///
/// `update_id` and `message_id` come from two counters shared by both logs,
/// so ids are unique across the store and are never handed out twice, not
/// even after eviction, deletion or [`reset`](Self::reset).
pub struct UpdateStore {
    state: RwLock<StoreState>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
}

impl UpdateStore {
    /// Create an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store that stamps records with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(StoreState::new()),
            notifier: Notifier::new(),
            clock,
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Append a message sent by the bot identified by `bot_token`.
    pub async fn append_bot_message(
        &self,
        payload: Value,
        bot_token: impl Into<String>,
    ) -> MessageRecord {
        self.append(Origin::Bot, bot_token.into(), payload).await
    }

    /// Append a message sent by a simulated user.
    ///
    /// The payload must name its bot in a `botToken` field.
    pub async fn append_user_message(&self, payload: Value) -> StoreResult<MessageRecord> {
        let bot_token = payload
            .get("botToken")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                StoreError::InvalidArgument(
                    "user message must contain a `botToken` field".to_string(),
                )
            })?;

        Ok(self.append(Origin::User, bot_token, payload).await)
    }

    async fn append(&self, origin: Origin, bot_token: String, payload: Value) -> MessageRecord {
        let record = {
            let mut state = self.state.write().await;
            // Stamped under the lock so `stored_at` order follows `update_id` order.
            let record = MessageRecord {
                origin,
                stored_at: self.clock.now_millis(),
                bot_token,
                payload,
                update_id: state.next_update_id,
                message_id: state.next_message_id,
                is_read: false,
            };
            state.next_update_id += 1;
            state.next_message_id += 1;
            state.log_mut(origin).push(record.clone());
            record
        };

        debug!(
            "stored {} message update_id={} message_id={}",
            origin, record.update_id, record.message_id
        );

        self.notifier.notify(StoreEvent {
            origin,
            update_id: record.update_id,
            bot_token: record.bot_token.clone(),
        });
        record
    }

    /// Records of one log, optionally limited to one bot, in `update_id` order.
    pub async fn query(&self, origin: Origin, bot_token: Option<&str>) -> Vec<MessageRecord> {
        let state = self.state.read().await;
        state
            .log(origin)
            .iter()
            .filter(|r| bot_token.is_none_or(|token| r.bot_token == token))
            .cloned()
            .collect()
    }

    /// Both logs for one bot, merged and sorted by payload `date`.
    ///
    /// Ties keep `update_id` order. Nothing is marked read or removed.
    pub async fn query_history(&self, bot_token: &str) -> Vec<MessageRecord> {
        let state = self.state.read().await;
        let mut history: Vec<MessageRecord> = state
            .bot_log
            .iter()
            .chain(state.user_log.iter())
            .filter(|r| r.bot_token == bot_token)
            .cloned()
            .collect();
        history.sort_by_key(|r| (r.date(), r.update_id));
        history
    }

    /// Look up a single record by `update_id`.
    pub async fn get(&self, origin: Origin, update_id: i64) -> Option<MessageRecord> {
        let state = self.state.read().await;
        state
            .log(origin)
            .iter()
            .find(|r| r.update_id == update_id)
            .cloned()
    }

    /// Flag the given records as delivered.
    pub async fn mark_read(&self, origin: Origin, update_ids: &[i64]) {
        let mut state = self.state.write().await;
        for record in state.log_mut(origin).iter_mut() {
            if update_ids.contains(&record.update_id) {
                record.is_read = true;
            }
        }
    }

    /// Remove and return every record of `bot_token` in `origin`'s log.
    ///
    /// Filtering and removal happen under one write lock, so concurrent
    /// callers never receive the same record.
    pub async fn take(&self, origin: Origin, bot_token: &str) -> Vec<MessageRecord> {
        let mut state = self.state.write().await;
        let log = state.log_mut(origin);
        let (taken, kept): (Vec<_>, Vec<_>) = log
            .drain(..)
            .partition(|r| r.bot_token == bot_token);
        *log = kept;
        taken
    }

    /// Remove one record from `origin`'s log. Missing ids are a no-op.
    pub async fn delete_by_update_id(&self, origin: Origin, update_id: i64) -> bool {
        let mut state = self.state.write().await;
        state.remove_update(origin, update_id)
    }

    /// Remove every record of `bot_token` in `origin`'s log below `offset`.
    ///
    /// This is how a `getUpdates` offset confirms earlier updates.
    pub async fn acknowledge(&self, origin: Origin, bot_token: &str, offset: i64) -> usize {
        let mut state = self.state.write().await;
        let confirmed: Vec<i64> = state
            .log(origin)
            .iter()
            .filter(|r| r.bot_token == bot_token && r.update_id < offset)
            .map(|r| r.update_id)
            .collect();
        for update_id in &confirmed {
            state.remove_update(origin, *update_id);
        }
        confirmed.len()
    }

    /// Delete the message `message_id` of chat `chat_id`.
    ///
    /// The bot log is searched before the user log and only the first match
    /// is removed. Returns whether anything was deleted.
    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> bool {
        let mut state = self.state.write().await;
        for origin in [Origin::Bot, Origin::User] {
            let log = state.log_mut(origin);
            if let Some(pos) = log
                .iter()
                .position(|r| r.message_id == message_id && r.chat_id() == Some(chat_id))
            {
                let removed = log.remove(pos);
                debug!(
                    "deleted {} message {} from chat {} (update_id={})",
                    origin, message_id, chat_id, removed.update_id
                );
                return true;
            }
        }
        false
    }

    /// Drop records stored at or before `now - ttl_millis` from both logs.
    ///
    /// Returns how many records were evicted.
    pub async fn evict_expired(&self, ttl_millis: i64, now: i64) -> usize {
        let cutoff = now.saturating_sub(ttl_millis);
        let mut state = self.state.write().await;
        let before = state.bot_log.len() + state.user_log.len();
        state.bot_log.retain(|r| r.stored_at > cutoff);
        state.user_log.retain(|r| r.stored_at > cutoff);
        before - (state.bot_log.len() + state.user_log.len())
    }

    /// Empty both logs. Identity counters keep counting.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        state.bot_log.clear();
        state.user_log.clear();
    }

    /// Number of records in `origin`'s log.
    pub async fn len(&self, origin: Origin) -> usize {
        self.state.read().await.log(origin).len()
    }

    pub async fn is_empty(&self) -> bool {
        let state = self.state.read().await;
        state.bot_log.is_empty() && state.user_log.is_empty()
    }
}

impl Default for UpdateStore {
    fn default() -> Self {
        Self::new()
    }
}
