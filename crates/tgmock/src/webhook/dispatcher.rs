//! Background task pushing user updates to registered webhooks.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::Client;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::api::format;
use crate::store::{MessageRecord, Origin, StoreEvent, UpdateStore};

use super::{SECRET_TOKEN_HEADER, Webhook, WebhookRegistry};

/// Per-request timeout for webhook calls.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Forwards each new user update to its bot's webhook, if one is set.
///
/// A delivered update (2xx answer) is removed from the user log. A failed
/// delivery stays in the log and is retried on the bot's next update, or
/// becomes available to `getUpdates` once the webhook is deleted.
pub struct WebhookDispatcher {
    store: Arc<UpdateStore>,
    registry: Arc<WebhookRegistry>,
    client: Client,
}

impl WebhookDispatcher {
    pub fn new(store: Arc<UpdateStore>, registry: Arc<WebhookRegistry>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(DELIVERY_TIMEOUT).build()?;
        Ok(Self {
            store,
            registry,
            client,
        })
    }

    /// Subscribe to user appends and deliver them until the task is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        let mut events = self.store.notifier().subscribe(Origin::User);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => self.handle(event).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!("webhook dispatcher skipped {} update(s)", missed);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("webhook dispatcher finished");
        })
    }

    /// Deliver every pending user update of the event's bot, oldest first.
    ///
    /// Updates that failed earlier, or were skipped after a lag, are retried
    /// here on the bot's next event. Delivery stops at the first failure to
    /// keep updates in order.
    async fn handle(&self, event: StoreEvent) {
        let Some(hook) = self.registry.get(&event.bot_token) else {
            return;
        };

        let pending = self
            .store
            .query(Origin::User, Some(&event.bot_token))
            .await;
        for record in pending {
            if !self.deliver(&hook, &record).await {
                break;
            }
        }
    }

    async fn deliver(&self, hook: &Webhook, record: &MessageRecord) -> bool {
        let update = format::user_update(record);
        let mut request = self.client.post(&hook.url).json(&update);
        if let Some(secret) = &hook.secret_token {
            request = request.header(SECRET_TOKEN_HEADER, secret);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                self.store
                    .delete_by_update_id(Origin::User, record.update_id)
                    .await;
                info!(
                    "delivered update {} to webhook {}",
                    record.update_id, hook.url
                );
                true
            }
            Ok(response) => {
                warn!(
                    "webhook {} answered {} for update {}",
                    hook.url,
                    response.status(),
                    record.update_id
                );
                false
            }
            Err(e) => {
                warn!(
                    "webhook {} unreachable for update {}: {}",
                    hook.url, record.update_id, e
                );
                false
            }
        }
    }
}
