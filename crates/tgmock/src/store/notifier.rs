//! Broadcast wake-up signal per message direction.

use tokio::sync::broadcast;

use super::record::Origin;

/// Capacity of each direction's broadcast channel.
pub const EVENT_BUFFER_SIZE: usize = 256;

/// Announcement that a record was appended.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    pub origin: Origin,
    pub update_id: i64,
    pub bot_token: String,
}

/// Pub/sub signal with one channel per [`Origin`].
///
/// Waiters only observe appends that happen after they registered; nothing is
/// replayed. Every waiter registered on a channel sees the same firing.
#[derive(Debug)]
pub struct Notifier {
    bot_tx: broadcast::Sender<StoreEvent>,
    user_tx: broadcast::Sender<StoreEvent>,
}

impl Notifier {
    pub fn new() -> Self {
        let (bot_tx, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        let (user_tx, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self { bot_tx, user_tx }
    }

    fn sender(&self, origin: Origin) -> &broadcast::Sender<StoreEvent> {
        match origin {
            Origin::Bot => &self.bot_tx,
            Origin::User => &self.user_tx,
        }
    }

    /// Fire the event's channel. Having no waiters is fine.
    pub fn notify(&self, event: StoreEvent) {
        let _ = self.sender(event.origin).send(event);
    }

    /// Register for the next append on `origin`.
    ///
    /// Registration happens here, not when the returned waiter is first
    /// polled, so a caller can register, query, and then wait without losing
    /// an append that lands in between.
    pub fn wait_for_next(&self, origin: Origin) -> Waiter {
        Waiter {
            rx: self.sender(origin).subscribe(),
        }
    }

    /// Raw event stream for long-lived consumers such as the webhook dispatcher.
    pub fn subscribe(&self, origin: Origin) -> broadcast::Receiver<StoreEvent> {
        self.sender(origin).subscribe()
    }

    /// Number of registered waiters and subscribers on `origin`.
    pub fn receiver_count(&self, origin: Origin) -> usize {
        self.sender(origin).receiver_count()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot suspension handle returned by [`Notifier::wait_for_next`].
#[derive(Debug)]
pub struct Waiter {
    rx: broadcast::Receiver<StoreEvent>,
}

impl Waiter {
    /// Resolve with the first append after registration.
    ///
    /// Never resolves if nothing is appended; compose with a timeout.
    pub async fn fired(mut self) -> StoreEvent {
        loop {
            match self.rx.recv().await {
                Ok(event) => return event,
                // Missed some events; the next recv yields the oldest kept one.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return std::future::pending::<StoreEvent>().await;
                }
            }
        }
    }
}
