//! In-memory update store.
//!
//! Two append-only logs (bot-originated and user-originated) share a pair of
//! monotonic identity counters. Every append is announced on the [`Notifier`]
//! so long-poll readers can wake up instead of spinning, and the
//! [`EvictionDaemon`] keeps the logs bounded by a time-to-live.

mod eviction;
mod notifier;
mod record;
mod update_store;

pub use eviction::EvictionDaemon;
pub use notifier::{EVENT_BUFFER_SIZE, Notifier, StoreEvent, Waiter};
pub use record::{MessageRecord, Origin};
pub use update_store::{StoreError, StoreResult, UpdateStore};
