//! In-memory Telegram Bot API test double.
//!
//! A [`TelegramServer`] speaks enough of the Bot API for a bot under test to
//! poll it, while a [`TelegramClient`] plays the chat user on the other side.
//! Both directions land in one [`UpdateStore`].

pub mod api;
pub mod client;
pub mod clock;
pub mod config;
pub mod poll;
pub mod server;
pub mod store;
pub mod webhook;

pub use client::{ClientError, ClientOptions, ClientResult, TelegramClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ServerConfig, StorageKind};
pub use poll::{PollConfig, PollTimeout, poll_until_nonempty, wait_for_updates};
pub use server::TelegramServer;
pub use store::{
    EvictionDaemon, MessageRecord, Notifier, Origin, StoreError, StoreEvent, UpdateStore,
};
pub use tgmock_protocol as protocol;
