//! Simulated chat user driving a running [`TelegramServer`](crate::TelegramServer).

mod error;
mod telegram;

pub use error::{ClientError, ClientResult};
pub use telegram::{ClientOptions, TelegramClient};
