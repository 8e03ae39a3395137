//! Telegram Bot API wire types.
//!
//! Only the subset of the real schema that bots commonly exercise is modelled.
//! Messages keep unknown fields in a flattened `extra` map so payloads pass
//! through the test double without losing data.

pub mod requests;
pub mod response;
pub mod types;

pub use requests::*;
pub use response::ApiResponse;
pub use types::*;
