//! HTTP surface of the test double.
//!
//! Two audiences share one router:
//! - the bot under test, through the Bot API shape `/bot<token>/<method>`;
//! - the test itself, playing the user, through `/sendMessage`,
//!   `/getUpdates` and friends.

mod error;
pub mod format;
mod handlers;
mod params;
mod routes;
mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
