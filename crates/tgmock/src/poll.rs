//! Long-poll retrieval.
//!
//! Two strategies with the same observable contract: return the first
//! non-empty batch, or give up once the deadline has passed.
//!
//! - [`poll_until_nonempty`] re-queries on a fixed interval. Clients use it
//!   against the HTTP surface, and it runs on an injected [`Clock`].
//! - [`wait_for_updates`] parks on the store's [`Notifier`] and re-queries
//!   only when something was appended. The server uses it for `getUpdates`
//!   with a `timeout`.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::clock::{Clock, duration_millis};
use crate::store::{Notifier, Origin};

/// Default pause between empty polls.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Default overall deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Shortest pause between polls; a zero interval would spin.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Per-client polling schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// No non-empty batch arrived before the deadline.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("no updates within {} ms", timeout.as_millis())]
pub struct PollTimeout {
    /// The configured deadline, not the time actually spent.
    pub timeout: Duration,
}

/// Query until the result is non-empty, sleeping `interval` between tries.
///
/// Fails with [`PollTimeout`] once `timeout` has elapsed on `clock`. Query
/// errors are returned immediately without retrying.
pub async fn poll_until_nonempty<C, F, Fut, T, E>(
    clock: &C,
    config: PollConfig,
    mut query: F,
) -> Result<Vec<T>, E>
where
    C: Clock + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
    E: From<PollTimeout>,
{
    let started = clock.monotonic_millis();
    let timeout_millis = duration_millis(config.timeout);
    let interval = config.interval.max(MIN_INTERVAL);

    loop {
        let batch = query().await?;
        if !batch.is_empty() {
            return Ok(batch);
        }

        let elapsed = clock.monotonic_millis().saturating_sub(started);
        if elapsed >= timeout_millis {
            return Err(PollTimeout {
                timeout: config.timeout,
            }
            .into());
        }

        let remaining = Duration::from_millis((timeout_millis - elapsed) as u64);
        clock.sleep(interval.min(remaining)).await;
    }
}

/// Query, and while the result is empty wait for the next append on `origin`.
///
/// Returns an empty batch when `timeout` passes first, matching the Bot API's
/// `getUpdates` behaviour. A zero timeout queries exactly once.
pub async fn wait_for_updates<F, Fut, T>(
    notifier: &Notifier,
    origin: Origin,
    timeout: Duration,
    mut query: F,
) -> Vec<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Vec<T>>,
{
    // A deadline past the end of the timeline means no deadline at all.
    let deadline = tokio::time::Instant::now().checked_add(timeout);

    loop {
        // Register before querying so an append in between still wakes us.
        let waiter = notifier.wait_for_next(origin);
        let batch = query().await;
        if !batch.is_empty() || timeout.is_zero() {
            return batch;
        }

        match deadline {
            Some(deadline) => {
                if tokio::time::timeout_at(deadline, waiter.fired()).await.is_err() {
                    return Vec::new();
                }
            }
            None => {
                waiter.fired().await;
            }
        }
    }
}
