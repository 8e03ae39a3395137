//! Time source shared by the store and the polling loops.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

/// Wall clock plus an async sleep, injectable for tests.
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;

    /// Milliseconds on a timeline that never steps backwards. Only
    /// differences between two readings are meaningful.
    fn monotonic_millis(&self) -> i64 {
        self.now_millis()
    }

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Real time: chrono for timestamps, tokio for sleeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn monotonic_millis(&self) -> i64 {
        static ANCHOR: OnceLock<tokio::time::Instant> = OnceLock::new();
        let anchor = *ANCHOR.get_or_init(tokio::time::Instant::now);
        duration_millis(tokio::time::Instant::now().saturating_duration_since(anchor))
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual time that only moves when told to.
///
/// `sleep` advances the clock by the requested duration and yields once, so a
/// polling loop driven by this clock runs through its whole schedule without
/// any real delay.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.now
            .fetch_add(duration_millis(duration), Ordering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

/// Duration as whole milliseconds, saturating at `i64::MAX`.
pub fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
