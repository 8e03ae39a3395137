//! Background sweep that keeps the store bounded by its time-to-live.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::clock::duration_millis;

use super::update_store::UpdateStore;

/// Periodically evicts expired records from an [`UpdateStore`].
///
/// The sweep period equals the TTL, so a record can survive for up to twice
/// the TTL before it is dropped.
pub struct EvictionDaemon {
    store: Arc<UpdateStore>,
    ttl: Duration,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl EvictionDaemon {
    pub fn new(store: Arc<UpdateStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            running: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            handle: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the sweep loop. Starting a running daemon does nothing.
    pub async fn start(&self) {
        if self.ttl.is_zero() {
            warn!("eviction disabled: store TTL is zero");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let store = self.store.clone();
        let running = self.running.clone();
        let wake = self.wake.clone();
        let ttl = self.ttl;
        let ttl_millis = duration_millis(ttl);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(ttl) => {}
                    _ = wake.notified() => {}
                }
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let now = store.clock().now_millis();
                let evicted = store.evict_expired(ttl_millis, now).await;
                if evicted > 0 {
                    debug!("evicted {} expired record(s)", evicted);
                }
            }
        });

        *self.handle.lock().await = Some(handle);
        info!("eviction daemon started (ttl {:?})", ttl);
    }

    /// Ask the loop to exit and wait until it has.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        // A stored permit makes the next wait return at once even if the
        // loop is mid-sweep right now.
        self.wake.notify_one();

        let Some(handle) = self.handle.lock().await.take() else {
            return;
        };
        if let Err(e) = handle.await {
            warn!("eviction daemon ended abnormally: {:?}", e);
        }
        info!("eviction daemon stopped");
    }
}
