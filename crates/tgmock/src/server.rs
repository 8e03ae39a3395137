//! The mock server: HTTP surface, eviction and webhook delivery around one store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use log::{info, warn};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

use crate::api::{AppState, create_router};
use crate::client::{ClientOptions, ClientResult, TelegramClient};
use crate::clock::{Clock, SystemClock};
use crate::config::ServerConfig;
use crate::store::{EvictionDaemon, MessageRecord, Origin, StoreEvent, UpdateStore};
use crate::webhook::{WebhookDispatcher, WebhookRegistry};

/// How long `stop` lets in-flight requests (long-polls included) finish.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Tasks owned by a started server.
struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    serve: JoinHandle<std::io::Result<()>>,
    dispatcher: JoinHandle<()>,
    eviction: EvictionDaemon,
}

/// In-memory Telegram Bot API server for tests.
///
/// The store outlives start/stop cycles, so update and message ids keep
/// increasing across restarts of the same server.
pub struct TelegramServer {
    config: ServerConfig,
    store: Arc<UpdateStore>,
    webhooks: Arc<WebhookRegistry>,
    running: Mutex<Option<Running>>,
}

impl TelegramServer {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ServerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            store: Arc::new(UpdateStore::with_clock(clock)),
            webhooks: Arc::new(WebhookRegistry::new()),
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<UpdateStore> {
        &self.store
    }

    pub fn webhooks(&self) -> &Arc<WebhookRegistry> {
        &self.webhooks
    }

    /// Bind and start serving. Returns the bound address.
    ///
    /// Calling `start` on a running server returns its current address.
    pub async fn start(&self) -> Result<SocketAddr> {
        let mut running = self.running.lock().await;
        if let Some(running) = running.as_ref() {
            return Ok(running.addr);
        }
        self.config.validate()?;

        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .with_context(|| {
                format!(
                    "binding to {}:{}",
                    self.config.host, self.config.port
                )
            })?;
        let addr = listener.local_addr().context("reading bound address")?;

        let state = AppState::new(self.store.clone(), self.webhooks.clone());
        let app = create_router(state);

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let serve = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let dispatcher =
            WebhookDispatcher::new(self.store.clone(), self.webhooks.clone())?.spawn();

        let eviction = EvictionDaemon::new(self.store.clone(), self.config.store_ttl());
        eviction.start().await;

        info!("Listening on http://{}", addr);
        *running = Some(Running {
            addr,
            shutdown,
            serve,
            dispatcher,
            eviction,
        });
        Ok(addr)
    }

    /// Stop serving, then drop every stored record and webhook.
    ///
    /// Stopping a server that is not running only clears its state.
    pub async fn stop(&self) -> Result<()> {
        let running = self.running.lock().await.take();
        if let Some(running) = running {
            let _ = running.shutdown.send(());

            let mut serve = running.serve;
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut serve).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => warn!("server ended with error: {:?}", e),
                Ok(Err(e)) => warn!("server task failed: {:?}", e),
                Err(_) => {
                    warn!("open connections outlived the shutdown grace period");
                    serve.abort();
                }
            }

            running.dispatcher.abort();
            running.eviction.stop().await;
            info!("Server on {} stopped", running.addr);
        }

        self.store.reset().await;
        self.webhooks.clear();
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Bound address, while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.addr)
    }

    /// Base URL clients should use. Falls back to the configured port before
    /// `start`.
    pub async fn url(&self) -> String {
        let port = self
            .local_addr()
            .await
            .map_or(self.config.port, |addr| addr.port());
        format!("http://{}:{}", self.config.host, port)
    }

    /// Resolves on the next message a bot sends.
    ///
    /// Registration happens when this is called, not when the future is
    /// first polled.
    pub fn wait_bot_message(&self) -> BoxFuture<'static, StoreEvent> {
        self.store.notifier().wait_for_next(Origin::Bot).fired().boxed()
    }

    /// Resolves on the next message or callback the user sends.
    pub fn wait_user_message(&self) -> BoxFuture<'static, StoreEvent> {
        self.store.notifier().wait_for_next(Origin::User).fired().boxed()
    }

    /// Snapshot of the bot log, oldest first.
    pub async fn bot_messages(&self) -> Vec<MessageRecord> {
        self.store.query(Origin::Bot, None).await
    }

    /// Snapshot of the user log, oldest first.
    pub async fn user_messages(&self) -> Vec<MessageRecord> {
        self.store.query(Origin::User, None).await
    }

    /// A simulated user talking to `bot_token` through this server.
    pub async fn get_client(
        &self,
        bot_token: impl Into<String>,
        options: ClientOptions,
    ) -> ClientResult<TelegramClient> {
        let url = self.url().await;
        TelegramClient::with_clock(url, bot_token, options, self.store.clock().clone())
    }
}
