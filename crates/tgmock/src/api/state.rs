//! Application state shared across handlers.

use std::sync::Arc;

use crate::store::UpdateStore;
use crate::webhook::WebhookRegistry;

/// Handles to the store and webhook registry owned by the running server.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<UpdateStore>,
    pub webhooks: Arc<WebhookRegistry>,
}

impl AppState {
    pub fn new(store: Arc<UpdateStore>, webhooks: Arc<WebhookRegistry>) -> Self {
        Self { store, webhooks }
    }
}
