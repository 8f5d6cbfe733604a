//! HTTP server for the lockfile bot.
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts GitHub webhook deliveries (returns 202 Accepted)
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::types::Trigger;
use crate::webhooks::WebhookSecret;

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::{WebhookError, webhook_handler};

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Secret for HMAC-SHA256 signature verification.
    webhook_secret: WebhookSecret,

    /// Queue feeding the dispatcher.
    triggers: mpsc::Sender<Trigger>,
}

impl AppState {
    pub fn new(webhook_secret: WebhookSecret, triggers: mpsc::Sender<Trigger>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                webhook_secret,
                triggers,
            }),
        }
    }

    pub fn webhook_secret(&self) -> &WebhookSecret {
        &self.inner.webhook_secret
    }

    pub fn triggers(&self) -> &mpsc::Sender<Trigger> {
        &self.inner.triggers
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}
