//! Checkout backend for the storefront: payment intent creation, order completion and the Stripe
//! webhook, plus the startup environment guard.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use stripe::Currency;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod ids;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod stripe_webhook;

use handlers::{
    complete_order_handler, create_payment_intent_handler, health_handler, stripe_key_handler,
};
use notifications::OrderNotifier;
use orders::store::OrderStore;
use payments::PaymentGateway;
use stripe_webhook::{webhook_handler, WebhookState};

/// Shared, immutable state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn PaymentGateway>,
    pub orders: Arc<dyn OrderStore>,
    pub notifier: OrderNotifier,
    pub currency: Currency,
    pub publishable_key: Option<String>,
    /// Present only when a webhook signing secret is configured.
    pub webhook: Option<WebhookState>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn PaymentGateway>, orders: Arc<dyn OrderStore>) -> Self {
        Self {
            gateway,
            orders,
            notifier: OrderNotifier::new(),
            currency: Currency::USD,
            publishable_key: None,
            webhook: None,
        }
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_publishable_key(mut self, key: Option<String>) -> Self {
        self.publishable_key = key;
        self
    }

    pub fn with_webhook(mut self, webhook: Option<WebhookState>) -> Self {
        self.webhook = webhook;
        self
    }
}

/// Configure HTTP routes
pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/stripe_key", get(stripe_key_handler))
        .route("/payment-intent", post(create_payment_intent_handler))
        .route("/orders/complete", post(complete_order_handler));
    if state.webhook.is_some() {
        router = router.route("/webhook", post(webhook_handler));
    }
    router.layer(TraceLayer::new_for_http()).with_state(state)
}
