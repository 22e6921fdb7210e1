#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use storefront_checkout::{
    app,
    orders::store::InMemoryOrderStore,
    payments::{
        CreatedPaymentIntent, CustomerProfile, GatewayError, NewPaymentIntent, PaymentGateway,
        PaymentIntentSummary, PaymentStatus,
    },
    AppState,
};
use tower::ServiceExt;

/// In-process stand-in for Stripe that records every call.
#[derive(Default)]
pub struct FakeGateway {
    counter: AtomicUsize,
    pub fail_requests: AtomicBool,
    pub created: Mutex<Vec<NewPaymentIntent>>,
    by_idempotency_key: Mutex<HashMap<String, CreatedPaymentIntent>>,
    statuses: Mutex<HashMap<String, PaymentStatus>>,
    pub customers: Mutex<HashMap<String, String>>,
    pub retrievals: AtomicUsize,
}

impl FakeGateway {
    pub fn set_status(&self, payment_intent_id: &str, status: PaymentStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(payment_intent_id.to_string(), status);
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_payment_intent(
        &self,
        request: NewPaymentIntent,
    ) -> Result<CreatedPaymentIntent, GatewayError> {
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(GatewayError::Provider("api_connection_error".into()));
        }
        if let Some(key) = &request.idempotency_key {
            if let Some(existing) = self.by_idempotency_key.lock().unwrap().get(key) {
                return Ok(existing.clone());
            }
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let created = CreatedPaymentIntent {
            id: format!("pi_test_{n}"),
            client_secret: format!("pi_test_{n}_secret_{n:04}"),
        };
        if let Some(key) = &request.idempotency_key {
            self.by_idempotency_key
                .lock()
                .unwrap()
                .insert(key.clone(), created.clone());
        }
        self.created.lock().unwrap().push(request);
        Ok(created)
    }

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<PaymentIntentSummary, GatewayError> {
        self.retrievals.fetch_add(1, Ordering::SeqCst);
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(GatewayError::Provider("api_connection_error".into()));
        }
        if !payment_intent_id.starts_with("pi_") {
            return Err(GatewayError::InvalidId(payment_intent_id.to_string()));
        }
        let status = self
            .statuses
            .lock()
            .unwrap()
            .get(payment_intent_id)
            .copied()
            .unwrap_or(PaymentStatus::Succeeded);
        Ok(PaymentIntentSummary {
            id: payment_intent_id.to_string(),
            status,
            amount: 4500,
            currency: "usd".to_string(),
            customer_id: None,
        })
    }

    async fn ensure_customer(&self, profile: &CustomerProfile) -> Result<String, GatewayError> {
        let mut customers = self.customers.lock().unwrap();
        let next = customers.len() + 1;
        Ok(customers
            .entry(profile.email.clone())
            .or_insert_with(|| format!("cus_test_{next}"))
            .clone())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    pub orders: Arc<InMemoryOrderStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_state(|state| state)
    }

    pub fn with_state(configure: impl FnOnce(AppState) -> AppState) -> Self {
        let gateway = Arc::new(FakeGateway::default());
        let orders = Arc::new(InMemoryOrderStore::new());
        let state = configure(AppState::new(gateway.clone(), orders.clone()));
        Self {
            router: app(state.clone()),
            state,
            gateway,
            orders,
        }
    }

    pub async fn post_json(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }
}
