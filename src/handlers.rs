use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::errors::ApiError;
use crate::orders::{complete_order, CompleteOrder, CustomerDetails};
use crate::payments::NewPaymentIntent;
use crate::AppState;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Fields are kept as raw JSON so a wrong-typed value is reported against its field name.
#[derive(Debug, Deserialize)]
pub struct PaymentIntentRequest {
    pub amount: Option<Value>,
    pub booking_id: Option<Value>,
    pub customer_email: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentIntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteOrderRequest {
    pub cart_id: Option<Value>,
    pub payment_intent_id: Option<Value>,
    pub customer_details: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteOrderResponse {
    pub success: bool,
    pub order_id: String,
    pub message: String,
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn wrong_type(field: &'static str, expected: &str, got: &Value) -> ApiError {
    ApiError::InvalidField {
        field,
        reason: format!("must be {expected}, got {}", json_kind(got)),
    }
}

/// A string field. Null, absent and blank values all count as missing.
fn string_field(value: Option<Value>, field: &'static str) -> Result<Option<String>, ApiError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(wrong_type(field, "a string", &other)),
    }
}

/// Only bytes that are not JSON at all are treated as server-side failures, matching the
/// storefront's contract for these endpoints. Well-formed JSON of the wrong shape is a client
/// error.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        error!("Error parsing request body: {e}");
        ApiError::MalformedBody(e.to_string())
    })?;
    if !value.is_object() {
        return Err(wrong_type("body", "a JSON object", &value));
    }
    serde_json::from_value(value).map_err(|e| ApiError::MalformedBody(e.to_string()))
}

impl PaymentIntentRequest {
    /// Returns `(amount, booking_id, customer_email)`. A zero amount counts as missing.
    fn validate(self) -> Result<(i64, String, String), ApiError> {
        let amount = match self.amount {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => Some(n),
            Some(other) => return Err(wrong_type("amount", "a positive integer", &other)),
        }
        .filter(|n| n.as_f64() != Some(0.0));
        let booking_id = string_field(self.booking_id, "booking_id")?;
        let customer_email = string_field(self.customer_email, "customer_email")?;

        let mut missing = Vec::new();
        if amount.is_none() {
            missing.push("amount");
        }
        if booking_id.is_none() {
            missing.push("booking_id");
        }
        let (Some(amount), Some(booking_id)) = (amount, booking_id) else {
            return Err(ApiError::MissingFields(missing));
        };

        let amount = amount
            .as_i64()
            .filter(|a| *a > 0)
            .ok_or_else(|| ApiError::InvalidField {
                field: "amount",
                reason: format!("must be a positive integer, got {amount}"),
            })?;
        Ok((amount, booking_id, customer_email.unwrap_or_default()))
    }
}

impl CompleteOrderRequest {
    fn validate(self) -> Result<CompleteOrder, ApiError> {
        let cart_id = string_field(self.cart_id, "cart_id")?;
        let payment_intent_id = string_field(self.payment_intent_id, "payment_intent_id")?;
        let customer_details = match self.customer_details {
            None | Some(Value::Null) => None,
            Some(details @ Value::Object(_)) => Some(
                serde_json::from_value::<CustomerDetails>(details).map_err(|e| {
                    ApiError::InvalidField {
                        field: "customer_details",
                        reason: e.to_string(),
                    }
                })?,
            ),
            Some(other) => return Err(wrong_type("customer_details", "an object", &other)),
        };

        let mut missing = Vec::new();
        if cart_id.is_none() {
            missing.push("cart_id");
        }
        if payment_intent_id.is_none() {
            missing.push("payment_intent_id");
        }
        match (cart_id, payment_intent_id) {
            (Some(cart_id), Some(payment_intent_id)) => Ok(CompleteOrder {
                cart_id,
                payment_intent_id,
                customer_details,
            }),
            _ => Err(ApiError::MissingFields(missing)),
        }
    }
}

/// POST /payment-intent creates a PaymentIntent for a booking with automatic payment methods
/// enabled.
#[tracing::instrument(skip(state, headers, body))]
pub async fn create_payment_intent_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PaymentIntentResponse>, ApiError> {
    let payload: PaymentIntentRequest = parse_body(&body)?;
    info!("Received payment intent request: {:?}", payload);
    let (amount, booking_id, customer_email) = payload.validate()?;

    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let created = state
        .gateway
        .create_payment_intent(NewPaymentIntent {
            amount,
            currency: state.currency,
            booking_id,
            customer_email,
            idempotency_key,
        })
        .await?;
    info!("Created payment intent {}", created.id);

    Ok(Json(PaymentIntentResponse {
        client_secret: created.client_secret,
        payment_intent_id: created.id,
    }))
}

/// POST /orders/complete turns a cart paid by a settled PaymentIntent into an order.
#[tracing::instrument(skip(state, body))]
pub async fn complete_order_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CompleteOrderResponse>, ApiError> {
    let payload: CompleteOrderRequest = parse_body(&body)?;
    info!(
        "Received order completion request: cart_id={:?}, payment_intent_id={:?}",
        payload.cart_id, payload.payment_intent_id
    );
    let request = payload.validate()?;

    let completed = complete_order(
        state.gateway.as_ref(),
        state.orders.as_ref(),
        &state.notifier,
        request,
    )
    .await?;

    let message = if completed.already_completed {
        "Order already completed"
    } else {
        "Order completed successfully"
    };
    Ok(Json(CompleteOrderResponse {
        success: true,
        order_id: completed.order_id,
        message: message.to_string(),
    }))
}

/// GET /health returns a simple text message.
#[tracing::instrument]
pub async fn health_handler() -> impl IntoResponse {
    "OK"
}

/// GET /stripe_key returns the Stripe publishable key for the storefront.
#[tracing::instrument(skip(state))]
pub async fn stripe_key_handler(State(state): State<AppState>) -> Json<Value> {
    info!("Handling stripe key request");
    Json(json!({ "publishable_key": state.publishable_key }))
}
