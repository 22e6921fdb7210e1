use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use stripe::{Event, EventObject, EventType, Webhook};
use tracing::{error, info, trace};

use crate::database::models::NewPaymentEvent;
use crate::orders::store::StoreError;
use crate::payments::PaymentStatus;
use crate::AppState;

/// Sink for payment-intent status transitions received from Stripe.
#[async_trait]
pub trait PaymentEventStore: Send + Sync {
    /// Stores `event` unless one with the same Stripe event id exists. Returns whether it was
    /// stored.
    async fn record(&self, event: NewPaymentEvent) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct WebhookState {
    pub secret: String,
    pub events: Arc<dyn PaymentEventStore>,
}

/// Custom extractor for Stripe webhook events.
pub struct StripeEvent(pub Event);

impl FromRequest<AppState> for StripeEvent {
    type Rejection = Response;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        trace!("Received webhook event");
        let Some(webhook) = &state.webhook else {
            error!("Webhook received but no signing secret is configured");
            return Err(StatusCode::NOT_FOUND.into_response());
        };

        let signature = req
            .headers()
            .get("stripe-signature")
            .ok_or_else(|| {
                error!("Webhook request is missing the stripe-signature header");
                StatusCode::BAD_REQUEST.into_response()
            })?
            .to_str()
            .map_err(|e| {
                error!("Error converting signature to string: {e}");
                StatusCode::BAD_REQUEST.into_response()
            })?
            .to_string();

        trace!("Signature: {signature}");

        let payload = String::from_request(req, state).await.map_err(|e| {
            error!("Encountered error {e:?} when converting request to payload as string");
            e.into_response()
        })?;

        // Construct and verify the event.
        let event = Webhook::construct_event(&payload, &signature, &webhook.secret).map_err(|e| {
            error!("Error constructing event: {e:?}");
            StatusCode::BAD_REQUEST.into_response()
        })?;
        trace!("Event: {event:?}");
        Ok(Self(event))
    }
}

/// Webhook handler that records payment intent transitions.
#[tracing::instrument(skip(state, stripe_event))]
pub async fn webhook_handler(
    State(state): State<AppState>,
    StripeEvent(stripe_event): StripeEvent,
) -> Response {
    let Some(webhook) = &state.webhook else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match PaymentStatus::try_from(stripe_event.type_) {
        Ok(payment_status) => {
            if let EventObject::PaymentIntent(payment_intent) = &stripe_event.data.object {
                info!(
                    "PaymentIntent status update: id={}, status={}, amount={}",
                    payment_intent.id, payment_status, payment_intent.amount
                );

                let record = NewPaymentEvent::new(
                    stripe_event.id.to_string(),
                    payment_intent.id.to_string(),
                    payment_status,
                    Some(payment_intent.amount),
                    Some(payment_intent.currency.to_string()),
                    payment_intent.customer.as_ref().map(|c| c.id().to_string()),
                    serde_json::to_value(&payment_intent.metadata).ok(),
                );
                match webhook.events.record(record).await {
                    Ok(true) => {}
                    Ok(false) => info!("Event {} was already recorded", stripe_event.id),
                    Err(e) => {
                        error!("Failed to record payment event: {e}");
                        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to record event")
                            .into_response();
                    }
                }
            }
        }
        Err(_) => match &stripe_event.data.object {
            EventObject::Charge(charge) if stripe_event.type_ == EventType::ChargeSucceeded => {
                info!("Charge succeeded: id={}", charge.id);
            }
            _ => info!("Unhandled event type: {}", stripe_event.type_),
        },
    }
    (StatusCode::OK, "Webhook received").into_response()
}
