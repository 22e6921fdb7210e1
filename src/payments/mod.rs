//! Payment provider access. Stripe is the only provider; the [`PaymentGateway`] trait is the seam
//! the handlers depend on so the checkout flow can run against a fake in tests.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stripe::{Currency, EventType};
use thiserror::Error;

mod stripe_gateway;
pub use stripe_gateway::StripeGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("provider request failed: {0}")]
    Provider(String),
    #[error("invalid payment intent id `{0}`")]
    InvalidId(String),
    #[error("payment intent {0} was returned without a client secret")]
    MissingClientSecret(String),
}

/// Parameters for a new charge intent.
#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub amount: i64,
    pub currency: Currency,
    pub booking_id: String,
    pub customer_email: String,
    /// Forwarded to the provider so retried submissions resolve to the same intent.
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// What the order flow needs to know about an existing intent.
#[derive(Debug, Clone)]
pub struct PaymentIntentSummary {
    pub id: String,
    pub status: PaymentStatus,
    pub amount: i64,
    pub currency: String,
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerProfile {
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        request: NewPaymentIntent,
    ) -> Result<CreatedPaymentIntent, GatewayError>;

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<PaymentIntentSummary, GatewayError>;

    /// Returns the id of the customer with `profile.email`, creating one if none exists.
    async fn ensure_customer(&self, profile: &CustomerProfile) -> Result<String, GatewayError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Processing,
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    RequiresCapture,
    PartiallyFunded,
    Succeeded,
    Failed,
    Canceled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Processing => "processing",
            PaymentStatus::RequiresPaymentMethod => "requires_payment_method",
            PaymentStatus::RequiresConfirmation => "requires_confirmation",
            PaymentStatus::RequiresAction => "requires_action",
            PaymentStatus::RequiresCapture => "requires_capture",
            PaymentStatus::PartiallyFunded => "partially_funded",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Canceled => "canceled",
        }
    }

    /// Funds are captured or authorized for capture; an order may be created.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Succeeded | PaymentStatus::RequiresCapture)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<stripe::PaymentIntentStatus> for PaymentStatus {
    #[allow(unreachable_patterns)]
    fn from(status: stripe::PaymentIntentStatus) -> Self {
        use stripe::PaymentIntentStatus as S;
        match status {
            S::Canceled => PaymentStatus::Canceled,
            S::Processing => PaymentStatus::Processing,
            S::RequiresAction => PaymentStatus::RequiresAction,
            S::RequiresCapture => PaymentStatus::RequiresCapture,
            S::RequiresConfirmation => PaymentStatus::RequiresConfirmation,
            S::RequiresPaymentMethod => PaymentStatus::RequiresPaymentMethod,
            S::Succeeded => PaymentStatus::Succeeded,
            _ => PaymentStatus::Processing,
        }
    }
}

#[derive(Debug, Error)]
#[error("event type {0} does not describe a payment intent transition")]
pub struct NotAPaymentIntentEvent(pub EventType);

impl TryFrom<EventType> for PaymentStatus {
    type Error = NotAPaymentIntentEvent;

    fn try_from(event_type: EventType) -> Result<Self, Self::Error> {
        match event_type {
            EventType::PaymentIntentCreated => Ok(PaymentStatus::Created),
            EventType::PaymentIntentProcessing => Ok(PaymentStatus::Processing),
            EventType::PaymentIntentRequiresAction => Ok(PaymentStatus::RequiresAction),
            EventType::PaymentIntentAmountCapturableUpdated => Ok(PaymentStatus::RequiresCapture),
            EventType::PaymentIntentPartiallyFunded => Ok(PaymentStatus::PartiallyFunded),
            EventType::PaymentIntentSucceeded => Ok(PaymentStatus::Succeeded),
            EventType::PaymentIntentPaymentFailed => Ok(PaymentStatus::Failed),
            EventType::PaymentIntentCanceled => Ok(PaymentStatus::Canceled),
            other => Err(NotAPaymentIntentEvent(other)),
        }
    }
}
