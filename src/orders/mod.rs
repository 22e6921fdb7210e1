use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::errors::ApiError;
use crate::ids::generate_id;
use crate::notifications::{OrderConfirmed, OrderNotifier};
use crate::payments::{CustomerProfile, PaymentGateway};

pub mod store;
use store::{InsertOutcome, OrderStore};

/// A finalized purchase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRecord {
    pub id: String,
    pub cart_id: String,
    pub payment_intent_id: String,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_details: Option<Value>,
    pub amount: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Customer fields the storefront sends with a completion request. Unknown keys are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CustomerDetails {
    fn email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }

    fn profile(&self) -> Option<CustomerProfile> {
        self.email().map(|email| CustomerProfile {
            email: email.to_string(),
            name: self.full_name(),
            phone: self.phone.clone(),
        })
    }
}

/// Validated completion input.
#[derive(Debug, Clone)]
pub struct CompleteOrder {
    pub cart_id: String,
    pub payment_intent_id: String,
    pub customer_details: Option<CustomerDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedOrder {
    pub order_id: String,
    /// True when the payment intent had already been turned into an order.
    pub already_completed: bool,
}

/// Fails unless `existing` was created for the same cart: a payment intent pays for one cart.
fn ensure_same_cart(existing: OrderRecord, cart_id: &str) -> Result<CompletedOrder, ApiError> {
    if existing.cart_id != cart_id {
        warn!(
            "Payment intent {} already paid for cart {}, not {cart_id}",
            existing.payment_intent_id, existing.cart_id
        );
        return Err(ApiError::PaymentIntentAlreadyUsed(existing.payment_intent_id));
    }
    Ok(CompletedOrder {
        order_id: existing.id,
        already_completed: true,
    })
}

/// Verifies the payment, records the order exactly once per payment intent and cart, then links
/// the customer.
///
/// The Stripe customer is resolved only after the ledger insert succeeds, so requests that lose a
/// race or hit an already-converted cart never create customers. Linking is best effort: the
/// order stands even if the customer lookup fails.
#[tracing::instrument(skip(gateway, store, notifier))]
pub async fn complete_order(
    gateway: &dyn PaymentGateway,
    store: &dyn OrderStore,
    notifier: &OrderNotifier,
    request: CompleteOrder,
) -> Result<CompletedOrder, ApiError> {
    if let Some(existing) = store.find_by_payment_intent(&request.payment_intent_id).await? {
        info!(
            "Payment intent {} already completed as order {}",
            request.payment_intent_id, existing.id
        );
        return ensure_same_cart(existing, &request.cart_id);
    }

    let payment_intent = gateway
        .retrieve_payment_intent(&request.payment_intent_id)
        .await?;
    if !payment_intent.status.is_settled() {
        return Err(ApiError::PaymentNotCompleted {
            status: payment_intent.status.to_string(),
        });
    }

    let profile = request
        .customer_details
        .as_ref()
        .and_then(CustomerDetails::profile);

    let customer_details = request
        .customer_details
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| ApiError::Internal(format!("serializing customer details: {e}")))?;

    let order = OrderRecord {
        id: generate_id(Some("order")),
        cart_id: request.cart_id.clone(),
        payment_intent_id: payment_intent.id.clone(),
        customer_id: payment_intent.customer_id.clone(),
        customer_email: profile.as_ref().map(|p| p.email.clone()),
        customer_details,
        amount: payment_intent.amount,
        currency: payment_intent.currency.clone(),
        created_at: Utc::now(),
    };

    match store.insert(order).await? {
        InsertOutcome::Created(order) => {
            info!(
                "Created order {} for cart {} and payment intent {}",
                order.id, order.cart_id, order.payment_intent_id
            );
            if let Some(profile) = &profile {
                link_customer(gateway, store, &order.id, profile).await;
            }
            notifier.publish(OrderConfirmed {
                order_id: order.id.clone(),
                cart_id: order.cart_id,
                payment_intent_id: order.payment_intent_id,
                customer_email: order.customer_email,
                amount: order.amount,
                currency: order.currency,
            });
            Ok(CompletedOrder {
                order_id: order.id,
                already_completed: false,
            })
        }
        InsertOutcome::Existing(order) => ensure_same_cart(order, &request.cart_id),
        InsertOutcome::CartTaken { payment_intent_id } => {
            warn!(
                "Cart {} already completed with payment intent {payment_intent_id}",
                request.cart_id
            );
            Err(ApiError::CartAlreadyCompleted(request.cart_id))
        }
    }
}

async fn link_customer(
    gateway: &dyn PaymentGateway,
    store: &dyn OrderStore,
    order_id: &str,
    profile: &CustomerProfile,
) {
    let customer_id = match gateway.ensure_customer(profile).await {
        Ok(customer_id) => customer_id,
        Err(e) => {
            warn!("Could not resolve customer for order {order_id}: {e}");
            return;
        }
    };
    match store.link_customer(order_id, &customer_id).await {
        Ok(()) => info!("Linked customer {customer_id} to order {order_id}"),
        Err(e) => warn!("Could not link customer {customer_id} to order {order_id}: {e}"),
    }
}
