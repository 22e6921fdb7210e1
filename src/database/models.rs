use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::orders::OrderRecord;
use crate::payments::PaymentStatus;

#[derive(diesel_derive_enum::DbEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[ExistingTypePath = "crate::database::schema::sql_types::EventStatus"]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Draft,
    Active,
    SoldOut,
    Cancelled,
    Completed,
}

/// A bookable event. `current_bookings <= max_capacity` is not enforced by the schema, so callers
/// must check [`Event::can_accept`] before adding bookings.
#[derive(Queryable, Selectable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Event {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub event_date: DateTime<Utc>,
    pub location: Option<String>,
    pub region: Option<String>,
    pub max_capacity: i32,
    pub current_bookings: i32,
    pub status: EventStatus,
    pub price_amount: i64,
    pub currency: String,
    pub booking_deadline: Option<DateTime<Utc>>,
    pub cancellation_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn remaining_capacity(&self) -> i32 {
        (self.max_capacity - self.current_bookings).max(0)
    }

    /// Whether `seats` more bookings fit: the event is active, the booking deadline has not
    /// passed and capacity remains.
    pub fn can_accept(&self, seats: i32, now: DateTime<Utc>) -> bool {
        seats > 0
            && self.status == EventStatus::Active
            && self.booking_deadline.map_or(true, |deadline| now <= deadline)
            && seats <= self.remaining_capacity()
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::database::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
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

impl From<OrderRecord> for OrderRow {
    fn from(order: OrderRecord) -> Self {
        Self {
            id: order.id,
            cart_id: order.cart_id,
            payment_intent_id: order.payment_intent_id,
            customer_id: order.customer_id,
            customer_email: order.customer_email,
            customer_details: order.customer_details,
            amount: order.amount,
            currency: order.currency,
            created_at: order.created_at,
        }
    }
}

impl From<OrderRow> for OrderRecord {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            cart_id: row.cart_id,
            payment_intent_id: row.payment_intent_id,
            customer_id: row.customer_id,
            customer_email: row.customer_email,
            customer_details: row.customer_details,
            amount: row.amount,
            currency: row.currency,
            created_at: row.created_at,
        }
    }
}

/// A payment-intent transition received from Stripe, keyed by the Stripe event id so redelivered
/// events are stored once.
#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::database::schema::payment_events)]
pub struct NewPaymentEvent {
    pub id: Uuid,
    pub stripe_event_id: String,
    pub payment_intent_id: String,
    pub status: String,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub customer_id: Option<String>,
    pub metadata: Option<Value>,
}

impl NewPaymentEvent {
    pub fn new(
        stripe_event_id: String,
        payment_intent_id: String,
        status: PaymentStatus,
        amount: Option<i64>,
        currency: Option<String>,
        customer_id: Option<String>,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            stripe_event_id,
            payment_intent_id,
            status: status.to_string(),
            amount,
            currency,
            customer_id,
            metadata,
        }
    }
}
