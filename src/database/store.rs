use async_trait::async_trait;
use diesel::prelude::*;
use tracing::info;

use super::models::{NewPaymentEvent, OrderRow};
use super::schema::{orders, payment_events};
use super::{get_conn, PgPool};
use crate::orders::store::{InsertOutcome, OrderStore, StoreError};
use crate::orders::OrderRecord;
use crate::stripe_webhook::PaymentEventStore;

/// Runs blocking diesel work off the async executor.
async fn with_conn<T, F>(pool: &PgPool, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T, StoreError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = get_conn(&pool)?;
        f(&mut conn)
    })
    .await
    .map_err(|e| StoreError::Task(e.to_string()))?
}

/// Postgres-backed order ledger. Unique indexes on `payment_intent_id` and `cart_id` settle
/// concurrent completions.
#[derive(Clone)]
pub struct DieselOrderStore {
    pool: PgPool,
}

impl DieselOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn find_order(
    conn: &mut PgConnection,
    payment_intent_id: &str,
) -> Result<Option<OrderRow>, diesel::result::Error> {
    orders::table
        .filter(orders::payment_intent_id.eq(payment_intent_id))
        .select(OrderRow::as_select())
        .first(conn)
        .optional()
}

#[async_trait]
impl OrderStore for DieselOrderStore {
    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<OrderRecord>, StoreError> {
        let payment_intent_id = payment_intent_id.to_string();
        with_conn(&self.pool, move |conn| {
            Ok(find_order(conn, &payment_intent_id)?.map(OrderRecord::from))
        })
        .await
    }

    async fn insert(&self, order: OrderRecord) -> Result<InsertOutcome, StoreError> {
        with_conn(&self.pool, move |conn| {
            let row = OrderRow::from(order.clone());
            let inserted = diesel::insert_into(orders::table)
                .values(&row)
                .on_conflict_do_nothing()
                .execute(conn)?;
            if inserted == 1 {
                info!("Inserted order {}", order.id);
                return Ok(InsertOutcome::Created(order));
            }

            if let Some(existing) = find_order(conn, &order.payment_intent_id)? {
                return Ok(InsertOutcome::Existing(existing.into()));
            }
            let other: String = orders::table
                .filter(orders::cart_id.eq(&order.cart_id))
                .select(orders::payment_intent_id)
                .first(conn)?;
            Ok(InsertOutcome::CartTaken {
                payment_intent_id: other,
            })
        })
        .await
    }

    async fn link_customer(&self, order_id: &str, customer_id: &str) -> Result<(), StoreError> {
        let order_id = order_id.to_string();
        let customer_id = customer_id.to_string();
        with_conn(&self.pool, move |conn| {
            diesel::update(orders::table.filter(orders::id.eq(&order_id)))
                .set(orders::customer_id.eq(Some(customer_id)))
                .execute(conn)?;
            Ok(())
        })
        .await
    }
}

/// Records webhook payment transitions in `payment_events`.
#[derive(Clone)]
pub struct DieselPaymentEventStore {
    pool: PgPool,
}

impl DieselPaymentEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentEventStore for DieselPaymentEventStore {
    async fn record(&self, event: NewPaymentEvent) -> Result<bool, StoreError> {
        with_conn(&self.pool, move |conn| {
            let inserted = diesel::insert_into(payment_events::table)
                .values(&event)
                .on_conflict(payment_events::stripe_event_id)
                .do_nothing()
                .execute(conn)?;
            Ok(inserted == 1)
        })
        .await
    }
}
