use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use super::OrderRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("blocking task failed: {0}")]
    Task(String),
}

/// Result of recording a completed order.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Created(OrderRecord),
    /// An order already exists for this payment intent; it is returned unchanged.
    Existing(OrderRecord),
    /// The cart was already converted under another payment intent.
    CartTaken { payment_intent_id: String },
}

/// Ledger of completed orders. Holds at most one order per payment intent and one per cart.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<OrderRecord>, StoreError>;

    async fn insert(&self, order: OrderRecord) -> Result<InsertOutcome, StoreError>;

    /// Records the payment provider's customer for an existing order.
    async fn link_customer(&self, order_id: &str, customer_id: &str) -> Result<(), StoreError>;
}

/// Process-local [`OrderStore`] for tests. The binary always uses the Postgres store.
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: Mutex<HashMap<String, OrderRecord>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.lock().await.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<OrderRecord>, StoreError> {
        Ok(self.orders.lock().await.get(payment_intent_id).cloned())
    }

    async fn insert(&self, order: OrderRecord) -> Result<InsertOutcome, StoreError> {
        let mut orders = self.orders.lock().await;
        if let Some(existing) = orders.get(&order.payment_intent_id) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        if let Some(other) = orders.values().find(|o| o.cart_id == order.cart_id) {
            return Ok(InsertOutcome::CartTaken {
                payment_intent_id: other.payment_intent_id.clone(),
            });
        }
        orders.insert(order.payment_intent_id.clone(), order.clone());
        Ok(InsertOutcome::Created(order))
    }

    async fn link_customer(&self, order_id: &str, customer_id: &str) -> Result<(), StoreError> {
        if let Some(order) = self
            .orders
            .lock()
            .await
            .values_mut()
            .find(|o| o.id == order_id)
        {
            order.customer_id = Some(customer_id.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn order(id: &str, cart_id: &str, payment_intent_id: &str) -> OrderRecord {
        OrderRecord {
            id: id.to_string(),
            cart_id: cart_id.to_string(),
            payment_intent_id: payment_intent_id.to_string(),
            customer_id: None,
            customer_email: None,
            customer_details: None,
            amount: 2500,
            currency: "usd".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn second_insert_for_same_intent_returns_first() {
        let store = InMemoryOrderStore::new();
        let first = order("order_a", "cart_1", "pi_1");
        assert_eq!(
            store.insert(first.clone()).await.unwrap(),
            InsertOutcome::Created(first.clone())
        );
        assert_eq!(
            store.insert(order("order_b", "cart_1", "pi_1")).await.unwrap(),
            InsertOutcome::Existing(first)
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn cart_cannot_be_completed_twice() {
        let store = InMemoryOrderStore::new();
        store.insert(order("order_a", "cart_1", "pi_1")).await.unwrap();
        assert_eq!(
            store.insert(order("order_b", "cart_1", "pi_2")).await.unwrap(),
            InsertOutcome::CartTaken {
                payment_intent_id: "pi_1".to_string()
            }
        );
        assert!(store.find_by_payment_intent("pi_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn customer_is_linked_to_stored_order() {
        let store = InMemoryOrderStore::new();
        store.insert(order("order_a", "cart_1", "pi_1")).await.unwrap();
        store.link_customer("order_a", "cus_1").await.unwrap();
        let stored = store.find_by_payment_intent("pi_1").await.unwrap().unwrap();
        assert_eq!(stored.customer_id.as_deref(), Some("cus_1"));
    }
}
