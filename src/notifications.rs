use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

const CHANNEL_CAPACITY: usize = 256;

/// Published once per newly created order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderConfirmed {
    pub order_id: String,
    pub cart_id: String,
    pub payment_intent_id: String,
    pub customer_email: Option<String>,
    pub amount: i64,
    pub currency: String,
}

/// Fan-out of order confirmations to in-process subscribers (mailers, loggers).
#[derive(Clone)]
pub struct OrderNotifier {
    sender: broadcast::Sender<OrderConfirmed>,
}

impl Default for OrderNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderConfirmed> {
        self.sender.subscribe()
    }

    pub fn publish(&self, confirmation: OrderConfirmed) {
        let order_id = confirmation.order_id.clone();
        match self.sender.send(confirmation) {
            Ok(receivers) => debug!("Order confirmation {order_id} sent to {receivers} subscriber(s)"),
            Err(_) => debug!("No subscribers for order confirmation {order_id}"),
        }
    }
}

/// Logs every confirmation until the channel closes.
pub async fn log_confirmations(mut receiver: broadcast::Receiver<OrderConfirmed>) {
    loop {
        match receiver.recv().await {
            Ok(confirmation) => info!(
                "Order confirmed: order_id={}, cart_id={}, payment_intent_id={}, email={:?}",
                confirmation.order_id,
                confirmation.cart_id,
                confirmation.payment_intent_id,
                confirmation.customer_email
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Confirmation logger lagged, skipped {skipped} message(s)")
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
