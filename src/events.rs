use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use crate::entities::order::OrderStatus;
use crate::entities::order_item::ProductionStatus;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// The various events emitted by the order engine. Emitted after the owning
// transaction commits; delivery is best-effort and never fails an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(i32),
    OrderStatusChanged {
        order_id: i32,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    ProductionStatusChanged {
        order_id: i32,
        item_id: i32,
        new_status: ProductionStatus,
    },
    PaymentRegistered {
        order_id: i32,
        transaction_id: i32,
        amount: Decimal,
        is_deposit: bool,
    },
    OrderDeleted(i32),
}

/// Drains the event channel, surfacing each event to the log. Downstream
/// consumers (notifications, dashboards) hook in here.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::OrderCreated(order_id) => {
                info!(order_id, "order created");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(order_id, %old_status, %new_status, "order status changed");
            }
            Event::ProductionStatusChanged {
                order_id,
                item_id,
                new_status,
            } => {
                info!(order_id, item_id, %new_status, "production status changed");
            }
            Event::PaymentRegistered {
                order_id,
                transaction_id,
                amount,
                is_deposit,
            } => {
                info!(order_id, transaction_id, %amount, is_deposit, "payment registered");
            }
            Event::OrderDeleted(order_id) => {
                info!(order_id, "order deleted");
            }
        }
    }

    info!("Event processing loop stopped");
}
