use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::order::OrderStatus;

/// Events emitted by the services after their transactions commit. The feed
/// is observational only: dashboards and notifications read persisted rows,
/// so a dropped event never loses business state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    OrderCancelled(Uuid),

    // Stock events
    StockMovementPosted {
        work_id: Uuid,
        movement_id: Uuid,
        quantity: i32,
        new_stock: i32,
    },
    LowStockDetected {
        work_id: Uuid,
        stock: i32,
        min_stock: i32,
    },

    // Ledger events
    RoyaltiesAccrued {
        order_id: Uuid,
        count: usize,
        total: Decimal,
    },
    RoyaltiesPaid {
        count: usize,
        total: Decimal,
    },
    CommissionAccrued {
        order_id: Uuid,
        representative_id: Uuid,
        amount: Decimal,
    },
    CommissionsPaid {
        count: usize,
        total: Decimal,
    },

    // Work lifecycle events
    WorkSubmitted(Uuid),
    WorkApproved(Uuid),
    WorkRejected(Uuid),
}

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

/// Consumes the event feed and logs it. Runs until every sender is dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::LowStockDetected {
                work_id,
                stock,
                min_stock,
            } => {
                warn!(work_id = %work_id, stock, min_stock, "Work fell below its minimum stock");
            }
            other => {
                info!(event = ?other, "Event processed");
            }
        }
    }
    info!("Event channel closed, processor exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let order_id = Uuid::new_v4();
        sender.send(Event::OrderCreated(order_id)).await.unwrap();

        match rx.recv().await {
            Some(Event::OrderCreated(id)) => assert_eq!(id, order_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_after_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::OrderCancelled(Uuid::new_v4())).await.is_err());
    }
}
