use crate::notifications::{NotificationKind, NotificationService};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::order::OrderStatus;

/// Events emitted by the services layer. Delivery is fire-and-forget; a
/// failure to enqueue or handle an event never fails the operation that
/// produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        user_id: Uuid,
        total_amount: Decimal,
    },
    OrderPaid {
        order_id: Uuid,
        user_id: Uuid,
    },
    OrderStatusChanged {
        order_id: Uuid,
        user_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    OrderCancelled {
        order_id: Uuid,
        user_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping event: {}", e);
        }
    }
}

/// Consumes events and fans order milestones out to the notification
/// collaborator. Runs until the sender side is dropped.
pub async fn process_events(
    mut receiver: mpsc::Receiver<Event>,
    notifier: Arc<dyn NotificationService>,
) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "Processing event");
        let result = match &event {
            Event::OrderCreated {
                order_id,
                user_id,
                total_amount,
            } => {
                notifier
                    .notify(
                        *user_id,
                        "Order confirmed",
                        &format!("Order {} was created for {}", order_id, total_amount),
                        NotificationKind::OrderStatus,
                    )
                    .await
            }
            Event::OrderPaid { order_id, user_id } => {
                notifier
                    .notify(
                        *user_id,
                        "Payment received",
                        &format!("Payment for order {} was confirmed", order_id),
                        NotificationKind::Payment,
                    )
                    .await
            }
            Event::OrderStatusChanged {
                order_id,
                user_id,
                new_status,
                ..
            } => {
                notifier
                    .notify(
                        *user_id,
                        "Order updated",
                        &format!("Order {} is now {:?}", order_id, new_status),
                        NotificationKind::OrderStatus,
                    )
                    .await
            }
            Event::OrderCancelled { order_id, user_id } => {
                notifier
                    .notify(
                        *user_id,
                        "Order cancelled",
                        &format!("Order {} was cancelled", order_id),
                        NotificationKind::OrderStatus,
                    )
                    .await
            }
        };

        if let Err(e) = result {
            warn!(?event, "Notification delivery failed: {}", e);
        }
    }
    info!("Event channel closed; processor exiting");
}
