use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

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

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart lock events
    CartLocked(Uuid),
    CartUnlocked(Uuid),

    // Checkout events
    CheckoutStarted {
        cart_id: Uuid,
        user_id: Uuid,
    },
    CheckoutCompleted {
        cart_id: Uuid,
        user_id: Uuid,
    },
    CheckoutFailed {
        cart_id: Uuid,
        reason: String,
    },

    // Payment events
    PaymentUrlIssued {
        cart_id: Uuid,
        payment_id: Uuid,
    },
    PaymentSucceeded(Uuid),
    PaymentFailed(Uuid),

    // Generic event for custom messages
    Generic {
        message: String,
        timestamp: DateTime<Utc>,
        metadata: serde_json::Value,
    },
}

impl Event {
    /// Create a generic event with string data
    pub fn with_data(data: String) -> Self {
        Event::Generic {
            message: data,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }
}

// Function to process incoming events and log them for operational visibility.
// The outbound checkout handoff goes through the message queue, not this loop;
// these events are intra-process signals only.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::CartLocked(cart_id) => {
                info!(cart_id = %cart_id, "Cart locked for checkout");
            }
            Event::CartUnlocked(cart_id) => {
                info!(cart_id = %cart_id, "Cart checkout lock released");
            }
            Event::CheckoutStarted { cart_id, user_id } => {
                info!(cart_id = %cart_id, user_id = %user_id, "Checkout started");
            }
            Event::CheckoutCompleted { cart_id, user_id } => {
                info!(cart_id = %cart_id, user_id = %user_id, "Checkout completed");
            }
            Event::CheckoutFailed { cart_id, reason } => {
                warn!(cart_id = %cart_id, reason = %reason, "Checkout failed");
            }
            Event::PaymentUrlIssued {
                cart_id,
                payment_id,
            } => {
                info!(cart_id = %cart_id, payment_id = %payment_id, "Payment URL issued");
            }
            Event::PaymentSucceeded(payment_id) => {
                info!(payment_id = %payment_id, "Payment succeeded");
            }
            Event::PaymentFailed(payment_id) => {
                warn!(payment_id = %payment_id, "Payment failed");
            }
            Event::Generic { message, .. } => {
                info!(message = %message, "Event received");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_delivers_events() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        sender
            .send(Event::CartLocked(Uuid::new_v4()))
            .await
            .unwrap();

        assert!(matches!(rx.recv().await, Some(Event::CartLocked(_))));
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        let result = sender.send(Event::with_data("orphan".to_string())).await;
        assert!(result.is_err());
    }
}
