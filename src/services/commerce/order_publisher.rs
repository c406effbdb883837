use crate::{
    errors::ServiceError,
    message_queue::{Message, MessageQueue},
    services::commerce::checkout_session::CheckoutPayload,
};
use std::sync::Arc;
use tracing::{error, info};

pub const CHECKOUT_TOPIC: &str = "checkout-topic";
pub const CHECKOUT_KEY: &str = "checkout";

/// Hands a finalized checkout to the order-materialization pipeline.
///
/// Fire-and-forget from the HTTP handler's perspective: the request succeeds
/// once the broker accepts the message, not once the order exists. A consumer
/// crash downstream therefore never fails a checkout response.
#[derive(Clone)]
pub struct OrderEventPublisher {
    queue: Arc<dyn MessageQueue>,
}

impl OrderEventPublisher {
    pub fn new(queue: Arc<dyn MessageQueue>) -> Self {
        Self { queue }
    }

    /// Publishes the checkout payload to the order pipeline topic.
    ///
    /// Exactly one message per successfully locked-and-validated checkout.
    /// A broker failure is logged with context and surfaced generically; the
    /// caller decides what happens to the cart lock.
    pub async fn publish_checkout(&self, payload: &CheckoutPayload) -> Result<(), ServiceError> {
        let body = serde_json::to_value(payload)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        let message = Message::new(CHECKOUT_TOPIC.to_string(), CHECKOUT_KEY.to_string(), body);

        self.queue.publish(message).await.map_err(|e| {
            error!(
                cart_id = %payload.cart_id,
                user_id = %payload.user_id,
                "Failed to publish checkout message: {}",
                e
            );
            ServiceError::QueueError(e.to_string())
        })?;

        info!(
            cart_id = %payload.cart_id,
            user_id = %payload.user_id,
            "Checkout handed off to order pipeline"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message_queue::MockMessageQueue;
    use crate::services::commerce::checkout_session::CheckoutItem;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn payload() -> CheckoutPayload {
        CheckoutPayload {
            user_id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
            items: vec![CheckoutItem {
                product_id: Uuid::new_v4(),
                quantity: 1,
                unit_price: dec!(15000),
                voucher_id: None,
            }],
            delivery_address: "Building B1, room 903".to_string(),
            grand_total: dec!(15000),
        }
    }

    #[tokio::test]
    async fn publishes_to_checkout_topic_with_fixed_key() {
        let queue = Arc::new(MockMessageQueue::new());
        let publisher = OrderEventPublisher::new(queue.clone());
        let payload = payload();

        publisher.publish_checkout(&payload).await.unwrap();

        let published = queue.get_published_messages();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, CHECKOUT_TOPIC);
        assert_eq!(published[0].key, CHECKOUT_KEY);

        let round_tripped: CheckoutPayload =
            serde_json::from_value(published[0].payload.clone()).unwrap();
        assert_eq!(round_tripped, payload);
    }
}
