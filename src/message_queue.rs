/*!
 * # Message Queue Implementation
 *
 * This module provides message queue functionality for handing confirmed
 * checkouts to the asynchronous order-materialization pipeline.
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Message queue errors
#[derive(Error, Debug)]
pub enum MessageQueueError {
    #[error("Queue is full")]
    QueueFull,
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

/// Message envelope for queue items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub topic: String,
    pub key: String,
    pub payload: serde_json::Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Message {
    pub fn new(topic: String, key: String, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic,
            key,
            payload,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Message queue trait for different implementations
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn publish(&self, message: Message) -> Result<(), MessageQueueError>;
    async fn subscribe(&self, topic: &str) -> Result<Option<Message>, MessageQueueError>;
}

/// In-memory message queue implementation
#[derive(Debug)]
pub struct InMemoryMessageQueue {
    queues: Arc<Mutex<std::collections::HashMap<String, VecDeque<Message>>>>,
    max_size: usize,
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        Self {
            queues: Arc::new(Mutex::new(std::collections::HashMap::new())),
            max_size: 1000,
        }
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            queues: Arc::new(Mutex::new(std::collections::HashMap::new())),
            max_size,
        }
    }
}

impl Default for InMemoryMessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn publish(&self, message: Message) -> Result<(), MessageQueueError> {
        let mut queues = self.queues.lock().unwrap();
        let queue = queues
            .entry(message.topic.clone())
            .or_insert_with(VecDeque::new);

        if queue.len() >= self.max_size {
            return Err(MessageQueueError::QueueFull);
        }

        queue.push_back(message);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Option<Message>, MessageQueueError> {
        let mut queues = self.queues.lock().unwrap();
        if let Some(queue) = queues.get_mut(topic) {
            Ok(queue.pop_front())
        } else {
            Ok(None)
        }
    }
}

/// Redis-backed message queue using namespaced lists.
///
/// Topics map to `{namespace}:{topic}` lists; `publish` appends and
/// `subscribe` performs a blocking pop bounded by the configured timeout.
pub struct RedisMessageQueue {
    client: Arc<redis::Client>,
    namespace: String,
    block_timeout: Duration,
}

impl RedisMessageQueue {
    pub async fn new(
        client: Arc<redis::Client>,
        namespace: String,
        block_timeout: Duration,
    ) -> Result<Self, MessageQueueError> {
        // Fail fast if the broker is unreachable rather than on first publish
        let mut conn = client
            .get_async_connection()
            .await
            .map_err(|e| MessageQueueError::ConnectionError(e.to_string()))?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| MessageQueueError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            namespace,
            block_timeout,
        })
    }

    fn topic_key(&self, topic: &str) -> String {
        format!("{}:{}", self.namespace, topic)
    }
}

#[async_trait]
impl MessageQueue for RedisMessageQueue {
    async fn publish(&self, message: Message) -> Result<(), MessageQueueError> {
        let body = serde_json::to_string(&message)
            .map_err(|e| MessageQueueError::SerializationError(e.to_string()))?;
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| MessageQueueError::ConnectionError(e.to_string()))?;
        redis::cmd("RPUSH")
            .arg(self.topic_key(&message.topic))
            .arg(body)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| MessageQueueError::ConnectionError(e.to_string()))?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Option<Message>, MessageQueueError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| MessageQueueError::ConnectionError(e.to_string()))?;
        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(self.topic_key(topic))
            .arg(self.block_timeout.as_secs())
            .query_async(&mut conn)
            .await
            .map_err(|e| MessageQueueError::ConnectionError(e.to_string()))?;

        match popped {
            Some((_key, body)) => {
                let message = serde_json::from_str(&body)
                    .map_err(|e| MessageQueueError::SerializationError(e.to_string()))?;
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }
}

/// Mock message queue for testing
#[cfg(test)]
pub struct MockMessageQueue {
    published_messages: Arc<Mutex<Vec<Message>>>,
}

#[cfg(test)]
impl MockMessageQueue {
    pub fn new() -> Self {
        Self {
            published_messages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn get_published_messages(&self) -> Vec<Message> {
        self.published_messages.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl MessageQueue for MockMessageQueue {
    async fn publish(&self, message: Message) -> Result<(), MessageQueueError> {
        self.published_messages.lock().unwrap().push(message);
        Ok(())
    }

    async fn subscribe(&self, _topic: &str) -> Result<Option<Message>, MessageQueueError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_queue() {
        let queue = InMemoryMessageQueue::new();
        let message = Message::new(
            "test_topic".to_string(),
            "test_key".to_string(),
            serde_json::json!({"test": "data"}),
        );

        // Publish message
        assert!(queue.publish(message.clone()).await.is_ok());

        // Subscribe and receive message
        let received = queue.subscribe("test_topic").await.unwrap();
        assert!(received.is_some());
        let received = received.unwrap();
        assert_eq!(received.topic, "test_topic");
        assert_eq!(received.key, "test_key");

        // Queue should be empty now
        let empty = queue.subscribe("test_topic").await.unwrap();
        assert!(empty.is_none());
    }

    #[tokio::test]
    async fn test_queue_full() {
        let queue = InMemoryMessageQueue::with_max_size(1);
        let message = Message::new(
            "t".to_string(),
            "k".to_string(),
            serde_json::Value::Null,
        );
        queue.publish(message.clone()).await.unwrap();
        assert!(matches!(
            queue.publish(message).await,
            Err(MessageQueueError::QueueFull)
        ));
    }
}
