use crate::{cache::CacheBackend, errors::ServiceError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const SESSION_KEY_PREFIX: &str = "checkout:session";

/// One line of a pending checkout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub voucher_id: Option<Uuid>,
}

/// The full checkout request carried from lock acquisition to the downstream
/// order pipeline. Serialized as the session value for online payments and as
/// the outbound message body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutPayload {
    pub user_id: Uuid,
    pub cart_id: Uuid,
    pub items: Vec<CheckoutItem>,
    pub delivery_address: String,
    pub grand_total: Decimal,
}

impl CheckoutPayload {
    /// Vouchers referenced across all lines, in line order, deduplicated
    pub fn voucher_ids(&self) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for item in &self.items {
            if let Some(id) = item.voucher_id {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }
}

/// Ephemeral store bridging "redirect to gateway" and "gateway calls back".
///
/// Keyed by the opaque `payment_id` the gateway round-trips as its
/// transaction reference; the gateway never sees internal identifiers. The
/// TTL must not undercut the gateway's own session timeout, otherwise a slow
/// but legitimate payment would come back to a missing session.
#[derive(Clone)]
pub struct CheckoutSessionStore {
    cache: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl CheckoutSessionStore {
    pub fn new(cache: Arc<dyn CacheBackend>, ttl_secs: u64) -> Self {
        Self {
            cache,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    fn key(payment_id: Uuid) -> String {
        format!("{}:{}", SESSION_KEY_PREFIX, payment_id)
    }

    pub async fn put(
        &self,
        payment_id: Uuid,
        payload: &CheckoutPayload,
    ) -> Result<(), ServiceError> {
        let body = serde_json::to_string(payload)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        self.cache
            .set(&Self::key(payment_id), &body, Some(self.ttl))
            .await?;
        Ok(())
    }

    /// Reads the pending payload; `None` covers both "never existed" and
    /// "expired", which callers must treat identically.
    pub async fn get(&self, payment_id: Uuid) -> Result<Option<CheckoutPayload>, ServiceError> {
        match self.cache.get(&Self::key(payment_id)).await? {
            Some(body) => {
                let payload = serde_json::from_str(&body)
                    .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
                Ok(Some(payload))
            }
            None => Ok(None),
        }
    }

    /// Explicit invalidation once the checkout is finalized, so a replayed
    /// `payment_id` cannot trigger a second order.
    pub async fn remove(&self, payment_id: Uuid) -> Result<(), ServiceError> {
        self.cache.delete(&Self::key(payment_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use rust_decimal_macros::dec;

    fn payload() -> CheckoutPayload {
        CheckoutPayload {
            user_id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
            items: vec![CheckoutItem {
                product_id: Uuid::new_v4(),
                quantity: 2,
                unit_price: dec!(35000),
                voucher_id: None,
            }],
            delivery_address: "Building A2, room 1204".to_string(),
            grand_total: dec!(70000),
        }
    }

    #[tokio::test]
    async fn put_get_remove_lifecycle() {
        let store = CheckoutSessionStore::new(Arc::new(InMemoryCache::new()), 60);
        let payment_id = Uuid::new_v4();
        let payload = payload();

        store.put(payment_id, &payload).await.unwrap();
        assert_eq!(store.get(payment_id).await.unwrap(), Some(payload));

        store.remove(payment_id).await.unwrap();
        assert_eq!(store.get(payment_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unknown_payment_id_reads_none() {
        let store = CheckoutSessionStore::new(Arc::new(InMemoryCache::new()), 60);
        assert_eq!(store.get(Uuid::new_v4()).await.unwrap(), None);
    }

    #[test]
    fn voucher_ids_are_collected_in_line_order_without_duplicates() {
        let va = Uuid::new_v4();
        let vb = Uuid::new_v4();
        let mut p = payload();
        p.items = vec![
            CheckoutItem {
                product_id: Uuid::new_v4(),
                quantity: 1,
                unit_price: dec!(1),
                voucher_id: Some(va),
            },
            CheckoutItem {
                product_id: Uuid::new_v4(),
                quantity: 1,
                unit_price: dec!(1),
                voucher_id: Some(vb),
            },
            CheckoutItem {
                product_id: Uuid::new_v4(),
                quantity: 1,
                unit_price: dec!(1),
                voucher_id: Some(va),
            },
        ];
        assert_eq!(p.voucher_ids(), vec![va, vb]);
    }
}
