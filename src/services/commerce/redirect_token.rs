use crate::{cache::CacheBackend, errors::ServiceError};
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;

const TOKEN_KEY_PREFIX: &str = "checkout:redirect";
const TOKEN_BYTES: usize = 32;

/// Issues short-lived opaque tokens that let the browser confirm a checkout
/// outcome through a public endpoint, without ever seeing gateway internals.
///
/// The callback redirect is a GET and must not carry side effects beyond
/// issuing one of these. Verification is poll-safe (non-consuming); the
/// store enforces time expiry only, and clients shrink the reuse window by
/// invalidating explicitly once they have consumed the result.
#[derive(Clone)]
pub struct RedirectTokenBroker {
    cache: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl RedirectTokenBroker {
    pub fn new(cache: Arc<dyn CacheBackend>, ttl_secs: u64) -> Self {
        Self {
            cache,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    fn key(token: &str) -> String {
        format!("{}:{}", TOKEN_KEY_PREFIX, token)
    }

    /// Issues a fresh high-entropy token valid for the configured window
    pub async fn issue(&self) -> Result<String, ServiceError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        self.cache
            .set(&Self::key(&token), "1", Some(self.ttl))
            .await?;
        Ok(token)
    }

    /// Valid while present and unexpired; does not consume the token
    pub async fn verify(&self, token: &str) -> Result<bool, ServiceError> {
        Ok(self.cache.exists(&Self::key(token)).await?)
    }

    /// Explicit removal once the client has consumed the result
    pub async fn invalidate(&self, token: &str) -> Result<(), ServiceError> {
        self.cache.delete(&Self::key(token)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;

    fn broker(ttl_secs: u64) -> RedirectTokenBroker {
        RedirectTokenBroker::new(Arc::new(InMemoryCache::new()), ttl_secs)
    }

    #[tokio::test]
    async fn issued_token_verifies_until_invalidated() {
        let broker = broker(60);
        let token = broker.issue().await.unwrap();

        // Poll-safe: repeated verification does not consume
        assert!(broker.verify(&token).await.unwrap());
        assert!(broker.verify(&token).await.unwrap());

        broker.invalidate(&token).await.unwrap();
        assert!(!broker.verify(&token).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let broker = broker(60);
        assert!(!broker.verify("deadbeef").await.unwrap());
    }

    #[tokio::test]
    async fn tokens_are_unique_and_high_entropy() {
        let broker = broker(60);
        let a = broker.issue().await.unwrap();
        let b = broker.issue().await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), TOKEN_BYTES * 2);
    }
}
