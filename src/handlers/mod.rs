pub mod commerce;
pub mod common;

use crate::cache::CacheBackend;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::message_queue::MessageQueue;
use crate::services::{
    commerce::{
        CartLockService, CheckoutService, CheckoutSessionStore, OrderEventPublisher,
        RedirectTokenBroker, VoucherGateService,
    },
    vnpay::VnpayGateway,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub checkout: Arc<CheckoutService>,
}

impl AppServices {
    /// Wire the checkout coordination pipeline from its injected collaborators.
    ///
    /// Sessions and redirect tokens share the cache backend; with more than
    /// one API instance that backend must be the shared (redis) one so a
    /// callback landing on any instance still finds its session.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        cache: Arc<dyn CacheBackend>,
        message_queue: Arc<dyn MessageQueue>,
        config: &AppConfig,
    ) -> Self {
        let cart_lock = CartLockService::new(
            db_pool.clone(),
            event_sender.clone(),
            config.checkout.cart_lock_ttl_secs,
        );
        let voucher_gate = VoucherGateService::new(db_pool);
        let sessions = CheckoutSessionStore::new(cache.clone(), config.checkout.session_ttl_secs);
        let tokens = RedirectTokenBroker::new(cache, config.checkout.redirect_token_ttl_secs);
        let gateway = Arc::new(VnpayGateway::new(config.vnpay.clone()));
        let publisher = OrderEventPublisher::new(message_queue);

        let checkout = Arc::new(CheckoutService::new(
            cart_lock,
            voucher_gate,
            sessions,
            tokens,
            gateway,
            publisher,
            event_sender,
        ));

        Self { checkout }
    }
}
