pub mod cart_lock;
pub mod checkout_service;
pub mod checkout_session;
pub mod order_publisher;
pub mod redirect_token;
/// Commerce services module - checkout coordination core
pub mod voucher_gate;

// Re-export services for convenience
pub use cart_lock::{CartLockHandle, CartLockService};
pub use checkout_service::{CallbackOutcome, CheckoutService};
pub use checkout_session::{CheckoutItem, CheckoutPayload, CheckoutSessionStore};
pub use order_publisher::{OrderEventPublisher, CHECKOUT_KEY, CHECKOUT_TOPIC};
pub use redirect_token::RedirectTokenBroker;
pub use voucher_gate::VoucherGateService;
