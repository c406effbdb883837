pub mod checkout;
/// Commerce API handlers module
pub mod vnpay;

// Re-export route builders
pub use checkout::checkout_routes;
pub use vnpay::vnpay_routes;
