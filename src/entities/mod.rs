/// Domain entities module
pub mod cart;
pub mod voucher;

// Re-export entities
pub use cart::{Entity as Cart, Model as CartModel};
pub use voucher::{Entity as Voucher, Model as VoucherModel, VoucherStatus};
