pub mod cart;
pub mod checkout;
pub mod inventory;
pub mod orders;
pub mod payments;

pub use cart::CartService;
pub use checkout::CheckoutService;
pub use inventory::InventoryService;
pub use orders::OrderService;
