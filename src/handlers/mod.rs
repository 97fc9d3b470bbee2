pub mod carts;
pub mod common;
pub mod orders;
pub mod payments;

use crate::{
    config::AppConfig,
    errors::ServiceError,
    events::EventSender,
    services::{
        payments::{GatewayClient, PaymentConfig},
        CartService, CheckoutService, InventoryService, OrderService,
    },
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// All request-facing services, wired once at startup and cloned into the
/// application state.
#[derive(Clone)]
pub struct AppServices {
    pub cart: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub gateway: GatewayClient,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        event_sender: EventSender,
    ) -> Result<Self, ServiceError> {
        let gateway = GatewayClient::new(PaymentConfig::from_app_config(config))?;
        let inventory = InventoryService::new();
        let cart = CartService::new(db.clone());
        let checkout = CheckoutService::new(
            db.clone(),
            cart.clone(),
            inventory.clone(),
            gateway.clone(),
            event_sender.clone(),
        );
        let orders = OrderService::new(db, event_sender, inventory);

        Ok(Self {
            cart,
            checkout,
            orders,
            gateway,
        })
    }
}
