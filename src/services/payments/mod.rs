pub mod gateway;
pub mod signature;

pub use gateway::{
    GatewayClient, PaymentConfig, PaymentGateway, PaymentRequest, Settlement, SettlementNotice,
};
