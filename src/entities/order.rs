use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Order entity.
///
/// `total_amount` is computed once at checkout from the cart snapshot and is
/// never recomputed afterwards; it always equals the sum of the order's line
/// `price * quantity` at creation time.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = Order)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_amount: Decimal,
    pub shipping_address: String,
    pub contact_phone: String,
    pub tracking_number: Option<String>,
    pub delivery_service: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Order lifecycle state.
///
/// Every order is created as `Pending`; only a verified settlement callback
/// (or a fulfillment action) moves it forward. `Delivered` and `Cancelled`
/// are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    /// Whether a transition from `self` to `to` is allowed.
    ///
    /// Cancellation is only reachable before fulfillment starts shipping the
    /// order; settled states never regress.
    pub fn can_transition(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, to) {
            (Pending, Paid) => true,
            (Pending | Paid, Processing | Shipped | Delivered) => true,
            (Pending | Paid, Cancelled) => true,
            (Processing, Shipped | Delivered) => true,
            (Shipped, Delivered) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

/// How the buyer chose to pay.
///
/// `GatewayA` and `GatewayB` are the online gateways that produce a payment
/// request at checkout; the rest settle out of band.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "card")]
    Card,
    #[sea_orm(string_value = "bank")]
    Bank,
    #[sea_orm(string_value = "cash")]
    Cash,
    #[sea_orm(string_value = "gateway_a")]
    GatewayA,
    #[sea_orm(string_value = "gateway_b")]
    GatewayB,
}

impl PaymentMethod {
    /// Whether checkout should build an online payment request for this method.
    pub fn is_online(self) -> bool {
        matches!(self, PaymentMethod::GatewayA | PaymentMethod::GatewayB)
    }
}
