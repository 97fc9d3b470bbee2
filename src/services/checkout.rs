//! Checkout orchestration.
//!
//! The whole state change of a checkout lives in one database transaction:
//! snapshot the cart, create the pending order, freeze line prices, decrement
//! tracked stock and clear the cart. Either everything commits or nothing
//! does. Gateway interaction happens strictly after the commit so a gateway
//! outage can never leave half a checkout behind.

use crate::entities::{
    order::{self, OrderStatus, PaymentMethod},
    order_item,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::{
    cart::CartService,
    inventory::InventoryService,
    payments::{GatewayClient, PaymentGateway, PaymentRequest},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
    #[validate(length(min = 1, max = 500))]
    pub shipping_address: String,
    #[validate(length(min = 5, max = 32))]
    pub contact_phone: String,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

/// What the client receives after a successful checkout.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutOutcome {
    pub order: order::Model,
    /// Present only for online payment methods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_request: Option<PaymentRequest>,
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    cart: CartService,
    inventory: InventoryService,
    gateway: GatewayClient,
    event_sender: EventSender,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        cart: CartService,
        inventory: InventoryService,
        gateway: GatewayClient,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            cart,
            inventory,
            gateway,
            event_sender,
        }
    }

    /// Converts the user's cart into a pending order.
    ///
    /// If the transaction commits but the subsequent gateway call fails, the
    /// order stands and the error carries its id; the client retries through
    /// [`CheckoutService::payment_request_for_order`].
    #[instrument(skip(self, request), fields(%user_id, method = ?request.payment_method))]
    pub async fn checkout(
        &self,
        user_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await?;

        let snapshot = self.cart.build_checkout_snapshot(&txn, user_id).await?;
        let now = Utc::now();

        let created = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            status: Set(OrderStatus::Pending),
            payment_method: Set(request.payment_method),
            total_amount: Set(snapshot.total_amount),
            shipping_address: Set(request.shipping_address),
            contact_phone: Set(request.contact_phone),
            tracking_number: Set(None),
            delivery_service: Set(None),
            comment: Set(request.comment),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await?;

        for line in &snapshot.lines {
            self.inventory
                .reserve_and_decrement(&txn, line.product_id, line.quantity)
                .await?;

            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(created.id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                price: Set(line.price),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        self.cart.clear_cart(&txn, user_id).await?;
        txn.commit().await?;

        info!(
            order_id = %created.id,
            total = %created.total_amount,
            lines = snapshot.lines.len(),
            "Checkout committed"
        );
        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id: created.id,
                user_id,
                total_amount: created.total_amount,
            })
            .await;

        let payment_request = match PaymentGateway::for_method(created.payment_method) {
            Some(gateway) => Some(
                self.gateway
                    .create_payment_request(gateway, &created)
                    .await
                    .map_err(|e| {
                        warn!(order_id = %created.id, "Payment request failed after commit: {}", e);
                        ServiceError::PaymentRequestFailed {
                            order_id: created.id,
                            reason: e.to_string(),
                        }
                    })?,
            ),
            None => None,
        };

        Ok(CheckoutOutcome {
            order: created,
            payment_request,
        })
    }

    /// Regenerates the payment request for an existing pending order, the
    /// retry path after a post-commit gateway failure.
    #[instrument(skip(self))]
    pub async fn payment_request_for_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<PaymentRequest, ServiceError> {
        let found = order::Entity::find_by_id(order_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {}", order_id)))?;

        if found.user_id != user_id {
            return Err(ServiceError::NotFound(format!("Order {}", order_id)));
        }
        if found.status != OrderStatus::Pending {
            return Err(ServiceError::InvalidOperation(format!(
                "Order is {:?}; payment requests apply to pending orders only",
                found.status
            )));
        }

        let gateway = PaymentGateway::for_method(found.payment_method).ok_or_else(|| {
            ServiceError::InvalidOperation(format!(
                "Payment method {:?} settles out of band",
                found.payment_method
            ))
        })?;

        self.gateway.create_payment_request(gateway, &found).await
    }
}
