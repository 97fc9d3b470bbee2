//! Order lifecycle: listing, fulfillment transitions, cancellation and
//! settlement from verified gateway callbacks.

use crate::entities::{
    order::{self, Entity as Order, OrderStatus},
    order_item::{self, Entity as OrderItem},
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::inventory::InventoryService;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Outcome of applying a settlement callback to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// The order moved from pending to paid.
    Transitioned,
    /// The order had already left pending. Duplicate and late callbacks land
    /// here and are harmless.
    AlreadySettled,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateStatusInput {
    pub status: OrderStatus,
    #[validate(length(max = 100))]
    pub tracking_number: Option<String>,
    #[validate(length(max = 100))]
    pub delivery_service: Option<String>,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

/// An order together with its frozen lines.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrdersPage {
    pub orders: Vec<order::Model>,
    pub total_items: u64,
    pub total_pages: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    inventory: InventoryService,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        inventory: InventoryService,
    ) -> Self {
        Self {
            db,
            event_sender,
            inventory,
        }
    }

    /// Lists the user's orders, newest first. `page` is 1-based.
    #[instrument(skip(self))]
    pub async fn list_orders_for_user(
        &self,
        user_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<OrdersPage, ServiceError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let paginator = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(self.db.as_ref(), per_page);

        let counts = paginator.num_items_and_pages().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok(OrdersPage {
            orders,
            total_items: counts.number_of_items,
            total_pages: counts.number_of_pages,
            page,
            per_page,
        })
    }

    /// Fetches a single order with its lines. Non-admin callers only see
    /// their own orders.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
        requester: Uuid,
        is_admin: bool,
    ) -> Result<OrderDetail, ServiceError> {
        let found = Order::find_by_id(order_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {}", order_id)))?;

        if !is_admin && found.user_id != requester {
            // Hide existence of other users' orders.
            return Err(ServiceError::NotFound(format!("Order {}", order_id)));
        }

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(self.db.as_ref())
            .await?;

        Ok(OrderDetail {
            order: found,
            items,
        })
    }

    /// Applies a fulfillment transition. Admin-gated by the handler; the
    /// state machine decides which transitions are legal.
    #[instrument(skip(self, input), fields(%order_id, new_status = ?input.status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        input: UpdateStatusInput,
    ) -> Result<order::Model, ServiceError> {
        input.validate()?;

        let found = Order::find_by_id(order_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {}", order_id)))?;

        let old_status = found.status;
        if !old_status.can_transition(input.status) {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot transition order from {:?} to {:?}",
                old_status, input.status
            )));
        }

        let mut active: order::ActiveModel = found.into();
        active.status = Set(input.status);
        if let Some(tracking) = input.tracking_number {
            active.tracking_number = Set(Some(tracking));
        }
        if let Some(service) = input.delivery_service {
            active.delivery_service = Set(Some(service));
        }
        if let Some(comment) = input.comment {
            active.comment = Set(Some(comment));
        }
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(self.db.as_ref()).await?;

        info!(%order_id, ?old_status, new_status = ?updated.status, "Order status updated");
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                user_id: updated.user_id,
                old_status,
                new_status: updated.status,
            })
            .await;

        Ok(updated)
    }

    /// Cancels an order and returns its reserved stock.
    ///
    /// Only the owner or an admin may cancel, and only while the state
    /// machine still allows cancellation (before fulfillment ships).
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        requester: Uuid,
        is_admin: bool,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let found = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {}", order_id)))?;

        if !is_admin && found.user_id != requester {
            return Err(ServiceError::NotFound(format!("Order {}", order_id)));
        }

        if !found.status.can_transition(OrderStatus::Cancelled) {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot cancel order in {:?} state",
                found.status
            )));
        }

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;
        for item in &items {
            self.inventory
                .restock(&txn, item.product_id, item.quantity)
                .await?;
        }

        let user_id = found.user_id;
        let mut active: order::ActiveModel = found.into();
        active.status = Set(OrderStatus::Cancelled);
        active.updated_at = Set(Some(Utc::now()));
        let cancelled = active.update(&txn).await?;

        txn.commit().await?;

        info!(%order_id, lines = items.len(), "Order cancelled, stock restored");
        self.event_sender
            .send_or_log(Event::OrderCancelled { order_id, user_id })
            .await;

        Ok(cancelled)
    }

    /// Confirms the order exists, without touching it. Callback handling
    /// rejects notices for unknown orders before acknowledging them, even
    /// when the reported status warrants no transition.
    pub async fn require_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        Order::find_by_id(order_id)
            .one(self.db.as_ref())
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(format!("Order {}", order_id)))
    }

    /// Marks an order paid in response to a verified settlement callback.
    ///
    /// The transition is a single conditional UPDATE filtered on the pending
    /// state, so concurrent duplicate callbacks race harmlessly: exactly one
    /// observes `Transitioned` and the rest observe `AlreadySettled`.
    #[instrument(skip(self))]
    pub async fn settle_from_callback(
        &self,
        order_id: Uuid,
    ) -> Result<SettleOutcome, ServiceError> {
        let result = Order::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Paid))
            .col_expr(order::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected > 0 {
            let settled = Order::find_by_id(order_id)
                .one(self.db.as_ref())
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Order {}", order_id)))?;

            info!(%order_id, "Order settled as paid");
            self.event_sender
                .send_or_log(Event::OrderPaid {
                    order_id,
                    user_id: settled.user_id,
                })
                .await;
            return Ok(SettleOutcome::Transitioned);
        }

        match Order::find_by_id(order_id).one(self.db.as_ref()).await? {
            Some(existing) => {
                info!(%order_id, status = ?existing.status, "Duplicate or late settlement callback");
                Ok(SettleOutcome::AlreadySettled)
            }
            None => Err(ServiceError::NotFound(format!("Order {}", order_id))),
        }
    }
}
