//! Cart management and the checkout snapshot.
//!
//! Carts never store prices. The authoritative price is read from the live
//! product exactly once, when [`CartService::build_checkout_snapshot`] runs
//! inside the checkout transaction, and is frozen into the order lines.

use crate::entities::{
    cart_item::{self, Entity as CartItem},
    product::Entity as ProductEntity,
};
use crate::errors::ServiceError;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1000))]
    pub quantity: i32,
}

/// One cart line joined with its live product.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartLineResponse {
    pub product_id: Uuid,
    pub name: String,
    /// Current catalog price. Indicative only until checkout freezes it.
    pub price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartResponse {
    pub items: Vec<CartLineResponse>,
    pub total_amount: Decimal,
}

/// Priced cart contents captured inside the checkout transaction.
#[derive(Debug, Clone)]
pub struct CheckoutSnapshot {
    pub lines: Vec<SnapshotLine>,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct SnapshotLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Adds a product to the user's cart, bumping the quantity when a line
    /// for that product already exists.
    #[instrument(skip(self, input), fields(%user_id, product_id = %input.product_id))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddToCartInput,
    ) -> Result<cart_item::Model, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let listing = ProductEntity::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {}", input.product_id)))?;

        if !listing.is_purchasable() {
            return Err(ServiceError::InvalidOperation(
                "Product is not available for purchase".to_string(),
            ));
        }

        let existing = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .one(&txn)
            .await?;

        let now = Utc::now();
        let saved = match existing {
            Some(line) => {
                let new_quantity = line.quantity + input.quantity;
                let mut active: cart_item::ActiveModel = line.into();
                active.quantity = Set(new_quantity);
                active.updated_at = Set(now);
                active.update(&txn).await?
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    product_id: Set(input.product_id),
                    quantity: Set(input.quantity),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?
            }
        };

        txn.commit().await?;
        debug!(cart_item_id = %saved.id, "Cart line upserted");
        Ok(saved)
    }

    /// Returns the user's cart priced at current catalog prices.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartResponse, ServiceError> {
        let lines = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .find_also_related(ProductEntity)
            .all(self.db.as_ref())
            .await?;

        let mut items = Vec::with_capacity(lines.len());
        let mut total_amount = Decimal::ZERO;
        for (line, listing) in lines {
            // A listing deleted after it was carted simply drops out of the
            // view; checkout would reject it anyway.
            let Some(listing) = listing else { continue };
            let line_total = listing.price * Decimal::from(line.quantity);
            total_amount += line_total;
            items.push(CartLineResponse {
                product_id: listing.id,
                name: listing.name,
                price: listing.price,
                quantity: line.quantity,
                line_total,
            });
        }

        Ok(CartResponse {
            items,
            total_amount,
        })
    }

    /// Removes a single product line from the user's cart.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<(), ServiceError> {
        let result = CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Cart line for product {}",
                product_id
            )));
        }
        Ok(())
    }

    /// Prices the cart inside the caller's transaction and returns the frozen
    /// snapshot checkout will persist. Rejects empty carts and carts that
    /// reference unpurchasable listings.
    pub async fn build_checkout_snapshot<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
    ) -> Result<CheckoutSnapshot, ServiceError> {
        let cart_lines = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .find_also_related(ProductEntity)
            .all(conn)
            .await?;

        if cart_lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let mut lines = Vec::with_capacity(cart_lines.len());
        let mut total_amount = Decimal::ZERO;
        for (line, listing) in cart_lines {
            let listing = listing.ok_or_else(|| {
                ServiceError::InvalidOperation(format!(
                    "Product {} is no longer available",
                    line.product_id
                ))
            })?;
            if !listing.is_purchasable() {
                return Err(ServiceError::InvalidOperation(format!(
                    "Product {} is not available for purchase",
                    listing.id
                )));
            }

            total_amount += listing.price * Decimal::from(line.quantity);
            lines.push(SnapshotLine {
                product_id: listing.id,
                quantity: line.quantity,
                price: listing.price,
            });
        }

        Ok(CheckoutSnapshot {
            lines,
            total_amount,
        })
    }

    /// Empties the user's cart outside any checkout flow.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
        self.clear_cart(self.db.as_ref(), user_id).await
    }

    /// Empties the user's cart within the caller's transaction.
    pub async fn clear_cart<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(conn)
            .await?;
        Ok(())
    }
}
