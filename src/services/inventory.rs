//! Stock reservation and release.
//!
//! Oversell is prevented at the database, not in application code: the
//! decrement is a single conditional UPDATE guarded by `quantity >= wanted`,
//! so two concurrent checkouts for the last unit cannot both succeed no
//! matter how their transactions interleave.

use crate::entities::product::{self, Entity as Product};
use crate::errors::ServiceError;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
};
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InventoryService;

impl InventoryService {
    pub fn new() -> Self {
        Self
    }

    /// Atomically decrements tracked stock for a product.
    ///
    /// Listings with untracked stock (NULL quantity) are left untouched and
    /// the reservation succeeds. For tracked listings the decrement only
    /// applies when enough stock remains; otherwise nothing is written and
    /// `InsufficientStock` is returned.
    #[instrument(skip(self, conn))]
    pub async fn reserve_and_decrement<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let result = Product::update_many()
            .col_expr(
                product::Column::Quantity,
                Expr::col(product::Column::Quantity).sub(quantity),
            )
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::Quantity.gte(quantity))
            .exec(conn)
            .await?;

        if result.rows_affected > 0 {
            debug!(%product_id, quantity, "Reserved stock");
            return Ok(());
        }

        // Zero rows means either an untracked listing (the NULL comparison
        // excluded it from the filter) or not enough stock. Distinguish the
        // two with a read inside the same transaction.
        let found = Product::find_by_id(product_id).one(conn).await?;
        match found {
            Some(listing) if listing.quantity.is_none() => {
                debug!(%product_id, "Stock untracked; no decrement");
                Ok(())
            }
            Some(_) => Err(ServiceError::InsufficientStock(format!(
                "product {} has fewer than {} units available",
                product_id, quantity
            ))),
            None => Err(ServiceError::NotFound(format!("Product {}", product_id))),
        }
    }

    /// Returns previously reserved stock to a tracked listing. Untracked
    /// listings are skipped by the NULL guard.
    #[instrument(skip(self, conn))]
    pub async fn restock<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        Product::update_many()
            .col_expr(
                product::Column::Quantity,
                Expr::col(product::Column::Quantity).add(quantity),
            )
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::Quantity.is_not_null())
            .exec(conn)
            .await?;
        Ok(())
    }
}
