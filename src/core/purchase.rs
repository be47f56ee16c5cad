//! Purchase business logic - Recording and reading acquisitions.
//!
//! Purchases are whole units at a per-unit price; the total cost is derived once at write
//! time and stored alongside for audit. There is no update or delete path: purchases are
//! immutable history and only disappear when their product is deleted.

use crate::{
    core::{day_bounds, product::get_product_by_id},
    entities::{Product, Purchase, purchase},
    errors::{Error, Result},
};
use chrono::{NaiveDate, NaiveDateTime};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Serialize;
use tracing::{debug, instrument};

/// A purchase joined with the name of the product it refers to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseWithProduct {
    /// The stored purchase row
    pub purchase: purchase::Model,
    /// Display name of the referenced product
    pub product_name: String,
}

/// Checks a purchase quantity and unit price before anything is written.
pub fn validate_purchase(quantity: i32, unit_price: f64) -> Result<()> {
    if quantity <= 0 {
        return Err(Error::InvalidQuantity {
            quantity: f64::from(quantity),
        });
    }
    if !unit_price.is_finite() || unit_price < 0.0 {
        return Err(Error::InvalidAmount { amount: unit_price });
    }
    Ok(())
}

/// Records a purchase of `quantity` whole units at `unit_price` each.
///
/// The product must exist and belong to `user_id`. `total_cost` is computed here as
/// `quantity * unit_price`.
#[instrument(skip(db))]
pub async fn create_purchase<C>(
    db: &C,
    user_id: &str,
    product_id: i64,
    purchased_at: NaiveDateTime,
    quantity: i32,
    unit_price: f64,
) -> Result<purchase::Model>
where
    C: ConnectionTrait,
{
    validate_purchase(quantity, unit_price)?;

    if get_product_by_id(db, user_id, product_id).await?.is_none() {
        return Err(Error::ProductNotFound {
            name: product_id.to_string(),
        });
    }

    let purchase = purchase::ActiveModel {
        user_id: Set(user_id.to_string()),
        product_id: Set(product_id),
        purchased_at: Set(purchased_at),
        quantity: Set(quantity),
        unit_price: Set(unit_price),
        total_cost: Set(f64::from(quantity) * unit_price),
        created_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    };
    let created = purchase.insert(db).await?;
    debug!(
        "Recorded purchase {} of {} x {:.2}",
        created.id, created.quantity, created.unit_price
    );
    Ok(created)
}

/// Retrieves all purchases of a user, newest first.
pub async fn list_purchases<C>(db: &C, user_id: &str) -> Result<Vec<purchase::Model>>
where
    C: ConnectionTrait,
{
    Purchase::find()
        .filter(purchase::Column::UserId.eq(user_id))
        .order_by_desc(purchase::Column::PurchasedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all purchases of a user with the product name denormalised in, newest first.
///
/// Rows whose product no longer exists are left out.
pub async fn list_purchases_with_product_names<C>(
    db: &C,
    user_id: &str,
) -> Result<Vec<PurchaseWithProduct>>
where
    C: ConnectionTrait,
{
    let rows = Purchase::find()
        .filter(purchase::Column::UserId.eq(user_id))
        .order_by_desc(purchase::Column::PurchasedAt)
        .find_also_related(Product)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(purchase, product)| {
            product.map(|p| PurchaseWithProduct {
                purchase,
                product_name: p.name,
            })
        })
        .collect())
}

/// Looks for an existing purchase with the same product, calendar day and quantity.
///
/// Time of day is ignored, so re-importing a sheet whose timestamps were truncated to dates
/// still matches.
pub async fn find_duplicate_purchase<C>(
    db: &C,
    user_id: &str,
    product_id: i64,
    date: NaiveDate,
    quantity: i32,
) -> Result<Option<purchase::Model>>
where
    C: ConnectionTrait,
{
    let (start, end) = day_bounds(date);
    Purchase::find()
        .filter(purchase::Column::UserId.eq(user_id))
        .filter(purchase::Column::ProductId.eq(product_id))
        .filter(purchase::Column::PurchasedAt.gte(start))
        .filter(purchase::Column::PurchasedAt.lt(end))
        .filter(purchase::Column::Quantity.eq(quantity))
        .one(db)
        .await
        .map_err(Into::into)
}
