//! Consumption business logic - Logging, correcting and reading usage entries.
//!
//! Quantities may be fractional (half a cigar is a valid entry) but must be positive
//! and finite. Entries can be corrected or deleted; everything else about stock is
//! recomputed from these rows by the ledger.

use crate::{
    core::{day_bounds, product::get_product_by_id},
    entities::{Consumption, consumption},
    errors::{Error, Result},
};
use chrono::{NaiveDate, NaiveDateTime};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{debug, info, instrument};

/// Checks that a consumed or given-away quantity is positive and finite.
pub fn validate_fractional_quantity(quantity: f64) -> Result<()> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(Error::InvalidQuantity { quantity });
    }
    Ok(())
}

/// Logs `quantity` units of a product as consumed at `consumed_at`.
#[instrument(skip(db))]
pub async fn create_consumption<C>(
    db: &C,
    user_id: &str,
    product_id: i64,
    consumed_at: NaiveDateTime,
    quantity: f64,
) -> Result<consumption::Model>
where
    C: ConnectionTrait,
{
    validate_fractional_quantity(quantity)?;

    if get_product_by_id(db, user_id, product_id).await?.is_none() {
        return Err(Error::ProductNotFound {
            name: product_id.to_string(),
        });
    }

    let entry = consumption::ActiveModel {
        user_id: Set(user_id.to_string()),
        product_id: Set(product_id),
        consumed_at: Set(consumed_at),
        quantity: Set(quantity),
        created_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    };
    let created = entry.insert(db).await?;
    debug!("Logged consumption {} ({} units)", created.id, created.quantity);
    Ok(created)
}

/// Corrects an existing entry: product, timestamp and quantity are all replaced.
///
/// # Errors
/// Returns `ConsumptionNotFound` if the entry does not exist for this user and
/// `ProductNotFound` if the new product is not the user's.
#[instrument(skip(db))]
pub async fn update_consumption(
    db: &DatabaseConnection,
    user_id: &str,
    consumption_id: i64,
    product_id: i64,
    consumed_at: NaiveDateTime,
    quantity: f64,
) -> Result<consumption::Model> {
    validate_fractional_quantity(quantity)?;

    let existing = get_consumption_by_id(db, user_id, consumption_id)
        .await?
        .ok_or(Error::ConsumptionNotFound { id: consumption_id })?;

    if get_product_by_id(db, user_id, product_id).await?.is_none() {
        return Err(Error::ProductNotFound {
            name: product_id.to_string(),
        });
    }

    let mut entry: consumption::ActiveModel = existing.into();
    entry.product_id = Set(product_id);
    entry.consumed_at = Set(consumed_at);
    entry.quantity = Set(quantity);

    entry.update(db).await.map_err(Into::into)
}

/// Deletes one consumption entry.
#[instrument(skip(db))]
pub async fn delete_consumption(
    db: &DatabaseConnection,
    user_id: &str,
    consumption_id: i64,
) -> Result<()> {
    let entry = get_consumption_by_id(db, user_id, consumption_id)
        .await?
        .ok_or(Error::ConsumptionNotFound { id: consumption_id })?;

    entry.delete(db).await?;
    info!("Deleted consumption entry {consumption_id}");
    Ok(())
}

/// Retrieves one entry, `None` if missing or owned by another user.
pub async fn get_consumption_by_id<C>(
    db: &C,
    user_id: &str,
    consumption_id: i64,
) -> Result<Option<consumption::Model>>
where
    C: ConnectionTrait,
{
    Consumption::find_by_id(consumption_id)
        .filter(consumption::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a user's consumption, newest first, optionally only entries at or after `since`.
pub async fn list_consumption<C>(
    db: &C,
    user_id: &str,
    since: Option<NaiveDateTime>,
) -> Result<Vec<consumption::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Consumption::find().filter(consumption::Column::UserId.eq(user_id));
    if let Some(since) = since {
        query = query.filter(consumption::Column::ConsumedAt.gte(since));
    }
    query
        .order_by_desc(consumption::Column::ConsumedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Looks for an entry with the same product, calendar day and quantity.
pub async fn find_duplicate_consumption<C>(
    db: &C,
    user_id: &str,
    product_id: i64,
    date: NaiveDate,
    quantity: f64,
) -> Result<Option<consumption::Model>>
where
    C: ConnectionTrait,
{
    let (start, end) = day_bounds(date);
    Consumption::find()
        .filter(consumption::Column::UserId.eq(user_id))
        .filter(consumption::Column::ProductId.eq(product_id))
        .filter(consumption::Column::ConsumedAt.gte(start))
        .filter(consumption::Column::ConsumedAt.lt(end))
        .filter(consumption::Column::Quantity.eq(quantity))
        .one(db)
        .await
        .map_err(Into::into)
}
