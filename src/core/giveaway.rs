//! Giveaway business logic - Removing stock without consuming it.
//!
//! A giveaway may never take more than is on hand. The stock check and the insert run in
//! one database transaction so two concurrent giveaways cannot both pass against the same
//! stock figure.

use crate::{
    core::{consumption::validate_fractional_quantity, ledger, product::get_product_by_id},
    entities::{Consumption, Giveaway, Purchase, consumption, giveaway, purchase},
    errors::{Error, Result},
};
use chrono::NaiveDateTime;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument, warn};

/// Allowed slack when comparing fractional stock figures.
const STOCK_EPSILON: f64 = 1e-9;

/// Computes the current stock of one product straight from its ledger rows.
pub async fn current_stock<C>(db: &C, user_id: &str, product_id: i64) -> Result<f64>
where
    C: ConnectionTrait,
{
    let purchases = Purchase::find()
        .filter(purchase::Column::UserId.eq(user_id))
        .filter(purchase::Column::ProductId.eq(product_id))
        .all(db)
        .await?;
    let entries = Consumption::find()
        .filter(consumption::Column::UserId.eq(user_id))
        .filter(consumption::Column::ProductId.eq(product_id))
        .all(db)
        .await?;
    let giveaways = Giveaway::find()
        .filter(giveaway::Column::UserId.eq(user_id))
        .filter(giveaway::Column::ProductId.eq(product_id))
        .all(db)
        .await?;

    Ok(ledger::stock(product_id, &purchases, &entries, &giveaways))
}

/// Gives away `quantity` units of a product.
///
/// # Errors
/// Returns an error if:
/// - The quantity is not positive and finite
/// - The product does not exist for this user
/// - The quantity exceeds the product's current stock
#[instrument(skip(db, recipient, notes))]
pub async fn create_giveaway(
    db: &DatabaseConnection,
    user_id: &str,
    product_id: i64,
    quantity: f64,
    given_at: NaiveDateTime,
    recipient: Option<String>,
    notes: Option<String>,
) -> Result<giveaway::Model> {
    validate_fractional_quantity(quantity)?;

    let txn = db.begin().await?;

    if get_product_by_id(&txn, user_id, product_id).await?.is_none() {
        return Err(Error::ProductNotFound {
            name: product_id.to_string(),
        });
    }

    let available = current_stock(&txn, user_id, product_id).await?;
    if quantity > available + STOCK_EPSILON {
        warn!("Rejected giveaway of {quantity} with only {available} in stock");
        return Err(Error::InsufficientStock {
            available,
            requested: quantity,
        });
    }

    let giveaway = giveaway::ActiveModel {
        user_id: Set(user_id.to_string()),
        product_id: Set(product_id),
        quantity: Set(quantity),
        given_at: Set(given_at),
        recipient: Set(recipient.filter(|r| !r.trim().is_empty())),
        notes: Set(notes.filter(|n| !n.trim().is_empty())),
        created_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    };
    let created = giveaway.insert(&txn).await?;

    txn.commit().await?;
    info!("Gave away {} of product {}", created.quantity, product_id);
    Ok(created)
}

/// Retrieves all giveaways of a user, newest first.
pub async fn list_giveaways<C>(db: &C, user_id: &str) -> Result<Vec<giveaway::Model>>
where
    C: ConnectionTrait,
{
    Giveaway::find()
        .filter(giveaway::Column::UserId.eq(user_id))
        .order_by_desc(giveaway::Column::GivenAt)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_giveaway_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result =
            create_giveaway(&db, TEST_USER, 1, 0.0, ts(2024, 1, 1, 0, 0), None, None).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidQuantity { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_giveaway_exceeding_stock_is_rejected() -> Result<()> {
        let (db, product) = setup_with_product().await?;
        create_test_purchase(&db, product.id, 10, 5.0, ts(2024, 1, 1, 10, 0)).await?;
        create_test_consumption(&db, product.id, 5.0, ts(2024, 1, 2, 10, 0)).await?;

        let result = create_giveaway(
            &db,
            TEST_USER,
            product.id,
            10.0,
            ts(2024, 1, 3, 10, 0),
            Some("Erik".to_string()),
            None,
        )
        .await;
        match result.unwrap_err() {
            Error::InsufficientStock {
                available,
                requested,
            } => {
                assert_eq!(available, 5.0);
                assert_eq!(requested, 10.0);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(list_giveaways(&db, TEST_USER).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_giveaway_of_whole_stock() -> Result<()> {
        let (db, product) = setup_with_product().await?;
        create_test_purchase(&db, product.id, 3, 5.0, ts(2024, 1, 1, 10, 0)).await?;
        create_test_consumption(&db, product.id, 0.5, ts(2024, 1, 2, 10, 0)).await?;

        let giveaway = create_giveaway(
            &db,
            TEST_USER,
            product.id,
            2.5,
            ts(2024, 1, 3, 10, 0),
            Some("Anna".to_string()),
            Some("   ".to_string()),
        )
        .await?;
        assert_eq!(giveaway.recipient.as_deref(), Some("Anna"));
        assert_eq!(giveaway.notes, None);

        assert_eq!(current_stock(&db, TEST_USER, product.id).await?, 0.0);

        let result =
            create_giveaway(&db, TEST_USER, product.id, 0.1, ts(2024, 1, 4, 10, 0), None, None)
                .await;
        assert!(matches!(result.unwrap_err(), Error::InsufficientStock { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_giveaway_unknown_product() -> Result<()> {
        let db = setup_test_db().await?;

        let result =
            create_giveaway(&db, TEST_USER, 77, 1.0, ts(2024, 1, 1, 0, 0), None, None).await;
        assert!(matches!(result.unwrap_err(), Error::ProductNotFound { .. }));

        Ok(())
    }
}
