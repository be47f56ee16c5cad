//! Shared test utilities for `smoke-ledger`.
//!
//! This module provides helpers for setting up an in-memory test database, writing ledger
//! rows through the real store functions, and building plain models for the pure
//! aggregation tests.

use crate::{
    core::{consumption, product::Category, purchase},
    entities::{self, product},
    errors::Result,
};
use chrono::{NaiveDate, NaiveDateTime};
use sea_orm::DatabaseConnection;

/// User the fixtures belong to
pub const TEST_USER: &str = "test_user";
/// A second user, for scoping checks
pub const OTHER_USER: &str = "other_user";

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Builds a timestamp; panics on an impossible date, which is a bug in the test itself.
#[allow(clippy::unwrap_used)]
#[must_use]
pub fn ts(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .unwrap()
}

/// Creates a test product for [`TEST_USER`].
///
/// # Defaults
/// * category: `Cigar`
/// * detail: none
pub async fn create_test_product(db: &DatabaseConnection, name: &str) -> Result<product::Model> {
    crate::core::product::create_product(db, TEST_USER, name, Category::Cigar, None).await
}

/// Sets up a test database with one product, "Test Cigar".
pub async fn setup_with_product() -> Result<(DatabaseConnection, product::Model)> {
    let db = setup_test_db().await?;
    let product = create_test_product(&db, "Test Cigar").await?;
    Ok((db, product))
}

/// Records a purchase for [`TEST_USER`].
pub async fn create_test_purchase(
    db: &DatabaseConnection,
    product_id: i64,
    quantity: i32,
    unit_price: f64,
    at: NaiveDateTime,
) -> Result<entities::purchase::Model> {
    purchase::create_purchase(db, TEST_USER, product_id, at, quantity, unit_price).await
}

/// Logs consumption for [`TEST_USER`].
pub async fn create_test_consumption(
    db: &DatabaseConnection,
    product_id: i64,
    quantity: f64,
    at: NaiveDateTime,
) -> Result<entities::consumption::Model> {
    consumption::create_consumption(db, TEST_USER, product_id, at, quantity).await
}

/// Plain product model, never stored.
#[must_use]
pub fn product_model(id: i64, name: &str, category: Category) -> product::Model {
    product::Model {
        id,
        user_id: TEST_USER.to_string(),
        name: name.to_string(),
        category: category.as_str().to_string(),
        detail: None,
        created_at: ts(2024, 1, 1, 0, 0),
    }
}

/// Plain purchase model with `total_cost` derived, never stored.
#[must_use]
pub fn purchase_model(
    id: i64,
    product_id: i64,
    quantity: i32,
    unit_price: f64,
    at: NaiveDateTime,
) -> entities::purchase::Model {
    entities::purchase::Model {
        id,
        user_id: TEST_USER.to_string(),
        product_id,
        purchased_at: at,
        quantity,
        unit_price,
        total_cost: f64::from(quantity) * unit_price,
        created_at: at,
    }
}

/// Plain consumption model, never stored.
#[must_use]
pub fn consumption_model(
    id: i64,
    product_id: i64,
    quantity: f64,
    at: NaiveDateTime,
) -> entities::consumption::Model {
    entities::consumption::Model {
        id,
        user_id: TEST_USER.to_string(),
        product_id,
        consumed_at: at,
        quantity,
        created_at: at,
    }
}

/// Plain giveaway model, never stored.
#[must_use]
pub fn giveaway_model(
    id: i64,
    product_id: i64,
    quantity: f64,
    at: NaiveDateTime,
) -> entities::giveaway::Model {
    entities::giveaway::Model {
        id,
        user_id: TEST_USER.to_string(),
        product_id,
        quantity,
        given_at: at,
        recipient: None,
        notes: None,
        created_at: at,
    }
}
