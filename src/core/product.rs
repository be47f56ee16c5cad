//! Product business logic - Handles all product-related operations.
//!
//! Products are the anchor every ledger row points at. Names are unique per user
//! (backed by a composite index), which lets the import pipeline resolve a product by name
//! with a single upsert instead of a create-then-reload pass. Deleting a product removes its
//! purchases, consumption and giveaways in the same database transaction.

use crate::{
    entities::{Consumption, Giveaway, Product, Purchase, consumption, giveaway, product, purchase},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::OnConflict};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::{debug, info, instrument};

/// Closed set of product categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Cigars
    Cigar,
    /// Cigarillos
    Cigarillo,
    /// Cigarettes
    Cigarette,
    /// Snus pouches
    Snus,
    /// Anything else
    Other,
}

impl Category {
    /// Every category, in display order
    pub const ALL: [Self; 5] = [
        Self::Cigar,
        Self::Cigarillo,
        Self::Cigarette,
        Self::Snus,
        Self::Other,
    ];

    /// Canonical name as stored in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cigar => "Cigar",
            Self::Cigarillo => "Cigarillo",
            Self::Cigarette => "Cigarette",
            Self::Snus => "Snus",
            Self::Other => "Other",
        }
    }

    /// Parses a category leniently, falling back to `Other` for anything unrecognised.
    #[must_use]
    pub fn parse_or_other(value: &str) -> Self {
        value.parse().unwrap_or(Self::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| Error::Validation {
                message: format!("Unknown product category '{trimmed}'"),
            })
    }
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation {
            message: "Product name cannot be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn normalize_detail(detail: Option<String>) -> Option<String> {
    detail
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Retrieves all products of a user, ordered alphabetically by name.
pub async fn list_products<C>(db: &C, user_id: &str) -> Result<Vec<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find()
        .filter(product::Column::UserId.eq(user_id))
        .order_by_asc(product::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a product by id, returning `None` if it does not exist or belongs to another user.
pub async fn get_product_by_id<C>(
    db: &C,
    user_id: &str,
    product_id: i64,
) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .filter(product::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a product of a user by its exact (trimmed) name.
pub async fn get_product_by_name<C>(
    db: &C,
    user_id: &str,
    name: &str,
) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find()
        .filter(product::Column::UserId.eq(user_id))
        .filter(product::Column::Name.eq(name.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a new product after validating the name.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or whitespace-only
/// - The user already has a product with this name
/// - The database insert fails
#[instrument(skip(db, detail))]
pub async fn create_product(
    db: &DatabaseConnection,
    user_id: &str,
    name: &str,
    category: Category,
    detail: Option<String>,
) -> Result<product::Model> {
    let name = validate_name(name)?;

    if get_product_by_name(db, user_id, &name).await?.is_some() {
        return Err(Error::DuplicateProduct { name });
    }

    let product = product::ActiveModel {
        user_id: Set(user_id.to_string()),
        name: Set(name),
        category: Set(category.as_str().to_string()),
        detail: Set(normalize_detail(detail)),
        created_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    };
    let created = product.insert(db).await?;
    info!("Created product '{}' (ID: {})", created.name, created.id);
    Ok(created)
}

/// Updates an existing product's name, category and detail.
///
/// # Errors
/// Returns an error if the name is empty, the product does not exist for this user,
/// or another product of the user already carries the new name.
#[instrument(skip(db, detail))]
pub async fn update_product(
    db: &DatabaseConnection,
    user_id: &str,
    product_id: i64,
    name: &str,
    category: Category,
    detail: Option<String>,
) -> Result<product::Model> {
    let name = validate_name(name)?;

    let existing = get_product_by_id(db, user_id, product_id)
        .await?
        .ok_or_else(|| Error::ProductNotFound {
            name: product_id.to_string(),
        })?;

    if existing.name != name
        && let Some(clash) = get_product_by_name(db, user_id, &name).await?
        && clash.id != product_id
    {
        return Err(Error::DuplicateProduct { name });
    }

    let mut product: product::ActiveModel = existing.into();
    product.name = Set(name);
    product.category = Set(category.as_str().to_string());
    product.detail = Set(normalize_detail(detail));

    product.update(db).await.map_err(Into::into)
}

/// Deletes a product together with every purchase, consumption entry and giveaway
/// that references it.
///
/// # Errors
/// Returns `ProductNotFound` if the product does not exist for this user.
#[instrument(skip(db))]
pub async fn delete_product(db: &DatabaseConnection, user_id: &str, product_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let product = get_product_by_id(&txn, user_id, product_id)
        .await?
        .ok_or_else(|| Error::ProductNotFound {
            name: product_id.to_string(),
        })?;

    let purchases = Purchase::delete_many()
        .filter(purchase::Column::ProductId.eq(product_id))
        .exec(&txn)
        .await?;
    let entries = Consumption::delete_many()
        .filter(consumption::Column::ProductId.eq(product_id))
        .exec(&txn)
        .await?;
    let giveaways = Giveaway::delete_many()
        .filter(giveaway::Column::ProductId.eq(product_id))
        .exec(&txn)
        .await?;
    product.delete(&txn).await?;

    txn.commit().await?;
    info!(
        "Deleted product {} with {} purchases, {} consumption entries, {} giveaways",
        product_id, purchases.rows_affected, entries.rows_affected, giveaways.rows_affected
    );
    Ok(())
}

/// Returns the id of the user's product called `name`, creating it first if needed.
///
/// The insert is an upsert on the `(user_id, name)` unique index, so concurrent callers
/// resolving the same name converge on one row.
#[instrument(skip(db, detail))]
pub async fn resolve_or_create_product<C>(
    db: &C,
    user_id: &str,
    name: &str,
    category: Category,
    detail: Option<String>,
) -> Result<i64>
where
    C: ConnectionTrait,
{
    let name = validate_name(name)?;

    if let Some(existing) = get_product_by_name(db, user_id, &name).await? {
        return Ok(existing.id);
    }

    let product = product::ActiveModel {
        user_id: Set(user_id.to_string()),
        name: Set(name.clone()),
        category: Set(category.as_str().to_string()),
        detail: Set(normalize_detail(detail)),
        created_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    };
    let inserted = Product::insert(product)
        .on_conflict(
            OnConflict::columns([product::Column::UserId, product::Column::Name])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    debug!("Upserted product '{name}' ({inserted} row(s) inserted)");

    get_product_by_name(db, user_id, &name)
        .await?
        .map(|p| p.id)
        .ok_or(Error::ProductNotFound { name })
}
