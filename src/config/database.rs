//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. The one constraint the entities cannot
//! express, a product name being unique per user, is added as a composite index here.

use crate::entities::{Consumption, Giveaway, Product, Purchase, UserSettings, product};
use crate::errors::Result;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use std::path::Path;
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/smoke_ledger.sqlite?mode=rwc";

/// Name of the composite unique index backing product upserts.
pub const PRODUCT_NAME_INDEX: &str = "idx_products_user_name";

/// Gets the database URL from environment variable or returns default `SQLite` path.
///
/// This function looks for `DATABASE_URL` in the environment and falls back to
/// a default local `SQLite` file if not found.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Directory a file-backed `SQLite` URL points into, if any.
fn sqlite_parent_dir(database_url: &str) -> Option<&Path> {
    let path = database_url.strip_prefix("sqlite://")?;
    let path = path.split('?').next()?;
    Path::new(path).parent().filter(|p| !p.as_os_str().is_empty())
}

/// Connects to `database_url` and ensures all tables exist.
///
/// For a file-backed `SQLite` URL the containing directory is created first.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection> {
    if let Some(dir) = sqlite_parent_dir(database_url) {
        std::fs::create_dir_all(dir)?;
    }
    debug!("Connecting to database at {database_url}");
    let db = Database::connect(database_url).await?;
    create_tables(&db).await?;
    Ok(db)
}

fn product_name_index() -> IndexCreateStatement {
    Index::create()
        .name(PRODUCT_NAME_INDEX)
        .table(Product)
        .col(product::Column::UserId)
        .col(product::Column::Name)
        .unique()
        .if_not_exists()
        .to_owned()
}

/// Creates all necessary database tables using `SeaORM`'s schema generation from entity definitions.
///
/// Products are created first because the three ledgers reference them by foreign key.
/// Every statement is `IF NOT EXISTS`, so this is safe to run on every start.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut tables = [
        schema.create_table_from_entity(Product),
        schema.create_table_from_entity(Purchase),
        schema.create_table_from_entity(Consumption),
        schema.create_table_from_entity(Giveaway),
        schema.create_table_from_entity(UserSettings),
    ];

    for table in &mut tables {
        table.if_not_exists();
        db.execute(builder.build(&*table)).await?;
    }
    db.execute(builder.build(&product_name_index())).await?;

    info!("Database tables ensured");
    Ok(())
}
