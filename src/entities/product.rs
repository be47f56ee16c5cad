//! Product entity - Represents a consumable item the user keeps in stock.
//!
//! Each product belongs to exactly one user and carries a display name, a category tag
//! (`Cigar`, `Cigarillo`, `Cigarette`, `Snus` or `Other`) and an optional flavor/detail note.
//! Names are unique per user, enforced by a composite index created alongside the table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Display name (e.g., "Handelsgold Blue")
    pub name: String,
    /// Category tag, stored as its canonical string
    pub category: String,
    /// Optional flavor or other free-text detail
    pub detail: Option<String>,
    /// When the product was created
    pub created_at: DateTime,
}

/// Defines relationships between Product and the three ledgers
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One product has many purchases
    #[sea_orm(has_many = "super::purchase::Entity")]
    Purchases,
    /// One product has many consumption entries
    #[sea_orm(has_many = "super::consumption::Entity")]
    Consumption,
    /// One product has many giveaways
    #[sea_orm(has_many = "super::giveaway::Entity")]
    Giveaways,
}

impl Related<super::purchase::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Purchases.def()
    }
}

impl Related<super::consumption::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Consumption.def()
    }
}

impl Related<super::giveaway::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Giveaways.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
