//! Consumption entity - A (possibly fractional) quantity of a product used up at a point in time.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Consumption database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consumption")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Product that was consumed
    pub product_id: i64,
    /// When it was consumed
    pub consumed_at: DateTime,
    /// Quantity consumed, fractions allowed (e.g. 0.5)
    pub quantity: f64,
    /// When the row was written
    pub created_at: DateTime,
}

/// Defines relationships between Consumption and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
