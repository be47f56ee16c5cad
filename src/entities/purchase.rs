//! Purchase entity - One acquisition of whole units of a product.
//!
//! `total_cost` is stored redundantly (`quantity * unit_price`) for audit.
//! Purchases are immutable history once written.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Purchase database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchases")]
pub struct Model {
    /// Unique identifier for the purchase
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Product that was bought
    pub product_id: i64,
    /// When the purchase happened
    pub purchased_at: DateTime,
    /// Whole units acquired
    pub quantity: i32,
    /// Price paid per unit
    pub unit_price: f64,
    /// `quantity * unit_price`
    pub total_cost: f64,
    /// When the row was written
    pub created_at: DateTime,
}

/// Defines relationships between Purchase and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each purchase belongs to one product
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
