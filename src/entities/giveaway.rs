//! Giveaway entity - Stock removed without being consumed.
//!
//! Carries an optional recipient and free-text notes. Giveaways are immutable history.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Giveaway database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "giveaways")]
pub struct Model {
    /// Unique identifier for the giveaway
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Product that was given away
    pub product_id: i64,
    /// Quantity removed from stock, fractions allowed
    pub quantity: f64,
    /// When it was given away
    pub given_at: DateTime,
    /// Who received it
    pub recipient: Option<String>,
    /// Free-text notes
    pub notes: Option<String>,
    /// When the row was written
    pub created_at: DateTime,
}

/// Defines relationships between Giveaway and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each giveaway belongs to one product
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
