//! User settings entity - One record per user.
//!
//! Stores the monthly budget, currency tag, the optional public share token and the
//! share visibility flags serialized as JSON.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User settings database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_settings")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user, one settings row per user
    #[sea_orm(unique)]
    pub user_id: String,
    /// Monthly spending budget
    pub monthly_budget: f64,
    /// Currency tag (e.g. `"SEK"`)
    pub currency: String,
    /// Public read-only share token, `None` when sharing is off
    #[sea_orm(unique)]
    pub share_token: Option<String>,
    /// JSON-encoded share visibility flags
    pub share_preferences: Option<String>,
    /// When the record was created
    pub created_at: DateTime,
    /// When the record was last modified
    pub updated_at: DateTime,
}

/// `UserSettings` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
