//! Settings business logic - Budget, currency and share link management.
//!
//! Each user has at most one settings row. A user without one sees the defaults
//! (budget 500, currency SEK, every share section visible) until something is saved.

use crate::{
    entities::{UserSettings, user_settings},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Budget used when the user has never saved one
pub const DEFAULT_MONTHLY_BUDGET: f64 = 500.0;
/// Currency used when the user has never saved one
pub const DEFAULT_CURRENCY: &str = "SEK";

/// Which sections a share link exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SharePreferences {
    /// Dashboard stats and analytics
    pub dashboard: bool,
    /// Consumption and giveaway history
    pub history: bool,
    /// Products with their stock metrics
    pub inventory: bool,
    /// Purchase log
    pub purchases: bool,
}

impl Default for SharePreferences {
    fn default() -> Self {
        Self {
            dashboard: true,
            history: true,
            inventory: true,
            purchases: true,
        }
    }
}

impl SharePreferences {
    /// Decodes the stored JSON blob, falling back to all-visible when absent or corrupt.
    #[must_use]
    pub fn from_stored(raw: Option<&str>) -> Self {
        match raw {
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
                warn!("Ignoring unreadable share preferences: {e}");
                Self::default()
            }),
            None => Self::default(),
        }
    }
}

/// Effective settings of a user, with defaults filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    /// Monthly spending budget
    pub monthly_budget: f64,
    /// Currency tag
    pub currency: String,
    /// Active share token, if sharing is on
    pub share_token: Option<String>,
    /// Visible share sections
    pub share_preferences: SharePreferences,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            monthly_budget: DEFAULT_MONTHLY_BUDGET,
            currency: DEFAULT_CURRENCY.to_string(),
            share_token: None,
            share_preferences: SharePreferences::default(),
        }
    }
}

impl From<user_settings::Model> for Settings {
    fn from(model: user_settings::Model) -> Self {
        Self {
            share_preferences: SharePreferences::from_stored(model.share_preferences.as_deref()),
            monthly_budget: model.monthly_budget,
            currency: model.currency,
            share_token: model.share_token,
        }
    }
}

/// Fields to change in [`upsert_settings`]; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsUpdate {
    /// New monthly budget
    pub monthly_budget: Option<f64>,
    /// New currency tag
    pub currency: Option<String>,
}

fn validate_update(update: &SettingsUpdate) -> Result<()> {
    if let Some(budget) = update.monthly_budget
        && (!budget.is_finite() || budget <= 0.0)
    {
        return Err(Error::InvalidAmount { amount: budget });
    }
    if let Some(currency) = &update.currency
        && currency.trim().is_empty()
    {
        return Err(Error::Validation {
            message: "Currency cannot be empty".to_string(),
        });
    }
    Ok(())
}

/// Retrieves the stored settings row of a user, if any.
pub async fn get_settings<C>(db: &C, user_id: &str) -> Result<Option<user_settings::Model>>
where
    C: ConnectionTrait,
{
    UserSettings::find()
        .filter(user_settings::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Returns the user's settings, or `fallback` when nothing is stored.
pub async fn get_settings_or<C>(db: &C, user_id: &str, fallback: Settings) -> Result<Settings>
where
    C: ConnectionTrait,
{
    Ok(get_settings(db, user_id)
        .await?
        .map_or(fallback, Settings::from))
}

/// Returns the user's settings with the built-in defaults filled in.
pub async fn get_settings_or_default<C>(db: &C, user_id: &str) -> Result<Settings>
where
    C: ConnectionTrait,
{
    get_settings_or(db, user_id, Settings::default()).await
}

async fn ensure_settings<C>(db: &C, user_id: &str) -> Result<user_settings::Model>
where
    C: ConnectionTrait,
{
    if let Some(existing) = get_settings(db, user_id).await? {
        return Ok(existing);
    }

    let now = chrono::Utc::now().naive_utc();
    let settings = user_settings::ActiveModel {
        user_id: Set(user_id.to_string()),
        monthly_budget: Set(DEFAULT_MONTHLY_BUDGET),
        currency: Set(DEFAULT_CURRENCY.to_string()),
        share_token: Set(None),
        share_preferences: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    settings.insert(db).await.map_err(Into::into)
}

/// Creates or updates the user's settings with the given fields.
///
/// # Errors
/// Returns `InvalidAmount` for a non-positive or non-finite budget and `Validation` for an
/// empty currency, both before anything is written.
#[instrument(skip(db))]
pub async fn upsert_settings<C>(
    db: &C,
    user_id: &str,
    update: SettingsUpdate,
) -> Result<user_settings::Model>
where
    C: ConnectionTrait,
{
    validate_update(&update)?;

    let existing = ensure_settings(db, user_id).await?;
    let mut settings: user_settings::ActiveModel = existing.into();
    if let Some(budget) = update.monthly_budget {
        settings.monthly_budget = Set(budget);
    }
    if let Some(currency) = update.currency {
        settings.currency = Set(currency.trim().to_string());
    }
    settings.updated_at = Set(chrono::Utc::now().naive_utc());

    let saved = settings.update(db).await?;
    info!(
        "Saved settings for {}: budget {:.2} {}",
        user_id, saved.monthly_budget, saved.currency
    );
    Ok(saved)
}

/// Issues a fresh share token, replacing (and so invalidating) any previous one.
#[instrument(skip(db))]
pub async fn generate_share_token(db: &DatabaseConnection, user_id: &str) -> Result<String> {
    let existing = ensure_settings(db, user_id).await?;
    let token = uuid::Uuid::new_v4().simple().to_string();

    let mut settings: user_settings::ActiveModel = existing.into();
    settings.share_token = Set(Some(token.clone()));
    settings.updated_at = Set(chrono::Utc::now().naive_utc());
    settings.update(db).await?;

    info!("Generated share token for {user_id}");
    Ok(token)
}

/// Turns sharing off. Every outstanding link stops resolving immediately.
#[instrument(skip(db))]
pub async fn revoke_share_token(db: &DatabaseConnection, user_id: &str) -> Result<()> {
    let Some(existing) = get_settings(db, user_id).await? else {
        return Ok(());
    };

    let mut settings: user_settings::ActiveModel = existing.into();
    settings.share_token = Set(None);
    settings.updated_at = Set(chrono::Utc::now().naive_utc());
    settings.update(db).await?;

    info!("Revoked share token for {user_id}");
    Ok(())
}

/// Stores which sections a share link may expose.
#[instrument(skip(db))]
pub async fn update_share_preferences(
    db: &DatabaseConnection,
    user_id: &str,
    preferences: SharePreferences,
) -> Result<user_settings::Model> {
    let existing = ensure_settings(db, user_id).await?;

    let mut settings: user_settings::ActiveModel = existing.into();
    settings.share_preferences = Set(Some(serde_json::to_string(&preferences)?));
    settings.updated_at = Set(chrono::Utc::now().naive_utc());
    settings.update(db).await.map_err(Into::into)
}

/// Resolves a share token to the settings row it belongs to.
///
/// # Errors
/// Returns `ShareNotFound` for unknown, revoked and empty tokens alike.
pub async fn get_settings_by_share_token<C>(db: &C, token: &str) -> Result<user_settings::Model>
where
    C: ConnectionTrait,
{
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::ShareNotFound);
    }

    UserSettings::find()
        .filter(user_settings::Column::ShareToken.eq(token))
        .one(db)
        .await?
        .ok_or(Error::ShareNotFound)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_defaults_without_record() -> Result<()> {
        let db = setup_test_db().await?;

        let settings = get_settings_or_default(&db, TEST_USER).await?;
        assert_eq!(settings.monthly_budget, 500.0);
        assert_eq!(settings.currency, "SEK");
        assert_eq!(settings.share_token, None);
        assert_eq!(settings.share_preferences, SharePreferences::default());

        assert!(get_settings(&db, TEST_USER).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_settings_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let update = SettingsUpdate {
            monthly_budget: Some(-5.0),
            currency: None,
        };
        let result = upsert_settings(&db, TEST_USER, update).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidAmount { .. }));

        let update = SettingsUpdate {
            monthly_budget: None,
            currency: Some(" ".to_string()),
        };
        let result = upsert_settings(&db, TEST_USER, update).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_settings_merges_fields() -> Result<()> {
        let db = setup_test_db().await?;

        let first = upsert_settings(
            &db,
            TEST_USER,
            SettingsUpdate {
                monthly_budget: Some(800.0),
                currency: None,
            },
        )
        .await?;
        assert_eq!(first.monthly_budget, 800.0);
        assert_eq!(first.currency, "SEK");

        let second = upsert_settings(
            &db,
            TEST_USER,
            SettingsUpdate {
                monthly_budget: None,
                currency: Some("EUR".to_string()),
            },
        )
        .await?;
        assert_eq!(second.id, first.id);
        assert_eq!(second.monthly_budget, 800.0);
        assert_eq!(second.currency, "EUR");

        Ok(())
    }

    #[tokio::test]
    async fn test_share_token_lifecycle() -> Result<()> {
        let db = setup_test_db().await?;

        let token = generate_share_token(&db, TEST_USER).await?;
        assert_eq!(token.len(), 32);
        let resolved = get_settings_by_share_token(&db, &token).await?;
        assert_eq!(resolved.user_id, TEST_USER);

        // Regenerating invalidates the old link
        let fresh = generate_share_token(&db, TEST_USER).await?;
        assert_ne!(fresh, token);
        assert!(matches!(
            get_settings_by_share_token(&db, &token).await.unwrap_err(),
            Error::ShareNotFound
        ));

        revoke_share_token(&db, TEST_USER).await?;
        assert!(matches!(
            get_settings_by_share_token(&db, &fresh).await.unwrap_err(),
            Error::ShareNotFound
        ));
        assert!(matches!(
            get_settings_by_share_token(&db, "").await.unwrap_err(),
            Error::ShareNotFound
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_share_preferences_roundtrip() -> Result<()> {
        let db = setup_test_db().await?;
        let prefs = SharePreferences {
            dashboard: true,
            history: false,
            inventory: true,
            purchases: false,
        };

        update_share_preferences(&db, TEST_USER, prefs).await?;
        let settings = get_settings_or_default(&db, TEST_USER).await?;
        assert_eq!(settings.share_preferences, prefs);

        Ok(())
    }

    #[test]
    fn test_share_preferences_from_stored() {
        assert_eq!(
            SharePreferences::from_stored(None),
            SharePreferences::default()
        );
        assert_eq!(
            SharePreferences::from_stored(Some("not json")),
            SharePreferences::default()
        );

        let partial = SharePreferences::from_stored(Some(r#"{"purchases":false}"#));
        assert!(partial.dashboard);
        assert!(!partial.purchases);
    }
}
