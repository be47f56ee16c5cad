//! Public share links - Read-only, preference-filtered views of one user's ledger.
//!
//! A share token resolves to a settings row; the owner's visibility flags then decide which
//! sections of the view are filled in. Sections that are switched off are `None` and are
//! skipped entirely when serialized.

use crate::{
    core::{
        ledger::{self, CostAnalytics, DashboardStats, DateWindow, LedgerSnapshot, ProductMetrics},
        settings::{Settings, SharePreferences, get_settings_by_share_token},
    },
    errors::Result,
};
use chrono::NaiveDateTime;
use sea_orm::ConnectionTrait;
use serde::Serialize;
use tracing::{debug, instrument};

/// Dashboard section of a shared view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedDashboard {
    /// Budget and consumption for the current month
    pub stats: DashboardStats,
    /// All-time cost attribution
    pub analytics: CostAnalytics,
}

/// One consumption or giveaway row with its product name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Name of the product
    pub product_name: String,
    /// Quantity consumed or given away
    pub quantity: f64,
    /// When it happened
    pub at: NaiveDateTime,
    /// Recipient, giveaways only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

/// History section of a shared view, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedHistory {
    /// Consumption entries
    pub consumption: Vec<HistoryEntry>,
    /// Giveaways
    pub giveaways: Vec<HistoryEntry>,
}

/// One purchase row with its product name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedPurchase {
    /// Name of the product
    pub product_name: String,
    /// Units bought
    pub quantity: i32,
    /// Price per unit
    pub unit_price: f64,
    /// Total paid
    pub total_cost: f64,
    /// When it was bought
    pub purchased_at: NaiveDateTime,
}

/// What an unauthenticated holder of a share token gets to see.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedView {
    /// Currency the amounts are in
    pub currency: String,
    /// Dashboard, if visible
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<SharedDashboard>,
    /// Per-product metrics, if visible
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Vec<ProductMetrics>>,
    /// Consumption and giveaway history, if visible
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<SharedHistory>,
    /// Purchase log, if visible
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchases: Option<Vec<SharedPurchase>>,
}

fn product_name(snapshot: &LedgerSnapshot, product_id: i64) -> String {
    snapshot
        .product(product_id)
        .map(|p| p.name.clone())
        .unwrap_or_default()
}

/// Builds the view for `settings`, filling in only the sections its flags allow.
#[must_use]
pub fn build_shared_view(
    snapshot: &LedgerSnapshot,
    settings: &Settings,
    now: NaiveDateTime,
    top_n: usize,
) -> SharedView {
    let SharePreferences {
        dashboard,
        history,
        inventory,
        purchases,
    } = settings.share_preferences;

    SharedView {
        currency: settings.currency.clone(),
        dashboard: dashboard.then(|| SharedDashboard {
            stats: ledger::dashboard_stats(
                snapshot,
                settings.monthly_budget,
                DateWindow::Month,
                now,
            )
            .rounded(),
            analytics: ledger::cost_analytics(snapshot, None, top_n).rounded(),
        }),
        inventory: inventory.then(|| {
            ledger::product_metrics(snapshot)
                .iter()
                .map(ProductMetrics::rounded)
                .collect()
        }),
        history: history.then(|| SharedHistory {
            consumption: snapshot
                .consumption
                .iter()
                .map(|c| HistoryEntry {
                    product_name: product_name(snapshot, c.product_id),
                    quantity: ledger::round2(c.quantity),
                    at: c.consumed_at,
                    recipient: None,
                })
                .collect(),
            giveaways: snapshot
                .giveaways
                .iter()
                .map(|g| HistoryEntry {
                    product_name: product_name(snapshot, g.product_id),
                    quantity: ledger::round2(g.quantity),
                    at: g.given_at,
                    recipient: g.recipient.clone(),
                })
                .collect(),
        }),
        purchases: purchases.then(|| {
            snapshot
                .purchases
                .iter()
                .map(|p| SharedPurchase {
                    product_name: product_name(snapshot, p.product_id),
                    quantity: p.quantity,
                    unit_price: ledger::round2(p.unit_price),
                    total_cost: ledger::round2(p.total_cost),
                    purchased_at: p.purchased_at,
                })
                .collect()
        }),
    }
}

/// Resolves a share token to the owner's filtered view.
///
/// # Errors
/// Returns `ShareNotFound` for unknown or revoked tokens. Once the token resolves, a
/// ledger that cannot be read shows up as an empty view rather than an error.
#[instrument(skip(db, token))]
pub async fn resolve_shared_view<C>(
    db: &C,
    token: &str,
    now: NaiveDateTime,
    top_n: usize,
) -> Result<SharedView>
where
    C: ConnectionTrait,
{
    let owner = get_settings_by_share_token(db, token).await?;
    let user_id = owner.user_id.clone();
    let settings = Settings::from(owner);

    let snapshot = ledger::load_snapshot_or_empty(db, &user_id).await;
    debug!("Resolved share link for {user_id}");
    Ok(build_shared_view(&snapshot, &settings, now, top_n))
}
