//! Ledger aggregation - Derived inventory and cost metrics.
//!
//! Nothing here is stored. Every figure (stock, average cost, run-rate, spend, cost
//! attribution) is recomputed from a [`LedgerSnapshot`] of the user's four tables, so the
//! functions in this module are pure and can be called as often as needed.
//!
//! Costing is weighted-average, not FIFO: a product's average unit cost over *all* its
//! purchases is applied to every consumed or given-away unit, regardless of when the
//! purchase happened. Sums are kept at full precision; use [`round2`] or the `rounded`
//! methods only when presenting a result.

use crate::{
    core::{consumption, giveaway, product::Category, product::list_products, purchase},
    entities::{consumption as consumption_entity, giveaway as giveaway_entity, product, purchase as purchase_entity},
    errors::{Error, Result},
};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
    str::FromStr,
};
use tracing::{debug, error};

/// Number of year-month buckets kept in [`CostAnalytics::cost_by_month`]
pub const MONTH_BUCKETS: usize = 6;
/// Number of weeks kept by [`weekly_totals`]
pub const WEEK_BUCKETS: usize = 12;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Rounds to two decimals for display.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Everything the aggregator needs about one user, read in one go.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerSnapshot {
    /// The user's products
    pub products: Vec<product::Model>,
    /// Every purchase referencing one of `products`
    pub purchases: Vec<purchase_entity::Model>,
    /// Every consumption entry referencing one of `products`
    pub consumption: Vec<consumption_entity::Model>,
    /// Every giveaway referencing one of `products`
    pub giveaways: Vec<giveaway_entity::Model>,
}

impl LedgerSnapshot {
    /// Builds a snapshot, dropping ledger rows whose product is not in `products`.
    #[must_use]
    pub fn new(
        products: Vec<product::Model>,
        mut purchases: Vec<purchase_entity::Model>,
        mut consumption: Vec<consumption_entity::Model>,
        mut giveaways: Vec<giveaway_entity::Model>,
    ) -> Self {
        let known: HashSet<i64> = products.iter().map(|p| p.id).collect();
        let before = purchases.len() + consumption.len() + giveaways.len();

        purchases.retain(|p| known.contains(&p.product_id));
        consumption.retain(|c| known.contains(&c.product_id));
        giveaways.retain(|g| known.contains(&g.product_id));

        let orphaned = before - (purchases.len() + consumption.len() + giveaways.len());
        if orphaned > 0 {
            debug!("Excluded {orphaned} ledger rows referencing missing products");
        }

        Self {
            products,
            purchases,
            consumption,
            giveaways,
        }
    }

    /// Looks up a product of this snapshot by id.
    #[must_use]
    pub fn product(&self, product_id: i64) -> Option<&product::Model> {
        self.products.iter().find(|p| p.id == product_id)
    }

    fn categories(&self) -> HashMap<i64, Category> {
        self.products
            .iter()
            .map(|p| (p.id, Category::parse_or_other(&p.category)))
            .collect()
    }
}

/// Reads a full snapshot of a user's ledger.
pub async fn load_snapshot<C>(db: &C, user_id: &str) -> Result<LedgerSnapshot>
where
    C: ConnectionTrait,
{
    let products = list_products(db, user_id).await?;
    let purchases = purchase::list_purchases(db, user_id).await?;
    let entries = consumption::list_consumption(db, user_id, None).await?;
    let giveaways = giveaway::list_giveaways(db, user_id).await?;

    Ok(LedgerSnapshot::new(products, purchases, entries, giveaways))
}

/// Like [`load_snapshot`], but an unreachable store yields an empty snapshot so read
/// views still render.
pub async fn load_snapshot_or_empty<C>(db: &C, user_id: &str) -> LedgerSnapshot
where
    C: ConnectionTrait,
{
    match load_snapshot(db, user_id).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("Failed to load ledger for {user_id}, showing empty view: {e}");
            LedgerSnapshot::default()
        }
    }
}

/// Time range a view is restricted to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateWindow {
    /// Since midnight today
    Today,
    /// The trailing seven days
    Week,
    /// Since the first of the current calendar month
    #[default]
    Month,
    /// No restriction
    All,
}

impl DateWindow {
    /// First instant inside the window, `None` when unbounded.
    #[must_use]
    pub fn start(self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Self::Today => Some(now.date().and_time(NaiveTime::MIN)),
            Self::Week => now.checked_sub_signed(TimeDelta::days(7)),
            Self::Month => now.date().with_day(1).map(|d| d.and_time(NaiveTime::MIN)),
            Self::All => None,
        }
    }

    /// Lower-case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Week => "week",
            Self::Month => "month",
            Self::All => "all",
        }
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateWindow {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "all" => Ok(Self::All),
            other => Err(Error::Validation {
                message: format!("Unknown date window '{other}' (expected today, week, month or all)"),
            }),
        }
    }
}

fn in_window(at: NaiveDateTime, since: Option<NaiveDateTime>) -> bool {
    since.is_none_or(|start| at >= start)
}

/// Whole days between two instants, rounded up, never less than one.
#[allow(clippy::cast_precision_loss)]
fn elapsed_days(first: NaiveDateTime, last: NaiveDateTime) -> f64 {
    let seconds = (last - first).num_seconds() as f64;
    (seconds / SECONDS_PER_DAY).ceil().max(1.0)
}

#[derive(Debug, Default, Clone, Copy)]
struct ProductTotals {
    purchased: f64,
    purchase_cost: f64,
    consumed: f64,
    given_away: f64,
    first_consumed: Option<NaiveDateTime>,
    last_consumed: Option<NaiveDateTime>,
}

impl ProductTotals {
    fn average_unit_cost(&self) -> f64 {
        if self.purchased > 0.0 {
            self.purchase_cost / self.purchased
        } else {
            0.0
        }
    }

    fn stock(&self) -> f64 {
        self.purchased - self.consumed - self.given_away
    }

    fn run_rate(&self) -> f64 {
        match (self.first_consumed, self.last_consumed) {
            (Some(first), Some(last)) => self.consumed / elapsed_days(first, last),
            _ => 0.0,
        }
    }
}

fn totals_by_product(
    purchases: &[purchase_entity::Model],
    consumption: &[consumption_entity::Model],
    giveaways: &[giveaway_entity::Model],
) -> HashMap<i64, ProductTotals> {
    let mut totals: HashMap<i64, ProductTotals> = HashMap::new();

    for p in purchases {
        let t = totals.entry(p.product_id).or_default();
        t.purchased += f64::from(p.quantity);
        t.purchase_cost += p.total_cost;
    }
    for c in consumption {
        let t = totals.entry(c.product_id).or_default();
        t.consumed += c.quantity;
        t.first_consumed = Some(t.first_consumed.map_or(c.consumed_at, |f| f.min(c.consumed_at)));
        t.last_consumed = Some(t.last_consumed.map_or(c.consumed_at, |l| l.max(c.consumed_at)));
    }
    for g in giveaways {
        totals.entry(g.product_id).or_default().given_away += g.quantity;
    }

    totals
}

/// Purchased minus consumed minus given away, for one product.
#[must_use]
pub fn stock(
    product_id: i64,
    purchases: &[purchase_entity::Model],
    consumption: &[consumption_entity::Model],
    giveaways: &[giveaway_entity::Model],
) -> f64 {
    totals_by_product(purchases, consumption, giveaways)
        .get(&product_id)
        .map_or(0.0, ProductTotals::stock)
}

/// Total purchase cost divided by total purchased quantity; 0 without purchases.
#[must_use]
pub fn average_unit_cost(product_id: i64, purchases: &[purchase_entity::Model]) -> f64 {
    totals_by_product(purchases, &[], &[])
        .get(&product_id)
        .map_or(0.0, ProductTotals::average_unit_cost)
}

/// Units consumed per day across the product's consumption history.
#[must_use]
pub fn run_rate(product_id: i64, consumption: &[consumption_entity::Model]) -> f64 {
    totals_by_product(&[], consumption, &[])
        .get(&product_id)
        .map_or(0.0, ProductTotals::run_rate)
}

/// Derived figures for one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductMetrics {
    /// Product id
    pub product_id: i64,
    /// Product name
    pub name: String,
    /// Product category
    pub category: Category,
    /// Optional flavor or detail text
    pub detail: Option<String>,
    /// Units bought
    pub total_purchased: f64,
    /// Units consumed
    pub total_consumed: f64,
    /// Units given away
    pub total_given_away: f64,
    /// Units on hand
    pub stock: f64,
    /// Money spent on this product
    pub total_cost: f64,
    /// Weighted average unit cost
    pub average_unit_cost: f64,
    /// `stock * average_unit_cost`
    pub inventory_value: f64,
    /// `total_consumed * average_unit_cost`
    pub consumed_value: f64,
    /// Units consumed per day
    pub run_rate: f64,
    /// `stock / run_rate`, only when something has been consumed
    pub days_remaining: Option<f64>,
}

impl ProductMetrics {
    /// Copy with every figure rounded to two decimals.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            total_purchased: round2(self.total_purchased),
            total_consumed: round2(self.total_consumed),
            total_given_away: round2(self.total_given_away),
            stock: round2(self.stock),
            total_cost: round2(self.total_cost),
            average_unit_cost: round2(self.average_unit_cost),
            inventory_value: round2(self.inventory_value),
            consumed_value: round2(self.consumed_value),
            run_rate: round2(self.run_rate),
            days_remaining: self.days_remaining.map(round2),
            ..self.clone()
        }
    }
}

/// Metrics for every product in the snapshot, in snapshot order.
#[must_use]
pub fn product_metrics(snapshot: &LedgerSnapshot) -> Vec<ProductMetrics> {
    let totals = totals_by_product(&snapshot.purchases, &snapshot.consumption, &snapshot.giveaways);

    snapshot
        .products
        .iter()
        .map(|p| {
            let t = totals.get(&p.id).copied().unwrap_or_default();
            let average_unit_cost = t.average_unit_cost();
            let stock = t.stock();
            let run_rate = t.run_rate();
            ProductMetrics {
                product_id: p.id,
                name: p.name.clone(),
                category: Category::parse_or_other(&p.category),
                detail: p.detail.clone(),
                total_purchased: t.purchased,
                total_consumed: t.consumed,
                total_given_away: t.given_away,
                stock,
                total_cost: t.purchase_cost,
                average_unit_cost,
                inventory_value: stock * average_unit_cost,
                consumed_value: t.consumed * average_unit_cost,
                run_rate,
                days_remaining: (run_rate > 0.0).then(|| stock / run_rate),
            }
        })
        .collect()
}

/// Money spent on purchases in the calendar month of `reference`.
#[must_use]
pub fn monthly_spend(purchases: &[purchase_entity::Model], reference: NaiveDateTime) -> f64 {
    purchases
        .iter()
        .filter(|p| {
            p.purchased_at.year() == reference.year() && p.purchased_at.month() == reference.month()
        })
        .map(|p| p.total_cost)
        .sum()
}

fn zero_filled() -> BTreeMap<Category, f64> {
    Category::ALL.into_iter().map(|c| (c, 0.0)).collect()
}

/// Consumed quantity per category since `since`; every category is present.
#[must_use]
pub fn consumption_by_category(
    snapshot: &LedgerSnapshot,
    since: Option<NaiveDateTime>,
) -> BTreeMap<Category, f64> {
    let categories = snapshot.categories();
    let mut buckets = zero_filled();

    for c in snapshot.consumption.iter().filter(|c| in_window(c.consumed_at, since)) {
        if let Some(category) = categories.get(&c.product_id) {
            *buckets.entry(*category).or_default() += c.quantity;
        }
    }

    buckets
}

/// Budget and consumption figures for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    /// Window the consumption figures cover
    pub window: DateWindow,
    /// Configured monthly budget
    pub monthly_budget: f64,
    /// Spent on purchases this calendar month
    pub monthly_spent: f64,
    /// `monthly_budget - monthly_spent`, may be negative
    pub remaining_budget: f64,
    /// Units consumed in the window
    pub total_consumed: f64,
    /// Units consumed in the window per category
    pub consumption_by_category: BTreeMap<Category, f64>,
}

impl DashboardStats {
    /// Copy with every figure rounded to two decimals.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            window: self.window,
            monthly_budget: round2(self.monthly_budget),
            monthly_spent: round2(self.monthly_spent),
            remaining_budget: round2(self.remaining_budget),
            total_consumed: round2(self.total_consumed),
            consumption_by_category: self
                .consumption_by_category
                .iter()
                .map(|(c, q)| (*c, round2(*q)))
                .collect(),
        }
    }
}

/// Computes the dashboard for `window` as seen at `now`.
#[must_use]
pub fn dashboard_stats(
    snapshot: &LedgerSnapshot,
    monthly_budget: f64,
    window: DateWindow,
    now: NaiveDateTime,
) -> DashboardStats {
    let monthly_spent = monthly_spend(&snapshot.purchases, now);
    let by_category = consumption_by_category(snapshot, window.start(now));

    DashboardStats {
        window,
        monthly_budget,
        monthly_spent,
        remaining_budget: monthly_budget - monthly_spent,
        total_consumed: by_category.values().sum(),
        consumption_by_category: by_category,
    }
}

/// Attributed consumption cost in one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthCost {
    /// Calendar year
    pub year: i32,
    /// Calendar month, 1-12
    pub month: u32,
    /// Attributed cost
    pub cost: f64,
}

impl MonthCost {
    /// `YYYY-MM`
    #[must_use]
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Attributed consumption cost of one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductCost {
    /// Product id
    pub product_id: i64,
    /// Product name
    pub name: String,
    /// Units consumed
    pub quantity: f64,
    /// `quantity * unit_cost`
    pub cost: f64,
    /// Average unit cost over all purchases
    pub unit_cost: f64,
}

/// Cost attribution for the history and analytics views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostAnalytics {
    /// Sum of every purchase
    pub total_spent: f64,
    /// Units consumed
    pub total_consumed: f64,
    /// Consumed units valued at average cost
    pub total_consumed_cost: f64,
    /// `total_consumed_cost / total_consumed`
    pub cost_per_item: f64,
    /// Consumed cost per elapsed day of consumption
    pub cost_per_day: f64,
    /// Consumed cost per category, every category present
    pub cost_by_category: BTreeMap<Category, f64>,
    /// Most recent months, oldest first
    pub cost_by_month: Vec<MonthCost>,
    /// Products with the highest consumed cost
    pub top_products: Vec<ProductCost>,
    /// Given-away units valued at average cost
    pub given_away_cost: f64,
}

impl CostAnalytics {
    /// Copy with every figure rounded to two decimals.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            total_spent: round2(self.total_spent),
            total_consumed: round2(self.total_consumed),
            total_consumed_cost: round2(self.total_consumed_cost),
            cost_per_item: round2(self.cost_per_item),
            cost_per_day: round2(self.cost_per_day),
            cost_by_category: self
                .cost_by_category
                .iter()
                .map(|(c, v)| (*c, round2(*v)))
                .collect(),
            cost_by_month: self
                .cost_by_month
                .iter()
                .map(|m| MonthCost {
                    cost: round2(m.cost),
                    ..*m
                })
                .collect(),
            top_products: self
                .top_products
                .iter()
                .map(|p| ProductCost {
                    quantity: round2(p.quantity),
                    cost: round2(p.cost),
                    unit_cost: round2(p.unit_cost),
                    ..p.clone()
                })
                .collect(),
            given_away_cost: round2(self.given_away_cost),
        }
    }
}

/// Values consumption and giveaways since `since` at each product's average unit cost.
///
/// Average costs always come from the full purchase history, not just the window.
#[must_use]
pub fn cost_analytics(
    snapshot: &LedgerSnapshot,
    since: Option<NaiveDateTime>,
    top_n: usize,
) -> CostAnalytics {
    let totals = totals_by_product(&snapshot.purchases, &[], &[]);
    let unit_cost = |id: i64| totals.get(&id).map_or(0.0, ProductTotals::average_unit_cost);
    let categories = snapshot.categories();

    let mut total_consumed = 0.0;
    let mut total_consumed_cost = 0.0;
    let mut cost_by_category = zero_filled();
    let mut by_month: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    let mut by_product: HashMap<i64, (f64, f64)> = HashMap::new();
    let mut span: Option<(NaiveDateTime, NaiveDateTime)> = None;

    for c in snapshot.consumption.iter().filter(|c| in_window(c.consumed_at, since)) {
        let Some(category) = categories.get(&c.product_id) else {
            continue;
        };
        let cost = c.quantity * unit_cost(c.product_id);

        total_consumed += c.quantity;
        total_consumed_cost += cost;
        *cost_by_category.entry(*category).or_default() += cost;
        *by_month
            .entry((c.consumed_at.year(), c.consumed_at.month()))
            .or_default() += cost;
        let entry = by_product.entry(c.product_id).or_default();
        entry.0 += c.quantity;
        entry.1 += cost;
        span = Some(span.map_or((c.consumed_at, c.consumed_at), |(first, last)| {
            (first.min(c.consumed_at), last.max(c.consumed_at))
        }));
    }

    let given_away_cost = snapshot
        .giveaways
        .iter()
        .filter(|g| in_window(g.given_at, since) && categories.contains_key(&g.product_id))
        .map(|g| g.quantity * unit_cost(g.product_id))
        .sum();

    let mut cost_by_month: Vec<MonthCost> = by_month
        .into_iter()
        .rev()
        .take(MONTH_BUCKETS)
        .map(|((year, month), cost)| MonthCost { year, month, cost })
        .collect();
    cost_by_month.reverse();

    let mut top_products: Vec<ProductCost> = by_product
        .into_iter()
        .filter_map(|(product_id, (quantity, cost))| {
            snapshot.product(product_id).map(|p| ProductCost {
                product_id,
                name: p.name.clone(),
                quantity,
                cost,
                unit_cost: unit_cost(product_id),
            })
        })
        .collect();
    top_products.sort_by(|a, b| b.cost.total_cmp(&a.cost).then_with(|| a.name.cmp(&b.name)));
    top_products.truncate(top_n);

    CostAnalytics {
        total_spent: snapshot.purchases.iter().map(|p| p.total_cost).sum(),
        total_consumed,
        total_consumed_cost,
        cost_per_item: if total_consumed > 0.0 {
            total_consumed_cost / total_consumed
        } else {
            0.0
        },
        cost_per_day: span.map_or(0.0, |(first, last)| {
            total_consumed_cost / elapsed_days(first, last)
        }),
        cost_by_category,
        cost_by_month,
        top_products,
        given_away_cost,
    }
}

/// Units consumed on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DayTotal {
    /// The day
    pub date: NaiveDate,
    /// Units consumed
    pub quantity: f64,
}

/// Units consumed on each day of a calendar month, zero-filled; empty for an invalid month.
#[must_use]
pub fn daily_totals(snapshot: &LedgerSnapshot, year: i32, month: u32) -> Vec<DayTotal> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };

    let mut per_day: HashMap<NaiveDate, f64> = HashMap::new();
    for c in &snapshot.consumption {
        let date = c.consumed_at.date();
        if date.year() == year && date.month() == month {
            *per_day.entry(date).or_default() += c.quantity;
        }
    }

    first
        .iter_days()
        .take_while(|d| d.month() == month)
        .map(|date| DayTotal {
            date,
            quantity: per_day.get(&date).copied().unwrap_or_default(),
        })
        .collect()
}

/// Units consumed in one week.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeekTotal {
    /// The Sunday the week starts on
    pub week_start: NaiveDate,
    /// Units consumed
    pub quantity: f64,
}

/// Units consumed per Sunday-based week, the most recent [`WEEK_BUCKETS`] weeks with any
/// consumption, oldest first.
#[must_use]
pub fn weekly_totals(snapshot: &LedgerSnapshot) -> Vec<WeekTotal> {
    let mut per_week: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for c in &snapshot.consumption {
        let date = c.consumed_at.date();
        let offset = i64::from(date.weekday().num_days_from_sunday());
        let week_start = date
            .checked_sub_signed(TimeDelta::days(offset))
            .unwrap_or(date);
        *per_week.entry(week_start).or_default() += c.quantity;
    }

    let mut weeks: Vec<WeekTotal> = per_week
        .into_iter()
        .rev()
        .take(WEEK_BUCKETS)
        .map(|(week_start, quantity)| WeekTotal {
            week_start,
            quantity,
        })
        .collect();
    weeks.reverse();
    weeks
}
