//! Workbook import - Best-effort, re-runnable merge of a workbook into the ledger.
//!
//! The pass is linear and forward-only: resolve every product name the workbook mentions
//! (creating missing ones), insert purchases, insert consumption, then merge settings.
//! Product resolution finishes before the first row insert. A row that cannot be read or
//! stored is logged, counted and skipped; nothing already written is rolled back.
//!
//! Purchases and consumption are deduplicated on (product, calendar day, quantity), so
//! importing the same file twice leaves the ledger unchanged the second time.

use super::{
    columns::{
        CONSUMPTION_COLUMNS, CONSUMPTION_SHEETS, ColumnMap, DASHBOARD_COLUMNS, DASHBOARD_SHEETS,
        Field, INVENTORY_COLUMNS, INVENTORY_SHEETS, PURCHASE_COLUMNS, PURCHASE_SHEETS,
    },
    temporal::decode_timestamp,
    workbook::{Cell, Sheet, Workbook},
};
use crate::{
    core::{
        consumption::{create_consumption, find_duplicate_consumption},
        product::{Category, list_products, resolve_or_create_product},
        purchase::{create_purchase, find_duplicate_purchase},
        settings::{SettingsUpdate, upsert_settings},
    },
    errors::{Error, Result},
};
use chrono::NaiveDateTime;
use sea_orm::ConnectionTrait;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// What an import did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Products that did not exist before
    pub products_created: usize,
    /// Purchase rows written
    pub purchases_imported: usize,
    /// Consumption rows written
    pub consumption_imported: usize,
    /// Rows already present in the ledger
    pub duplicates_skipped: usize,
    /// Rows without a usable product name, or whose product could not be created
    pub unresolved_product: usize,
    /// Rows with a bad timestamp, quantity or price, or that the store rejected
    pub invalid_rows: usize,
    /// Whether the monthly budget was overwritten
    pub budget_updated: bool,
    /// Whether the currency was overwritten
    pub currency_updated: bool,
}

impl ImportReport {
    /// Total rows written.
    #[must_use]
    pub const fn imported(&self) -> usize {
        self.purchases_imported + self.consumption_imported
    }
}

#[derive(Debug)]
struct ProductRow {
    name: String,
    category: Category,
    detail: Option<String>,
}

#[derive(Debug)]
struct PurchaseRow {
    name: String,
    purchased_at: NaiveDateTime,
    quantity: i32,
    unit_price: f64,
}

#[derive(Debug)]
struct ConsumptionRow {
    name: String,
    consumed_at: NaiveDateTime,
    quantity: f64,
}

/// Rows of one sheet, split into usable rows and skip counts.
#[derive(Debug)]
struct Parsed<T> {
    rows: Vec<T>,
    /// Every product name on the sheet, including rows that failed to parse
    mentioned: Vec<String>,
    unresolved: usize,
    invalid: usize,
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            mentioned: Vec::new(),
            unresolved: 0,
            invalid: 0,
        }
    }
}

fn parse_products(sheet: Option<&Sheet>) -> Parsed<ProductRow> {
    let mut parsed = Parsed::default();
    let Some(sheet) = sheet else {
        return parsed;
    };
    let columns = ColumnMap::resolve(sheet, INVENTORY_COLUMNS);

    for row in &sheet.rows {
        let Some(name) = columns.text(row, Field::ProductName) else {
            parsed.unresolved += 1;
            continue;
        };
        parsed.rows.push(ProductRow {
            name,
            category: columns
                .text(row, Field::Category)
                .map_or(Category::Other, |c| Category::parse_or_other(&c)),
            detail: columns.text(row, Field::Detail),
        });
    }
    parsed
}

#[allow(clippy::cast_possible_truncation)]
fn whole_quantity(cell: Option<&Cell>) -> Result<i32> {
    let quantity = cell.and_then(Cell::as_number).unwrap_or(0.0);
    if quantity.fract() != 0.0 || quantity < 1.0 || quantity > f64::from(i32::MAX) {
        return Err(Error::InvalidQuantity { quantity });
    }
    Ok(quantity as i32)
}

fn fractional_quantity(cell: Option<&Cell>) -> Result<f64> {
    let quantity = cell.and_then(Cell::as_number).unwrap_or(0.0);
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(Error::InvalidQuantity { quantity });
    }
    Ok(quantity)
}

fn unit_price(cell: Option<&Cell>) -> Result<f64> {
    let Some(cell) = cell else {
        return Ok(0.0);
    };
    match cell.as_number() {
        Some(price) if price.is_finite() && price >= 0.0 => Ok(price),
        Some(price) => Err(Error::InvalidAmount { amount: price }),
        None => Err(Error::Validation {
            message: format!("Unreadable price '{cell}'"),
        }),
    }
}

fn parse_purchases(sheet: Option<&Sheet>) -> Parsed<PurchaseRow> {
    let mut parsed = Parsed::default();
    let Some(sheet) = sheet else {
        return parsed;
    };
    let columns = ColumnMap::resolve(sheet, PURCHASE_COLUMNS);

    for (i, row) in sheet.rows.iter().enumerate() {
        let Some(name) = columns.text(row, Field::ProductName) else {
            parsed.unresolved += 1;
            continue;
        };
        parsed.mentioned.push(name.clone());
        let decoded = decode_timestamp(columns.get(row, Field::Date), None).and_then(|at| {
            Ok(PurchaseRow {
                purchased_at: at,
                quantity: whole_quantity(columns.get(row, Field::Quantity))?,
                unit_price: unit_price(columns.get(row, Field::UnitPrice))?,
                name: name.clone(),
            })
        });
        match decoded {
            Ok(purchase) => parsed.rows.push(purchase),
            Err(e) => {
                warn!("Skipping purchase row {} for '{name}': {e}", i + 2);
                parsed.invalid += 1;
            }
        }
    }
    parsed
}

fn parse_consumption(sheet: Option<&Sheet>) -> Parsed<ConsumptionRow> {
    let mut parsed = Parsed::default();
    let Some(sheet) = sheet else {
        return parsed;
    };
    let columns = ColumnMap::resolve(sheet, CONSUMPTION_COLUMNS);

    for (i, row) in sheet.rows.iter().enumerate() {
        let Some(name) = columns.text(row, Field::ProductName) else {
            parsed.unresolved += 1;
            continue;
        };
        parsed.mentioned.push(name.clone());
        let decoded = decode_timestamp(columns.get(row, Field::Date), columns.get(row, Field::Time))
            .and_then(|at| {
                Ok(ConsumptionRow {
                    consumed_at: at,
                    quantity: fractional_quantity(columns.get(row, Field::Quantity))?,
                    name: name.clone(),
                })
            });
        match decoded {
            Ok(entry) => parsed.rows.push(entry),
            Err(e) => {
                warn!("Skipping consumption row {} for '{name}': {e}", i + 2);
                parsed.invalid += 1;
            }
        }
    }
    parsed
}

/// Settings found on the dashboard sheet.
#[derive(Debug, Default, PartialEq)]
struct DashboardValues {
    monthly_budget: Option<f64>,
    currency: Option<String>,
}

fn parse_dashboard(sheet: Option<&Sheet>) -> DashboardValues {
    let mut values = DashboardValues::default();
    let Some(sheet) = sheet else {
        return values;
    };
    let columns = ColumnMap::resolve(sheet, DASHBOARD_COLUMNS);

    for row in &sheet.rows {
        let Some(label) = columns.text(row, Field::Label).map(|l| l.to_lowercase()) else {
            continue;
        };
        if values.monthly_budget.is_none() && label.contains("budget") {
            values.monthly_budget = columns.get(row, Field::Value).and_then(Cell::as_number);
        } else if values.currency.is_none() && label.contains("currency") {
            values.currency = columns.text(row, Field::Value);
        }
    }
    values
}

/// Resolves every product name the workbook mentions, creating the missing ones.
///
/// Names listed on the inventory sheet keep their category and detail; names that only
/// appear on a log sheet are created as `Other`.
async fn resolve_products<'a, C>(
    db: &C,
    user_id: &str,
    inventory: &'a [ProductRow],
    mentioned: impl Iterator<Item = &'a str>,
    report: &mut ImportReport,
) -> Result<HashMap<String, i64>>
where
    C: ConnectionTrait,
{
    let mut ids: HashMap<String, i64> = list_products(db, user_id)
        .await?
        .into_iter()
        .map(|p| (p.name, p.id))
        .collect();

    let wanted = inventory
        .iter()
        .map(|p| (p.name.as_str(), p.category, p.detail.clone()))
        .chain(mentioned.map(|name| (name, Category::Other, None)));

    for (name, category, detail) in wanted {
        if ids.contains_key(name) {
            continue;
        }
        match resolve_or_create_product(db, user_id, name, category, detail).await {
            Ok(id) => {
                ids.insert(name.to_string(), id);
                report.products_created += 1;
            }
            Err(e) => warn!("Could not create product '{name}': {e}"),
        }
    }

    Ok(ids)
}

async fn insert_purchases<C>(
    db: &C,
    user_id: &str,
    rows: Vec<PurchaseRow>,
    ids: &HashMap<String, i64>,
    report: &mut ImportReport,
) where
    C: ConnectionTrait,
{
    for row in rows {
        let Some(&product_id) = ids.get(&row.name) else {
            report.unresolved_product += 1;
            continue;
        };

        match find_duplicate_purchase(db, user_id, product_id, row.purchased_at.date(), row.quantity)
            .await
        {
            Ok(Some(_)) => {
                report.duplicates_skipped += 1;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Duplicate check failed for purchase of '{}': {e}", row.name);
                report.invalid_rows += 1;
                continue;
            }
        }

        match create_purchase(
            db,
            user_id,
            product_id,
            row.purchased_at,
            row.quantity,
            row.unit_price,
        )
        .await
        {
            Ok(_) => report.purchases_imported += 1,
            Err(e) => {
                warn!("Failed to import purchase of '{}': {e}", row.name);
                report.invalid_rows += 1;
            }
        }
    }
}

async fn insert_consumption<C>(
    db: &C,
    user_id: &str,
    rows: Vec<ConsumptionRow>,
    ids: &HashMap<String, i64>,
    report: &mut ImportReport,
) where
    C: ConnectionTrait,
{
    for row in rows {
        let Some(&product_id) = ids.get(&row.name) else {
            report.unresolved_product += 1;
            continue;
        };

        match find_duplicate_consumption(db, user_id, product_id, row.consumed_at.date(), row.quantity)
            .await
        {
            Ok(Some(_)) => {
                report.duplicates_skipped += 1;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Duplicate check failed for consumption of '{}': {e}", row.name);
                report.invalid_rows += 1;
                continue;
            }
        }

        match create_consumption(db, user_id, product_id, row.consumed_at, row.quantity).await {
            Ok(_) => report.consumption_imported += 1,
            Err(e) => {
                warn!("Failed to import consumption of '{}': {e}", row.name);
                report.invalid_rows += 1;
            }
        }
    }
}

async fn merge_settings<C>(
    db: &C,
    user_id: &str,
    values: DashboardValues,
    report: &mut ImportReport,
) where
    C: ConnectionTrait,
{
    let update = SettingsUpdate {
        monthly_budget: values.monthly_budget,
        currency: values.currency,
    };
    if update == SettingsUpdate::default() {
        return;
    }

    let budget = update.monthly_budget.is_some();
    let currency = update.currency.is_some();
    match upsert_settings(db, user_id, update).await {
        Ok(_) => {
            report.budget_updated = budget;
            report.currency_updated = currency;
        }
        Err(e) => warn!("Ignoring dashboard settings: {e}"),
    }
}

/// Imports a workbook into a user's ledger.
///
/// # Errors
/// Only a failure to read the user's existing products aborts the import; every row-level
/// failure is counted in the report instead.
#[instrument(skip(db, workbook))]
pub async fn import_workbook<C>(db: &C, user_id: &str, workbook: &Workbook) -> Result<ImportReport>
where
    C: ConnectionTrait,
{
    let products = parse_products(workbook.sheet(INVENTORY_SHEETS));
    let purchases = parse_purchases(workbook.sheet(PURCHASE_SHEETS));
    let consumption = parse_consumption(workbook.sheet(CONSUMPTION_SHEETS));
    let dashboard = parse_dashboard(workbook.sheet(DASHBOARD_SHEETS));
    info!(
        "Importing {} products, {} purchases, {} consumption entries",
        products.rows.len(),
        purchases.rows.len(),
        consumption.rows.len()
    );

    let mut report = ImportReport {
        unresolved_product: products.unresolved + purchases.unresolved + consumption.unresolved,
        invalid_rows: purchases.invalid + consumption.invalid,
        ..ImportReport::default()
    };

    let mentioned = purchases
        .mentioned
        .iter()
        .chain(&consumption.mentioned)
        .map(String::as_str);
    let ids = resolve_products(db, user_id, &products.rows, mentioned, &mut report).await?;

    insert_purchases(db, user_id, purchases.rows, &ids, &mut report).await;
    insert_consumption(db, user_id, consumption.rows, &ids, &mut report).await;
    merge_settings(db, user_id, dashboard, &mut report).await;

    info!(
        "Import finished: {} products created, {} rows imported, {} duplicates, {} unresolved, {} invalid",
        report.products_created,
        report.imported(),
        report.duplicates_skipped,
        report.unresolved_product,
        report.invalid_rows
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        core::{consumption::list_consumption, purchase::list_purchases, settings::get_settings_or_default},
        test_utils::*,
    };
    use serde_json::json;

    fn widget_workbook() -> Workbook {
        Workbook::from_json_value(json!({
            "Inventory": [
                { "Product Name": "Widget", "Type": "Cigarillo", "Flavor/Detail": "Cherry" },
                { "Product Name": "", "Type": "Cigar" }
            ],
            "Purchase Log": [
                { "Product": "Widget", "Purchase Date": "2023-03-01", "Quantity": 10, "Price Per Item (SEK)": 5 },
                { "Product": "Gadget", "Date": 45001, "Quantity": 2.5, "Price Per Item": 3 }
            ],
            "Smoke Log": [
                { "Product": "Widget", "Date": 45000, "Time": 0.5, "Quantity": 2 },
                { "Product": "Widget", "Date": "2023-03-16", "Time": "None", "Quantity": 0.5 },
                { "Product": "Sprocket", "Date": "someday", "Quantity": 1 },
                { "Date": 45002, "Quantity": 1 }
            ],
            "Dashboard": [
                { "Smoke Tracker Dashboard": "Monthly Budget (SEK)", "__EMPTY": 750 }
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_import_widget_workbook() -> Result<()> {
        let db = setup_test_db().await?;

        let report = import_workbook(&db, TEST_USER, &widget_workbook()).await?;
        // Widget from the inventory, Gadget and Sprocket only from rows that fail to parse
        assert_eq!(report.products_created, 3);
        assert_eq!(report.purchases_imported, 1);
        assert_eq!(report.consumption_imported, 2);
        assert_eq!(report.duplicates_skipped, 0);
        // Nameless inventory row and nameless consumption row
        assert_eq!(report.unresolved_product, 2);
        // Fractional purchase quantity and unreadable date
        assert_eq!(report.invalid_rows, 2);
        assert!(report.budget_updated);
        assert!(!report.currency_updated);

        let products = list_products(&db, TEST_USER).await?;
        let names: Vec<_> = products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Gadget", "Sprocket", "Widget"]);
        let widget = products.iter().find(|p| p.name == "Widget").unwrap();
        assert_eq!(widget.category, "Cigarillo");
        assert_eq!(widget.detail.as_deref(), Some("Cherry"));
        let gadget = products.iter().find(|p| p.name == "Gadget").unwrap();
        assert_eq!(gadget.category, "Other");

        let entries = list_consumption(&db, TEST_USER, None).await?;
        let midday = entries.iter().find(|c| c.quantity == 2.0).unwrap();
        assert_eq!(midday.consumed_at, ts(2023, 3, 15, 12, 0));
        let midnight = entries.iter().find(|c| c.quantity == 0.5).unwrap();
        assert_eq!(midnight.consumed_at, ts(2023, 3, 16, 0, 0));

        let purchases = list_purchases(&db, TEST_USER).await?;
        assert_eq!(purchases[0].total_cost, 50.0);

        let settings = get_settings_or_default(&db, TEST_USER).await?;
        assert_eq!(settings.monthly_budget, 750.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_import_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let workbook = widget_workbook();

        import_workbook(&db, TEST_USER, &workbook).await?;
        let second = import_workbook(&db, TEST_USER, &workbook).await?;

        assert_eq!(second.products_created, 0);
        assert_eq!(second.imported(), 0);
        assert_eq!(second.duplicates_skipped, 3);
        assert_eq!(list_purchases(&db, TEST_USER).await?.len(), 1);
        assert_eq!(list_consumption(&db, TEST_USER, None).await?.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_log_only_products_are_created_as_other() -> Result<()> {
        let db = setup_test_db().await?;
        let workbook = Workbook::from_json_value(json!({
            "Consumption": [
                { "product": "Loose Snus", "date": "2024-01-05", "time": "07:15", "quantity": 1 }
            ]
        }))?;

        let report = import_workbook(&db, TEST_USER, &workbook).await?;
        assert_eq!(report.products_created, 1);
        assert_eq!(report.consumption_imported, 1);
        assert!(!report.budget_updated);

        let products = list_products(&db, TEST_USER).await?;
        assert_eq!(products[0].name, "Loose Snus");
        assert_eq!(products[0].category, "Other");

        let entries = list_consumption(&db, TEST_USER, None).await?;
        assert_eq!(entries[0].consumed_at, ts(2024, 1, 5, 7, 15));
        Ok(())
    }

    #[tokio::test]
    async fn test_existing_products_are_reused() -> Result<()> {
        let (db, product) = setup_with_product().await?;
        let workbook = Workbook::from_json_value(json!({
            "Purchases": [
                { "Product Name": product.name, "Date": "2024-02-01", "Quantity": "4", "Price per unit": "12.5" }
            ]
        }))?;

        let report = import_workbook(&db, TEST_USER, &workbook).await?;
        assert_eq!(report.products_created, 0);
        assert_eq!(report.purchases_imported, 1);

        let purchases = list_purchases(&db, TEST_USER).await?;
        assert_eq!(purchases[0].product_id, product.id);
        assert_eq!(purchases[0].total_cost, 50.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_store_failures_are_counted_and_import_continues() -> Result<()> {
        let db = setup_test_db().await?;
        db.execute_unprepared(
            "CREATE TRIGGER reject_recalled_product BEFORE INSERT ON products \
             WHEN NEW.name = 'Recalled' BEGIN SELECT RAISE(ABORT, 'recalled'); END",
        )
        .await?;
        db.execute_unprepared(
            "CREATE TRIGGER reject_oversized_entry BEFORE INSERT ON consumption \
             WHEN NEW.quantity > 50 BEGIN SELECT RAISE(ABORT, 'too large'); END",
        )
        .await?;
        let workbook = Workbook::from_json_value(json!({
            "Inventory": [
                { "Product": "Recalled", "Type": "Cigar" },
                { "Product": "Widget", "Type": "Cigar" }
            ],
            "Purchase Log": [
                { "Product": "Recalled", "Date": "2024-03-01", "Quantity": 5, "Price Per Item": 10 },
                { "Product": "Widget", "Date": "2024-03-01", "Quantity": 4, "Price Per Item": 10 }
            ],
            "Consumption": [
                { "Product": "Widget", "Date": "2024-03-02", "Quantity": 99 },
                { "Product": "Recalled", "Date": "2024-03-02", "Quantity": 1 },
                { "Product": "Widget", "Date": "2024-03-03", "Quantity": 1 }
            ]
        }))?;

        let report = import_workbook(&db, TEST_USER, &workbook).await?;
        assert_eq!(report.products_created, 1);
        assert_eq!(report.purchases_imported, 1);
        assert_eq!(report.consumption_imported, 1);
        // Both rows naming the product whose creation failed
        assert_eq!(report.unresolved_product, 2);
        // The consumption insert the store rejected
        assert_eq!(report.invalid_rows, 1);

        let products = list_products(&db, TEST_USER).await?;
        assert_eq!(products.len(), 1);
        assert_eq!(list_purchases(&db, TEST_USER).await?.len(), 1);
        let entries = list_consumption(&db, TEST_USER, None).await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].consumed_at, ts(2024, 3, 3, 0, 0));
        assert_eq!(entries[0].quantity, 1.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_budget_leaves_settings_untouched() -> Result<()> {
        let db = setup_test_db().await?;
        let workbook = Workbook::from_json_value(json!({
            "Settings": [
                { "Label": "Budget", "Value": -10 },
                { "Label": "Currency", "Value": "EUR" }
            ]
        }))?;

        let report = import_workbook(&db, TEST_USER, &workbook).await?;
        assert!(!report.budget_updated);

        let settings = get_settings_or_default(&db, TEST_USER).await?;
        assert_eq!(settings.monthly_budget, 500.0);
        assert_eq!(settings.currency, "SEK");
        Ok(())
    }

    #[test]
    fn test_quantity_parsing() {
        assert_eq!(whole_quantity(Some(&Cell::Number(3.0))).unwrap(), 3);
        assert!(whole_quantity(Some(&Cell::Number(2.5))).is_err());
        assert!(whole_quantity(Some(&Cell::Number(0.0))).is_err());
        assert!(whole_quantity(None).is_err());
        assert_eq!(fractional_quantity(Some(&Cell::text("0.5"))).unwrap(), 0.5);
        assert!(fractional_quantity(Some(&Cell::text("-1"))).is_err());
        assert_eq!(unit_price(None).unwrap(), 0.0);
        assert!(unit_price(Some(&Cell::text("cheap"))).is_err());
    }
}
