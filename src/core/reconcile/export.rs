//! Workbook export - A straight projection of the ledger into four sheets.
//!
//! The headers written here are all accepted by the import column table, and timestamps
//! carry their full time, so exporting and re-importing reproduces the ledger.

use super::workbook::{Cell, Sheet, Workbook};
use crate::{
    core::{
        consumption::list_consumption,
        product::list_products,
        purchase::{PurchaseWithProduct, list_purchases_with_product_names},
        settings::{Settings, get_settings_or_default},
    },
    entities::{consumption, product},
    errors::Result,
};
use sea_orm::ConnectionTrait;
use std::collections::HashMap;
use tracing::{info, instrument};

// `%.f` writes nothing for whole seconds
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

fn inventory_sheet(products: &[product::Model]) -> Sheet {
    let mut sheet = Sheet::new("Inventory", &["Product", "Type", "Flavor"]);
    for p in products {
        sheet.push_row(vec![
            Cell::text(p.name.as_str()),
            Cell::text(p.category.as_str()),
            p.detail.as_deref().map_or(Cell::Empty, Cell::text),
        ]);
    }
    sheet
}

fn purchase_sheet(purchases: &[PurchaseWithProduct]) -> Sheet {
    let mut sheet = Sheet::new(
        "Purchase Log",
        &["Date", "Product", "Quantity", "Price Per Item", "Total Cost"],
    );
    for row in purchases.iter().rev() {
        let p = &row.purchase;
        sheet.push_row(vec![
            Cell::text(p.purchased_at.format(DATETIME_FORMAT).to_string()),
            Cell::text(row.product_name.as_str()),
            Cell::Number(f64::from(p.quantity)),
            Cell::Number(p.unit_price),
            Cell::Number(p.total_cost),
        ]);
    }
    sheet
}

fn consumption_sheet(entries: &[consumption::Model], names: &HashMap<i64, &str>) -> Sheet {
    let mut sheet = Sheet::new("Consumption", &["Date", "Time", "Product", "Quantity"]);
    for c in entries.iter().rev() {
        let Some(name) = names.get(&c.product_id) else {
            continue;
        };
        sheet.push_row(vec![
            Cell::text(c.consumed_at.format(DATE_FORMAT).to_string()),
            Cell::text(c.consumed_at.format(TIME_FORMAT).to_string()),
            Cell::text(*name),
            Cell::Number(c.quantity),
        ]);
    }
    sheet
}

fn dashboard_sheet(settings: &Settings) -> Sheet {
    let mut sheet = Sheet::new("Dashboard", &["Label", "Value"]);
    sheet.push_row(vec![
        Cell::text(format!("Monthly Budget ({})", settings.currency)),
        Cell::Number(settings.monthly_budget),
    ]);
    sheet.push_row(vec![
        Cell::text("Currency"),
        Cell::text(settings.currency.as_str()),
    ]);
    sheet
}

/// Lays the ledger out as a workbook. Log rows are written oldest first.
#[must_use]
pub fn build_workbook(
    products: &[product::Model],
    purchases: &[PurchaseWithProduct],
    entries: &[consumption::Model],
    settings: &Settings,
) -> Workbook {
    let names: HashMap<i64, &str> = products.iter().map(|p| (p.id, p.name.as_str())).collect();

    Workbook {
        sheets: vec![
            inventory_sheet(products),
            purchase_sheet(purchases),
            consumption_sheet(entries, &names),
            dashboard_sheet(settings),
        ],
    }
}

/// Exports a user's products, purchases, consumption and settings.
#[instrument(skip(db))]
pub async fn export_workbook<C>(db: &C, user_id: &str) -> Result<Workbook>
where
    C: ConnectionTrait,
{
    let products = list_products(db, user_id).await?;
    let purchases = list_purchases_with_product_names(db, user_id).await?;
    let entries = list_consumption(db, user_id, None).await?;
    let settings = get_settings_or_default(db, user_id).await?;

    info!(
        "Exporting {} products, {} purchases, {} consumption entries",
        products.len(),
        purchases.len(),
        entries.len()
    );
    Ok(build_workbook(&products, &purchases, &entries, &settings))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        core::{
            product::{Category, create_product},
            purchase::list_purchases,
            reconcile::import::import_workbook,
            settings::{SettingsUpdate, upsert_settings},
        },
        test_utils::*,
    };

    #[tokio::test]
    async fn test_export_layout() -> Result<()> {
        let (db, product) = setup_with_product().await?;
        create_test_purchase(&db, product.id, 10, 5.0, ts(2024, 1, 1, 9, 30)).await?;
        create_test_consumption(&db, product.id, 0.5, ts(2024, 1, 2, 21, 15)).await?;

        let workbook = export_workbook(&db, TEST_USER).await?;
        let names: Vec<_> = workbook.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Inventory", "Purchase Log", "Consumption", "Dashboard"]);

        let purchases = workbook.sheet(&["Purchase Log"]).unwrap();
        assert_eq!(purchases.rows[0][0], Cell::text("2024-01-01 09:30:00"));
        assert_eq!(purchases.rows[0][1], Cell::text(product.name.as_str()));
        assert_eq!(purchases.rows[0][4], Cell::Number(50.0));

        let consumption = workbook.sheet(&["Consumption"]).unwrap();
        assert_eq!(consumption.rows[0][0], Cell::text("2024-01-02"));
        assert_eq!(consumption.rows[0][1], Cell::text("21:15:00"));

        let dashboard = workbook.sheet(&["Dashboard"]).unwrap();
        assert_eq!(dashboard.rows[0][0], Cell::text("Monthly Budget (SEK)"));
        assert_eq!(dashboard.rows[0][1], Cell::Number(500.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_export_keeps_subsecond_timestamps() -> Result<()> {
        let (db, product) = setup_with_product().await?;
        let bought = ts(2024, 5, 1, 9, 30) + chrono::TimeDelta::milliseconds(500);
        let smoked = ts(2024, 5, 2, 21, 15) + chrono::TimeDelta::milliseconds(250);
        create_test_purchase(&db, product.id, 3, 20.0, bought).await?;
        create_test_consumption(&db, product.id, 1.0, smoked).await?;

        let workbook = export_workbook(&db, TEST_USER).await?;
        let purchases = workbook.sheet(&["Purchase Log"]).unwrap();
        assert_eq!(purchases.rows[0][0], Cell::text("2024-05-01 09:30:00.500"));
        let consumption = workbook.sheet(&["Consumption"]).unwrap();
        assert_eq!(consumption.rows[0][1], Cell::text("21:15:00.250"));

        import_workbook(&db, OTHER_USER, &workbook).await?;
        let copy = crate::core::ledger::load_snapshot(&db, OTHER_USER).await?;
        assert_eq!(copy.purchases[0].purchased_at, bought);
        assert_eq!(copy.consumption[0].consumed_at, smoked);
        Ok(())
    }

    #[tokio::test]
    async fn test_export_then_import_roundtrip() -> Result<()> {
        let db = setup_test_db().await?;
        let cigar = create_product(
            &db,
            TEST_USER,
            "Montecristo No. 4",
            Category::Cigar,
            Some("Cedar".to_string()),
        )
        .await?;
        let snus = create_product(&db, TEST_USER, "Ettan", Category::Snus, None).await?;
        create_test_purchase(&db, cigar.id, 5, 89.0, ts(2024, 4, 1, 18, 0)).await?;
        create_test_purchase(&db, snus.id, 10, 52.5, ts(2024, 4, 2, 10, 0)).await?;
        create_test_consumption(&db, cigar.id, 1.0, ts(2024, 4, 3, 20, 30)).await?;
        create_test_consumption(&db, snus.id, 0.5, ts(2024, 4, 3, 7, 45)).await?;
        upsert_settings(
            &db,
            TEST_USER,
            SettingsUpdate {
                monthly_budget: Some(900.0),
                currency: Some("EUR".to_string()),
            },
        )
        .await?;

        // Through the file form, as a user moving installations would
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("ledger.json");
        export_workbook(&db, TEST_USER).await?.write(&path)?;
        let workbook = Workbook::read(&path)?;

        let report = import_workbook(&db, OTHER_USER, &workbook).await?;
        assert_eq!(report.products_created, 2);
        assert_eq!(report.imported(), 4);
        assert_eq!(report.invalid_rows, 0);
        assert!(report.budget_updated);
        assert!(report.currency_updated);

        let source = crate::core::ledger::load_snapshot(&db, TEST_USER).await?;
        let copy = crate::core::ledger::load_snapshot(&db, OTHER_USER).await?;

        let summarize_products = |s: &crate::core::ledger::LedgerSnapshot| {
            s.products
                .iter()
                .map(|p| (p.name.clone(), p.category.clone(), p.detail.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(summarize_products(&source), summarize_products(&copy));

        let name_of = |s: &crate::core::ledger::LedgerSnapshot, id: i64| {
            s.product(id).map(|p| p.name.clone()).unwrap()
        };
        let mut source_purchases: Vec<_> = source
            .purchases
            .iter()
            .map(|p| (name_of(&source, p.product_id), p.purchased_at, p.quantity, p.total_cost))
            .collect();
        let mut copy_purchases: Vec<_> = copy
            .purchases
            .iter()
            .map(|p| (name_of(&copy, p.product_id), p.purchased_at, p.quantity, p.total_cost))
            .collect();
        source_purchases.sort_by(|a, b| a.0.cmp(&b.0));
        copy_purchases.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(source_purchases, copy_purchases);

        let mut source_entries: Vec<_> = source
            .consumption
            .iter()
            .map(|c| (name_of(&source, c.product_id), c.consumed_at, c.quantity))
            .collect();
        let mut copy_entries: Vec<_> = copy
            .consumption
            .iter()
            .map(|c| (name_of(&copy, c.product_id), c.consumed_at, c.quantity))
            .collect();
        source_entries.sort_by(|a, b| a.0.cmp(&b.0));
        copy_entries.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(source_entries, copy_entries);

        let settings = get_settings_or_default(&db, OTHER_USER).await?;
        assert_eq!(settings.monthly_budget, 900.0);
        assert_eq!(settings.currency, "EUR");

        // Importing the export back into its own ledger changes nothing
        let again = import_workbook(&db, TEST_USER, &workbook).await?;
        assert_eq!(again.imported(), 0);
        assert_eq!(again.duplicates_skipped, 4);
        assert_eq!(list_purchases(&db, TEST_USER).await?.len(), 2);
        Ok(())
    }
}
