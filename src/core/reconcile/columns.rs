//! Column alias table for imported sheets.
//!
//! Each logical field lists the headers it may appear under, most preferred first. A sheet's
//! headers are resolved against this table once; rows are then read through the resulting
//! [`ColumnMap`]. Extending the accepted spellings means adding a string here.

use super::workbook::{Cell, Sheet};

/// Sheet names accepted for the product list
pub const INVENTORY_SHEETS: &[&str] = &["Inventory", "Products"];
/// Sheet names accepted for purchases
pub const PURCHASE_SHEETS: &[&str] = &["Purchase Log", "Purchases"];
/// Sheet names accepted for consumption
pub const CONSUMPTION_SHEETS: &[&str] = &["Consumption", "Smoke Log"];
/// Sheet names accepted for settings
pub const DASHBOARD_SHEETS: &[&str] = &["Dashboard", "Settings"];

/// A logical column of an imported sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Product display name
    ProductName,
    /// Product category
    Category,
    /// Flavor or other detail text
    Detail,
    /// Date, or full timestamp
    Date,
    /// Time of day
    Time,
    /// Quantity
    Quantity,
    /// Price per unit
    UnitPrice,
    /// Dashboard row label
    Label,
    /// Dashboard row value
    Value,
}

/// Field aliases for a sheet kind.
pub type ColumnAliases = &'static [(Field, &'static [&'static str])];

/// Columns of the product list
pub const INVENTORY_COLUMNS: ColumnAliases = &[
    (
        Field::ProductName,
        &["Product Name", "Product", "product", "Name", "name"],
    ),
    (Field::Category, &["Type", "type"]),
    (
        Field::Detail,
        &["Flavor/Detail", "Flavor", "flavor", "Flavor Detail"],
    ),
];

/// Columns of the purchase log
pub const PURCHASE_COLUMNS: ColumnAliases = &[
    (Field::ProductName, &["Product Name", "Product", "product"]),
    (Field::Date, &["Purchase Date", "Date", "date"]),
    (Field::Quantity, &["Quantity", "quantity"]),
    (
        Field::UnitPrice,
        &[
            "Price Per Item (SEK)",
            "Price Per Item",
            "pricePerItem",
            "Price per unit",
        ],
    ),
];

/// Columns of the consumption log
pub const CONSUMPTION_COLUMNS: ColumnAliases = &[
    (Field::ProductName, &["Product", "product", "Product Name"]),
    (Field::Date, &["Date", "date"]),
    (Field::Time, &["Time", "time"]),
    (Field::Quantity, &["Quantity", "quantity"]),
];

/// Columns of the dashboard sheet
pub const DASHBOARD_COLUMNS: ColumnAliases = &[
    (Field::Label, &["Smoke Tracker Dashboard", "Label", "label"]),
    (Field::Value, &["__EMPTY", "Value", "value"]),
];

/// Column indices per field for one sheet, in alias preference order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    fields: Vec<(Field, Vec<usize>)>,
}

impl ColumnMap {
    /// Resolves `sheet`'s headers against `aliases`.
    #[must_use]
    pub fn resolve(sheet: &Sheet, aliases: ColumnAliases) -> Self {
        let fields = aliases
            .iter()
            .map(|(field, names)| {
                let indices = names
                    .iter()
                    .filter_map(|name| sheet.headers.iter().position(|h| h.trim() == *name))
                    .collect();
                (*field, indices)
            })
            .collect();
        Self { fields }
    }

    /// The first non-empty cell of `row` among the columns mapped to `field`.
    #[must_use]
    pub fn get<'a>(&self, row: &'a [Cell], field: Field) -> Option<&'a Cell> {
        self.fields
            .iter()
            .filter(|(f, _)| *f == field)
            .flat_map(|(_, indices)| indices.iter())
            .filter_map(|i| row.get(*i))
            .find(|cell| !cell.is_empty())
    }

    /// Trimmed text of [`get`](Self::get).
    #[must_use]
    pub fn text(&self, row: &[Cell], field: Field) -> Option<String> {
        self.get(row, field).and_then(Cell::as_text)
    }
}
