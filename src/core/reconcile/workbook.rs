//! Tabular workbook model and its two on-disk forms.
//!
//! A workbook is a set of named sheets, each a header row plus rows of loosely typed cells,
//! the shape a spreadsheet export has once read. On disk it is either one JSON document
//! (`{ "<sheet>": [ { "<header>": <cell> } ] }`) or a directory with one `<sheet>.csv` per
//! sheet.

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::BTreeMap,
    fmt,
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::Path,
};
use tracing::debug;

/// One spreadsheet cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Blank
    #[default]
    Empty,
    /// Boolean
    Bool(bool),
    /// Any number, including date serials and fractional-day times
    Number(f64),
    /// Free text
    Text(String),
}

impl Cell {
    /// Text cell, or `Empty` for blank input.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Self::Empty
        } else {
            Self::Text(value)
        }
    }

    /// True for blank cells and whitespace-only text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Bool(_) | Self::Number(_) => false,
        }
    }

    /// Trimmed text form of a non-empty cell.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(self.to_string().trim().to_string())
    }

    /// Numeric value of a number cell or of text that parses as one.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Empty | Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for Cell {
    #[allow(clippy::cast_possible_truncation)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => n.as_f64().map_or(Self::Empty, Self::Number),
            Value::String(s) => Self::text(s),
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<&Cell> for Value {
    fn from(cell: &Cell) -> Self {
        match cell {
            Cell::Empty => Self::Null,
            Cell::Bool(b) => Self::Bool(*b),
            Cell::Number(n) => serde_json::Number::from_f64(*n).map_or(Self::Null, Self::Number),
            Cell::Text(s) => Self::String(s.clone()),
        }
    }
}

/// A named sheet: header row plus data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    /// Sheet name
    pub name: String,
    /// Column headers
    pub headers: Vec<String>,
    /// Data rows, each as long as `headers` or shorter
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    /// Creates an empty sheet with the given headers.
    #[must_use]
    pub fn new(name: &str, headers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            headers: headers.iter().map(ToString::to_string).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a data row.
    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    fn from_records(name: &str, records: Vec<Map<String, Value>>) -> Self {
        let mut headers: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }

        let rows = records
            .into_iter()
            .map(|mut record| {
                headers
                    .iter()
                    .map(|h| record.remove(h).map(Cell::from).unwrap_or_default())
                    .collect()
            })
            .collect();

        Self {
            name: name.to_string(),
            headers,
            rows,
        }
    }

    fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let record: Map<String, Value> = self
                    .headers
                    .iter()
                    .zip(row.iter().chain(std::iter::repeat(&Cell::Empty)))
                    .filter(|(_, cell)| !cell.is_empty())
                    .map(|(h, cell)| (h.clone(), Value::from(cell)))
                    .collect();
                Value::Object(record)
            })
            .collect()
    }
}

/// An ordered collection of sheets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    /// The sheets, in file order
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    /// Adds a sheet at the end.
    pub fn push(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    /// Finds the first sheet matching one of `names`, trying them in order.
    ///
    /// Exact names win; a case-insensitive match is the fallback.
    #[must_use]
    pub fn sheet(&self, names: &[&str]) -> Option<&Sheet> {
        names
            .iter()
            .find_map(|n| self.sheets.iter().find(|s| s.name == *n))
            .or_else(|| {
                names.iter().find_map(|n| {
                    self.sheets
                        .iter()
                        .find(|s| s.name.trim().eq_ignore_ascii_case(n))
                })
            })
    }

    /// Parses the JSON form.
    pub fn from_json_value(value: Value) -> Result<Self> {
        let sheets: BTreeMap<String, Vec<Map<String, Value>>> = serde_json::from_value(value)?;
        Ok(Self {
            sheets: sheets
                .into_iter()
                .map(|(name, records)| Sheet::from_records(&name, records))
                .collect(),
        })
    }

    /// Renders the JSON form.
    #[must_use]
    pub fn to_json_value(&self) -> Value {
        Value::Object(
            self.sheets
                .iter()
                .map(|s| (s.name.clone(), Value::Array(s.to_records())))
                .collect(),
        )
    }

    /// Reads a workbook: a directory is read as CSV sheets, a file as JSON.
    pub fn read(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Self::read_csv_dir(path);
        }
        let reader = BufReader::new(File::open(path)?);
        let value: Value = serde_json::from_reader(reader)?;
        let workbook = Self::from_json_value(value)?;
        debug!("Read {} sheets from {}", workbook.sheets.len(), path.display());
        Ok(workbook)
    }

    /// Writes a workbook: a `.json` path gets the JSON form, anything else becomes a
    /// directory of CSV sheets.
    pub fn write(&self, path: &Path) -> Result<()> {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if !is_json {
            return self.write_csv_dir(path);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.to_json_value())?;
        Ok(())
    }

    /// Reads every `*.csv` file in `dir` as a sheet named after the file stem.
    pub fn read_csv_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
            })
            .collect();
        paths.sort();

        let mut workbook = Self::default();
        for path in paths {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut reader = csv::ReaderBuilder::new()
                .flexible(true)
                .from_path(&path)?;

            let headers = reader
                .headers()?
                .iter()
                .map(|h| h.trim().to_string())
                .collect();
            let mut sheet = Sheet {
                name,
                headers,
                rows: Vec::new(),
            };
            for record in reader.records() {
                sheet.push_row(record?.iter().map(Cell::text).collect());
            }
            workbook.push(sheet);
        }

        debug!("Read {} CSV sheets from {}", workbook.sheets.len(), dir.display());
        Ok(workbook)
    }

    /// Writes each sheet to `dir/<sheet>.csv`, creating `dir` if needed.
    pub fn write_csv_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        for sheet in &self.sheets {
            let mut writer = csv::Writer::from_path(dir.join(format!("{}.csv", sheet.name)))?;
            writer.write_record(&sheet.headers)?;
            for row in &sheet.rows {
                let mut record: Vec<String> = row.iter().map(ToString::to_string).collect();
                record.resize(sheet.headers.len(), String::new());
                writer.write_record(&record)?;
            }
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_conversions() {
        assert_eq!(Cell::from(json!(45000)), Cell::Number(45000.0));
        assert_eq!(Cell::from(json!("  ")), Cell::Empty);
        assert_eq!(Cell::from(json!(null)), Cell::Empty);
        assert_eq!(Cell::Number(3.0).to_string(), "3");
        assert_eq!(Cell::Number(0.5).to_string(), "0.5");
        assert_eq!(Cell::text(" 2.5 ").as_number(), Some(2.5));
        assert_eq!(Cell::text(" Widget ").as_text().as_deref(), Some("Widget"));
        assert_eq!(Cell::Bool(true).as_number(), None);
    }

    #[test]
    fn test_json_records_align_to_headers() {
        let value = json!({
            "Inventory": [
                { "Product": "Widget", "Type": "Cigar" },
                { "Product": "Gadget", "Flavor": "Mint" }
            ]
        });

        let workbook = Workbook::from_json_value(value).unwrap();
        let sheet = workbook.sheet(&["inventory"]).unwrap();
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.headers.len(), 3);

        let flavor = sheet.headers.iter().position(|h| h == "Flavor").unwrap();
        assert_eq!(sheet.rows[0][flavor], Cell::Empty);
        assert_eq!(sheet.rows[1][flavor], Cell::Text("Mint".to_string()));
    }

    #[test]
    fn test_sheet_lookup_prefers_exact_alias_order() {
        let mut workbook = Workbook::default();
        workbook.push(Sheet::new("Smoke Log", &["Date"]));
        workbook.push(Sheet::new("Consumption", &["Date"]));

        assert_eq!(
            workbook.sheet(&["Consumption", "Smoke Log"]).unwrap().name,
            "Consumption"
        );
        assert!(workbook.sheet(&["Dashboard"]).is_none());
    }

    #[test]
    fn test_csv_dir_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut sheet = Sheet::new("Purchase Log", &["Product", "Quantity", "Price Per Item"]);
        sheet.push_row(vec![
            Cell::text("Widget"),
            Cell::Number(10.0),
            Cell::Number(4.5),
        ]);
        sheet.push_row(vec![Cell::text("Gadget")]);
        let mut workbook = Workbook::default();
        workbook.push(sheet);

        workbook.write(dir.path())?;
        let read = Workbook::read(dir.path())?;

        let sheet = read.sheet(&["Purchase Log"]).unwrap();
        assert_eq!(sheet.headers, ["Product", "Quantity", "Price Per Item"]);
        assert_eq!(sheet.rows[0][1].as_number(), Some(10.0));
        assert_eq!(sheet.rows[0][2].as_number(), Some(4.5));
        assert!(sheet.rows[1][2].is_empty());
        Ok(())
    }

    #[test]
    fn test_json_file_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("export.json");
        let mut sheet = Sheet::new("Dashboard", &["Label", "Value"]);
        sheet.push_row(vec![Cell::text("Monthly Budget (SEK)"), Cell::Number(750.0)]);
        let mut workbook = Workbook::default();
        workbook.push(sheet);

        workbook.write(&path)?;
        let read = Workbook::read(&path)?;

        let sheet = read.sheet(&["Dashboard"]).unwrap();
        let value = sheet.headers.iter().position(|h| h == "Value").unwrap();
        assert_eq!(sheet.rows[0][value], Cell::Number(750.0));
        Ok(())
    }
}
