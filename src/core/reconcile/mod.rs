//! Spreadsheet reconciliation - Import and export of the ledger as a workbook.

pub mod columns;
pub mod export;
pub mod import;
pub mod temporal;
pub mod workbook;

pub use export::{build_workbook, export_workbook};
pub use import::{ImportReport, import_workbook};
pub use workbook::{Cell, Sheet, Workbook};

use crate::errors::Result;
use sea_orm::ConnectionTrait;
use std::path::Path;

/// Reads the workbook at `path` (JSON file or CSV directory) and imports it.
pub async fn import_path<C>(db: &C, user_id: &str, path: &Path) -> Result<ImportReport>
where
    C: ConnectionTrait,
{
    let workbook = Workbook::read(path)?;
    import_workbook(db, user_id, &workbook).await
}

/// Exports a user's ledger to `path` (`.json` file, otherwise a CSV directory).
pub async fn export_path<C>(db: &C, user_id: &str, path: &Path) -> Result<()>
where
    C: ConnectionTrait,
{
    export_workbook(db, user_id).await?.write(path)
}
