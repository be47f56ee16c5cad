//! Core business logic, independent of any presentation layer.
//!
//! The store modules (`product`, `purchase`, `consumption`, `giveaway`, `settings`) are thin
//! async functions over a `SeaORM` connection. `ledger` is the pure aggregator that turns a
//! snapshot of those tables into derived metrics; `share` and `reconcile` are built on top.

pub mod consumption;
pub mod giveaway;
pub mod ledger;
pub mod product;
pub mod purchase;
pub mod reconcile;
pub mod settings;
pub mod share;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

/// Half-open `[start, end)` range covering one calendar day.
pub(crate) fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_time(NaiveTime::MIN);
    let end = start
        .checked_add_signed(TimeDelta::days(1))
        .unwrap_or(NaiveDateTime::MAX);
    (start, end)
}

/// Current local wall-clock time, the reference point for every date window.
#[must_use]
pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
