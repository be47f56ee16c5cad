//! Date and time cell decoding.
//!
//! Spreadsheets hand dates over either as text or as serial day counts since 1899-12-30,
//! and times either as text or as a fraction of a day. Every decoded timestamp is a naive
//! local wall-clock time.

use super::workbook::Cell;
use crate::errors::{Error, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

const SECONDS_PER_DAY: f64 = 86_400.0;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

fn serial_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

/// Whole seconds in a fractional-day value after wrapping modulo 1. Rounding can yield a
/// full day (86 400), which callers carry into the date.
#[allow(clippy::cast_possible_truncation)]
fn seconds_of_fraction(fraction: f64) -> Option<i64> {
    fraction
        .is_finite()
        .then(|| (fraction.rem_euclid(1.0) * SECONDS_PER_DAY).round() as i64)
}

/// Time of day for a fractional-day value. Values of a day or more wrap modulo 1.
#[must_use]
pub fn time_from_fraction(fraction: f64) -> Option<NaiveTime> {
    let seconds = seconds_of_fraction(fraction)?.rem_euclid(86_400);
    NaiveTime::from_num_seconds_from_midnight_opt(u32::try_from(seconds).ok()?, 0)
}

/// Timestamp for a spreadsheet serial; the fractional part is the time of day.
///
/// The serial is rounded to whole seconds before it is split, so a time that rounds up to
/// midnight lands on the following day.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn datetime_from_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial > 2_958_465.0 {
        return None;
    }
    let seconds = (serial * SECONDS_PER_DAY).round() as i64;
    serial_epoch()?
        .and_time(NaiveTime::MIN)
        .checked_add_signed(TimeDelta::try_seconds(seconds)?)
}

/// Parses a textual date or date-time; date-only text is midnight.
#[must_use]
pub fn parse_datetime_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(serial) = text.parse::<f64>() {
        return datetime_from_serial(serial);
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Local).naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Parses a textual time of day; numeric text is a day fraction.
#[must_use]
pub fn parse_time_text(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    if let Ok(fraction) = text.parse::<f64>() {
        return time_from_fraction(fraction);
    }
    TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(text, f).ok())
}

/// Offset from midnight for a time cell. A day fraction that rounds up to 86 400 seconds
/// stays a full day here instead of wrapping to 00:00.
fn time_offset(cell: &Cell) -> Option<TimeDelta> {
    let fraction = match cell {
        Cell::Number(fraction) => *fraction,
        Cell::Text(text) => match text.trim().parse::<f64>() {
            Ok(fraction) => fraction,
            Err(_) => return parse_time_text(text).map(|t| t - NaiveTime::MIN),
        },
        Cell::Empty | Cell::Bool(_) => return None,
    };
    TimeDelta::try_seconds(seconds_of_fraction(fraction)?)
}

fn is_absent_time(cell: &Cell) -> bool {
    cell.is_empty() || matches!(cell, Cell::Text(s) if s.trim().eq_ignore_ascii_case("none"))
}

fn invalid(cell: Option<&Cell>) -> Error {
    Error::InvalidTimestamp {
        value: cell.map(ToString::to_string).unwrap_or_default(),
    }
}

/// Combines a date cell and an optional time cell into one timestamp.
///
/// A time cell that is blank or reads `None` leaves the date's own time, which is midnight
/// for date-only values.
///
/// # Errors
/// Returns `InvalidTimestamp` when the date is missing or unreadable, or the time cell is
/// present but unreadable.
pub fn decode_timestamp(date: Option<&Cell>, time: Option<&Cell>) -> Result<NaiveDateTime> {
    let at = match date {
        Some(Cell::Number(serial)) => datetime_from_serial(*serial),
        Some(Cell::Text(text)) => parse_datetime_text(text),
        _ => None,
    }
    .ok_or_else(|| invalid(date))?;

    let Some(time_cell) = time.filter(|c| !is_absent_time(c)) else {
        return Ok(at);
    };
    at.date()
        .and_time(NaiveTime::MIN)
        .checked_add_signed(time_offset(time_cell).ok_or_else(|| invalid(Some(time_cell)))?)
        .ok_or_else(|| invalid(Some(time_cell)))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::ts;

    #[test]
    fn test_serial_and_fraction_decode_to_midday() {
        let at = decode_timestamp(Some(&Cell::Number(45000.0)), Some(&Cell::Number(0.5))).unwrap();
        assert_eq!(at, ts(2023, 3, 15, 12, 0));
    }

    #[test]
    fn test_fraction_wraps_modulo_one() {
        assert_eq!(
            time_from_fraction(1.25),
            NaiveTime::from_hms_opt(6, 0, 0)
        );
        assert_eq!(time_from_fraction(0.999_999_9), Some(NaiveTime::MIN));
        assert_eq!(time_from_fraction(f64::NAN), None);
    }

    #[test]
    fn test_serial_with_fraction() {
        assert_eq!(datetime_from_serial(45000.75), Some(ts(2023, 3, 15, 18, 0)));
        assert_eq!(datetime_from_serial(1.0), Some(ts(1899, 12, 31, 0, 0)));
        assert_eq!(datetime_from_serial(-1.0), None);
    }

    #[test]
    fn test_serial_rounding_up_to_midnight_moves_to_next_day() {
        let last_moment = 45000.0 + 86_399.99 / 86_400.0;
        assert_eq!(datetime_from_serial(last_moment), Some(ts(2023, 3, 16, 0, 0)));
        assert_eq!(
            datetime_from_serial(45000.0 + 86_399.0 / 86_400.0),
            Some(ts(2023, 3, 15, 23, 59) + TimeDelta::seconds(59))
        );
    }

    #[test]
    fn test_time_cell_rounding_up_carries_into_date() {
        let date = Cell::Number(45000.0);
        assert_eq!(
            decode_timestamp(Some(&date), Some(&Cell::Number(0.999_999_95))).unwrap(),
            ts(2023, 3, 16, 0, 0)
        );
        assert_eq!(
            decode_timestamp(Some(&date), Some(&Cell::text("0.99999995"))).unwrap(),
            ts(2023, 3, 16, 0, 0)
        );
        // A fraction of a day or more still wraps before the carry
        assert_eq!(
            decode_timestamp(Some(&date), Some(&Cell::Number(1.25))).unwrap(),
            ts(2023, 3, 15, 6, 0)
        );
    }

    #[test]
    fn test_text_dates_and_times() {
        let date = Cell::text("2024-05-10");
        assert_eq!(decode_timestamp(Some(&date), None).unwrap(), ts(2024, 5, 10, 0, 0));
        assert_eq!(
            decode_timestamp(Some(&date), Some(&Cell::text("None"))).unwrap(),
            ts(2024, 5, 10, 0, 0)
        );
        assert_eq!(
            decode_timestamp(Some(&date), Some(&Cell::text("21:45"))).unwrap(),
            ts(2024, 5, 10, 21, 45)
        );
        assert_eq!(
            decode_timestamp(Some(&Cell::text("2024-05-10 08:30:00")), None).unwrap(),
            ts(2024, 5, 10, 8, 30)
        );
        // Numeric text from a CSV sheet is a serial
        assert_eq!(
            decode_timestamp(Some(&Cell::text("45000")), Some(&Cell::text("0.5"))).unwrap(),
            ts(2023, 3, 15, 12, 0)
        );
    }

    #[test]
    fn test_unreadable_values_are_rejected() {
        assert!(matches!(
            decode_timestamp(Some(&Cell::text("yesterday")), None).unwrap_err(),
            Error::InvalidTimestamp { .. }
        ));
        assert!(decode_timestamp(None, None).is_err());
        assert!(decode_timestamp(Some(&Cell::text("2024-02-30")), None).is_err());
        assert!(
            decode_timestamp(Some(&Cell::text("2024-05-10")), Some(&Cell::text("late"))).is_err()
        );
    }
}
