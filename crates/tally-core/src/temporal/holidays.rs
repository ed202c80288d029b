//! US holiday date computation for named-period queries
//!
//! Fixed-date holidays are constructed directly; floating holidays
//! (Thanksgiving, Memorial Day, Labor Day) are derived from weekday math.

use chrono::{Datelike, Duration, NaiveDate};

/// Ordered lookup table of holiday phrases
///
/// Iteration order matters: "new years" must be tried before "new year"
/// so the longer phrase wins.
pub(crate) const HOLIDAYS: &[(&str, fn(i32) -> Option<NaiveDate>)] = &[
    ("thanksgiving", thanksgiving),
    ("christmas", christmas),
    ("new years", new_years),
    ("new year", new_years),
    ("black friday", black_friday),
    ("cyber monday", cyber_monday),
    ("memorial day", memorial_day),
    ("labor day", labor_day),
    ("fourth of july", fourth_of_july),
    ("halloween", halloween),
];

/// 4th Thursday of November
pub(crate) fn thanksgiving(year: i32) -> Option<NaiveDate> {
    let november_first = NaiveDate::from_ymd_opt(year, 11, 1)?;
    let days_until_thursday = (3 + 7 - november_first.weekday().num_days_from_monday() as i64) % 7;
    let first_thursday = november_first + Duration::days(days_until_thursday);
    Some(first_thursday + Duration::weeks(3))
}

fn christmas(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 12, 25)
}

fn new_years(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}

fn black_friday(year: i32) -> Option<NaiveDate> {
    thanksgiving(year).map(|d| d + Duration::days(1))
}

fn cyber_monday(year: i32) -> Option<NaiveDate> {
    thanksgiving(year).map(|d| d + Duration::days(4))
}

/// Last Monday of May
pub(crate) fn memorial_day(year: i32) -> Option<NaiveDate> {
    let last_may = NaiveDate::from_ymd_opt(year, 5, 31)?;
    let days_back = last_may.weekday().num_days_from_monday() as i64;
    Some(last_may - Duration::days(days_back))
}

/// First Monday of September
pub(crate) fn labor_day(year: i32) -> Option<NaiveDate> {
    let september_first = NaiveDate::from_ymd_opt(year, 9, 1)?;
    let days_until_monday =
        (7 - september_first.weekday().num_days_from_monday() as i64) % 7;
    Some(september_first + Duration::days(days_until_monday))
}

fn fourth_of_july(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 7, 4)
}

fn halloween(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 10, 31)
}
