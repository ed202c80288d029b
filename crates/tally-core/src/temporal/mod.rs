//! Temporal query resolution
//!
//! Converts free-text queries into concrete date constraints through an
//! ordered strategy chain: absolute dates first (fastest, most precise),
//! then named months, relative timeframes, named periods (holidays,
//! quarters), contextual ranges, and finally a language-model fallback.
//! The first strategy that produces a constraint wins.
//!
//! All relative computation is anchored to a reference date that defaults
//! to "now" but can be overridden per resolver instance, so queries like
//! "last week" can be resolved against the corpus' own recency rather
//! than wall-clock time.

mod holidays;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use tracing::{debug, warn};

use crate::ai::{AiClient, LanguageBackend};
use crate::models::DateConstraint;

/// Environment variable overriding the resolver's notion of "now"
/// (accepts `YYYYMMDD` or RFC 3339)
pub const REFERENCE_DATE_ENV: &str = "RECEIPT_REFERENCE_DATE";

/// Environment variable overriding the month-only widening window
pub const MONTH_LOOKBACK_ENV: &str = "RECEIPT_MONTH_LOOKBACK_YEARS";

const DEFAULT_MONTH_LOOKBACK_YEARS: i32 = 5;

/// Month names (longest first so "september" wins over "sep" in alternation)
const MONTHS: &[(&str, u32)] = &[
    ("september", 9),
    ("february", 2),
    ("december", 12),
    ("november", 11),
    ("january", 1),
    ("october", 10),
    ("august", 8),
    ("march", 3),
    ("april", 4),
    ("june", 6),
    ("july", 7),
    ("sept", 9),
    ("may", 5),
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

/// Resolves temporal expressions against a fixed reference date
///
/// One resolver is constructed per request, carrying its reference date as
/// an explicit field. There is no process-wide clock state to corrupt.
#[derive(Debug, Clone)]
pub struct TemporalResolver {
    reference: DateTime<Utc>,
    month_lookback_years: i32,
}

impl Default for TemporalResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TemporalResolver {
    /// Create a resolver anchored to `RECEIPT_REFERENCE_DATE` if set,
    /// otherwise the current UTC time
    pub fn new() -> Self {
        Self {
            reference: reference_from_env().unwrap_or_else(Utc::now),
            month_lookback_years: lookback_from_env(),
        }
    }

    /// Create a resolver anchored to an explicit reference date
    pub fn anchored(reference: DateTime<Utc>) -> Self {
        Self {
            reference,
            month_lookback_years: lookback_from_env(),
        }
    }

    /// Override the month-only widening window (years searched before the
    /// reference year when a month is named without a year)
    pub fn with_month_lookback(mut self, years: i32) -> Self {
        self.month_lookback_years = years.max(0);
        self
    }

    /// The date all relative expressions are resolved against
    pub fn reference(&self) -> DateTime<Utc> {
        self.reference
    }

    /// Resolve a temporal expression from query text
    ///
    /// Returns `None` when no temporal constraint is present. Never fails:
    /// fragments that look temporal but don't parse are treated as absent.
    pub fn resolve(&self, query: &str) -> Option<DateConstraint> {
        let q = query.to_lowercase();
        let now = self.reference;

        try_iso_date(&q)
            .or_else(|| try_slash_date(&q))
            .or_else(|| try_textual_date(&q, now))
            .or_else(|| self.try_month_only(&q, now))
            .or_else(|| try_relative_timeframe(&q, now))
            .or_else(|| try_named_period(&q, now))
            .or_else(|| try_contextual_range(&q, now))
    }

    /// Resolve with the language-model fallback as the final strategy
    ///
    /// Only consults the backend when every rule-based strategy came up
    /// empty; a backend failure degrades to `None`.
    pub async fn resolve_with_fallback(
        &self,
        query: &str,
        ai: Option<&AiClient>,
    ) -> Option<DateConstraint> {
        if let Some(constraint) = self.resolve(query) {
            return Some(constraint);
        }

        let ai = ai?;
        match ai.extract_date_range(query, self.reference).await {
            Ok(Some((start, end))) => {
                debug!(%start, %end, "language model resolved date range");
                Some(day_range(start.date_naive(), end.date_naive()))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "language model date extraction failed");
                None
            }
        }
    }

    /// Month name with optional 4-digit year nearby
    ///
    /// With a year the exact month range is returned. Without one the range
    /// is widened across the reference year and `month_lookback_years` prior
    /// years, since receipts may predate the reference date and nothing else
    /// bounds the search. A lookback of zero falls back to a coarse
    /// month-of-year filter instead of guessing at years.
    fn try_month_only(&self, query: &str, now: DateTime<Utc>) -> Option<DateConstraint> {
        let word = Regex::new(r"[a-z]+").ok()?;
        let month = MONTHS.iter().find_map(|(name, num)| {
            word.find_iter(query)
                .any(|m| m.as_str() == *name)
                .then_some(*num)
        })?;

        if let Some(year) = find_year(query) {
            let (start, end) = month_range(year, month)?;
            return Some(DateConstraint::range(start, end));
        }

        if self.month_lookback_years == 0 {
            return Some(DateConstraint::Month { month, year: None });
        }

        let (start, _) = month_range(now.year() - self.month_lookback_years, month)?;
        let (_, end) = month_range(now.year(), month)?;
        Some(DateConstraint::range(start, end))
    }
}

fn reference_from_env() -> Option<DateTime<Utc>> {
    let raw = std::env::var(REFERENCE_DATE_ENV).ok()?;

    if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
        match NaiveDate::parse_from_str(&raw, "%Y%m%d") {
            Ok(date) => return Some(start_of_day(date)),
            Err(e) => {
                warn!(value = %raw, error = %e, "invalid {}", REFERENCE_DATE_ENV);
                return None;
            }
        }
    }

    match DateTime::parse_from_rfc3339(&raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            warn!(value = %raw, error = %e, "invalid {}", REFERENCE_DATE_ENV);
            None
        }
    }
}

fn lookback_from_env() -> i32 {
    std::env::var(MONTH_LOOKBACK_ENV)
        .ok()
        .and_then(|v| v.parse::<i32>().ok())
        .map(|v| v.max(0))
        .unwrap_or(DEFAULT_MONTH_LOOKBACK_YEARS)
}

// ---------------------------------------------------------------------------
// Strategies (pure functions, first non-None wins)
// ---------------------------------------------------------------------------

/// ISO format: YYYY-MM-DD
fn try_iso_date(query: &str) -> Option<DateConstraint> {
    let re = Regex::new(r"\b(20\d{2})-(\d{2})-(\d{2})\b").ok()?;
    let caps = re.captures(query)?;
    let date = NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )?;
    Some(single_day(date))
}

/// Slash format: MM/DD/YYYY or M/D/YY (2-digit years assumed 2000s)
fn try_slash_date(query: &str) -> Option<DateConstraint> {
    let re = Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{2,4})\b").ok()?;
    let caps = re.captures(query)?;
    let mut year: i32 = caps[3].parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    let date = NaiveDate::from_ymd_opt(year, caps[1].parse().ok()?, caps[2].parse().ok()?)?;
    Some(single_day(date))
}

/// Textual format: "Month Day[, Year]" with optional ordinal suffix
fn try_textual_date(query: &str, now: DateTime<Utc>) -> Option<DateConstraint> {
    let month_pattern = MONTHS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join("|");
    let re = Regex::new(&format!(
        r"\b({month_pattern})\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s*(20\d{{2}})?\b"
    ))
    .ok()?;

    let caps = re.captures(query)?;
    let month = month_number(&caps[1])?;
    let day: u32 = caps[2].parse().ok()?;

    let year = match caps.get(3) {
        Some(y) => y.as_str().parse().ok()?,
        None => {
            // No year given: assume the reference year, rolling back one
            // year if the month would land in the future
            if month > now.month() {
                now.year() - 1
            } else {
                now.year()
            }
        }
    };

    Some(single_day(NaiveDate::from_ymd_opt(year, month, day)?))
}

/// Relative timeframes: today, yesterday, last week, this month, ...
fn try_relative_timeframe(query: &str, now: DateTime<Utc>) -> Option<DateConstraint> {
    let today = now.date_naive();

    if query.contains("today") {
        return Some(single_day(today));
    }

    if query.contains("yesterday") {
        return Some(single_day(today - Duration::days(1)));
    }

    if query.contains("last week") {
        // Weeks start on Monday
        let start = today - Duration::days(today.weekday().num_days_from_monday() as i64 + 7);
        return Some(day_range(start, start + Duration::days(6)));
    }

    if query.contains("this week") {
        let start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        return Some(day_range(start, today));
    }

    if query.contains("last month") {
        let (year, month) = if now.month() == 1 {
            (now.year() - 1, 12)
        } else {
            (now.year(), now.month() - 1)
        };
        let (start, end) = month_range(year, month)?;
        return Some(DateConstraint::range(start, end));
    }

    if query.contains("this month") {
        let start = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)?;
        return Some(day_range(start, today));
    }

    if let Some(caps) = Regex::new(r"(?:last|past)\s+(\d+)\s+days?")
        .ok()
        .and_then(|re| re.captures(query))
    {
        let days: i64 = caps[1].parse().ok()?;
        return Some(day_range(today - Duration::days(days), today));
    }

    if query.contains("last year") {
        let start = NaiveDate::from_ymd_opt(now.year() - 1, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(now.year() - 1, 12, 31)?;
        return Some(day_range(start, end));
    }

    if query.contains("this year") {
        let start = NaiveDate::from_ymd_opt(now.year(), 1, 1)?;
        return Some(day_range(start, today));
    }

    None
}

/// Named periods: calendar quarters and holidays with week modifiers
fn try_named_period(query: &str, now: DateTime<Utc>) -> Option<DateConstraint> {
    if let Some(caps) = Regex::new(r"\bq([1-4])\s*(20\d{2})?\b")
        .ok()
        .and_then(|re| re.captures(query))
    {
        let quarter: u32 = caps[1].parse().ok()?;
        let year = caps
            .get(2)
            .and_then(|y| y.as_str().parse().ok())
            .unwrap_or_else(|| now.year());

        let start_month = (quarter - 1) * 3 + 1;
        let end_month = quarter * 3;
        let (start, _) = month_range(year, start_month)?;
        let (_, end) = month_range(year, end_month)?;
        return Some(DateConstraint::range(start, end));
    }

    for (name, date_fn) in holidays::HOLIDAYS {
        if !query.contains(name) {
            continue;
        }

        let year = find_year(query).unwrap_or_else(|| now.year());
        let holiday = date_fn(year)?;

        if query.contains("week before") {
            return Some(day_range(
                holiday - Duration::days(7),
                holiday - Duration::days(1),
            ));
        }
        if query.contains("week after") || query.contains("week following") {
            return Some(day_range(
                holiday + Duration::days(1),
                holiday + Duration::days(7),
            ));
        }
        if query.contains("week") || query.contains("weekend") {
            // The Monday-start week containing the holiday
            let start = holiday - Duration::days(holiday.weekday().num_days_from_monday() as i64);
            return Some(day_range(start, start + Duration::days(6)));
        }

        return Some(single_day(holiday));
    }

    None
}

/// Contextual ranges: "since <date>", "between <A> and <B>"
fn try_contextual_range(query: &str, now: DateTime<Utc>) -> Option<DateConstraint> {
    if let Some(idx) = query.find("since") {
        let fragment = &query[idx + "since".len()..];
        if let Some(start) = parse_fuzzy_date(fragment, now) {
            return Some(day_range(start, now.date_naive()));
        }
        debug!(fragment, "unparseable 'since' clause");
    }

    if let Some(caps) = Regex::new(r"between\s+(.+?)\s+and\s+([^,.;?!]+)")
        .ok()
        .and_then(|re| re.captures(query))
    {
        let start = parse_fuzzy_date(&caps[1], now);
        let end = parse_fuzzy_date(&caps[2], now);
        if let (Some(start), Some(end)) = (start, end) {
            return Some(day_range(start, end));
        }
        debug!(clause = &caps[0], "unparseable 'between' clause");
    }

    None
}

/// Lenient single-date parser for contextual range endpoints
///
/// Tries strict formats first, then textual month/day, month-year, month
/// alone, and a bare year.
fn parse_fuzzy_date(fragment: &str, now: DateTime<Utc>) -> Option<NaiveDate> {
    let fragment = fragment.trim().trim_end_matches(['.', ',', ';', '!', '?']);
    if fragment.is_empty() {
        return None;
    }

    for format in ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"] {
        if let Some(date) = fragment
            .split_whitespace()
            .find_map(|token| NaiveDate::parse_from_str(token, format).ok())
        {
            return Some(date);
        }
    }

    if let Some(DateConstraint::Range { start, .. }) = try_textual_date(fragment, now) {
        return Some(start.date_naive());
    }

    // Month name, with the year inferred the same way textual dates do
    let word = Regex::new(r"[a-z]+").ok()?;
    if let Some(month) = MONTHS.iter().find_map(|(name, num)| {
        word.find_iter(fragment)
            .any(|m| m.as_str() == *name)
            .then_some(*num)
    }) {
        let year = find_year(fragment).unwrap_or_else(|| {
            if month > now.month() {
                now.year() - 1
            } else {
                now.year()
            }
        });
        return NaiveDate::from_ymd_opt(year, month, 1);
    }

    if let Some(year) = find_year(fragment) {
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }

    None
}

// ---------------------------------------------------------------------------
// Boundary helpers
// ---------------------------------------------------------------------------

fn month_number(name: &str) -> Option<u32> {
    MONTHS
        .iter()
        .find_map(|(n, num)| (*n == name).then_some(*num))
}

fn find_year(query: &str) -> Option<i32> {
    Regex::new(r"\b(20\d{2})\b")
        .ok()?
        .captures(query)
        .and_then(|c| c[1].parse().ok())
}

pub(crate) fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

pub(crate) fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last_instant =
        NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN);
    date.and_time(last_instant).and_utc()
}

/// A single day as an inclusive range
fn single_day(date: NaiveDate) -> DateConstraint {
    DateConstraint::range(start_of_day(date), end_of_day(date))
}

/// A multi-day inclusive range with normalized boundaries
pub(crate) fn day_range(start: NaiveDate, end: NaiveDate) -> DateConstraint {
    DateConstraint::range(start_of_day(start), end_of_day(end))
}

/// Start and end instants of a calendar month
fn month_range(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = next_month.pred_opt()?;
    Some((start_of_day(first), end_of_day(last)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_at(year: i32, month: u32, day: u32) -> TemporalResolver {
        let reference = start_of_day(NaiveDate::from_ymd_opt(year, month, day).unwrap());
        TemporalResolver::anchored(reference).with_month_lookback(5)
    }

    fn expect_range(constraint: DateConstraint) -> (DateTime<Utc>, DateTime<Utc>) {
        match constraint {
            DateConstraint::Range { start, end } => (start, end),
            other => panic!("expected range, got {:?}", other),
        }
    }

    #[test]
    fn test_iso_date_single_day_bounds() {
        let resolver = resolver_at(2024, 2, 7);
        let (start, end) = expect_range(resolver.resolve("receipts on 2024-01-15").unwrap());
        assert_eq!(start.to_rfc3339(), "2024-01-15T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-01-15T23:59:59.999999+00:00");
    }

    #[test]
    fn test_iso_date_invalid_day_is_ignored() {
        let resolver = resolver_at(2024, 2, 7);
        assert!(resolver.resolve("weird stamp 2024-13-45").is_none());
    }

    #[test]
    fn test_slash_date_two_digit_year() {
        let resolver = resolver_at(2024, 2, 7);
        let (start, end) = expect_range(resolver.resolve("bought on 3/5/24").unwrap());
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(end.date_naive(), start.date_naive());
    }

    #[test]
    fn test_textual_date_with_year() {
        let resolver = resolver_at(2024, 2, 7);
        let (start, _) = expect_range(resolver.resolve("on December 25, 2023").unwrap());
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2023, 12, 25).unwrap());
    }

    #[test]
    fn test_textual_date_infers_previous_year_for_future_month() {
        // Reference is February 2024; "November 3rd" must mean 2023
        let resolver = resolver_at(2024, 2, 7);
        let (start, _) = expect_range(resolver.resolve("receipt from November 3rd").unwrap());
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2023, 11, 3).unwrap());
    }

    #[test]
    fn test_month_with_year_exact_range() {
        let resolver = resolver_at(2024, 2, 7);
        let (start, end) = expect_range(resolver.resolve("spending in January 2024").unwrap());
        assert_eq!(start.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-01-31T23:59:59.999999+00:00");
    }

    #[test]
    fn test_month_without_year_widens_across_lookback() {
        let resolver = resolver_at(2024, 2, 7);
        let (start, end) = expect_range(resolver.resolve("receipts from december").unwrap());
        assert_eq!(start.to_rfc3339(), "2019-12-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-12-31T23:59:59.999999+00:00");
    }

    #[test]
    fn test_month_without_year_zero_lookback_goes_coarse() {
        let resolver = resolver_at(2024, 2, 7).with_month_lookback(0);
        let constraint = resolver.resolve("receipts from december").unwrap();
        assert_eq!(
            constraint,
            DateConstraint::Month {
                month: 12,
                year: None
            }
        );
    }

    #[test]
    fn test_last_week_monday_start() {
        // 2024-01-15 is a Monday
        let resolver = resolver_at(2024, 1, 15);
        let (start, end) = expect_range(resolver.resolve("how much last week").unwrap());
        assert_eq!(start.to_rfc3339(), "2024-01-08T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-01-14T23:59:59.999999+00:00");
    }

    #[test]
    fn test_yesterday() {
        let resolver = resolver_at(2024, 1, 15);
        let (start, end) = expect_range(resolver.resolve("what did I buy yesterday").unwrap());
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 14).unwrap());
        assert_eq!(end.date_naive(), start.date_naive());
    }

    #[test]
    fn test_last_month_full_calendar_month() {
        let resolver = resolver_at(2024, 1, 15);
        let (start, end) = expect_range(resolver.resolve("receipts from last month").unwrap());
        assert_eq!(start.to_rfc3339(), "2023-12-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2023-12-31T23:59:59.999999+00:00");
    }

    #[test]
    fn test_last_n_days() {
        let resolver = resolver_at(2024, 1, 15);
        let (start, end) = expect_range(resolver.resolve("spending in the last 30 days").unwrap());
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2023, 12, 16).unwrap());
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_quarter_with_year() {
        let resolver = resolver_at(2024, 2, 7);
        let (start, end) = expect_range(resolver.resolve("purchases in q4 2023").unwrap());
        assert_eq!(start.to_rfc3339(), "2023-10-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2023-12-31T23:59:59.999999+00:00");
    }

    #[test]
    fn test_thanksgiving_resolves_to_fourth_thursday() {
        let resolver = resolver_at(2024, 2, 7);
        let (start, end) = expect_range(resolver.resolve("thanksgiving 2023 shopping").unwrap());
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2023, 11, 23).unwrap());
        assert_eq!(end.date_naive(), start.date_naive());
    }

    #[test]
    fn test_week_before_thanksgiving() {
        let resolver = resolver_at(2024, 2, 7);
        let (start, end) =
            expect_range(resolver.resolve("week before thanksgiving 2023").unwrap());
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2023, 11, 16).unwrap());
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2023, 11, 22).unwrap());
    }

    #[test]
    fn test_christmas_week_contains_holiday() {
        let resolver = resolver_at(2024, 2, 7);
        let (start, end) = expect_range(resolver.resolve("christmas week 2023").unwrap());
        // Christmas 2023 fell on a Monday
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2023, 12, 25).unwrap());
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn test_since_clause_with_bare_year() {
        // A bare year reaches the contextual strategy (anything more
        // specific is claimed by an earlier strategy first)
        let resolver = resolver_at(2024, 2, 7);
        let (start, end) = expect_range(resolver.resolve("spending since 2023").unwrap());
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2024, 2, 7).unwrap());
    }

    #[test]
    fn test_between_clause_with_bare_years() {
        let resolver = resolver_at(2024, 6, 1);
        let (start, end) =
            expect_range(resolver.resolve("purchases between 2022 and 2023").unwrap());
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2022, 1, 1).unwrap());
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
    }

    #[test]
    fn test_absolute_date_wins_inside_since_clause() {
        // "since <ISO date>" is claimed by the absolute-date strategy, so
        // it resolves to that single day, not an open-ended range
        let resolver = resolver_at(2024, 2, 7);
        let (start, end) = expect_range(resolver.resolve("since 2024-01-01").unwrap());
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(end.date_naive(), start.date_naive());
    }

    #[test]
    fn test_no_temporal_expression() {
        let resolver = resolver_at(2024, 2, 7);
        assert!(resolver.resolve("how much did I spend at Walmart").is_none());
    }

    #[test]
    fn test_absolute_date_wins_over_relative() {
        // Strategy order: the ISO date must win even with "last week" present
        let resolver = resolver_at(2024, 2, 7);
        let (start, _) =
            expect_range(resolver.resolve("2024-01-03 not last week").unwrap());
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }
}
