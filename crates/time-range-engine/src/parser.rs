//! Deterministic interpretation of typed time-range expressions.
//!
//! The parser is a pure function of its inputs: the caller provides the
//! "now" anchor, nothing reads the system clock, and no input is sent
//! anywhere. If an expression does not match the grammar the result is
//! `Failed(unparseable)`; escalating to a smarter resolver is the
//! controller's decision, not the parser's.
//!
//! # Grammar
//!
//! Input is trimmed, lower-cased and whitespace-collapsed first.
//!
//! - **Compact durations**: `"15m"`, `"4 h"`, `"7d"`, `"2w"`, `"3mo"`, a bare
//!   `"30"` (minutes) → `[now - n*unit, now)`
//! - **Look-back**: `"past 3 days"`, `"last 2 hours"`, `"past week"`
//! - **Ago**: `"3 days ago"`, `"an hour ago"`, `"2h ago"` → `[now - n*unit, now)`
//! - **Named days**: `"today"` → `[midnight, now)`, `"yesterday"` → `[midnight - 1d, midnight)`
//! - **Named periods**: `"this week|month|quarter|year"` → `[period start, now)`,
//!   `"last week|month|quarter|year"` → the whole previous period
//! - **Absolute**: `"2024-01-05"`, `"2024-01-05 10:00"`, any RFC 3339 instant
//!   → `[instant, now)`
//! - **Explicit range**: `"<date|instant> to <date|instant>"` (also `until`
//!   and `" - "`); a date-only end covers that whole day
//! - **Canonical form**: whatever [`crate::format::format_time_range`] renders, e.g.
//!   `"Jan 1, 2024 11:45 - 12:00 UTC"`, read in the zone named by its label
//!
//! Units: `m|min|mins|minute|minutes`, `h|hr|hrs|hour|hours`, `d|day|days`,
//! `w|wk|wks|week|weeks`, `mo|mos|month|months` (30 days). Units match whole
//! tokens only, so `"5mo"` is five months, never five minutes.
//!
//! Day, week, month, quarter and year boundaries are computed in
//! [`ParseOptions::timezone`] (UTC by default). Weeks start on Monday
//! unless [`ParseOptions::week_start`] says otherwise.
//!
//! A result of zero width (`"0m"`, `"today"` at exactly midnight) is not a
//! usable window and is reported as `Failed(unparseable)`.

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{RangeError, Result};
use crate::format::{describe_time_range, parse_display_zone, FormatOptions};
use crate::preset::{DAY_MS, HOUR_MS, MINUTE_MS};
use crate::range::{FailureReason, ParseOutcome, ResolutionSource, TimeRange};

// ── Configurable week start ─────────────────────────────────────────────────

/// Which day begins a week for `"this week"` / `"last week"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStartDay {
    /// ISO 8601 standard (Monday = day 0 of the week).
    #[default]
    Monday,
    /// US/Canada convention (Sunday = day 0 of the week).
    Sunday,
}

/// Options for [`parse_time_range_with_options`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Which day starts the week for period computations.
    pub week_start: WeekStartDay,
    /// Zone whose midnights delimit days, weeks, months and years.
    pub timezone: Tz,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            week_start: WeekStartDay::Monday,
            timezone: chrono_tz::UTC,
        }
    }
}

impl ParseOptions {
    /// Options using an IANA timezone for calendar boundaries.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::InvalidTimezone`] for unknown zone names.
    pub fn with_timezone(timezone: &str) -> Result<Self> {
        let timezone = timezone
            .trim()
            .parse::<Tz>()
            .map_err(|_| RangeError::InvalidTimezone(format!("'{}'", timezone.trim())))?;
        Ok(Self {
            timezone,
            ..Self::default()
        })
    }
}

/// How many days `weekday` is from the week-start day.
fn days_from_week_start(weekday: Weekday, week_start: WeekStartDay) -> i64 {
    match week_start {
        WeekStartDay::Monday => weekday.num_days_from_monday() as i64,
        WeekStartDay::Sunday => weekday.num_days_from_sunday() as i64,
    }
}

// ── parse_time_range ────────────────────────────────────────────────────────

/// Resolve a typed expression into a range, with UTC calendar boundaries and
/// ISO weeks. See the [module docs](self) for the grammar.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use time_range_engine::parser::parse_time_range;
///
/// let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
/// let range = parse_time_range("15m", now).range().unwrap();
/// assert_eq!(range.start(), Utc.with_ymd_and_hms(2024, 1, 1, 11, 45, 0).unwrap());
/// assert_eq!(range.end(), now);
/// ```
pub fn parse_time_range(input: &str, now: DateTime<Utc>) -> ParseOutcome {
    parse_time_range_with_options(input, now, &ParseOptions::default())
}

/// Resolve a typed expression into a range with explicit options.
///
/// Never panics on user input and never guesses: anything outside the
/// grammar is `Failed(unparseable)`.
pub fn parse_time_range_with_options(
    input: &str,
    now: DateTime<Utc>,
    options: &ParseOptions,
) -> ParseOutcome {
    let normalized = normalize_expression(input);
    if normalized.is_empty() {
        return ParseOutcome::failed(FailureReason::Unparseable);
    }

    let tz = options.timezone;
    let local_now = now.with_timezone(&tz);
    let ws = options.week_start;

    // Most specific rules first: multi-token forms before single tokens.
    let range = try_canonical_range(&normalized)
        .or_else(|| try_explicit_range(&normalized, &tz))
        .or_else(|| try_compact_duration(&normalized, now))
        .or_else(|| try_named_day(&normalized, &local_now, &tz))
        .or_else(|| try_named_period(&normalized, &local_now, &tz, ws))
        .or_else(|| try_lookback(&normalized, now))
        .or_else(|| try_ago(&normalized, now))
        .or_else(|| try_passthrough(&normalized, now, &tz));

    match range {
        Some(range) if !range.is_point() => {
            let format_options = FormatOptions::with_timezone(tz.name());
            let interpretation = describe_time_range(&range, now, &format_options);
            ParseOutcome::resolved(range, interpretation, ResolutionSource::Grammar)
        }
        _ => ParseOutcome::failed(FailureReason::Unparseable),
    }
}

// ── Expression rules ────────────────────────────────────────────────────────

/// Normalize expression: trim, lowercase, collapse whitespace, strip a
/// leading "the".
fn normalize_expression(s: &str) -> String {
    let collapsed = s
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    match collapsed.strip_prefix("the ") {
        Some(rest) => rest.to_string(),
        None => collapsed,
    }
}

/// Try the canonical display form: "jan 1, 2024 11:45 - 12:00 utc",
/// "dec 24, 2023 00:00 - dec 26, 2023 00:00 utc-08:00".
fn try_canonical_range(s: &str) -> Option<TimeRange> {
    let (body, label) = s.rsplit_once(' ')?;
    let zone = parse_display_zone(label).ok()?;
    let (left, right) = body.split_once(" - ")?;

    let start = parse_display_datetime(left)?;
    let end = match parse_display_datetime(right) {
        Some(end) => end,
        // Same local day: the end shows only a time.
        None => start.date().and_time(parse_display_time(right)?),
    };
    Some(TimeRange::new(zone.localize(start)?, zone.localize(end)?))
}

/// Try an explicit range: "2024-01-01 to 2024-01-05", "… until …", "… - …".
fn try_explicit_range(s: &str, tz: &Tz) -> Option<TimeRange> {
    let (left, right) = s
        .split_once(" to ")
        .or_else(|| s.split_once(" until "))
        .or_else(|| s.split_once(" - "))?;

    let start = match parse_bound(left.trim(), tz)? {
        Bound::Instant(t) => t,
        Bound::Day(date) => start_of_day(date, tz)?,
    };
    let end = match parse_bound(right.trim(), tz)? {
        Bound::Instant(t) => t,
        // A date-only end includes that whole day.
        Bound::Day(date) => start_of_day(date.succ_opt()?, tz)?,
    };
    Some(TimeRange::new(start, end))
}

/// Try a compact duration: "15m", "4 h", "7d", "3mo", bare "30".
fn try_compact_duration(s: &str, now: DateTime<Utc>) -> Option<TimeRange> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let digits_end = compact
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(compact.len());
    if digits_end == 0 {
        return None;
    }
    let n: i64 = compact[..digits_end].parse().ok()?;
    let unit = match &compact[digits_end..] {
        // Bare number while the user is still typing: smallest unit.
        "" => "m",
        unit => unit,
    };
    Some(TimeRange::ending_at(now, unit_width(n, unit)?))
}

/// Try named days: "today", "yesterday".
fn try_named_day(s: &str, local: &DateTime<Tz>, tz: &Tz) -> Option<TimeRange> {
    let now = local.with_timezone(&Utc);
    let today = local.date_naive();
    match s {
        "today" => Some(TimeRange::new(start_of_day(today, tz)?, now)),
        "yesterday" => {
            let midnight = start_of_day(today, tz)?;
            let previous = start_of_day(today.pred_opt()?, tz)?;
            Some(TimeRange::new(previous, midnight))
        }
        _ => None,
    }
}

/// Try named periods: "this week", "last month", "last quarter", "this year".
fn try_named_period(
    s: &str,
    local: &DateTime<Tz>,
    tz: &Tz,
    ws: WeekStartDay,
) -> Option<TimeRange> {
    let (modifier, period) = s.split_once(' ')?;
    let now = local.with_timezone(&Utc);
    let today = local.date_naive();

    let (current_start, previous_start) = match period {
        "week" => {
            let days_since_start = days_from_week_start(local.weekday(), ws);
            let this_start = today - Duration::days(days_since_start);
            (this_start, this_start - Duration::days(7))
        }
        "month" => (
            first_of_month(today.year(), today.month(), 0)?,
            first_of_month(today.year(), today.month(), -1)?,
        ),
        "quarter" => {
            let q_start_month = ((today.month() - 1) / 3) * 3 + 1;
            (
                first_of_month(today.year(), q_start_month, 0)?,
                first_of_month(today.year(), q_start_month, -3)?,
            )
        }
        "year" => (
            NaiveDate::from_ymd_opt(today.year(), 1, 1)?,
            NaiveDate::from_ymd_opt(today.year() - 1, 1, 1)?,
        ),
        _ => return None,
    };

    match modifier {
        "this" | "current" => Some(TimeRange::new(start_of_day(current_start, tz)?, now)),
        "last" | "previous" => Some(TimeRange::new(
            start_of_day(previous_start, tz)?,
            start_of_day(current_start, tz)?,
        )),
        _ => None,
    }
}

/// Try look-back phrases: "past 3 days", "last 2 hours", "past week".
fn try_lookback(s: &str, now: DateTime<Utc>) -> Option<TimeRange> {
    let rest = s
        .strip_prefix("past ")
        .or_else(|| s.strip_prefix("last "))?;
    let (n, unit) = parse_quantity(rest)?;
    Some(TimeRange::ending_at(now, unit_width(n, unit)?))
}

/// Try "N unit(s) ago": a point in the past, exposed as `[point, now)`.
fn try_ago(s: &str, now: DateTime<Utc>) -> Option<TimeRange> {
    let rest = s.strip_suffix(" ago")?;
    let (n, unit) = parse_quantity(rest)?;
    let point = now.checked_sub_signed(unit_width(n, unit)?)?;
    Some(TimeRange::new(point, now))
}

/// Try an absolute date or instant → `[instant, now)`.
fn try_passthrough(s: &str, now: DateTime<Utc>, tz: &Tz) -> Option<TimeRange> {
    let start = match parse_bound(s, tz)? {
        Bound::Instant(t) => t,
        Bound::Day(date) => start_of_day(date, tz)?,
    };
    Some(TimeRange::new(start, now))
}

// ── Parsing helpers ─────────────────────────────────────────────────────────

/// One side of an absolute expression.
enum Bound {
    Instant(DateTime<Utc>),
    Day(NaiveDate),
}

/// Parse an RFC 3339 instant, a local "YYYY-MM-DD HH:MM[:SS]" or a bare date.
fn parse_bound(s: &str, tz: &Tz) -> Option<Bound> {
    // Normalization lower-cased the 'T' and 'Z' designators.
    let upper = s.to_uppercase();
    if let Ok(dt) = DateTime::parse_from_rfc3339(&upper) {
        return Some(Bound::Instant(dt.with_timezone(&Utc)));
    }
    for pattern in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&upper, pattern) {
            let local = tz.from_local_datetime(&naive).earliest()?;
            return Some(Bound::Instant(local.with_timezone(&Utc)));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Bound::Day)
}

/// Parse "jan 1, 2024 11:45[:30]". Month names match in any case.
fn parse_display_datetime(s: &str) -> Option<NaiveDateTime> {
    ["%b %d, %Y %H:%M:%S", "%b %d, %Y %H:%M"]
        .iter()
        .find_map(|pattern| NaiveDateTime::parse_from_str(s, pattern).ok())
}

fn parse_display_time(s: &str) -> Option<NaiveTime> {
    ["%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|pattern| NaiveTime::parse_from_str(s, pattern).ok())
}

/// Parse a quantity: "3 days", "3days", "3d", "an hour", "week".
fn parse_quantity(s: &str) -> Option<(i64, &str)> {
    let parts: Vec<&str> = s.split_whitespace().collect();
    let (n, unit) = match parts[..] {
        ["a" | "an", unit] => (1, unit),
        [count, unit] => (count.parse().ok()?, unit),
        [single] => split_compact(single).unwrap_or((1, single)),
        _ => return None,
    };
    unit_millis(unit)?;
    Some((n, unit))
}

/// Split "3d" into `(3, "d")`.
fn split_compact(token: &str) -> Option<(i64, &str)> {
    let digits_end = token.find(|c: char| !c.is_ascii_digit())?;
    if digits_end == 0 {
        return None;
    }
    Some((token[..digits_end].parse().ok()?, &token[digits_end..]))
}

/// Milliseconds in one unit. Whole-token match only.
fn unit_millis(unit: &str) -> Option<i64> {
    match unit {
        "m" | "min" | "mins" | "minute" | "minutes" => Some(MINUTE_MS),
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(HOUR_MS),
        "d" | "day" | "days" => Some(DAY_MS),
        "w" | "wk" | "wks" | "week" | "weeks" => Some(7 * DAY_MS),
        "mo" | "mos" | "month" | "months" => Some(30 * DAY_MS),
        _ => None,
    }
}

/// `n` units as a duration, `None` on overflow.
fn unit_width(n: i64, unit: &str) -> Option<Duration> {
    let ms = n.checked_mul(unit_millis(unit)?)?;
    Duration::try_milliseconds(ms)
}

/// First day of the month `delta` months away from `year`-`month`.
fn first_of_month(year: i32, month: u32, delta: i32) -> Option<NaiveDate> {
    let index = year * 12 + (month as i32 - 1) + delta;
    NaiveDate::from_ymd_opt(index.div_euclid(12), index.rem_euclid(12) as u32 + 1, 1)
}

/// Local midnight of `date` in `tz`, as a UTC instant.
fn start_of_day(date: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn anchor() -> DateTime<Utc> {
        // Wednesday, February 18, 2026, 14:30:00 UTC
        utc(2026, 2, 18, 14, 30, 0)
    }

    fn resolve(input: &str, now: DateTime<Utc>) -> TimeRange {
        parse_time_range(input, now)
            .range()
            .unwrap_or_else(|| panic!("'{input}' should resolve"))
    }

    fn assert_unparseable(input: &str) {
        let outcome = parse_time_range(input, anchor());
        assert_eq!(
            outcome.failure(),
            Some(FailureReason::Unparseable),
            "'{input}' should fail, got {outcome:?}"
        );
    }

    // ── compact durations ───────────────────────────────────────────────

    #[test]
    fn test_parse_15m() {
        let now = utc(2024, 1, 1, 12, 0, 0);
        let range = resolve("15m", now);
        assert_eq!(range.start(), utc(2024, 1, 1, 11, 45, 0));
        assert_eq!(range.end(), now);
    }

    #[test]
    fn test_parse_compact_units() {
        let now = anchor();
        assert_eq!(resolve("4h", now).duration(), Duration::hours(4));
        assert_eq!(resolve("7d", now).duration(), Duration::days(7));
        assert_eq!(resolve("2w", now).duration(), Duration::weeks(2));
        assert_eq!(resolve("90mins", now).duration(), Duration::minutes(90));
    }

    #[test]
    fn test_parse_month_unit_beats_minutes() {
        assert_eq!(resolve("5mo", anchor()).duration(), Duration::days(150));
    }

    #[test]
    fn test_parse_bare_integer_is_minutes() {
        assert_eq!(resolve("30", anchor()).duration(), Duration::minutes(30));
    }

    #[test]
    fn test_parse_whitespace_and_case_insensitive() {
        let now = anchor();
        assert_eq!(resolve("  15 M ", now), resolve("15m", now));
        assert_eq!(resolve("4 Hours", now), resolve("4h", now));
        assert_eq!(resolve("YESTERDAY", now), resolve("yesterday", now));
    }

    #[test]
    fn test_parse_zero_duration_fails() {
        assert_unparseable("0m");
        assert_unparseable("0 days ago");
    }

    #[test]
    fn test_parse_overflow_fails() {
        assert_unparseable("999999999999999999w");
    }

    // ── named days ──────────────────────────────────────────────────────

    #[test]
    fn test_parse_yesterday() {
        let now = utc(2024, 1, 2, 9, 0, 0);
        let range = resolve("yesterday", now);
        assert_eq!(range.start(), utc(2024, 1, 1, 0, 0, 0));
        assert_eq!(range.end(), utc(2024, 1, 2, 0, 0, 0));
    }

    #[test]
    fn test_parse_today() {
        let range = resolve("today", anchor());
        assert_eq!(range.start(), utc(2026, 2, 18, 0, 0, 0));
        assert_eq!(range.end(), anchor());
    }

    #[test]
    fn test_parse_today_at_midnight_is_zero_width() {
        let outcome = parse_time_range("today", utc(2026, 2, 18, 0, 0, 0));
        assert_eq!(outcome.failure(), Some(FailureReason::Unparseable));
    }

    #[test]
    fn test_parse_yesterday_in_timezone() {
        // 14:30 UTC is 09:30 EST on Feb 18
        let options = ParseOptions::with_timezone("America/New_York").unwrap();
        let range = parse_time_range_with_options("yesterday", anchor(), &options)
            .range()
            .unwrap();
        assert_eq!(range.start(), utc(2026, 2, 17, 5, 0, 0));
        assert_eq!(range.end(), utc(2026, 2, 18, 5, 0, 0));
    }

    // ── ago / look-back ─────────────────────────────────────────────────

    #[test]
    fn test_parse_3_days_ago() {
        let now = utc(2024, 1, 10, 0, 0, 0);
        let range = resolve("3 days ago", now);
        assert_eq!(range.start(), utc(2024, 1, 7, 0, 0, 0));
        assert_eq!(range.end(), now);
    }

    #[test]
    fn test_parse_ago_variants() {
        let now = anchor();
        assert_eq!(resolve("an hour ago", now).duration(), Duration::hours(1));
        assert_eq!(resolve("a week ago", now).duration(), Duration::weeks(1));
        assert_eq!(resolve("2h ago", now).duration(), Duration::hours(2));
        assert_eq!(resolve("1 month ago", now).duration(), Duration::days(30));
    }

    #[test]
    fn test_parse_lookback() {
        let now = anchor();
        assert_eq!(resolve("past 3 days", now).duration(), Duration::days(3));
        assert_eq!(resolve("last 2 hours", now).duration(), Duration::hours(2));
        assert_eq!(resolve("past week", now).duration(), Duration::weeks(1));
        assert_eq!(resolve("the past 15 minutes", now).duration(), Duration::minutes(15));
        assert_eq!(resolve("last 2 weeks", now).duration(), Duration::weeks(2));
    }

    // ── named periods ───────────────────────────────────────────────────

    #[test]
    fn test_parse_last_week_iso() {
        // Anchor is Wed Feb 18 → this week started Mon Feb 16
        let range = resolve("last week", anchor());
        assert_eq!(range.start(), utc(2026, 2, 9, 0, 0, 0));
        assert_eq!(range.end(), utc(2026, 2, 16, 0, 0, 0));
        assert_eq!(range.duration(), Duration::days(7));
    }

    #[test]
    fn test_parse_last_week_sunday_start() {
        let options = ParseOptions {
            week_start: WeekStartDay::Sunday,
            ..ParseOptions::default()
        };
        let range = parse_time_range_with_options("last week", anchor(), &options)
            .range()
            .unwrap();
        assert_eq!(range.start(), utc(2026, 2, 8, 0, 0, 0));
        assert_eq!(range.end(), utc(2026, 2, 15, 0, 0, 0));
    }

    #[test]
    fn test_parse_this_week() {
        let range = resolve("this week", anchor());
        assert_eq!(range.start(), utc(2026, 2, 16, 0, 0, 0));
        assert_eq!(range.end(), anchor());
    }

    #[test]
    fn test_parse_this_month() {
        let range = resolve("this month", anchor());
        assert_eq!(range.start(), utc(2026, 2, 1, 0, 0, 0));
        assert_eq!(range.end(), anchor());
    }

    #[test]
    fn test_parse_last_month_across_year() {
        let range = resolve("last month", utc(2026, 1, 15, 8, 0, 0));
        assert_eq!(range.start(), utc(2025, 12, 1, 0, 0, 0));
        assert_eq!(range.end(), utc(2026, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_parse_quarters_and_years() {
        let now = anchor();
        assert_eq!(resolve("this quarter", now).start(), utc(2026, 1, 1, 0, 0, 0));
        let last_quarter = resolve("last quarter", now);
        assert_eq!(last_quarter.start(), utc(2025, 10, 1, 0, 0, 0));
        assert_eq!(last_quarter.end(), utc(2026, 1, 1, 0, 0, 0));
        let last_year = resolve("last year", now);
        assert_eq!(last_year.start(), utc(2025, 1, 1, 0, 0, 0));
        assert_eq!(last_year.end(), utc(2026, 1, 1, 0, 0, 0));
    }

    // ── absolute ────────────────────────────────────────────────────────

    #[test]
    fn test_parse_iso_date_passthrough() {
        let range = resolve("2026-02-10", anchor());
        assert_eq!(range.start(), utc(2026, 2, 10, 0, 0, 0));
        assert_eq!(range.end(), anchor());
    }

    #[test]
    fn test_parse_rfc3339_passthrough() {
        let range = resolve("2026-02-18T10:00:00Z", anchor());
        assert_eq!(range.start(), utc(2026, 2, 18, 10, 0, 0));
    }

    #[test]
    fn test_parse_future_instant_is_swapped() {
        let range = resolve("2026-02-20", anchor());
        assert_eq!(range.start(), anchor());
        assert_eq!(range.end(), utc(2026, 2, 20, 0, 0, 0));
    }

    #[test]
    fn test_parse_explicit_date_range_includes_end_day() {
        let range = resolve("2026-01-05 to 2026-01-10", anchor());
        assert_eq!(range.start(), utc(2026, 1, 5, 0, 0, 0));
        assert_eq!(range.end(), utc(2026, 1, 11, 0, 0, 0));
    }

    #[test]
    fn test_parse_explicit_instant_range() {
        let range = resolve("2026-01-05 09:00 - 2026-01-05 17:30", anchor());
        assert_eq!(range.start(), utc(2026, 1, 5, 9, 0, 0));
        assert_eq!(range.end(), utc(2026, 1, 5, 17, 30, 0));
    }

    // ── canonical form ──────────────────────────────────────────────────

    #[test]
    fn test_parse_canonical_same_day() {
        let range = resolve("Jan 1, 2024 11:45 - 12:00 UTC", anchor());
        assert_eq!(range.start(), utc(2024, 1, 1, 11, 45, 0));
        assert_eq!(range.end(), utc(2024, 1, 1, 12, 0, 0));
    }

    #[test]
    fn test_parse_canonical_across_days_with_seconds() {
        let range = resolve("Dec 24, 2023 00:00:15 - Dec 26, 2023 08:30:00 UTC", anchor());
        assert_eq!(range.start(), utc(2023, 12, 24, 0, 0, 15));
        assert_eq!(range.end(), utc(2023, 12, 26, 8, 30, 0));
    }

    #[test]
    fn test_parse_canonical_reads_offset_label() {
        // Calendar options are ignored: the label carries the zone.
        let options = ParseOptions::with_timezone("Asia/Tokyo").unwrap();
        let range =
            parse_time_range_with_options("Jan 1, 2024 08:00 - 09:00 UTC-08:00", anchor(), &options)
                .range()
                .unwrap();
        assert_eq!(range.start(), utc(2024, 1, 1, 16, 0, 0));
        assert_eq!(range.end(), utc(2024, 1, 1, 17, 0, 0));
    }

    #[test]
    fn test_parse_canonical_round_trips_format() {
        let range = TimeRange::new(utc(2024, 5, 9, 3, 7, 0), utc(2024, 6, 1, 0, 0, 0));
        for zone in ["UTC", "+05:30", "UTC-08:00"] {
            let text = crate::format::format_time_range(&range, &FormatOptions::with_timezone(zone));
            assert_eq!(resolve(&text, anchor()), range, "{text}");
        }
    }

    #[test]
    fn test_parse_canonical_rejects_unknown_label() {
        assert_unparseable("Jan 1, 2024 11:45 - 12:00 Mars");
        assert_unparseable("Jan 1, 2024 11:45 - noon UTC");
    }

    // ── failures and interpretation ─────────────────────────────────────

    #[test]
    fn test_parse_unrecognized_fails() {
        assert_unparseable("???");
        assert_unparseable("");
        assert_unparseable("   ");
        assert_unparseable("next tuesday");
        assert_unparseable("5 parsecs");
        assert_unparseable("2026-13-45");
    }

    #[test]
    fn test_parse_is_deterministic() {
        for input in ["15m", "yesterday", "last week", "3 days ago", "this month"] {
            assert_eq!(
                parse_time_range(input, anchor()),
                parse_time_range(input, anchor())
            );
        }
    }

    #[test]
    fn test_parse_outcome_source_and_interpretation() {
        match parse_time_range("15m", anchor()) {
            ParseOutcome::Resolved {
                interpretation,
                source,
                ..
            } => {
                assert_eq!(source, ResolutionSource::Grammar);
                assert_eq!(interpretation, "Past 15 minutes");
            }
            other => panic!("expected resolved, got {other:?}"),
        }
    }

    #[test]
    fn test_with_timezone_rejects_unknown_zone() {
        let err = ParseOptions::with_timezone("Nowhere/Special").unwrap_err();
        assert!(err.to_string().contains("Invalid timezone"), "got: {err}");
    }
}
