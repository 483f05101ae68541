//! Canonical rendering of resolved ranges.
//!
//! [`format_time_range`] is the single source of display strings. It is
//! also what the controller compares when deciding whether a controlled
//! value already matches its own output, so the same `(range, timezone)`
//! pair must always render to the same string.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::{RangeError, Result};
use crate::preset::{HOUR_MS, MINUTE_MS};
use crate::range::TimeRange;

/// Rendering options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatOptions {
    /// IANA name (`"America/New_York"`) or fixed offset (`"UTC-08:00"`,
    /// `"+05:30"`). `None` or an unrecognized value renders in UTC.
    pub timezone: Option<String>,
}

impl FormatOptions {
    pub fn with_timezone(timezone: impl Into<String>) -> Self {
        Self {
            timezone: Some(timezone.into()),
        }
    }

    fn zone(&self) -> DisplayZone {
        self.timezone
            .as_deref()
            .and_then(|tz| parse_display_zone(tz).ok())
            .unwrap_or(DisplayZone::Fixed(utc_offset()))
    }
}

/// A zone ranges can be displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayZone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl DisplayZone {
    /// The UTC offset in effect at `at`.
    pub fn offset_at(&self, at: DateTime<Utc>) -> FixedOffset {
        match self {
            DisplayZone::Named(tz) => at.with_timezone(tz).offset().fix(),
            DisplayZone::Fixed(offset) => *offset,
        }
    }

    /// Read a wall-clock time in this zone. Gaps resolve to `None`, folds to
    /// the earlier instant.
    pub fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            DisplayZone::Named(tz) => tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            DisplayZone::Fixed(offset) => offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

/// Parse a timezone label accepted by [`FormatOptions`].
///
/// # Errors
///
/// Returns [`RangeError::InvalidTimezone`] when the label is neither an IANA
/// name nor a `UTC±HH:MM` / `±HH:MM` / `±HHMM` / `±H` offset.
pub fn parse_display_zone(s: &str) -> Result<DisplayZone> {
    let trimmed = s.trim();
    let upper = trimmed.to_ascii_uppercase();
    if matches!(upper.as_str(), "UTC" | "Z" | "GMT") {
        return Ok(DisplayZone::Fixed(utc_offset()));
    }

    let offset_part = upper
        .strip_prefix("UTC")
        .or_else(|| upper.strip_prefix("GMT"))
        .unwrap_or(&upper);
    if offset_part.starts_with('+') || offset_part.starts_with('-') {
        return parse_offset(offset_part)
            .map(DisplayZone::Fixed)
            .ok_or_else(|| RangeError::InvalidTimezone(format!("'{trimmed}'")));
    }

    trimmed
        .parse::<Tz>()
        .map(DisplayZone::Named)
        .map_err(|_| RangeError::InvalidTimezone(format!("'{trimmed}'")))
}

/// Parse `+05:30`, `-0800`, `+9`.
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return None,
    };
    let (hours, minutes): (i32, i32) = if let Some((h, m)) = rest.split_once(':') {
        (h.parse().ok()?, m.parse().ok()?)
    } else if rest.len() == 4 {
        (rest[..2].parse().ok()?, rest[2..].parse().ok()?)
    } else {
        (rest.parse().ok()?, 0)
    };
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Format the UTC offset as a zone label ("UTC", "UTC-08:00", "UTC+05:30").
fn zone_label(offset: FixedOffset) -> String {
    let offset_secs = offset.local_minus_utc();
    if offset_secs == 0 {
        return "UTC".to_string();
    }
    let sign = if offset_secs >= 0 { "+" } else { "-" };
    let abs_secs = offset_secs.unsigned_abs();
    let hours = abs_secs / 3600;
    let minutes = (abs_secs % 3600) / 60;
    format!("UTC{sign}{hours:02}:{minutes:02}")
}

/// Render a range as `"Jan 1, 2024 11:45 - 12:00 UTC"`.
///
/// The end date is omitted when both bounds fall on the same local day, and
/// seconds are shown only when either bound has a non-zero seconds field.
/// The zone label reflects the offset in effect at the end of the range.
///
/// The parser reads this form back. The round trip is exact for ranges on
/// whole seconds, unless a named zone changes offset inside the range.
pub fn format_time_range(range: &TimeRange, options: &FormatOptions) -> String {
    let zone = options.zone();
    let start = range.start().with_timezone(&zone.offset_at(range.start()));
    let end_offset = zone.offset_at(range.end());
    let end = range.end().with_timezone(&end_offset);

    let time_format = if start.second() != 0 || end.second() != 0 {
        "%H:%M:%S"
    } else {
        "%H:%M"
    };
    let full_format = format!("%b %-d, %Y {time_format}");

    let start_str = start.format(&full_format).to_string();
    let end_str = if start.date_naive() == end.date_naive() {
        end.format(time_format).to_string()
    } else {
        end.format(&full_format).to_string()
    };

    format!("{start_str} - {end_str} {}", zone_label(end_offset))
}

/// Human interpretation of a range relative to `now`.
///
/// Windows that end within a minute of `now` read as `"Past 15 minutes"`,
/// `"Past 4 hours"` or `"Past 7 days"`. Anything else falls back to
/// [`format_time_range`].
pub fn describe_time_range(range: &TimeRange, now: DateTime<Utc>, options: &FormatOptions) -> String {
    let ends_now = (now - range.end()).num_milliseconds().abs() < MINUTE_MS;
    if !ends_now || range.is_point() {
        return format_time_range(range, options);
    }

    let width_ms = range.duration().num_milliseconds();
    let seconds = rounded(width_ms, 1000);
    let minutes = rounded(width_ms, MINUTE_MS);
    let hours = rounded(width_ms, HOUR_MS);
    let days = rounded(width_ms, 24 * HOUR_MS);

    if minutes == 0 {
        format!("Past {}", plural(seconds, "second"))
    } else if minutes < 60 {
        format!("Past {}", plural(minutes, "minute"))
    } else if hours < 24 {
        format!("Past {}", plural(hours, "hour"))
    } else {
        format!("Past {}", plural(days, "day"))
    }
}

fn rounded(value: i64, unit: i64) -> i64 {
    (value + unit / 2) / unit
}

fn plural(n: i64, unit: &str) -> String {
    format!("{} {}{}", n, unit, if n == 1 { "" } else { "s" })
}
