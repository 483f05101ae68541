//! WASM bindings for the time-range parser and formatter.
//!
//! Instants cross the boundary as epoch milliseconds (`Date.getTime()`),
//! structured results as JSON strings. The host supplies "now"; nothing here
//! reads a clock.

use chrono::{DateTime, Utc};
use time_range_engine::format::parse_display_zone;
use time_range_engine::{
    describe_time_range, format_time_range, list_defaults, parse_time_range_with_options,
    FormatOptions, ParseOptions, PresetCatalog, TimeRange, WeekStartDay,
};
use wasm_bindgen::prelude::*;

/// Parse `input` relative to `now_ms`. Returns a `ParseOutcome` as JSON;
/// unparseable input is a `{"status":"failed"}` outcome, not an error.
#[wasm_bindgen(js_name = "parseTimeRange")]
pub fn parse_time_range(
    input: &str,
    now_ms: f64,
    timezone: Option<String>,
    week_start: Option<String>,
) -> Result<String, JsError> {
    parse_json(input, now_ms, timezone.as_deref(), week_start.as_deref()).map_err(|e| JsError::new(&e))
}

#[wasm_bindgen(js_name = "formatTimeRange")]
pub fn format_range(start_ms: f64, end_ms: f64, timezone: Option<String>) -> Result<String, JsError> {
    format_text(start_ms, end_ms, timezone).map_err(|e| JsError::new(&e))
}

#[wasm_bindgen(js_name = "describeTimeRange")]
pub fn describe_range(
    start_ms: f64,
    end_ms: f64,
    now_ms: f64,
    timezone: Option<String>,
) -> Result<String, JsError> {
    describe_text(start_ms, end_ms, now_ms, timezone).map_err(|e| JsError::new(&e))
}

/// The default presets as a JSON array of `{label, value, durationMs}`.
#[wasm_bindgen(js_name = "defaultPresets")]
pub fn default_presets() -> Result<String, JsError> {
    serde_json::to_string(&list_defaults()).map_err(|e| JsError::new(&e.to_string()))
}

/// Map a loose label such as `"1w"` to the value of a default preset.
#[wasm_bindgen(js_name = "presetValueForLabel")]
pub fn preset_value_for_label(label: &str) -> Option<String> {
    PresetCatalog::defaults()
        .resolve_label(label)
        .map(|preset| preset.value().to_string())
}

// ── Native implementations ──────────────────────────────────────────────────

fn instant(ms: f64, what: &str) -> Result<DateTime<Utc>, String> {
    if !ms.is_finite() {
        return Err(format!("{what} must be a finite epoch-millisecond value"));
    }
    DateTime::from_timestamp_millis(ms as i64)
        .ok_or_else(|| format!("{what} is out of range: {ms}"))
}

fn format_options(timezone: Option<String>) -> Result<FormatOptions, String> {
    if let Some(tz) = &timezone {
        parse_display_zone(tz).map_err(|e| e.to_string())?;
    }
    Ok(FormatOptions { timezone })
}

fn parse_json(
    input: &str,
    now_ms: f64,
    timezone: Option<&str>,
    week_start: Option<&str>,
) -> Result<String, String> {
    let now = instant(now_ms, "now")?;
    let mut options = match timezone {
        // Fixed offsets only change display, so calendar math stays in UTC.
        Some(tz) if parse_display_zone(tz).is_ok() => {
            ParseOptions::with_timezone(tz).unwrap_or_default()
        }
        Some(tz) => return Err(format!("Invalid timezone: '{tz}'")),
        None => ParseOptions::default(),
    };
    if let Some(ws) = week_start {
        options.week_start = serde_json::from_value::<WeekStartDay>(serde_json::Value::from(ws))
            .map_err(|_| format!("Invalid week start: '{ws}'"))?;
    }
    let outcome = parse_time_range_with_options(input, now, &options);
    serde_json::to_string(&outcome).map_err(|e| e.to_string())
}

fn format_text(start_ms: f64, end_ms: f64, timezone: Option<String>) -> Result<String, String> {
    let range = TimeRange::new(instant(start_ms, "start")?, instant(end_ms, "end")?);
    Ok(format_time_range(&range, &format_options(timezone)?))
}

fn describe_text(
    start_ms: f64,
    end_ms: f64,
    now_ms: f64,
    timezone: Option<String>,
) -> Result<String, String> {
    let range = TimeRange::new(instant(start_ms, "start")?, instant(end_ms, "end")?);
    let now = instant(now_ms, "now")?;
    Ok(describe_time_range(&range, now, &format_options(timezone)?))
}
