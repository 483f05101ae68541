//! Named look-back durations ("15m", "1h", ...) offered next to the input.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RangeError, Result};
use crate::range::TimeRange;

pub const MINUTE_MS: i64 = 60 * 1000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// A named look-back window.
///
/// `value` is the stable identifier used for selection and equality,
/// `label` is display text only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PresetSpec", rename_all = "camelCase")]
pub struct TimeRangePreset {
    label: String,
    value: String,
    duration_ms: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresetSpec {
    label: String,
    value: String,
    duration_ms: i64,
}

impl TryFrom<PresetSpec> for TimeRangePreset {
    type Error = RangeError;

    fn try_from(raw: PresetSpec) -> Result<Self> {
        TimeRangePreset::new(raw.label, raw.value, raw.duration_ms)
    }
}

impl TimeRangePreset {
    /// Create a preset. `duration_ms` must be positive and `value` non-empty.
    pub fn new(
        label: impl Into<String>,
        value: impl Into<String>,
        duration_ms: i64,
    ) -> Result<Self> {
        let label = label.into();
        let value = value.into();
        if value.trim().is_empty() {
            return Err(RangeError::InvalidPreset(format!(
                "preset '{label}' has an empty value"
            )));
        }
        if duration_ms <= 0 {
            return Err(RangeError::InvalidPreset(format!(
                "preset '{value}' must have a positive duration, got {duration_ms}ms"
            )));
        }
        Ok(Self {
            label,
            value,
            duration_ms,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.duration_ms)
    }

    /// `[now - duration, now)`.
    pub fn range_at(&self, now: DateTime<Utc>) -> TimeRange {
        TimeRange::ending_at(now, self.duration())
    }
}

// Built-in, so the invariants of `new` hold by construction.
fn builtin(label: &str, value: &str, duration_ms: i64) -> TimeRangePreset {
    TimeRangePreset {
        label: label.to_string(),
        value: value.to_string(),
        duration_ms,
    }
}

/// The default presets, shortest first.
pub fn list_defaults() -> Vec<TimeRangePreset> {
    vec![
        builtin("Past 15 Minutes", "15m", 15 * MINUTE_MS),
        builtin("Past 1 Hour", "1h", HOUR_MS),
        builtin("Past 4 Hours", "4h", 4 * HOUR_MS),
        builtin("Past 24 Hours", "24h", DAY_MS),
        builtin("Past 7 Days", "7d", 7 * DAY_MS),
        builtin("Past 30 Days", "30d", 30 * DAY_MS),
        builtin("Past 90 Days", "90d", 90 * DAY_MS),
    ]
}

/// An ordered set of presets with unique values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetCatalog {
    presets: Vec<TimeRangePreset>,
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self::defaults()
    }
}

impl PresetCatalog {
    pub fn defaults() -> Self {
        Self {
            presets: list_defaults(),
        }
    }

    /// A caller-supplied catalog. Order is kept as given.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::InvalidPreset`] if the list is empty or two
    /// presets share a value.
    pub fn custom(presets: Vec<TimeRangePreset>) -> Result<Self> {
        if presets.is_empty() {
            return Err(RangeError::InvalidPreset(
                "catalog must contain at least one preset".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for preset in &presets {
            if !seen.insert(preset.value()) {
                return Err(RangeError::InvalidPreset(format!(
                    "duplicate preset value '{}'",
                    preset.value()
                )));
            }
        }
        Ok(Self { presets })
    }

    pub fn presets(&self) -> &[TimeRangePreset] {
        &self.presets
    }

    pub fn find(&self, value: &str) -> Option<&TimeRangePreset> {
        self.presets.iter().find(|p| p.value() == value)
    }

    pub fn find_by_duration(&self, duration: Duration) -> Option<&TimeRangePreset> {
        let ms = duration.num_milliseconds();
        self.presets.iter().find(|p| p.duration_ms() == ms)
    }

    /// Look up a preset from a loose label such as `"1w"` or `"24h"`.
    pub fn resolve_label(&self, label: &str) -> Option<&TimeRangePreset> {
        let label = label.trim().to_lowercase();
        self.find(&label)
            .or_else(|| self.find(normalize_preset_value(&label)))
    }
}

/// Map common aliases onto the canonical preset values.
fn normalize_preset_value(value: &str) -> &str {
    match value {
        "1w" => "7d",
        "1mo" => "30d",
        "3mo" => "90d",
        "1d" => "24h",
        "60m" => "1h",
        other => other,
    }
}
