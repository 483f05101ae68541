//! Controller configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RangeError, Result};
use crate::format::{parse_display_zone, FormatOptions};
use crate::parser::{ParseOptions, WeekStartDay};

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_LIVE_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_FALLBACK_TIMEOUT_MS: u64 = 10_000;

/// Settings for one range controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Quiet period after the last keystroke before input is parsed.
    pub debounce_ms: u64,
    /// Period of the live-mode refresh.
    pub live_interval_ms: u64,
    /// Zone for calendar boundaries and display. IANA names set both;
    /// fixed offsets (`"UTC-08:00"`) only affect display.
    pub timezone: Option<String>,
    pub week_start: WeekStartDay,
    /// Escalate unparseable input to the fallback resolver.
    pub enable_fallback: bool,
    pub fallback: Option<FallbackConfig>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            live_interval_ms: DEFAULT_LIVE_INTERVAL_MS,
            timezone: None,
            week_start: WeekStartDay::default(),
            enable_fallback: false,
            fallback: None,
        }
    }
}

/// Where and how to reach the natural-language resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackConfig {
    pub api_url: String,
    #[serde(default)]
    pub auth_headers: BTreeMap<String, String>,
    #[serde(default = "default_fallback_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_fallback_timeout_ms() -> u64 {
    DEFAULT_FALLBACK_TIMEOUT_MS
}

impl FallbackConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            auth_headers: BTreeMap::new(),
            timeout_ms: DEFAULT_FALLBACK_TIMEOUT_MS,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ControllerConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ControllerConfig = serde_json::from_str(json)
            .map_err(|e| RangeError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::InvalidConfig`] for a zero live interval, a zero
    /// fallback timeout, or fallback enabled without an API URL, and
    /// [`RangeError::InvalidTimezone`] for an unknown timezone.
    pub fn validate(&self) -> Result<()> {
        if self.live_interval_ms == 0 {
            return Err(RangeError::InvalidConfig(
                "live_interval_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(tz) = &self.timezone {
            parse_display_zone(tz)?;
        }
        if let Some(fallback) = &self.fallback {
            if fallback.timeout_ms == 0 {
                return Err(RangeError::InvalidConfig(
                    "fallback.timeout_ms must be greater than zero".to_string(),
                ));
            }
        }
        if self.enable_fallback {
            match &self.fallback {
                Some(fallback) if !fallback.api_url.trim().is_empty() => {}
                _ => {
                    return Err(RangeError::InvalidConfig(
                        "enable_fallback requires fallback.api_url".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn live_interval(&self) -> Duration {
        Duration::from_millis(self.live_interval_ms)
    }

    /// Parser options derived from this config.
    ///
    /// A fixed-offset timezone keeps UTC calendar boundaries.
    pub fn parse_options(&self) -> ParseOptions {
        let mut options = self
            .timezone
            .as_deref()
            .and_then(|tz| ParseOptions::with_timezone(tz).ok())
            .unwrap_or_default();
        options.week_start = self.week_start;
        options
    }

    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            timezone: self.timezone.clone(),
        }
    }
}
