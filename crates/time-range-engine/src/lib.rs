//! # time-range-engine
//!
//! Deterministic interpretation of human-typed time ranges.
//!
//! The engine turns expressions such as `"15m"`, `"yesterday"`,
//! `"3 days ago"` or `"last week"` into concrete `[start, end)` instant pairs
//! relative to an injected "now", and drives the state machine behind a
//! time-range control: debounced input, presets, calendar selections, an
//! optional natural-language fallback, and a live mode that keeps the window
//! anchored to the present.
//!
//! ## Modules
//!
//! - [`range`] — `TimeRange`, `ParseOutcome` and failure reasons
//! - [`preset`] — Default and caller-supplied preset catalogs
//! - [`parser`] — The deterministic expression grammar
//! - [`format`] — Canonical range formatting and relative descriptions
//! - [`config`] — Controller and fallback configuration
//! - [`fallback`] — Natural-language resolver boundary (feature `controller`)
//! - [`scheduler`] — Injectable clock and timers (feature `controller`)
//! - [`controller`] — The range controller state machine (feature `controller`)
//! - [`error`] — Error types

pub mod config;
pub mod error;
pub mod format;
pub mod parser;
pub mod preset;
pub mod range;

#[cfg(feature = "controller")]
pub mod controller;
#[cfg(feature = "controller")]
pub mod fallback;
#[cfg(feature = "controller")]
pub mod scheduler;

pub use config::{ControllerConfig, FallbackConfig};
pub use error::{RangeError, Result};
pub use format::{describe_time_range, format_time_range, FormatOptions};
pub use parser::{parse_time_range, parse_time_range_with_options, ParseOptions, WeekStartDay};
pub use preset::{list_defaults, PresetCatalog, TimeRangePreset};
pub use range::{FailureReason, ParseOutcome, ResolutionSource, TimeRange};

#[cfg(feature = "controller")]
pub use controller::{ControllerState, Phase, RangeChange, RangeController, RangeControllerBuilder};
#[cfg(feature = "controller")]
pub use fallback::{FallbackResolver, HttpFallbackResolver};
#[cfg(feature = "controller")]
pub use scheduler::{Scheduler, TokioScheduler};
