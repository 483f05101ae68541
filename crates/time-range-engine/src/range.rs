//! Core value types: the resolved [`TimeRange`] and the [`ParseOutcome`]
//! every resolution path produces.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RangeError;

/// A half-open window `[start, end)` between two UTC instants.
///
/// The bounds are always ordered: constructors swap them when given in
/// reverse, and deserialization goes through the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RangeBounds")]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RangeBounds {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl From<RangeBounds> for TimeRange {
    fn from(bounds: RangeBounds) -> Self {
        TimeRange::new(bounds.start, bounds.end)
    }
}

impl TimeRange {
    /// Build a range from two instants, swapping them if `a > b`.
    pub fn new(a: DateTime<Utc>, b: DateTime<Utc>) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// The window of `width` that ends at `now`.
    ///
    /// Negative widths are treated as their absolute value.
    pub fn ending_at(now: DateTime<Utc>, width: Duration) -> Self {
        let width = width.abs();
        let start = now.checked_sub_signed(width).unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { start, end: now }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Width of the window (`end - start`, never negative).
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether this is a zero-width "point" selection.
    pub fn is_point(&self) -> bool {
        self.start == self.end
    }

    /// Half-open containment: `start <= t < end`.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

/// Which path produced a resolved range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    Grammar,
    Fallback,
    Preset,
    Calendar,
    /// Seeded from a controlled value owned by the host.
    External,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::Grammar => "grammar",
            ResolutionSource::Fallback => "fallback",
            ResolutionSource::Preset => "preset",
            ResolutionSource::Calendar => "calendar",
            ResolutionSource::External => "external",
        }
    }
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an input could not be turned into a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    Unparseable,
    FallbackError,
    FallbackTimeout,
    InternalError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Unparseable => "unparseable",
            FailureReason::FallbackError => "fallback-error",
            FailureReason::FallbackTimeout => "fallback-timeout",
            FailureReason::InternalError => "internal-error",
        }
    }

    /// Short user-facing text shown in place of an interpretation.
    pub fn message(&self) -> &'static str {
        match self {
            FailureReason::Unparseable => "could not understand input",
            FailureReason::FallbackError => "could not reach the time range service",
            FailureReason::FallbackTimeout => "the time range service took too long",
            FailureReason::InternalError => "something went wrong reading that input",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&RangeError> for FailureReason {
    fn from(err: &RangeError) -> Self {
        match err {
            RangeError::UnparseableInput(_) => FailureReason::Unparseable,
            RangeError::FallbackUnavailable(_) => FailureReason::FallbackError,
            #[cfg(feature = "controller")]
            RangeError::Http(e) if e.is_timeout() => FailureReason::FallbackTimeout,
            #[cfg(feature = "controller")]
            RangeError::Http(_) => FailureReason::FallbackError,
            RangeError::InvalidTimezone(_)
            | RangeError::InvalidPreset(_)
            | RangeError::InvalidConfig(_) => FailureReason::InternalError,
        }
    }
}

/// The result of interpreting one piece of input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ParseOutcome {
    Resolved {
        range: TimeRange,
        interpretation: String,
        source: ResolutionSource,
    },
    /// Several plausible windows. Consumers currently take the first one,
    /// see [`ParseOutcome::collapse`].
    Ambiguous { candidates: Vec<TimeRange> },
    Failed { reason: FailureReason },
}

impl ParseOutcome {
    pub fn resolved(
        range: TimeRange,
        interpretation: impl Into<String>,
        source: ResolutionSource,
    ) -> Self {
        ParseOutcome::Resolved {
            range,
            interpretation: interpretation.into(),
            source,
        }
    }

    pub fn failed(reason: FailureReason) -> Self {
        ParseOutcome::Failed { reason }
    }

    pub fn range(&self) -> Option<TimeRange> {
        match self {
            ParseOutcome::Resolved { range, .. } => Some(*range),
            ParseOutcome::Ambiguous { candidates } => candidates.first().copied(),
            ParseOutcome::Failed { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ParseOutcome::Resolved { .. })
    }

    pub fn failure(&self) -> Option<FailureReason> {
        match self {
            ParseOutcome::Failed { reason } => Some(*reason),
            _ => None,
        }
    }

    /// Reduce an `Ambiguous` outcome to its first candidate.
    ///
    /// `interpret` builds the interpretation for the chosen range. An empty
    /// candidate list or a zero-width first candidate becomes `Failed(unparseable)`.
    /// Other variants pass through unchanged.
    pub fn collapse(
        self,
        source: ResolutionSource,
        interpret: impl FnOnce(&TimeRange) -> String,
    ) -> Self {
        match self {
            ParseOutcome::Ambiguous { candidates } => match candidates.first() {
                Some(range) if !range.is_point() => {
                    let interpretation = interpret(range);
                    ParseOutcome::resolved(*range, interpretation, source)
                }
                _ => ParseOutcome::failed(FailureReason::Unparseable),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_new_swaps_reversed_bounds() {
        let range = TimeRange::new(at(12, 0), at(11, 0));
        assert_eq!(range.start(), at(11, 0));
        assert_eq!(range.end(), at(12, 0));
    }

    #[test]
    fn test_ending_at_keeps_width() {
        let range = TimeRange::ending_at(at(12, 0), Duration::minutes(15));
        assert_eq!(range.start(), at(11, 45));
        assert_eq!(range.duration(), Duration::minutes(15));
    }

    #[test]
    fn test_contains_is_half_open() {
        let range = TimeRange::new(at(11, 0), at(12, 0));
        assert!(range.contains(at(11, 0)));
        assert!(range.contains(at(11, 59)));
        assert!(!range.contains(at(12, 0)));
    }

    #[test]
    fn test_deserialize_swaps_reversed_bounds() {
        let json = r#"{"start":"2024-01-01T12:00:00Z","end":"2024-01-01T11:00:00Z"}"#;
        let range: TimeRange = serde_json::from_str(json).unwrap();
        assert_eq!(range.start(), at(11, 0));
    }

    #[test]
    fn test_failure_reason_strings() {
        assert_eq!(FailureReason::Unparseable.to_string(), "unparseable");
        assert_eq!(FailureReason::FallbackError.as_str(), "fallback-error");
        let json = serde_json::to_string(&FailureReason::InternalError).unwrap();
        assert_eq!(json, "\"internal-error\"");
    }

    #[test]
    fn test_collapse_takes_first_candidate() {
        let first = TimeRange::new(at(10, 0), at(11, 0));
        let second = TimeRange::new(at(8, 0), at(9, 0));
        let outcome = ParseOutcome::Ambiguous {
            candidates: vec![first, second],
        }
        .collapse(ResolutionSource::Fallback, |_| "picked".to_string());
        assert_eq!(
            outcome,
            ParseOutcome::resolved(first, "picked", ResolutionSource::Fallback)
        );
    }

    #[test]
    fn test_collapse_empty_candidates_fails() {
        let outcome = ParseOutcome::Ambiguous { candidates: vec![] }
            .collapse(ResolutionSource::Fallback, |_| String::new());
        assert_eq!(outcome.failure(), Some(FailureReason::Unparseable));
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = ParseOutcome::failed(FailureReason::Unparseable);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "unparseable");
    }
}
