//! The range controller: one state machine per time-range control.
//!
//! It owns the input text, the current outcome, the live flag and every
//! timer. Typed input is debounced, parsed with the grammar, and escalated
//! to the fallback resolver when enabled. Presets and calendar selections
//! bypass parsing. Live mode slides the last resolved width forward on a
//! fixed interval.
//!
//! Every user action bumps a generation counter. Debounced parses and
//! resolver calls carry the generation they were started under and are
//! dropped on arrival if it has moved on.
//!
//! Consumers observe the controller two ways:
//! - [`RangeController::watch`] yields every state snapshot;
//! - [`RangeController::subscribe`] yields one [`RangeChange`] per applied
//!   resolution or live tick, never per keystroke.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::config::{ControllerConfig, DEFAULT_FALLBACK_TIMEOUT_MS};
use crate::error::{RangeError, Result};
use crate::fallback::{FallbackResolver, HttpFallbackResolver};
use crate::format::{describe_time_range, format_time_range, FormatOptions};
use crate::parser::{parse_time_range_with_options, ParseOptions};
use crate::preset::{PresetCatalog, TimeRangePreset};
use crate::range::{FailureReason, ParseOutcome, ResolutionSource, TimeRange};
use crate::scheduler::{Scheduler, TokioScheduler};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

type GrammarFn = dyn Fn(&str, DateTime<Utc>, &ParseOptions) -> ParseOutcome + Send + Sync;

/// The grammar entry point the controller parses with.
#[derive(Clone)]
struct Grammar(Arc<GrammarFn>);

impl Default for Grammar {
    fn default() -> Self {
        Self(Arc::new(parse_time_range_with_options))
    }
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Grammar")
    }
}

// ── Public state ────────────────────────────────────────────────────────────

/// Where the controller is in the input lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    /// Input changed, parse not yet attempted.
    Typing,
    Parsing,
    /// Waiting on the fallback resolver.
    Resolving,
    Resolved,
    Errored,
}

/// A snapshot of one controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ControllerState {
    pub input_text: String,
    pub outcome: Option<ParseOutcome>,
    pub is_live: bool,
    /// True only while a resolver call for the current input is in flight.
    pub is_resolving: bool,
    /// The range most recently applied. Survives failed parses.
    pub last_applied_range: Option<TimeRange>,
    pub phase: Phase,
}

impl ControllerState {
    /// The text to show next to the control.
    pub fn interpretation(&self) -> Option<&str> {
        match self.outcome.as_ref()? {
            ParseOutcome::Resolved { interpretation, .. } => Some(interpretation),
            ParseOutcome::Failed { reason } => Some(reason.message()),
            ParseOutcome::Ambiguous { .. } => None,
        }
    }
}

/// Emitted once per applied resolution and once per live tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeChange {
    pub range: TimeRange,
    pub source: ResolutionSource,
    pub live: bool,
}

// ── Builder ─────────────────────────────────────────────────────────────────

/// Assembles a [`RangeController`].
#[derive(Debug, Default)]
pub struct RangeControllerBuilder {
    config: ControllerConfig,
    scheduler: Option<Arc<dyn Scheduler>>,
    resolver: Option<Arc<dyn FallbackResolver>>,
    catalog: Option<PresetCatalog>,
    initial_value: Option<TimeRange>,
    initial_input: Option<String>,
    grammar: Grammar,
}

impl RangeControllerBuilder {
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Use `resolver` instead of an HTTP resolver built from the config.
    pub fn resolver(mut self, resolver: Arc<dyn FallbackResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn catalog(mut self, catalog: PresetCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Seed from an externally owned range. Not emitted.
    pub fn initial_value(mut self, range: TimeRange) -> Self {
        self.initial_value = Some(range);
        self
    }

    /// Seed the input box. Not parsed until the next edit.
    pub fn initial_input(mut self, text: impl Into<String>) -> Self {
        self.initial_input = Some(text.into());
        self
    }

    #[cfg(test)]
    fn grammar(
        mut self,
        parse: impl Fn(&str, DateTime<Utc>, &ParseOptions) -> ParseOutcome + Send + Sync + 'static,
    ) -> Self {
        self.grammar = Grammar(Arc::new(parse));
        self
    }

    /// Validate the configuration and start the controller on the current
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::InvalidConfig`] for an invalid config or when
    /// called outside a tokio runtime, and any error from building the HTTP
    /// fallback resolver.
    pub fn build(self) -> Result<RangeController> {
        self.config.validate()?;
        let runtime = Handle::try_current().map_err(|e| {
            RangeError::InvalidConfig(format!("range controller needs a tokio runtime: {e}"))
        })?;

        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(TokioScheduler::system()));
        let resolver = match (self.resolver, &self.config.fallback) {
            (Some(resolver), _) => Some(resolver),
            (None, Some(fallback)) if self.config.enable_fallback => {
                let resolver = HttpFallbackResolver::new(fallback, self.config.timezone.as_deref())?;
                Some(Arc::new(resolver) as Arc<dyn FallbackResolver>)
            }
            (None, _) => None,
        };

        let parse_options = self.config.parse_options();
        let format_options = self.config.format_options();

        let mut state = ControllerState::default();
        let mut last_source = None;
        if let Some(range) = self.initial_value {
            let text = format_time_range(&range, &format_options);
            state.input_text = text.clone();
            state.outcome = Some(ParseOutcome::resolved(range, text, ResolutionSource::External));
            state.last_applied_range = Some(range);
            state.phase = Phase::Resolved;
            last_source = Some(ResolutionSource::External);
        }
        if let Some(text) = self.initial_input {
            state.input_text = text;
        }

        let (state_tx, _) = watch::channel(state.clone());
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Ok(RangeController {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state,
                    generation: 0,
                    debounce: None,
                    in_flight: Vec::new(),
                    ticker: None,
                    live_width: None,
                    last_source,
                    closed: false,
                }),
                config: self.config,
                grammar: self.grammar,
                parse_options,
                format_options,
                catalog: self.catalog.unwrap_or_default(),
                scheduler,
                resolver,
                runtime,
                state_tx,
                changes,
            }),
        })
    }
}

// ── Controller ──────────────────────────────────────────────────────────────

/// A time-range control's state machine.
///
/// Dropping the controller cancels every pending timer and resolver call.
#[derive(Debug)]
pub struct RangeController {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    inner: Mutex<Inner>,
    config: ControllerConfig,
    grammar: Grammar,
    parse_options: ParseOptions,
    format_options: FormatOptions,
    catalog: PresetCatalog,
    scheduler: Arc<dyn Scheduler>,
    resolver: Option<Arc<dyn FallbackResolver>>,
    runtime: Handle,
    state_tx: watch::Sender<ControllerState>,
    changes: broadcast::Sender<RangeChange>,
}

#[derive(Debug)]
struct Inner {
    state: ControllerState,
    generation: u64,
    debounce: Option<JoinHandle<()>>,
    /// Resolver calls still running. Superseded calls stay here until they
    /// finish or the controller is cleared.
    in_flight: Vec<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
    live_width: Option<chrono::Duration>,
    /// Source of the last applied range, carried by live ticks.
    last_source: Option<ResolutionSource>,
    closed: bool,
}

impl Inner {
    /// Start a new generation, cancelling the pending debounce.
    fn supersede(&mut self) -> u64 {
        self.generation += 1;
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
        self.state.is_resolving = false;
        self.generation
    }

    fn stop_live(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
        self.state.is_live = false;
        self.live_width = None;
    }

    fn abort_all(&mut self) {
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
        for handle in self.in_flight.drain(..) {
            handle.abort();
        }
        self.stop_live();
    }
}

impl RangeController {
    pub fn builder() -> RangeControllerBuilder {
        RangeControllerBuilder::default()
    }

    /// Record typed text and schedule a debounced parse.
    ///
    /// Blank text returns to `Idle` without parsing; the last applied range
    /// is kept.
    pub fn set_input_value(&self, text: &str) {
        let shared = &self.shared;
        let mut inner = shared.inner.lock();
        if inner.closed {
            return;
        }
        let generation = inner.supersede();
        inner.state.input_text = text.to_string();

        if text.trim().is_empty() {
            inner.state.outcome = None;
            inner.state.phase = Phase::Idle;
            shared.publish(&inner);
            return;
        }

        inner.state.phase = Phase::Typing;
        shared.publish(&inner);

        let delay = shared.scheduler.sleep(shared.config.debounce());
        let task_shared = Arc::clone(shared);
        inner.debounce = Some(shared.runtime.spawn(async move {
            delay.await;
            task_shared.run_parse(generation);
        }));
    }

    /// Apply a preset relative to now. Does not touch live mode, but a
    /// running live window adopts the preset's width.
    pub fn select_preset(&self, preset: &TimeRangePreset) {
        let shared = &self.shared;
        let mut inner = shared.inner.lock();
        if inner.closed {
            return;
        }
        inner.supersede();
        let range = preset.range_at(shared.scheduler.now());
        inner.state.input_text = preset.label().to_string();
        shared.commit(
            &mut inner,
            ParseOutcome::resolved(range, preset.label(), ResolutionSource::Preset),
        );
    }

    /// Apply the catalog preset with the given value.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::InvalidPreset`] if the catalog has no such value.
    pub fn select_preset_value(&self, value: &str) -> Result<()> {
        let preset = self
            .shared
            .catalog
            .find(value)
            .cloned()
            .ok_or_else(|| RangeError::InvalidPreset(format!("no preset with value '{value}'")))?;
        self.select_preset(&preset);
        Ok(())
    }

    /// Apply a calendar selection. Bounds are swapped if reversed.
    ///
    /// A missing end or a zero-width selection is still in progress and is
    /// ignored; returns whether the selection was applied. Applying a
    /// calendar range turns live mode off.
    pub fn select_date_range(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> bool {
        let Some(end) = end else {
            return false;
        };
        let range = TimeRange::new(start, end);
        if range.is_point() {
            return false;
        }

        let shared = &self.shared;
        let mut inner = shared.inner.lock();
        if inner.closed {
            return false;
        }
        inner.supersede();
        inner.stop_live();
        let text = format_time_range(&range, &shared.format_options);
        inner.state.input_text = text.clone();
        shared.commit(
            &mut inner,
            ParseOutcome::resolved(range, text, ResolutionSource::Calendar),
        );
        true
    }

    /// Select whole local days, `first` through `last` inclusive.
    pub fn select_days(&self, first: NaiveDate, last: NaiveDate) -> bool {
        let (first, last) = if first <= last { (first, last) } else { (last, first) };
        let tz = self.shared.parse_options.timezone;
        let midnight = |date: NaiveDate| {
            tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
        };
        match (midnight(first), last.succ_opt().and_then(midnight)) {
            (Some(start), Some(end)) => self.select_date_range(start, Some(end)),
            _ => false,
        }
    }

    /// Turn live mode on or off. Returns whether live mode is on afterwards.
    ///
    /// Enabling captures the width of the last applied range and re-anchors
    /// it at now; it fails without a non-empty range to follow. Disabling
    /// freezes the range at its last computed value.
    pub fn set_live(&self, enabled: bool) -> bool {
        let shared = &self.shared;
        let mut inner = shared.inner.lock();
        if inner.closed {
            return false;
        }

        if !enabled {
            if inner.state.is_live {
                inner.stop_live();
                shared.publish(&inner);
            }
            return false;
        }
        if inner.state.is_live {
            return true;
        }

        let width = match inner.state.last_applied_range {
            Some(range) if !range.is_point() => range.duration(),
            _ => {
                tracing::debug!("Live mode requested without a range to follow");
                return false;
            }
        };
        inner.state.is_live = true;
        inner.live_width = Some(width);
        shared.tick_locked(&mut inner);

        let interval = shared.config.live_interval();
        let task_shared = Arc::clone(shared);
        inner.ticker = Some(shared.runtime.spawn(async move {
            loop {
                task_shared.scheduler.sleep(interval).await;
                if !task_shared.tick() {
                    break;
                }
            }
        }));
        true
    }

    /// Reset to an empty control and cancel all pending work.
    pub fn clear(&self) {
        let shared = &self.shared;
        let mut inner = shared.inner.lock();
        if inner.closed {
            return;
        }
        inner.supersede();
        inner.abort_all();
        inner.state = ControllerState::default();
        inner.last_source = None;
        shared.publish(&inner);
    }

    /// Re-seed from an externally owned range without re-parsing or emitting.
    ///
    /// Returns false when the range renders the same as the last applied
    /// one, which is how the controller recognizes its own output coming
    /// back.
    pub fn sync_external(&self, range: TimeRange) -> bool {
        let shared = &self.shared;
        let mut inner = shared.inner.lock();
        if inner.closed {
            return false;
        }
        let text = format_time_range(&range, &shared.format_options);
        if let Some(last) = inner.state.last_applied_range {
            if format_time_range(&last, &shared.format_options) == text {
                return false;
            }
        }

        inner.supersede();
        if inner.state.is_live && !range.is_point() {
            inner.live_width = Some(range.duration());
        }
        inner.state.input_text = text.clone();
        inner.state.outcome = Some(ParseOutcome::resolved(range, text, ResolutionSource::External));
        inner.state.last_applied_range = Some(range);
        inner.state.phase = Phase::Resolved;
        inner.last_source = Some(ResolutionSource::External);
        shared.publish(&inner);
        true
    }

    pub fn snapshot(&self) -> ControllerState {
        self.shared.inner.lock().state.clone()
    }

    /// Receiver of every state snapshot.
    pub fn watch(&self) -> watch::Receiver<ControllerState> {
        self.shared.state_tx.subscribe()
    }

    /// Receiver of applied range changes.
    pub fn subscribe(&self) -> broadcast::Receiver<RangeChange> {
        self.shared.changes.subscribe()
    }

    pub fn presets(&self) -> &[TimeRangePreset] {
        self.shared.catalog.presets()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.shared.config
    }

    /// Cancel every timer and resolver call. Nothing is published afterwards.
    pub fn close(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.closed {
            return;
        }
        inner.generation += 1;
        inner.abort_all();
        inner.closed = true;
        tracing::debug!(generation = inner.generation, "Range controller closed");
    }
}

impl Drop for RangeController {
    fn drop(&mut self) {
        self.close();
    }
}

// ── Internals ───────────────────────────────────────────────────────────────

impl Shared {
    fn publish(&self, inner: &Inner) {
        self.state_tx.send_replace(inner.state.clone());
    }

    fn emit(&self, change: RangeChange) {
        // No receivers is fine.
        let _ = self.changes.send(change);
    }

    fn is_current(&self, inner: &Inner, generation: u64) -> bool {
        if inner.closed || inner.generation != generation {
            tracing::debug!(
                generation,
                current = inner.generation,
                "Discarding superseded result"
            );
            return false;
        }
        true
    }

    /// Debounce elapsed: parse the current input, escalating if allowed.
    fn run_parse(self: &Arc<Self>, generation: u64) {
        let input = {
            let mut inner = self.inner.lock();
            if !self.is_current(&inner, generation) {
                return;
            }
            inner.debounce = None;
            inner.state.phase = Phase::Parsing;
            self.publish(&inner);
            inner.state.input_text.clone()
        };

        let now = self.scheduler.now();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            (self.grammar.0)(&input, now, &self.parse_options)
        }))
        .unwrap_or_else(|_| {
            tracing::error!(generation, input = %input, "Parser panicked");
            ParseOutcome::failed(FailureReason::InternalError)
        });
        tracing::debug!(generation, input = %input, resolved = outcome.is_resolved(), "Parsed input");

        let escalate = self.config.enable_fallback
            && outcome.failure() == Some(FailureReason::Unparseable);
        match &self.resolver {
            Some(resolver) if escalate => {
                self.start_fallback(generation, Arc::clone(resolver), input, now);
            }
            _ => self.apply(generation, outcome),
        }
    }

    fn start_fallback(
        self: &Arc<Self>,
        generation: u64,
        resolver: Arc<dyn FallbackResolver>,
        input: String,
        now: DateTime<Utc>,
    ) {
        let mut inner = self.inner.lock();
        if !self.is_current(&inner, generation) {
            return;
        }
        inner.state.phase = Phase::Resolving;
        inner.state.is_resolving = true;
        self.publish(&inner);

        let timeout_ms = self
            .config
            .fallback
            .as_ref()
            .map_or(DEFAULT_FALLBACK_TIMEOUT_MS, |f| f.timeout_ms);
        let timeout = self
            .scheduler
            .sleep(std::time::Duration::from_millis(timeout_ms));
        let shared = Arc::clone(self);
        inner.in_flight.retain(|handle| !handle.is_finished());
        inner.in_flight.push(self.runtime.spawn(async move {
            let outcome = tokio::select! {
                outcome = resolver.resolve(&input, now) => outcome,
                _ = timeout => {
                    tracing::warn!(generation, timeout_ms, "Fallback resolver timed out");
                    ParseOutcome::failed(FailureReason::FallbackTimeout)
                }
            };
            shared.apply(generation, outcome);
        }));
    }

    /// Land an asynchronous outcome if its generation is still current.
    fn apply(&self, generation: u64, outcome: ParseOutcome) {
        let mut inner = self.inner.lock();
        if !self.is_current(&inner, generation) {
            return;
        }
        let now = self.scheduler.now();
        let outcome = outcome.collapse(ResolutionSource::Fallback, |range| {
            describe_time_range(range, now, &self.format_options)
        });
        let outcome = match outcome {
            ParseOutcome::Resolved {
                range,
                interpretation,
                source: ResolutionSource::Fallback,
            } => {
                let interpretation = self
                    .catalog
                    .resolve_label(&interpretation)
                    .map(|preset| preset.label().to_string())
                    .unwrap_or(interpretation);
                ParseOutcome::resolved(range, interpretation, ResolutionSource::Fallback)
            }
            other => other,
        };
        self.commit(&mut inner, outcome);
    }

    /// Store a final outcome, emitting on success. A failure keeps the last
    /// applied range.
    fn commit(&self, inner: &mut Inner, outcome: ParseOutcome) {
        inner.state.is_resolving = false;
        match &outcome {
            ParseOutcome::Resolved { range, source, .. } => {
                inner.state.phase = Phase::Resolved;
                inner.state.last_applied_range = Some(*range);
                inner.last_source = Some(*source);
                if inner.state.is_live {
                    inner.live_width = Some(range.duration());
                }
                self.emit(RangeChange {
                    range: *range,
                    source: *source,
                    live: inner.state.is_live,
                });
            }
            ParseOutcome::Failed { reason } => {
                tracing::debug!(generation = inner.generation, reason = %reason, "Input not resolved");
                inner.state.phase = Phase::Errored;
            }
            ParseOutcome::Ambiguous { .. } => inner.state.phase = Phase::Errored,
        }
        inner.state.outcome = Some(outcome);
        self.publish(inner);
    }

    /// One live tick. Returns false once live mode is off.
    fn tick(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed || !inner.state.is_live {
            return false;
        }
        self.tick_locked(&mut inner);
        true
    }

    fn tick_locked(&self, inner: &mut Inner) {
        let Some(width) = inner.live_width else {
            return;
        };
        let now = self.scheduler.now();
        let range = TimeRange::ending_at(now, width);

        let source = match inner.state.outcome.take() {
            Some(ParseOutcome::Resolved {
                interpretation,
                source,
                ..
            }) => {
                let interpretation = if source == ResolutionSource::Preset {
                    interpretation
                } else {
                    describe_time_range(&range, now, &self.format_options)
                };
                inner.state.outcome = Some(ParseOutcome::resolved(range, interpretation, source));
                source
            }
            other => {
                inner.state.outcome = other;
                inner.last_source.unwrap_or(ResolutionSource::External)
            }
        };
        inner.state.last_applied_range = Some(range);
        self.emit(RangeChange {
            range,
            source,
            live: true,
        });
        self.publish(inner);
    }
}
