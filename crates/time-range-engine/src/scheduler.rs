//! Clock and timer capability used by the controller.
//!
//! Debounce delays, live ticks and resolver timeouts all go through a
//! [`Scheduler`], so hosts can substitute their own event loop and tests can
//! drive virtual time.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

pub trait Scheduler: Send + Sync + fmt::Debug {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;

    /// A future that completes after `duration`.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Scheduler backed by tokio timers.
///
/// Wall-clock time is derived from tokio's monotonic clock relative to an
/// origin, so pausing or advancing tokio time (`tokio::time::pause`,
/// `tokio::time::advance`) moves `now()` along with the timers.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    origin: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl TokioScheduler {
    /// Anchor at the system clock.
    pub fn system() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Anchor at a fixed instant.
    pub fn starting_at(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.started.elapsed();
        chrono::Duration::from_std(elapsed)
            .ok()
            .and_then(|elapsed| self.origin.checked_add_signed(elapsed))
            .unwrap_or(self.origin)
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
