//! Injected clock — every store takes one so tests are deterministic.
//!
//! Mirrors the teacher's injected-clock discipline (`aura-core::time`):
//! production code reaches for `SystemClock`, tests reach for `FixedClock`
//! or `StepClock`, and nothing in the core ever calls `Utc::now()` directly.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// A source of the current instant, injected into every component that
/// needs timestamps (audit log, revocation registry, approval subsystem).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time via `Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to a single instant, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn at(ts: DateTime<Utc>) -> Self {
        Self(ts)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A clock that advances by a fixed step every time it is read, for tests
/// that need strictly increasing but still deterministic timestamps.
pub struct StepClock {
    start_millis: i64,
    step_millis: i64,
    ticks: AtomicI64,
}

impl StepClock {
    pub fn new(start: DateTime<Utc>, step_millis: i64) -> Self {
        Self {
            start_millis: start.timestamp_millis(),
            step_millis,
            ticks: AtomicI64::new(0),
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        let millis = self.start_millis + tick * self.step_millis;
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }
}

/// The fixed instant used across the workspace's deterministic test
/// scenarios: `2025-01-15T10:00:00Z`.
pub fn test_epoch() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-01-15T10:00:00Z")
        .expect("valid constant timestamp")
        .with_timezone(&Utc)
}
