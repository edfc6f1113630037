//! # Timestamp Oracle
//!
//! Time-gated contract behavior (dispute windows, withdrawal eligibility)
//! must be reproducible in tests. The contracts therefore never call
//! `Utc::now()` themselves -- every time-sensitive operation takes a
//! [`Clock`], and the host decides which one.
//!
//! Production code passes [`SystemClock`]. Tests pass a [`ManualClock`] and
//! advance it explicitly, the same way a chain test harness fast-forwards
//! block timestamps.

use std::cell::Cell;

use chrono::{DateTime, Duration, Utc};

/// A monotonic source of timestamps.
///
/// Implementations are expected to never move backwards between calls made
/// by the same host. ([`ManualClock::set`] can rewind, but that is a test
/// affordance -- don't do it mid-scenario.)
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The production clock: reads the operating system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A hand-driven clock for deterministic tests and simulations.
///
/// The Rust analog of a test network's `time.increase`: create one at a
/// fixed instant, hand it to the contract under test, and advance it to
/// cross delay thresholds without waiting.
#[derive(Debug)]
pub struct ManualClock {
    current: Cell<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Cell::new(start),
        }
    }

    /// Moves the clock forward by `secs` seconds.
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::seconds(secs as i64));
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.current.set(self.current.get() + delta);
    }

    /// Sets the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        self.current.set(instant);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.current.get()
    }
}
