//! # Absolute Time and Clock Sources
//!
//! Time handling for record and pick timestamps. All absolute times are
//! seconds since the Unix epoch stored as `f64`, which keeps arithmetic with
//! sampling intervals and lags trivial while retaining sub-microsecond
//! resolution for present-day epochs.
//!
//! The on-hold expiry of candidate events is the only wall-clock dependent
//! policy in the engine, so "now" is obtained through the [`Clock`] trait.
//! Production uses [`SystemClock`]; playback and tests drive a
//! [`ManualClock`] so expiry fires deterministically on record time.
//!
//! ## Example
//!
//! ```rust
//! use quakematch_core::time::{Clock, ManualClock, Time};
//!
//! let clock = ManualClock::new(Time::from_epoch(100.0));
//! clock.advance(2.5);
//! assert_eq!(clock.now() - Time::from_epoch(100.0), 2.5);
//! ```

use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// An absolute point in time, seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Time {
    secs: f64,
}

impl Time {
    /// Create a time from seconds since the Unix epoch.
    pub fn from_epoch(secs: f64) -> Self {
        Self { secs }
    }

    /// Seconds since the Unix epoch.
    pub fn epoch_secs(&self) -> f64 {
        self.secs
    }

    /// ISO 8601 representation with millisecond precision (UTC).
    pub fn iso(&self) -> String {
        let total = self.secs;
        let mut days = (total / 86_400.0).floor() as i64;
        let mut rem = total - days as f64 * 86_400.0;
        if rem < 0.0 {
            days -= 1;
            rem += 86_400.0;
        }
        let (year, month, day) = civil_from_days(days);
        let hour = (rem / 3600.0) as u32;
        let minute = ((rem % 3600.0) / 60.0) as u32;
        let second = rem % 60.0;
        format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:06.3}Z")
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.iso())
    }
}

impl Add<f64> for Time {
    type Output = Time;

    fn add(self, span_secs: f64) -> Time {
        Time::from_epoch(self.secs + span_secs)
    }
}

impl AddAssign<f64> for Time {
    fn add_assign(&mut self, span_secs: f64) {
        self.secs += span_secs;
    }
}

impl Sub<f64> for Time {
    type Output = Time;

    fn sub(self, span_secs: f64) -> Time {
        Time::from_epoch(self.secs - span_secs)
    }
}

impl Sub<Time> for Time {
    type Output = f64;

    /// Span between two times, in seconds.
    fn sub(self, other: Time) -> f64 {
        self.secs - other.secs
    }
}

/// Days-since-epoch to civil date (proleptic Gregorian).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

/// A replaceable source of "now".
///
/// The linker derives candidate-event expiry from this clock rather than
/// from record timestamps.
pub trait Clock {
    /// The current time.
    fn now(&self) -> Time;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Time {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        Time::from_epoch(secs)
    }
}

/// A manually driven clock for playback and tests.
///
/// Cloned handles share the same underlying time cell, so a test can keep a
/// handle while the linker owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    cell: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a manual clock starting at the given time.
    pub fn new(start: Time) -> Self {
        Self {
            cell: Arc::new(AtomicU64::new(start.epoch_secs().to_bits())),
        }
    }

    /// Set the current time.
    pub fn set(&self, time: Time) {
        self.cell
            .store(time.epoch_secs().to_bits(), Ordering::Relaxed);
    }

    /// Advance the current time by the given number of seconds.
    pub fn advance(&self, span_secs: f64) {
        let now = f64::from_bits(self.cell.load(Ordering::Relaxed));
        self.cell
            .store((now + span_secs).to_bits(), Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Time {
        Time::from_epoch(f64::from_bits(self.cell.load(Ordering::Relaxed)))
    }
}
