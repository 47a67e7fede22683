//! Clock and sleep seams.
//!
//! The token manager reads the current time through [`Clock`] and the request
//! executor waits between attempts through [`Sleeper`], so both can be
//! replaced in tests.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Blocks the calling thread between retry attempts.
pub trait Sleeper: Send + Sync + fmt::Debug {
    /// Wait for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeps with [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
