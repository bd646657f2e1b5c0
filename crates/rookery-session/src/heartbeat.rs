//! Heartbeat cadence.
//!
//! The session sends a heartbeat whenever `now >= last + interval`, then
//! restarts the interval from `now`. Time is always passed in, never read
//! here, so the schedule can be tested without sleeping.

use std::time::{Duration, Instant};

/// When the next heartbeat is due.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    interval: Duration,
    last: Instant,
}

impl Heartbeat {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last: now,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Replaces the interval (e.g. with the server's keep-alive value).
    ///
    /// A zero interval is kept as given and makes every poll due.
    pub fn set_interval(&mut self, interval: Duration) {
        if interval.is_zero() {
            tracing::debug!("zero heartbeat interval, heartbeat on every tick");
        }
        self.interval = interval;
    }

    pub fn last(&self) -> Instant {
        self.last
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.last
            .checked_add(self.interval)
            .is_some_and(|next| now >= next)
    }

    /// Restarts the interval at `now`.
    pub fn reset(&mut self, now: Instant) {
        self.last = now;
    }

    /// Returns true (and restarts the interval) if a heartbeat is due.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.last = now;
        true
    }
}
