//! The simulation clock.
//!
//! Every per-client machine in Tickward measures time in ticks, never in
//! wall-clock time. A [`Clock`] is a tiny copyable snapshot of "which tick is
//! it and how many ticks make a second", handed to every machine that needs
//! to count down or run something periodically.
//!
//! Because nothing samples `Instant::now()`, pausing the process (or the
//! scheduler) simply stops the tick counter and every timer freezes with it.

use serde::{Deserialize, Serialize};

/// A snapshot of the global tick counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    tick: u64,
    rate: u32,
}

impl Clock {
    /// Creates a clock at `tick` for a simulation running at `rate` Hz.
    ///
    /// A rate of 0 is bumped to 1 so interval arithmetic never divides by zero.
    pub fn new(tick: u64, rate: u32) -> Self {
        Self {
            tick,
            rate: rate.max(1),
        }
    }

    /// The current tick number.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Ticks per second.
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Returns a copy of the clock advanced by one tick.
    pub fn next(self) -> Self {
        Self {
            tick: self.tick + 1,
            ..self
        }
    }

    /// `true` on every tick that is a multiple of `ticks`.
    ///
    /// An interval of 0 is treated as 1 (fires every tick).
    pub fn every(&self, ticks: u64) -> bool {
        self.tick % ticks.max(1) == 0
    }

    /// `true` once every `seconds` seconds (`tick % (rate * seconds) == 0`).
    pub fn every_secs(&self, seconds: u64) -> bool {
        self.every(self.secs_to_ticks(seconds))
    }

    /// Converts whole seconds to ticks at this clock's rate.
    pub fn secs_to_ticks(&self, seconds: u64) -> u64 {
        seconds.saturating_mul(self.rate as u64)
    }

    /// Splits a tick count into whole seconds and hundredths of a second.
    pub fn split_ticks(&self, ticks: u64) -> (u64, u64) {
        let rate = self.rate as u64;
        let secs = ticks / rate;
        let hundredths = (ticks - secs * rate) * 100 / rate;
        (secs, hundredths)
    }

    /// The tick `ticks` ticks from now.
    pub fn deadline(&self, ticks: u64) -> u64 {
        self.tick.saturating_add(ticks)
    }

    /// `true` once the clock has reached (or passed) `deadline`.
    pub fn reached(&self, deadline: u64) -> bool {
        self.tick >= deadline
    }
}
