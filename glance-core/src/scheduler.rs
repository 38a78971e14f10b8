//! Periodic duty scheduling
//!
//! The main loop owns a free-running millisecond counter that wraps at
//! `u32::MAX`. Each duty fires once at least its period has elapsed since
//! it last fired; elapsed time is computed with wrapping subtraction so
//! the wrap (every ~49.7 days) is invisible.

/// Default clock band refresh period
pub const CLOCK_PERIOD_MS: u32 = 1_000;

/// Default feed resynchronization period
pub const SYNC_PERIOD_MS: u32 = 120_000;

/// A single periodic duty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cadence {
    period_ms: u32,
    last_ms: u32,
}

impl Cadence {
    pub const fn new(period_ms: u32) -> Self {
        Self {
            period_ms,
            last_ms: 0,
        }
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    /// Restart the period at `now_ms`
    pub fn arm(&mut self, now_ms: u32) {
        self.last_ms = now_ms;
    }

    pub fn is_due(&self, now_ms: u32) -> bool {
        now_ms.wrapping_sub(self.last_ms) >= self.period_ms
    }

    /// If due, re-arm at `now_ms` and return true
    pub fn poll(&mut self, now_ms: u32) -> bool {
        let due = self.is_due(now_ms);
        if due {
            self.arm(now_ms);
        }
        due
    }
}

/// Duties that came due in one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Due {
    /// Redraw the clock band
    pub clock: bool,
    /// Resynchronize the feed
    pub sync: bool,
}

/// Clock and sync cadences of the main loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Scheduler {
    clock: Cadence,
    sync: Cadence,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(CLOCK_PERIOD_MS, SYNC_PERIOD_MS)
    }
}

impl Scheduler {
    pub const fn new(clock_period_ms: u32, sync_period_ms: u32) -> Self {
        Self {
            clock: Cadence::new(clock_period_ms),
            sync: Cadence::new(sync_period_ms),
        }
    }

    /// Restart both periods at `now_ms`
    pub fn arm(&mut self, now_ms: u32) {
        self.clock.arm(now_ms);
        self.sync.arm(now_ms);
    }

    /// Collect due duties, re-arming each one that fired
    pub fn poll(&mut self, now_ms: u32) -> Due {
        Due {
            clock: self.clock.poll(now_ms),
            sync: self.sync.poll(now_ms),
        }
    }
}
