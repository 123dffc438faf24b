//! Fixed-tick countdowns.
//!
//! Every wait in the bridge is a counter decremented once per poll. A
//! countdown at zero is expired; nothing here reads a wall clock.

/// POTS signaling poll period.
pub const POTS_TICK_MS: u32 = 10;
/// Cellular call machine poll period.
pub const CELL_TICK_MS: u32 = 20;
/// Call orchestrator poll period.
pub const CALL_TICK_MS: u32 = 50;

/// Deadline measured in poll ticks.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Countdown {
    remaining: u32,
}

impl Countdown {
    /// An already-expired countdown.
    #[must_use]
    pub const fn expired() -> Self {
        Self { remaining: 0 }
    }

    #[must_use]
    pub const fn ticks(remaining: u32) -> Self {
        Self { remaining }
    }

    /// Converts a millisecond duration into whole ticks, rounding down.
    #[must_use]
    pub const fn from_millis(millis: u32, tick_ms: u32) -> Self {
        Self::ticks(millis / tick_ms)
    }

    /// Consumes one tick and reports whether the deadline has passed.
    pub fn tick(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining == 0
    }

    #[must_use]
    pub const fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }
}

/// Counts ticks upward from a reset point.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Elapsed {
    ticks: u32,
}

impl Elapsed {
    #[must_use]
    pub const fn new() -> Self {
        Self { ticks: 0 }
    }

    pub fn reset(&mut self) {
        self.ticks = 0;
    }

    /// Advances by one tick and returns the new count.
    pub fn tick(&mut self) -> u32 {
        self.ticks = self.ticks.saturating_add(1);
        self.ticks
    }

    #[must_use]
    pub const fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Returns `true` once at least `millis` worth of `tick_ms` ticks have elapsed.
    #[must_use]
    pub const fn reached(&self, millis: u32, tick_ms: u32) -> bool {
        self.ticks >= millis / tick_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_expires_after_exact_tick_count() {
        let mut countdown = Countdown::from_millis(30, POTS_TICK_MS);
        assert!(!countdown.tick());
        assert!(!countdown.tick());
        assert!(countdown.tick());
        assert!(countdown.tick(), "stays expired");
    }

    #[test]
    fn zero_length_countdown_is_already_expired() {
        assert!(Countdown::from_millis(5, POTS_TICK_MS).is_expired());
        assert!(Countdown::expired().is_expired());
    }

    #[test]
    fn elapsed_reaches_threshold() {
        let mut elapsed = Elapsed::new();
        for _ in 0..79 {
            elapsed.tick();
        }
        assert!(!elapsed.reached(4_000, CALL_TICK_MS));
        elapsed.tick();
        assert!(elapsed.reached(4_000, CALL_TICK_MS));
    }
}
