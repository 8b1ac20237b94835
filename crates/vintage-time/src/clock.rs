/// Monotonic virtual clock shared by every device on a bus.
///
/// Time is counted in nanoseconds. [`crate::TIMER_USEC`] converts device-facing microsecond
/// latches into clock units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Clock {
    now_ns: u64,
}

impl Clock {
    pub const fn new() -> Self {
        Self { now_ns: 0 }
    }

    /// Returns the current virtual time, in nanoseconds.
    #[inline]
    pub const fn now_ns(&self) -> u64 {
        self.now_ns
    }

    /// Advances the clock by `ns` nanoseconds, saturating at `u64::MAX`.
    #[inline]
    pub fn advance(&mut self, ns: u64) {
        self.now_ns = self.now_ns.saturating_add(ns);
    }

    /// Moves the clock to `now_ns`.
    ///
    /// The timer loop uses this to jump straight to the next due deadline. Moving backwards is
    /// accepted; callers own the consistency of any pending timers.
    #[inline]
    pub fn set_now_ns(&mut self, now_ns: u64) {
        self.now_ns = now_ns;
    }
}

#[cfg(test)]
mod tests {
    use super::Clock;

    #[test]
    fn advance_saturates_instead_of_wrapping() {
        let mut clock = Clock::new();
        clock.set_now_ns(u64::MAX - 1);
        clock.advance(10);
        assert_eq!(clock.now_ns(), u64::MAX);
    }
}
