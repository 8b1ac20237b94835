//! Deterministic virtual time for ISA device models.
//!
//! # Design
//!
//! Devices never own threads or wall-clock timers. A [`Clock`] holds the current virtual time
//! and a [`TimerQueue`] holds pending deadlines tagged with a caller-chosen payload. The machine
//! loop repeatedly pops the earliest due event, moves the clock to its deadline, and hands the
//! event to the owning device, which may schedule its own next deadline before doing one unit
//! of work.
//!
//! Interrupts leave devices through the level-triggered [`InterruptSink`] trait.

mod clock;
mod interrupt;
mod timer_queue;

pub use clock::Clock;
pub use interrupt::{Interrupt, InterruptSink, NullInterruptSink};
pub use timer_queue::{TimerEvent, TimerId, TimerQueue};

/// Virtual clock ticks per microsecond. The clock counts nanoseconds.
pub const TIMER_USEC: u64 = 1_000;

pub const NS_PER_SEC: u64 = 1_000_000_000;

/// Timer period for a sample rate, truncated to whole ticks.
///
/// Returns 0 for a zero rate so callers can treat it as "not programmed".
pub fn latch_from_rate_hz(rate_hz: f64) -> u64 {
    if !(rate_hz > 0.0) {
        return 0;
    }
    (TIMER_USEC as f64 * (1_000_000.0 / rate_hz)) as u64
}

/// Converts a tick count on a clock of `hz` into nanoseconds, rounding up.
pub fn ns_from_ticks_ceil(ticks: u64, hz: u64) -> u64 {
    if hz == 0 {
        return 0;
    }
    let numer = u128::from(ticks) * u128::from(NS_PER_SEC);
    let denom = u128::from(hz);
    ((numer + denom - 1) / denom).min(u128::from(u64::MAX)) as u64
}

/// Converts nanoseconds into whole ticks of a clock running at `hz`.
pub fn ticks_from_ns(ns: u64, hz: u64) -> u64 {
    (u128::from(ns) * u128::from(hz) / u128::from(NS_PER_SEC)) as u64
}
