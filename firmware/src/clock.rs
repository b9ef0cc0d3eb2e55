#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Wall-clock tick counter.
//!
//! The sample scheduler is the only periodic source in the firmware, so the
//! wall clock piggy-backs on it: one [`tick`] per scheduler period, every
//! period, whether or not the sampler consumes the tick.

use portable_atomic::{AtomicU32, Ordering};
use powerboard_core::battery::SAMPLE_TICK_HZ;

static TICKS: AtomicU32 = AtomicU32::new(0);

/// Advances the wall clock by one scheduler period.
pub fn tick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Milliseconds since boot, derived from the tick count.
pub fn uptime_ms() -> u32 {
    TICKS.load(Ordering::Relaxed) / (SAMPLE_TICK_HZ / 1_000)
}
