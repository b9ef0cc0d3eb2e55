#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Lightweight atomics republish the battery sampler's output, the
//! per-output current-sense sweep, and the debounced button state. The USB
//! control callbacks read these words without touching any task-owned state,
//! and every field is written as a single machine word so a reader never
//! observes a torn value.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};
use powerboard_core::battery::BatteryReadings;
use powerboard_core::control::OUTPUT_COUNT;

/// Battery current in mA, as published by the sampler.
static BATTERY_CURRENT_MA: AtomicU32 = AtomicU32::new(0);
/// Battery voltage in 4 mV units, as published by the sampler.
static BATTERY_VOLTAGE: AtomicU32 = AtomicU32::new(0);
/// Latest current-sense figure per switched output, in mA.
static OUTPUT_CURRENT_MA: [AtomicU32; OUTPUT_COUNT] = [
    AtomicU32::new(0),
    AtomicU32::new(0),
    AtomicU32::new(0),
    AtomicU32::new(0),
    AtomicU32::new(0),
    AtomicU32::new(0),
];
/// Debounced "either button held" state.
static BUTTON_HELD: AtomicBool = AtomicBool::new(false);

/// Stores a freshly decoded battery current.
pub fn record_battery_current(milliamps: u32) {
    BATTERY_CURRENT_MA.store(milliamps, Ordering::Relaxed);
}

/// Stores a freshly decoded battery voltage.
pub fn record_battery_voltage(voltage: u32) {
    BATTERY_VOLTAGE.store(voltage, Ordering::Relaxed);
}

/// Snapshot of the published battery telemetry.
pub fn battery_readings() -> BatteryReadings {
    BatteryReadings {
        current_ma: BATTERY_CURRENT_MA.load(Ordering::Relaxed),
        voltage: BATTERY_VOLTAGE.load(Ordering::Relaxed),
    }
}

/// Stores the latest current-sense reading for one output.
pub fn record_output_current(index: usize, milliamps: u32) {
    OUTPUT_CURRENT_MA[index].store(milliamps, Ordering::Relaxed);
}

/// Latest current-sense reading for one output, in mA.
pub fn output_current_ma(index: usize) -> u32 {
    OUTPUT_CURRENT_MA[index].load(Ordering::Relaxed)
}

/// Updates the debounced button state.
pub fn record_button(held: bool) {
    BUTTON_HELD.store(held, Ordering::Relaxed);
}

/// `true` while either debounced button is held.
pub fn button_pressed() -> bool {
    BUTTON_HELD.load(Ordering::Relaxed)
}
