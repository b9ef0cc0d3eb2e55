#![no_std]

// Board-independent logic for the USB power-distribution board.
//
// This crate stays portable across the MCU firmware and host-side tests by
// avoiding the Rust standard library. Hardware is reached exclusively through
// the traits defined here; the firmware crate supplies the concrete bindings.

pub mod battery;
pub mod button;
pub mod control;
pub mod dfu;
