//! Board bindings for the power-distribution hardware.
//!
//! Pin assignment, as routed on the board:
//!
//! * switched outputs H0, H1, L0..L3 on PB0, PB1, PB10..PB13
//! * run / error LEDs on PA9 / PA10
//! * internal / external buttons on PC14 / PC15, pulled up, active low
//! * per-output current sense on ADC channels PA0..PA5
//! * battery monitor on I2C1 (PB6 / PB7)
//! * piezo on PA7, USB D+ pull-up gate on PA8
//!
//! [`BoardIo`] bundles the pins the USB control callbacks drive and
//! implements the `PowerBoard` collaborator trait for the dispatcher.

use embassy_stm32::gpio::{Level, Output};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Sender};

use powerboard_core::control::{OUTPUT_COUNT, OutputChannel, PowerBoard, StatusLed};

use crate::status;

/// Tones queued faster than the piezo can play them are rejected beyond
/// this depth.
pub const PIEZO_QUEUE_DEPTH: usize = 8;

/// One note for the piezo: little-endian (frequency, duration) on the wire.
#[derive(Copy, Clone, Debug)]
pub struct Tone {
    pub frequency_hz: u16,
    pub duration_ms: u16,
}

/// Queue between the USB control callback and the piezo task.
pub static PIEZO_TONES: Channel<CriticalSectionRawMutex, Tone, PIEZO_QUEUE_DEPTH> = Channel::new();

/// The output, LED, and piezo endpoints owned by the USB control handler.
pub struct BoardIo {
    outputs: [Output<'static>; OUTPUT_COUNT],
    run_led: Output<'static>,
    error_led: Output<'static>,
    piezo: Sender<'static, CriticalSectionRawMutex, Tone, PIEZO_QUEUE_DEPTH>,
}

impl BoardIo {
    pub fn new(
        outputs: [Output<'static>; OUTPUT_COUNT],
        run_led: Output<'static>,
        error_led: Output<'static>,
    ) -> Self {
        Self {
            outputs,
            run_led,
            error_led,
            piezo: PIEZO_TONES.sender(),
        }
    }
}

impl PowerBoard for BoardIo {
    fn output_set(&mut self, channel: OutputChannel, on: bool) {
        let level = if on { Level::High } else { Level::Low };
        self.outputs[channel.as_index()].set_level(level);
    }

    fn output_current_ma(&self, channel: OutputChannel) -> u32 {
        status::output_current_ma(channel.as_index())
    }

    fn led_set(&mut self, led: StatusLed, on: bool) {
        let level = if on { Level::High } else { Level::Low };
        match led {
            StatusLed::Run => self.run_led.set_level(level),
            StatusLed::Error => self.error_led.set_level(level),
        }
    }

    fn piezo_receive(&mut self, data: &[u8]) -> bool {
        // The payload is a run of 4-byte tone records; anything else is
        // malformed and stalls the transfer.
        if data.is_empty() || data.len() % 4 != 0 {
            return false;
        }

        for record in data.chunks_exact(4) {
            let tone = Tone {
                frequency_hz: u16::from_le_bytes([record[0], record[1]]),
                duration_ms: u16::from_le_bytes([record[2], record[3]]),
            };
            if self.piezo.try_send(tone).is_err() {
                // Queue full; tones already accepted keep playing.
                return false;
            }
        }
        true
    }

    fn button_pressed(&self) -> bool {
        status::button_pressed()
    }
}
