//! Per-output current sense sweep.
//!
//! Each switched output feeds a high-side sense amplifier into one ADC
//! channel. A slow sweep keeps the status mirror fresh so the USB read path
//! never has to touch the ADC itself.

use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::adc::Adc;
use embassy_time::{Duration, Ticker};

use crate::status;

/// Amplifier gain and the 12-bit, 3.3 V conversion collapse to roughly one
/// count per 4 mA.
const SENSE_MA_PER_COUNT: u32 = 4;

const SWEEP_HZ: u64 = 1_000;

#[embassy_executor::task]
pub async fn run(
    adc: Peri<'static, hal::peripherals::ADC1>,
    mut h0: Peri<'static, hal::peripherals::PA0>,
    mut h1: Peri<'static, hal::peripherals::PA1>,
    mut l0: Peri<'static, hal::peripherals::PA2>,
    mut l1: Peri<'static, hal::peripherals::PA3>,
    mut l2: Peri<'static, hal::peripherals::PA4>,
    mut l3: Peri<'static, hal::peripherals::PA5>,
) -> ! {
    let mut adc = Adc::new(adc);
    let mut ticker = Ticker::every(Duration::from_hz(SWEEP_HZ));

    loop {
        ticker.next().await;

        let samples = [
            adc.blocking_read(&mut h0),
            adc.blocking_read(&mut h1),
            adc.blocking_read(&mut l0),
            adc.blocking_read(&mut l1),
            adc.blocking_read(&mut l2),
            adc.blocking_read(&mut l3),
        ];

        for (index, raw) in samples.iter().enumerate() {
            status::record_output_current(index, u32::from(*raw) * SENSE_MA_PER_COUNT);
        }
    }
}
