//! Plays queued tones on the piezo.
//!
//! The piezo sits behind a plain GPIO, so a tone is a timed square wave: a
//! zero frequency is a rest. Coarse, but the buzzer only announces state
//! changes.

use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_time::{Duration, Timer};

use crate::hw::{PIEZO_TONES, Tone};

#[embassy_executor::task]
pub async fn run(pin: Peri<'static, hal::peripherals::PA7>) -> ! {
    let mut piezo = Output::new(pin, Level::Low, Speed::Low);
    let receiver = PIEZO_TONES.receiver();

    loop {
        let tone = receiver.receive().await;
        play(&mut piezo, tone).await;
    }
}

async fn play(piezo: &mut Output<'static>, tone: Tone) {
    if tone.frequency_hz == 0 {
        Timer::after_millis(u64::from(tone.duration_ms)).await;
        return;
    }

    let half_period = Duration::from_micros(500_000 / u64::from(tone.frequency_hz));
    let cycles = u64::from(tone.duration_ms) * u64::from(tone.frequency_hz) / 1_000;

    for _ in 0..cycles {
        piezo.set_high();
        Timer::after(half_period).await;
        piezo.set_low();
        Timer::after(half_period).await;
    }
}
