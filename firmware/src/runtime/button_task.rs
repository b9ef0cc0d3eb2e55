//! Polls the two panel buttons into the debouncer.

use embassy_stm32::gpio::Input;
use embassy_time::{Duration, Ticker};

use powerboard_core::button::ButtonPair;

use crate::status;

const POLL_HZ: u64 = 1_000;

#[embassy_executor::task]
pub async fn run(internal: Input<'static>, external: Input<'static>) -> ! {
    let mut buttons = ButtonPair::new();
    let mut ticker = Ticker::every(Duration::from_hz(POLL_HZ));

    loop {
        ticker.next().await;
        // Both inputs are pulled up and active low.
        buttons.sample(internal.is_low(), external.is_low());
        status::record_button(buttons.either_held());
    }
}
