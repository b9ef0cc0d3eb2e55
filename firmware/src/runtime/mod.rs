use cortex_m::interrupt;
use cortex_m::peripheral::SCB;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::time::Hertz;
use embassy_time::Timer;

use powerboard_core::battery::SampleTick;
use powerboard_core::dfu::BootloaderHandoff;

use crate::clock;
use crate::hw;

mod battery_task;
mod button_task;
mod piezo_task;
mod sense_task;
mod usb_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

defmt::timestamp!("{=u32:ms}", clock::uptime_ms());

/// Edge flag from the sample scheduler to the battery sampler.
pub(super) static SAMPLE_TICK: SampleTick = SampleTick::new();
/// Raised by DFU DETACH; consumed by the lifecycle loop below.
pub(super) static RE_ENTER_BOOTLOADER: BootloaderHandoff = BootloaderHandoff::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let mut config = hal::Config::default();
    {
        // 8 MHz crystal up to 72 MHz; the USB clock divides down from the
        // same PLL.
        use hal::rcc::*;
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll = Some(Pll {
            src: PllSource::HSE,
            prediv: PllPreDiv::DIV1,
            mul: PllMul::MUL9,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV2;
        config.rcc.apb2_pre = APBPrescaler::DIV1;
    }
    let p = hal::init(config);

    // Boot pattern: run and error both lit until the host enumerates us,
    // then the USB handler clears the error half.
    let run_led = Output::new(p.PA9, Level::High, Speed::Low);
    let error_led = Output::new(p.PA10, Level::High, Speed::Low);

    let board = hw::BoardIo::new(
        [
            Output::new(p.PB0, Level::Low, Speed::Low),
            Output::new(p.PB1, Level::Low, Speed::Low),
            Output::new(p.PB10, Level::Low, Speed::Low),
            Output::new(p.PB11, Level::Low, Speed::Low),
            Output::new(p.PB12, Level::Low, Speed::Low),
            Output::new(p.PB13, Level::Low, Speed::Low),
        ],
        run_led,
        error_led,
    );

    // Keep the D+ pull-up gated until the device is ready to enumerate.
    let mut usb_pullup = Output::new(p.PA8, Level::Low, Speed::Low);

    spawner
        .spawn(usb_task::run(p.USB, p.PA12, p.PA11, board))
        .expect("failed to spawn USB task");

    spawner
        .spawn(battery_task::tick_task())
        .expect("failed to spawn sample scheduler");
    spawner
        .spawn(battery_task::run())
        .expect("failed to spawn battery sampler");
    spawner
        .spawn(battery_task::bus_task(
            p.I2C1, p.PB6, p.PB7, p.DMA1_CH6, p.DMA1_CH7,
        ))
        .expect("failed to spawn sense bus task");

    spawner
        .spawn(sense_task::run(
            p.ADC1, p.PA0, p.PA1, p.PA2, p.PA3, p.PA4, p.PA5,
        ))
        .expect("failed to spawn current sense task");

    spawner
        .spawn(button_task::run(
            Input::new(p.PC14, Pull::Up),
            Input::new(p.PC15, Pull::Up),
        ))
        .expect("failed to spawn button task");

    spawner
        .spawn(piezo_task::run(p.PA7))
        .expect("failed to spawn piezo task");

    usb_pullup.set_high();
    defmt::info!("powerboard: running");

    // Lifecycle owner for the bootloader handoff: poll once per iteration
    // and, on observing the flag, drop off the bus cleanly before resetting
    // into the update bootloader.
    loop {
        if RE_ENTER_BOOTLOADER.is_requested() {
            defmt::info!("powerboard: detaching for firmware update");
            usb_pullup.set_low();
            Timer::after_millis(20).await;
            interrupt::disable();
            SCB::sys_reset();
        }
        Timer::after_millis(10).await;
    }
}
