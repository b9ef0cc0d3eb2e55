//! Battery sampling: the 4 kHz scheduler, the sampler poll loop, and the
//! sense-bus service task.
//!
//! The scheduler does nothing but raise the sample tick and advance the
//! wall clock, every period, unconditionally. The sampler loop drives the
//! core state machine well above the tick rate so a bus completion and the
//! tick that follows it are both observed within one period. The bus task
//! owns the I2C driver and turns the one-slot request channel into
//! completions on a signal, which keeps the poll side free of blocking.

use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::time::Hertz;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker, Timer};

use powerboard_core::battery::{
    BatterySampler, BusStatus, ChannelUpdate, SAMPLE_TICK_HZ, SampleBus,
};

use super::SAMPLE_TICK;
use crate::{clock, status};

hal::bind_interrupts!(struct I2cIrqs {
    I2C1_EV => hal::i2c::EventInterruptHandler<hal::peripherals::I2C1>;
    I2C1_ER => hal::i2c::ErrorInterruptHandler<hal::peripherals::I2C1>;
});

/// One register read on the sense bus.
struct BusRequest {
    address: u8,
    register: u8,
}

// One-slot transaction arena: the sampler never starts a second read while
// one is outstanding, so depth 1 suffices.
static BUS_REQUESTS: Channel<CriticalSectionRawMutex, BusRequest, 1> = Channel::new();
static BUS_RESULT: Signal<CriticalSectionRawMutex, BusStatus> = Signal::new();

/// Front half of the bus driver, lives with the sampler poll loop.
struct SenseBusFrontend;

impl SampleBus for SenseBusFrontend {
    fn start_read(&mut self, address: u8, register: u8) {
        BUS_RESULT.reset();
        if BUS_REQUESTS.try_send(BusRequest { address, register }).is_err() {
            // The sampler guarantees one transaction at a time; a full queue
            // here means that invariant broke upstream.
            defmt::warn!("battery: dropped sense bus request");
        }
    }

    fn poll(&mut self) -> BusStatus {
        BUS_RESULT.try_take().unwrap_or(BusStatus::NotYet)
    }
}

/// The sample scheduler.
#[embassy_executor::task]
pub async fn tick_task() -> ! {
    let mut ticker = Ticker::every(Duration::from_hz(u64::from(SAMPLE_TICK_HZ)));
    loop {
        ticker.next().await;
        SAMPLE_TICK.raise();
        // The only periodic source in the firmware, so the wall clock rides
        // along whether or not the sampler consumes this tick.
        clock::tick();
    }
}

/// The sampler poll loop.
#[embassy_executor::task]
pub async fn run() -> ! {
    const POLL_PERIOD: Duration = Duration::from_micros(50);

    let mut sampler = BatterySampler::new();
    let mut bus = SenseBusFrontend;

    loop {
        if let Some(update) = sampler.poll(&SAMPLE_TICK, &mut bus) {
            match update {
                ChannelUpdate::Current(milliamps) => status::record_battery_current(milliamps),
                ChannelUpdate::Voltage(voltage) => status::record_battery_voltage(voltage),
            }
        }
        Timer::after(POLL_PERIOD).await;
    }
}

/// Services sense bus requests against the I2C peripheral.
#[embassy_executor::task]
pub async fn bus_task(
    i2c: Peri<'static, hal::peripherals::I2C1>,
    scl: Peri<'static, hal::peripherals::PB6>,
    sda: Peri<'static, hal::peripherals::PB7>,
    tx_dma: Peri<'static, hal::peripherals::DMA1_CH6>,
    rx_dma: Peri<'static, hal::peripherals::DMA1_CH7>,
) -> ! {
    let mut i2c = hal::i2c::I2c::new(
        i2c,
        scl,
        sda,
        I2cIrqs,
        tx_dma,
        rx_dma,
        Hertz(400_000),
        hal::i2c::Config::default(),
    );

    loop {
        let request = BUS_REQUESTS.receive().await;
        let mut raw = [0u8; 2];
        let outcome = match i2c
            .write_read(request.address, &[request.register], &mut raw)
            .await
        {
            // Monitor registers are big-endian on the wire.
            Ok(()) => BusStatus::Complete(u16::from_be_bytes(raw)),
            Err(cause) => {
                defmt::warn!(
                    "battery: sense bus read failed: {}",
                    defmt::Debug2Format(&cause)
                );
                BusStatus::Error
            }
        };
        BUS_RESULT.signal(outcome);
    }
}
