use powerboard_core::battery::{
    BatterySampler, BusStatus, SampleBus, SampleTick,
};
use powerboard_core::control::{
    self, OutputChannel, PowerBoard, StatusLed, Unsupported,
};
use powerboard_core::dfu::{self, BootloaderHandoff, DFU_DETACH};

/// Sense bus whose next completion is scripted up front.
struct OneShotBus {
    next: Option<BusStatus>,
}

impl SampleBus for OneShotBus {
    fn start_read(&mut self, _address: u8, _register: u8) {}

    fn poll(&mut self) -> BusStatus {
        self.next.take().unwrap_or(BusStatus::NotYet)
    }
}

#[derive(Default)]
struct FakeBoard {
    outputs: [bool; control::OUTPUT_COUNT],
    leds: [bool; 2],
    button: bool,
}

impl PowerBoard for FakeBoard {
    fn output_set(&mut self, channel: OutputChannel, on: bool) {
        self.outputs[channel.as_index()] = on;
    }

    fn output_current_ma(&self, channel: OutputChannel) -> u32 {
        channel.as_index() as u32 * 10
    }

    fn led_set(&mut self, led: StatusLed, on: bool) {
        let index = match led {
            StatusLed::Run => 0,
            StatusLed::Error => 1,
        };
        self.leds[index] = on;
    }

    fn piezo_receive(&mut self, data: &[u8]) -> bool {
        !data.is_empty() && data.len() % 4 == 0
    }

    fn button_pressed(&self) -> bool {
        self.button
    }
}

fn run_one_sample(sampler: &mut BatterySampler, tick: &SampleTick, status: BusStatus) {
    let mut bus = OneShotBus { next: None };
    tick.raise();
    sampler.poll(tick, &mut bus);
    bus.next = Some(status);
    sampler
        .poll(tick, &mut bus)
        .expect("scripted completion should publish a channel");
}

#[test]
fn battery_read_reflects_the_latest_samples() {
    let tick = SampleTick::new();
    let mut sampler = BatterySampler::new();

    // A current sample of raw 100 decodes to 1200 mA, and a voltage sample
    // that is all status bits decodes to 0.
    run_one_sample(&mut sampler, &tick, BusStatus::Complete(100));
    run_one_sample(&mut sampler, &tick, BusStatus::Complete(0x0007));

    let board = FakeBoard::default();
    let mut buf = [0u8; 8];
    let len = control::handle_read(7, sampler.readings(), &board, &mut buf).unwrap();

    assert_eq!(len, 8);
    assert_eq!(&buf[..4], &1_200u32.to_le_bytes());
    assert_eq!(&buf[4..], &0u32.to_le_bytes());
}

#[test]
fn battery_read_stalls_until_the_buffer_fits() {
    let board = FakeBoard::default();
    let readings = powerboard_core::battery::BatteryReadings {
        current_ma: 42,
        voltage: 42,
    };

    let mut short = [0u8; 7];
    assert_eq!(
        control::handle_read(7, &readings, &board, &mut short),
        Err(Unsupported)
    );

    let mut exact = [0u8; 8];
    assert_eq!(
        control::handle_read(7, &readings, &board, &mut exact),
        Ok(8)
    );
}

#[test]
fn write_then_read_round_trips_every_output() {
    let mut board = FakeBoard::default();

    for selector in 0..6u16 {
        control::handle_write(selector, 1, &[], &mut board).unwrap();
    }
    assert_eq!(board.outputs, [true; 6]);

    for selector in 0..6u16 {
        control::handle_write(selector, 0, &[], &mut board).unwrap();
    }
    assert_eq!(board.outputs, [false; 6]);
}

#[test]
fn led_writes_reach_the_board() {
    let mut board = FakeBoard::default();

    control::handle_write(6, 1, &[], &mut board).unwrap();
    control::handle_write(7, 0xFF, &[], &mut board).unwrap();
    assert_eq!(board.leds, [true, true]);

    control::handle_write(7, 0, &[], &mut board).unwrap();
    assert_eq!(board.leds, [true, false]);
}

#[test]
fn selectors_outside_both_tables_stall() {
    let mut board = FakeBoard::default();
    let readings = powerboard_core::battery::BatteryReadings::default();
    let mut buf = [0u8; 64];

    for selector in [10u16, 100, u16::MAX] {
        assert_eq!(
            control::handle_read(selector, &readings, &board, &mut buf),
            Err(Unsupported)
        );
    }
    for selector in [9u16, 100, u16::MAX] {
        assert_eq!(
            control::handle_write(selector, 1, &[], &mut board),
            Err(Unsupported)
        );
    }
}

#[test]
fn detach_is_idempotent_across_repeated_delivery() {
    let handoff = BootloaderHandoff::new();

    for _ in 0..3 {
        assert_eq!(dfu::handle_dfu_out(DFU_DETACH, &handoff), Ok(()));
        assert!(handoff.is_requested());
    }
}
