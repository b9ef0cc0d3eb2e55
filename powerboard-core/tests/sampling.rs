use heapless::Vec;

use powerboard_core::battery::{
    BATTERY_SENSE_ADDR, BatterySampler, BusStatus, ChannelUpdate, REG_BUS_VOLTAGE,
    REG_SHUNT_VOLTAGE, ReadState, SampleBus, SampleTick,
};

/// Test double standing in for the sense-bus driver. Transactions complete
/// only when the test scripts a completion, and starting a second one while
/// the first is outstanding fails the test.
struct ScriptedBus {
    outstanding: Option<(u8, u8)>,
    completion: Option<BusStatus>,
    starts: usize,
}

impl ScriptedBus {
    fn new() -> Self {
        Self {
            outstanding: None,
            completion: None,
            starts: 0,
        }
    }

    fn complete(&mut self, status: BusStatus) {
        assert!(
            self.outstanding.is_some(),
            "completion scripted with no transaction outstanding"
        );
        self.completion = Some(status);
    }
}

impl SampleBus for ScriptedBus {
    fn start_read(&mut self, address: u8, register: u8) {
        assert!(
            self.outstanding.is_none(),
            "second transaction started while one was outstanding"
        );
        self.outstanding = Some((address, register));
        self.starts += 1;
    }

    fn poll(&mut self) -> BusStatus {
        match self.completion.take() {
            Some(status) => {
                self.outstanding = None;
                status
            }
            None => BusStatus::NotYet,
        }
    }
}

#[test]
fn cycle_visits_all_four_states_in_order() {
    let tick = SampleTick::new();
    let mut bus = ScriptedBus::new();
    let mut sampler = BatterySampler::new();

    // Nothing moves without a tick.
    assert_eq!(sampler.poll(&tick, &mut bus), None);
    assert_eq!(sampler.state(), ReadState::AwaitCurrentTick);
    assert_eq!(bus.starts, 0);

    tick.raise();
    assert_eq!(sampler.poll(&tick, &mut bus), None);
    assert_eq!(sampler.state(), ReadState::WaitCurrent);
    assert_eq!(bus.outstanding, Some((BATTERY_SENSE_ADDR, REG_SHUNT_VOLTAGE)));

    // Outstanding transaction holds the state across any number of polls.
    assert_eq!(sampler.poll(&tick, &mut bus), None);
    assert_eq!(sampler.poll(&tick, &mut bus), None);
    assert_eq!(sampler.state(), ReadState::WaitCurrent);

    bus.complete(BusStatus::Complete(100));
    assert_eq!(
        sampler.poll(&tick, &mut bus),
        Some(ChannelUpdate::Current(1_200))
    );
    assert_eq!(sampler.state(), ReadState::AwaitVoltageTick);

    tick.raise();
    assert_eq!(sampler.poll(&tick, &mut bus), None);
    assert_eq!(sampler.state(), ReadState::WaitVoltage);
    assert_eq!(bus.outstanding, Some((BATTERY_SENSE_ADDR, REG_BUS_VOLTAGE)));

    bus.complete(BusStatus::Complete(0x0007));
    assert_eq!(
        sampler.poll(&tick, &mut bus),
        Some(ChannelUpdate::Voltage(0))
    );
    assert_eq!(sampler.state(), ReadState::AwaitCurrentTick);

    // One bus start per consumed tick.
    assert_eq!(bus.starts, 2);
    assert_eq!(sampler.readings().current_ma, 1_200);
    assert_eq!(sampler.readings().voltage, 0);
}

#[test]
fn coalesced_ticks_trigger_exactly_one_start() {
    let tick = SampleTick::new();
    let mut bus = ScriptedBus::new();
    let mut sampler = BatterySampler::new();

    // A burst of ticks arrives before the sampler runs at all.
    tick.raise();
    tick.raise();
    tick.raise();

    assert_eq!(sampler.poll(&tick, &mut bus), None);
    assert_eq!(bus.starts, 1);

    // The burst was coalesced: finishing the read leaves no tick to consume,
    // so the voltage read must wait for a fresh one.
    bus.complete(BusStatus::Complete(50));
    sampler.poll(&tick, &mut bus);
    assert_eq!(sampler.state(), ReadState::AwaitVoltageTick);
    assert_eq!(sampler.poll(&tick, &mut bus), None);
    assert_eq!(bus.starts, 1);

    tick.raise();
    sampler.poll(&tick, &mut bus);
    assert_eq!(bus.starts, 2);
}

#[test]
fn bus_errors_publish_zero_and_keep_the_cycle_moving() {
    let tick = SampleTick::new();
    let mut bus = ScriptedBus::new();
    let mut sampler = BatterySampler::new();
    let mut published: Vec<ChannelUpdate, 8> = Vec::new();

    // Current read fails, voltage read succeeds.
    tick.raise();
    sampler.poll(&tick, &mut bus);
    bus.complete(BusStatus::Error);
    published.extend(sampler.poll(&tick, &mut bus));

    tick.raise();
    sampler.poll(&tick, &mut bus);
    bus.complete(BusStatus::Complete(0x1238));
    published.extend(sampler.poll(&tick, &mut bus));

    assert_eq!(
        published.as_slice(),
        &[
            ChannelUpdate::Current(0),
            ChannelUpdate::Voltage(0x91C),
        ]
    );
    assert_eq!(sampler.state(), ReadState::AwaitCurrentTick);

    // A later successful current read replaces the error value.
    tick.raise();
    sampler.poll(&tick, &mut bus);
    bus.complete(BusStatus::Complete(100));
    sampler.poll(&tick, &mut bus);
    assert_eq!(sampler.readings().current_ma, 1_200);
    assert_eq!(sampler.readings().voltage, 0x91C);
}

#[test]
fn voltage_error_clears_only_the_voltage_channel() {
    let tick = SampleTick::new();
    let mut bus = ScriptedBus::new();
    let mut sampler = BatterySampler::new();

    tick.raise();
    sampler.poll(&tick, &mut bus);
    bus.complete(BusStatus::Complete(200));
    sampler.poll(&tick, &mut bus);

    tick.raise();
    sampler.poll(&tick, &mut bus);
    bus.complete(BusStatus::Error);
    assert_eq!(
        sampler.poll(&tick, &mut bus),
        Some(ChannelUpdate::Voltage(0))
    );

    // The stale current reading persists through the voltage failure.
    assert_eq!(sampler.readings().current_ma, 3_200);
    assert_eq!(sampler.readings().voltage, 0);
}
