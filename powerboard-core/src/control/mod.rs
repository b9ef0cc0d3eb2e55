//! Vendor control-transfer dispatch.
//!
//! The board answers a single vendor-defined device request; everything else
//! on that filter is rejected so the transport stalls the transfer, which is
//! the host-visible signature for "bad request". The direction bit selects
//! between the read and write tables, and the request's index field carries
//! the command selector. Handlers here run inside the USB control callback,
//! so every path is bounded, branch-only, and allocation-free.

use crate::battery::BatteryReadings;

/// The one vendor request code the board recognizes.
pub const VENDOR_REQUEST: u8 = 64;

/// Build version reported by [`ReadCommand::FirmwareVersion`].
pub const FIRMWARE_VERSION: u32 = 4;

/// Number of switched outputs on the board.
pub const OUTPUT_COUNT: usize = 6;

/// Switched outputs: two high-current channels and four low-current ones.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputChannel {
    H0,
    H1,
    L0,
    L1,
    L2,
    L3,
}

impl OutputChannel {
    /// Deterministic index matching the selector numbering.
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            OutputChannel::H0 => 0,
            OutputChannel::H1 => 1,
            OutputChannel::L0 => 2,
            OutputChannel::L1 => 3,
            OutputChannel::L2 => 4,
            OutputChannel::L3 => 5,
        }
    }

    /// Attempts to construct an [`OutputChannel`] from a raw index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(OutputChannel::H0),
            1 => Some(OutputChannel::H1),
            2 => Some(OutputChannel::L0),
            3 => Some(OutputChannel::L1),
            4 => Some(OutputChannel::L2),
            5 => Some(OutputChannel::L3),
            _ => None,
        }
    }
}

/// Front-panel status LEDs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StatusLed {
    Run,
    Error,
}

/// Marker for a request that must be answered with a protocol stall.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Unsupported;

pub type ControlResult<T> = Result<T, Unsupported>;

/// Device-to-host command selectors, carried in the request index field.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReadCommand {
    /// Current-sense reading for one switched output.
    Output(OutputChannel),
    /// 5 V rail telemetry. Deliberately unimplemented: serving it would take
    /// a blocking sense-bus transaction from the control callback.
    Rail5V,
    /// Battery current then voltage.
    Battery,
    /// Debounced button state.
    Button,
    /// Build version constant.
    FirmwareVersion,
}

impl ReadCommand {
    /// Decodes a selector; unknown values are left for the caller to stall.
    #[must_use]
    pub fn from_selector(selector: u16) -> Option<Self> {
        match selector {
            0..=5 => OutputChannel::from_index(usize::from(selector)).map(ReadCommand::Output),
            6 => Some(ReadCommand::Rail5V),
            7 => Some(ReadCommand::Battery),
            8 => Some(ReadCommand::Button),
            9 => Some(ReadCommand::FirmwareVersion),
            _ => None,
        }
    }
}

/// Host-to-device command selectors, carried in the request index field.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WriteCommand {
    /// Switch one output; parameter 0 is off, anything else on.
    Output(OutputChannel),
    RunLed,
    ErrorLed,
    /// Forward the data stage to the piezo driver.
    Piezo,
}

impl WriteCommand {
    /// Decodes a selector; unknown values are left for the caller to stall.
    #[must_use]
    pub fn from_selector(selector: u16) -> Option<Self> {
        match selector {
            0..=5 => OutputChannel::from_index(usize::from(selector)).map(WriteCommand::Output),
            6 => Some(WriteCommand::RunLed),
            7 => Some(WriteCommand::ErrorLed),
            8 => Some(WriteCommand::Piezo),
            _ => None,
        }
    }
}

/// External collaborators the dispatcher drives.
///
/// The firmware implements this over the GPIO output bank, the status LEDs,
/// the piezo tone queue, and the debounced button state.
pub trait PowerBoard {
    /// Switches one output on or off.
    fn output_set(&mut self, channel: OutputChannel, on: bool);

    /// Latest current-sense reading for one output, in mA.
    fn output_current_ma(&self, channel: OutputChannel) -> u32;

    /// Switches a status LED on or off.
    fn led_set(&mut self, led: StatusLed, on: bool);

    /// Hands a tone payload to the piezo driver; `false` rejects it.
    fn piezo_receive(&mut self, data: &[u8]) -> bool;

    /// `true` while either debounced button is held.
    fn button_pressed(&self) -> bool;
}

/// Serves a device-to-host request.
///
/// `battery` is a snapshot of the sampler's published readings. On success
/// the response occupies the returned number of bytes at the front of `buf`;
/// an unknown selector or a buffer shorter than the response stalls instead.
pub fn handle_read(
    selector: u16,
    battery: &BatteryReadings,
    board: &impl PowerBoard,
    buf: &mut [u8],
) -> ControlResult<usize> {
    match ReadCommand::from_selector(selector).ok_or(Unsupported)? {
        ReadCommand::Output(channel) => put_u32(buf, 0, board.output_current_ma(channel)),
        ReadCommand::Rail5V => Err(Unsupported),
        ReadCommand::Battery => {
            put_u32(buf, 0, battery.current_ma)?;
            put_u32(buf, 4, battery.voltage)?;
            Ok(8)
        }
        ReadCommand::Button => put_u32(buf, 0, u32::from(board.button_pressed())),
        ReadCommand::FirmwareVersion => put_u32(buf, 0, FIRMWARE_VERSION),
    }
}

/// Serves a host-to-device request.
///
/// `value` is the request's value field; `data` is the host-supplied data
/// stage, already bounded by the transfer length.
pub fn handle_write(
    selector: u16,
    value: u16,
    data: &[u8],
    board: &mut impl PowerBoard,
) -> ControlResult<()> {
    match WriteCommand::from_selector(selector).ok_or(Unsupported)? {
        WriteCommand::Output(channel) => {
            board.output_set(channel, value != 0);
            Ok(())
        }
        WriteCommand::RunLed => {
            board.led_set(StatusLed::Run, value != 0);
            Ok(())
        }
        WriteCommand::ErrorLed => {
            board.led_set(StatusLed::Error, value != 0);
            Ok(())
        }
        WriteCommand::Piezo => {
            if board.piezo_receive(data) {
                Ok(())
            } else {
                Err(Unsupported)
            }
        }
    }
}

/// Writes one little-endian word, stalling when the buffer is too short.
fn put_u32(buf: &mut [u8], offset: usize, value: u32) -> ControlResult<usize> {
    let end = offset + 4;
    let slot = buf.get_mut(offset..end).ok_or(Unsupported)?;
    slot.copy_from_slice(&value.to_le_bytes());
    Ok(end)
}
