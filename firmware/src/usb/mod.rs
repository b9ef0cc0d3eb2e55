//! USB control surface for the power board.
//!
//! The device enumerates with a single DFU run-time interface and answers
//! the board's vendor request on the default control pipe. This module owns
//! the descriptor storage and a small builder wrapper so the USB task can
//! construct the device without knowing the underlying Embassy USB
//! bookkeeping, plus the control handler that routes vendor and DFU traffic
//! into `powerboard-core`.
//!
//! Control callbacks run while a transfer is being serviced, so everything
//! they reach is bounded and non-blocking; telemetry reads come from the
//! status mirror, never from the sense bus.

use embassy_usb::control::{InResponse, OutResponse, Recipient, Request, RequestType};
use embassy_usb::driver::Driver;
use embassy_usb::types::InterfaceNumber;
use embassy_usb::{Builder, Handler, UsbDevice};

use powerboard_core::control::{self, PowerBoard, StatusLed};
use powerboard_core::dfu::{self, BootloaderHandoff};

use crate::hw::BoardIo;
use crate::status;

pub const MAX_PACKET_SIZE: u16 = 64;

const CONTROL_BUFFER_LEN: usize = 128;
const CONFIG_DESCRIPTOR_LEN: usize = 256;
const BOS_DESCRIPTOR_LEN: usize = 256;
const MSOS_DESCRIPTOR_LEN: usize = 256;

// DFU run-time interface identity and functional descriptor contents.
const USB_CLASS_APP_SPECIFIC: u8 = 0xFE;
const USB_SUBCLASS_DFU: u8 = 0x01;
const DFU_PROTOCOL_RUNTIME: u8 = 0x01;
const DESC_DFU_FUNCTIONAL: u8 = 0x21;
const DFU_ATTR_CAN_DOWNLOAD: u8 = 0x01;
const DFU_ATTR_WILL_DETACH: u8 = 0x08;
const DFU_DETACH_TIMEOUT_MS: u16 = 255;
const DFU_TRANSFER_SIZE: u16 = 128;
const DFU_VERSION_BCD: u16 = 0x011A;

/// User-visible strings advertised in the USB descriptors.
#[derive(Clone, Copy, Debug)]
pub struct UsbDeviceStrings {
    pub manufacturer: &'static str,
    pub product: &'static str,
    pub serial_number: Option<&'static str>,
}

impl Default for UsbDeviceStrings {
    fn default() -> Self {
        Self {
            manufacturer: "Powerboard",
            product: "USB power-distribution board",
            serial_number: None,
        }
    }
}

/// Backing storage for the Embassy USB builder and the control handler.
pub struct UsbDeviceStorage {
    control_buf: [u8; CONTROL_BUFFER_LEN],
    config_descriptor: [u8; CONFIG_DESCRIPTOR_LEN],
    bos_descriptor: [u8; BOS_DESCRIPTOR_LEN],
    msos_descriptor: [u8; MSOS_DESCRIPTOR_LEN],
    handler: Option<ControlHandler>,
}

impl UsbDeviceStorage {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            control_buf: [0; CONTROL_BUFFER_LEN],
            config_descriptor: [0; CONFIG_DESCRIPTOR_LEN],
            bos_descriptor: [0; BOS_DESCRIPTOR_LEN],
            msos_descriptor: [0; MSOS_DESCRIPTOR_LEN],
            handler: None,
        }
    }
}

/// Builds the USB device: descriptors, the DFU run-time interface, and the
/// vendor/DFU control handler wired to the board endpoints.
pub fn build<D>(
    driver: D,
    storage: &'static mut UsbDeviceStorage,
    board: BoardIo,
    handoff: &'static BootloaderHandoff,
    strings: UsbDeviceStrings,
) -> UsbDevice<'static, D>
where
    D: Driver<'static>,
{
    let UsbDeviceStorage {
        control_buf,
        config_descriptor,
        bos_descriptor,
        msos_descriptor,
        handler,
    } = storage;

    let mut config = embassy_usb::Config::new(0x1209, 0x0001);
    config.manufacturer = Some(strings.manufacturer);
    config.product = Some(strings.product);
    config.serial_number = strings.serial_number;
    config.max_packet_size_0 = MAX_PACKET_SIZE as u8;
    config.self_powered = true;
    // Token draw from VBUS; the board powers itself from the battery.
    config.max_power = 10;

    let mut builder = Builder::new(
        driver,
        config,
        config_descriptor,
        bos_descriptor,
        msos_descriptor,
        control_buf,
    );

    let mut function =
        builder.function(USB_CLASS_APP_SPECIFIC, USB_SUBCLASS_DFU, DFU_PROTOCOL_RUNTIME);
    let mut interface = function.interface();
    let mut alt = interface.alt_setting(
        USB_CLASS_APP_SPECIFIC,
        USB_SUBCLASS_DFU,
        DFU_PROTOCOL_RUNTIME,
        None,
    );
    alt.descriptor(
        DESC_DFU_FUNCTIONAL,
        &[
            DFU_ATTR_CAN_DOWNLOAD | DFU_ATTR_WILL_DETACH,
            (DFU_DETACH_TIMEOUT_MS & 0xFF) as u8,
            (DFU_DETACH_TIMEOUT_MS >> 8) as u8,
            (DFU_TRANSFER_SIZE & 0xFF) as u8,
            (DFU_TRANSFER_SIZE >> 8) as u8,
            (DFU_VERSION_BCD & 0xFF) as u8,
            (DFU_VERSION_BCD >> 8) as u8,
        ],
    );
    let dfu_interface = interface.interface_number();
    drop(function);

    let control = handler.insert(ControlHandler {
        board,
        handoff,
        dfu_interface,
    });
    builder.handler(control);

    builder.build()
}

/// Routes vendor requests and DFU class requests into `powerboard-core`.
struct ControlHandler {
    board: BoardIo,
    handoff: &'static BootloaderHandoff,
    dfu_interface: InterfaceNumber,
}

impl ControlHandler {
    fn targets_dfu_interface(&self, req: &Request) -> bool {
        req.index == u16::from(self.dfu_interface.0)
    }
}

impl Handler for ControlHandler {
    fn configured(&mut self, configured: bool) {
        if configured {
            // Enumeration finished; the error half of the boot pattern goes
            // out and the LED is handed back to the host.
            self.board.led_set(StatusLed::Error, false);
            defmt::info!("usb: configured");
        }
    }

    fn set_alternate_setting(&mut self, iface: InterfaceNumber, alternate_setting: u8) {
        // Single-configuration device; the stack has already acknowledged
        // the only setting that exists.
        let accepted =
            dfu::set_interface(u16::from(alternate_setting), u16::from(iface.0)).is_ok();
        defmt::trace!(
            "usb: set_interface {} alt {} accepted={}",
            iface.0,
            alternate_setting,
            accepted
        );
    }

    fn control_out(&mut self, req: Request, data: &[u8]) -> Option<OutResponse> {
        match (req.request_type, req.recipient) {
            (RequestType::Vendor, Recipient::Device) => {
                if req.request != control::VENDOR_REQUEST {
                    return Some(OutResponse::Rejected);
                }
                match control::handle_write(req.index, req.value, data, &mut self.board) {
                    Ok(()) => Some(OutResponse::Accepted),
                    Err(_) => {
                        defmt::warn!("usb: rejected write selector {}", req.index);
                        Some(OutResponse::Rejected)
                    }
                }
            }
            (RequestType::Class, Recipient::Interface) if self.targets_dfu_interface(&req) => {
                match dfu::handle_dfu_out(req.request, self.handoff) {
                    Ok(()) => {
                        defmt::info!("usb: DFU detach requested");
                        Some(OutResponse::Accepted)
                    }
                    Err(_) => Some(OutResponse::Rejected),
                }
            }
            _ => None,
        }
    }

    fn control_in<'a>(&'a mut self, req: Request, buf: &'a mut [u8]) -> Option<InResponse<'a>> {
        // The host's transfer length bounds the response buffer.
        let budget = usize::from(req.length).min(buf.len());

        match (req.request_type, req.recipient) {
            (RequestType::Vendor, Recipient::Device) => {
                if req.request != control::VENDOR_REQUEST {
                    return Some(InResponse::Rejected);
                }
                let battery = status::battery_readings();
                match control::handle_read(req.index, &battery, &self.board, &mut buf[..budget]) {
                    Ok(len) => Some(InResponse::Accepted(&buf[..len])),
                    Err(_) => {
                        defmt::warn!("usb: rejected read selector {}", req.index);
                        Some(InResponse::Rejected)
                    }
                }
            }
            (RequestType::Class, Recipient::Interface) if self.targets_dfu_interface(&req) => {
                match dfu::handle_dfu_in(req.request, &mut buf[..budget]) {
                    Ok(len) => Some(InResponse::Accepted(&buf[..len])),
                    Err(_) => Some(InResponse::Rejected),
                }
            }
            _ => None,
        }
    }
}
