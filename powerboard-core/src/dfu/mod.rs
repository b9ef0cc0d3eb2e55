//! Interface-level control requests: SET_INTERFACE and the DFU handshake.
//!
//! Two unrelated concerns share the interface-request filter. The first is
//! the standard SET_INTERFACE, which a single-configuration device with no
//! real alternate settings simply acknowledges. The second is the DFU
//! run-time protocol: GETSTATUS answers a canned "application idle" report,
//! and DETACH raises the [`BootloaderHandoff`] flag so the main loop can
//! drop off the bus and hand control to the update bootloader. Nothing here
//! resets the device itself.

use portable_atomic::{AtomicBool, Ordering};

use crate::control::{ControlResult, Unsupported};

/// DFU class request: detach and await the bootloader.
pub const DFU_DETACH: u8 = 0;
/// DFU class request: report protocol status.
pub const DFU_GETSTATUS: u8 = 3;

/// Length of the GETSTATUS response.
pub const GETSTATUS_LEN: usize = 6;

// The run-time half of the DFU protocol has exactly one state.
const STATE_APP_IDLE: u8 = 0;
const STATUS_OK: u8 = 0;
const POLL_TIMEOUT_MS: u8 = 100;

/// Signal from the DETACH handler to the external lifecycle owner.
///
/// Set once per session and never cleared; repeated DETACH requests are
/// idempotent. The consumer polls it from its own loop and performs the
/// controlled shutdown before entering the bootloader.
pub struct BootloaderHandoff(AtomicBool);

impl BootloaderHandoff {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Requests re-entry into the bootloader.
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// `true` once any DETACH request has been accepted.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for BootloaderHandoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Serves a device-to-host DFU class request.
///
/// GETSTATUS reports application-idle with a 100 ms poll timeout and no
/// DFU status code; there is no state machine behind it. Anything else on
/// this filter stalls.
pub fn handle_dfu_in(request: u8, buf: &mut [u8]) -> ControlResult<usize> {
    match request {
        DFU_GETSTATUS => {
            let status = buf.get_mut(..GETSTATUS_LEN).ok_or(Unsupported)?;
            status.copy_from_slice(&[STATUS_OK, POLL_TIMEOUT_MS, 0, 0, STATE_APP_IDLE, 0]);
            Ok(GETSTATUS_LEN)
        }
        _ => Err(Unsupported),
    }
}

/// Serves a host-to-device DFU class request.
///
/// DETACH raises the handoff flag and acknowledges without a payload; the
/// actual detachment is the lifecycle owner's responsibility.
pub fn handle_dfu_out(request: u8, handoff: &BootloaderHandoff) -> ControlResult<()> {
    match request {
        DFU_DETACH => {
            handoff.request();
            Ok(())
        }
        _ => Err(Unsupported),
    }
}

/// Acknowledges SET_INTERFACE for the one interface and setting that exist.
pub fn set_interface(value: u16, index: u16) -> ControlResult<()> {
    if value == 0 && index == 0 {
        Ok(())
    } else {
        Err(Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getstatus_reports_application_idle() {
        let mut buf = [0xAAu8; 8];
        let len = handle_dfu_in(DFU_GETSTATUS, &mut buf).unwrap();
        assert_eq!(len, GETSTATUS_LEN);
        assert_eq!(&buf[..6], &[0, 100, 0, 0, 0, 0]);
    }

    #[test]
    fn getstatus_stalls_on_short_buffer() {
        let mut buf = [0u8; 5];
        assert_eq!(handle_dfu_in(DFU_GETSTATUS, &mut buf), Err(Unsupported));
    }

    #[test]
    fn unknown_class_requests_stall() {
        let mut buf = [0u8; 8];
        let handoff = BootloaderHandoff::new();
        // DNLOAD and friends belong to the bootloader, not this image.
        assert_eq!(handle_dfu_in(1, &mut buf), Err(Unsupported));
        assert_eq!(handle_dfu_out(1, &handoff), Err(Unsupported));
        assert!(!handoff.is_requested());
    }

    #[test]
    fn detach_sets_the_handoff_once_and_stays_set() {
        let handoff = BootloaderHandoff::new();
        assert!(!handoff.is_requested());

        handle_dfu_out(DFU_DETACH, &handoff).unwrap();
        assert!(handoff.is_requested());

        // Repeated delivery is idempotent.
        handle_dfu_out(DFU_DETACH, &handoff).unwrap();
        assert!(handoff.is_requested());
    }

    #[test]
    fn set_interface_only_acknowledges_the_default_setting() {
        assert_eq!(set_interface(0, 0), Ok(()));
        assert_eq!(set_interface(1, 0), Err(Unsupported));
        assert_eq!(set_interface(0, 1), Err(Unsupported));
    }
}
