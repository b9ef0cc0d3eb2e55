use embassy_stm32 as hal;
use embassy_stm32::Peri;
use static_cell::StaticCell;

use super::RE_ENTER_BOOTLOADER;
use crate::hw::BoardIo;
use crate::usb::{self, UsbDeviceStrings};

hal::bind_interrupts!(struct UsbIrqs {
    USB_LP_CAN1_RX0 => hal::usb::InterruptHandler<hal::peripherals::USB>;
});

static USB_STORAGE: StaticCell<usb::UsbDeviceStorage> = StaticCell::new();

#[embassy_executor::task]
pub async fn run(
    peri: Peri<'static, hal::peripherals::USB>,
    dp: Peri<'static, hal::peripherals::PA12>,
    dm: Peri<'static, hal::peripherals::PA11>,
    board: BoardIo,
) -> ! {
    let storage = USB_STORAGE.init(usb::UsbDeviceStorage::new());
    let driver = hal::usb::Driver::new(peri, UsbIrqs, dp, dm);

    let mut device = usb::build(
        driver,
        storage,
        board,
        &RE_ENTER_BOOTLOADER,
        UsbDeviceStrings::default(),
    );

    loop {
        device.run().await;
    }
}
