//! Implements the USB device and task: HID transport for emitted keystrokes
//! and the keyboard-LED status byte coming back from the host, plus the
//! CDC-ACM serial channel carrying raw command frames.
//! Mostly lifted from [embassy_usb] examples.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::keymap::{keystroke_report, release_report};
use crate::{KEY_CHANNEL, SERIAL_CHANNEL};

use embassy_futures::join::{join, join3};
use embassy_rp::{
    bind_interrupts,
    peripherals::USB,
    usb::{Driver, InterruptHandler},
};
use embassy_time::{Duration, Timer};
use embassy_usb::{
    class::cdc_acm::{CdcAcmClass, State as CdcState},
    class::hid::{HidReaderWriter, ReportId, RequestHandler, State as HidState},
    control::OutResponse,
    Builder, Handler, UsbDevice,
};
use usbd_hid::descriptor::{KeyboardReport, SerializedDescriptor};

use static_cell::StaticCell;

type MyDriver = Driver<'static, USB>;
type MyUsbDevice = UsbDevice<'static, MyDriver>;
type MyHidReaderWriter = HidReaderWriter<'static, MyDriver, 1, 8>;
type MyCdcAcmClass = CdcAcmClass<'static, MyDriver>;

bind_interrupts!(pub(crate) struct Irqs {
    USBCTRL_IRQ => InterruptHandler<USB>;
});

/// Latest keyboard-LED status byte the host has sent; re-read every tick.
static LED_STATUS: AtomicU8 = AtomicU8::new(0);

static CONFIGURED: AtomicBool = AtomicBool::new(false);

pub fn led_status() -> u8 {
    LED_STATUS.load(Ordering::Relaxed)
}

/// Resolves once the host has configured the device; used as the boot
/// handshake, with a timeout on the caller's side.
pub async fn wait_configured() {
    while !CONFIGURED.load(Ordering::Relaxed) {
        Timer::after(Duration::from_millis(10)).await;
    }
}

pub fn get_device(
    driver: MyDriver,
) -> (MyUsbDevice, MyHidReaderWriter, MyCdcAcmClass) {
    // identity the shorty host tools look for
    let mut config = embassy_usb::Config::new(0x1209, 0xFABD);
    config.manufacturer = Some("shorty");
    config.product = Some("shorty macro keypad");
    config.serial_number = Some("001");
    config.max_power = 100;
    config.max_packet_size_0 = 64;

    static DEVICE_HANDLER: StaticCell<MyDeviceHandler> = StaticCell::new();

    // Create embassy-usb DeviceBuilder using the driver and config.
    static CONFIG_DESC: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUF: StaticCell<[u8; 128]> = StaticCell::new();
    let mut builder = Builder::new(
        driver,
        config,
        &mut CONFIG_DESC.init([0; 256])[..],
        &mut BOS_DESC.init([0; 256])[..],
        &mut [], // no msos descriptors
        &mut CONTROL_BUF.init([0; 128])[..],
    );

    static STATE: StaticCell<HidState> = StaticCell::new();

    builder.handler(DEVICE_HANDLER.init(MyDeviceHandler::new()));

    // Create classes on the builder.
    let config = embassy_usb::class::hid::Config {
        report_descriptor: KeyboardReport::desc(),
        request_handler: None,
        poll_ms: 10,
        max_packet_size: 64,
    };
    let hid = HidReaderWriter::<_, 1, 8>::new(&mut builder, STATE.init(HidState::new()), config);

    let cdc = {
        static STATE: StaticCell<CdcState> = StaticCell::new();
        let state = STATE.init(CdcState::new());
        CdcAcmClass::new(&mut builder, state, 64)
    };

    (builder.build(), hid, cdc)
}

#[embassy_executor::task]
pub async fn run(mut usb: MyUsbDevice, hid: MyHidReaderWriter, cdc: MyCdcAcmClass) {
    // Run the USB device.
    let usb_fut = usb.run();

    let (reader, mut writer) = hid.split();

    // Every emitted key is one press report followed by the all-zero release.
    let in_fut = async {
        loop {
            let code = KEY_CHANNEL.receive().await;
            for report in [keystroke_report(code), release_report()] {
                match writer.write_serialize(&report).await {
                    Ok(()) => {}
                    Err(_e) => defmt::warn!("failed to send report"),
                }
            }
        }
    };

    // The host's LED output reports land in the request handler below.
    let out_fut = async {
        static REQUEST_HANDLER: StaticCell<MyRequestHandler> = StaticCell::new();
        reader.run(false, REQUEST_HANDLER.init(MyRequestHandler {})).await;
    };

    // Raw command bytes from the serial channel; the tick loop re-frames them.
    let serial_fut = async {
        let (_tx, mut rx) = cdc.split();
        let mut buf = [0; 64];
        loop {
            rx.wait_connection().await;
            defmt::info!("serial connected");
            loop {
                match rx.read_packet(&mut buf).await {
                    Ok(len) => {
                        for &byte in &buf[..len] {
                            // drop bytes rather than stall the USB task
                            let _ = SERIAL_CHANNEL.try_send(byte);
                        }
                    }
                    Err(_) => break,
                }
            }
            defmt::info!("serial disconnected");
        }
    };

    // Run everything concurrently.
    join(usb_fut, join3(in_fut, out_fut, serial_fut)).await;
}

struct MyRequestHandler;

impl RequestHandler for MyRequestHandler {
    fn get_report(&mut self, _id: ReportId, _buf: &mut [u8]) -> Option<usize> {
        None
    }

    fn set_report(&mut self, _id: ReportId, data: &[u8]) -> OutResponse {
        // keyboard output report: byte 0 is the LED status byte
        if let Some(&byte) = data.first() {
            LED_STATUS.store(byte, Ordering::Relaxed);
        }
        OutResponse::Accepted
    }

    fn set_idle_ms(&mut self, _id: Option<ReportId>, _dur: u32) {}

    fn get_idle_ms(&mut self, _id: Option<ReportId>) -> Option<u32> {
        None
    }
}

struct MyDeviceHandler;

impl MyDeviceHandler {
    fn new() -> Self {
        MyDeviceHandler
    }
}

impl Handler for MyDeviceHandler {
    fn enabled(&mut self, _enabled: bool) {
        CONFIGURED.store(false, Ordering::Relaxed);
    }

    fn reset(&mut self) {
        CONFIGURED.store(false, Ordering::Relaxed);
    }

    fn addressed(&mut self, _addr: u8) {
        CONFIGURED.store(false, Ordering::Relaxed);
    }

    fn configured(&mut self, configured: bool) {
        CONFIGURED.store(configured, Ordering::Relaxed);
        if configured {
            defmt::info!("usb configured");
        }
    }
}
