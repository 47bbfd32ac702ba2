//! Firmware for the "shorty" USB macro keypad based on the Raspberry Pi Pico,
//! using the [embassy_rp] framework: 6 buttons, a 6-pixel WS2812 strip and a
//! rotary encoder, driven by one fixed-period tick loop.

#![no_main]
#![no_std]

mod command;
mod dispatch;
mod effect;
mod keymap;
mod lighting;
mod render;
mod rotary;
mod scan;
mod usb;

use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_rp::{
    bind_interrupts,
    gpio::{Input, Pull},
    peripherals::PIO0,
    pio::{self, Pio},
    pio_programs::rotary_encoder::{Direction as EncoderTick, PioEncoder, PioEncoderProgram},
    pio_programs::ws2812::{PioWs2812, PioWs2812Program},
};
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Ticker, Timer};
use portable_atomic::{AtomicI32, Ordering};
use smart_leds::RGB8;

use defmt_rtt as _;
use panic_reset as _;

use crate::command::{decode_frame, FrameAccumulator, StatusDecoder};
use crate::effect::FxEngine;
use crate::keymap::{HidKeyCode, KEY_VOLUME_DOWN, KEY_VOLUME_UP};
use crate::lighting::{LightingState, KEY_COUNT};
use crate::render::BootAnimation;
use crate::rotary::{Direction, RotaryEvents};
use crate::scan::{ButtonProcessor, KeySink, KeyVisual, PolledButton};

macro_rules! button_pins {
    ($dev:ident; $($pin:ident),*) => {[ $(Input::new($dev.$pin, Pull::Up)),* ]}
}

bind_interrupts!(struct PioIrqs {
    PIO0_IRQ_0 => pio::InterruptHandler<PIO0>;
});

/// Channel for emitted key codes, drained by [usb]; each code becomes a
/// press report plus a release report on the wire.
pub(crate) static KEY_CHANNEL: Channel<RawMutex, HidKeyCode, 8> = Channel::new();
/// Raw bytes arriving on the CDC serial channel, re-framed by the tick loop.
pub(crate) static SERIAL_CHANNEL: Channel<RawMutex, u8, 64> = Channel::new();
type RawMutex = embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;

/// Raw rotary position, bumped per encoder transition by [run_encoder].
static ROTARY_POSITION: AtomicI32 = AtomicI32::new(0);

const TICK_PERIOD: Duration = Duration::from_millis(5);

/// How long a tap/long-press flash stays on the strip before the loop
/// resumes; the one deliberate blocking pause in the tick loop.
const FLASH_HOLD: Duration = Duration::from_millis(50);

/// The original firmware waited this long for its HID bridge handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(500);

/// Effect color forced when the handshake fails: red, as a passive warning.
const WARNING_COLOR: RGB8 = RGB8::new(255, 0, 0);

/// Where the tick loop reads status bytes from. [InputSource::SerialSimulated]
/// replaces HID polling with status bytes typed over the serial channel, for
/// bench-testing without a host that toggles LED state.
#[derive(Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)] // one variant is always unselected
enum InputSource {
    HardwareLedStatus,
    SerialSimulated,
}

const INPUT_SOURCE: InputSource = InputSource::HardwareLedStatus;

trait StatusSource {
    fn poll(&mut self) -> Option<u8>;
}

/// The real channel: the latest host LED output report, re-read every tick.
struct HardwareLedStatus;

impl StatusSource for HardwareLedStatus {
    fn poll(&mut self) -> Option<u8> {
        Some(usb::led_status())
    }
}

/// Bench variant: one status byte per tick from the serial stream.
struct SerialSimulated;

impl StatusSource for SerialSimulated {
    fn poll(&mut self) -> Option<u8> {
        SERIAL_CHANNEL.try_receive().ok()
    }
}

/// Emission goes through the channel; a full channel drops the key rather
/// than stalling the tick loop.
struct ChannelSink;

impl KeySink for ChannelSink {
    fn send_key(&mut self, code: HidKeyCode) {
        if KEY_CHANNEL.try_send(code).is_err() {
            defmt::warn!("key channel full, dropping key {=u8}", code);
        }
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    let usb_driver = embassy_rp::usb::Driver::new(p.USB, usb::Irqs);
    let (usb_device, hid, cdc) = usb::get_device(usb_driver);
    spawner.spawn(usb::run(usb_device, hid, cdc)).expect("spawn usb");

    let Pio {
        mut common, sm0, sm1, ..
    } = Pio::new(p.PIO0, PioIrqs);
    let strip_program = PioWs2812Program::new(&mut common);
    let strip: PioWs2812<'static, PIO0, 0, KEY_COUNT> =
        PioWs2812::new(&mut common, sm0, p.DMA_CH0, p.PIN_6, &strip_program);
    let encoder_program = PioEncoderProgram::new(&mut common);
    let encoder = PioEncoder::new(&mut common, sm1, p.PIN_10, p.PIN_11, &encoder_program);
    spawner.spawn(run_encoder(encoder)).expect("spawn encoder");

    let button_pins: [Input<'static>; KEY_COUNT] = button_pins!(p;
        PIN_2, PIN_3, PIN_4, PIN_5, PIN_7, PIN_8
    );

    let mut engine: FxEngine<KEY_COUNT> = FxEngine::new();
    engine.set_color(lighting::PALETTE[0]);

    // boot handshake: give the host a moment to configure us; degrade to a
    // visual warning and keep running if it never does
    match select(usb::wait_configured(), Timer::after(HANDSHAKE_TIMEOUT)).await {
        Either::First(()) => defmt::info!("host connected"),
        Either::Second(()) => {
            defmt::warn!("no host handshake, continuing standalone");
            engine.set_color(WARNING_COLOR);
        }
    }

    match INPUT_SOURCE {
        InputSource::HardwareLedStatus => {
            run_loop(HardwareLedStatus, true, strip, button_pins, engine).await
        }
        InputSource::SerialSimulated => {
            run_loop(SerialSimulated, false, strip, button_pins, engine).await
        }
    }
}

#[embassy_executor::task]
async fn run_encoder(mut encoder: PioEncoder<'static, PIO0, 1>) {
    loop {
        match encoder.read().await {
            EncoderTick::Clockwise => {
                ROTARY_POSITION.fetch_add(1, Ordering::Relaxed);
            }
            EncoderTick::CounterClockwise => {
                ROTARY_POSITION.fetch_sub(1, Ordering::Relaxed);
            }
        }
    }
}

/// The cooperative tick loop. Per tick: status-byte ingestion, rotary
/// ingestion, button scan/dispatch, render, serial-frame ingestion.
async fn run_loop<S: StatusSource>(
    mut source: S,
    ingest_frames: bool,
    mut strip: PioWs2812<'static, PIO0, 0, KEY_COUNT>,
    pins: [Input<'static>; KEY_COUNT],
    mut engine: FxEngine<KEY_COUNT>,
) -> ! {
    let mut lighting = LightingState::new();
    let mut status = StatusDecoder::new();
    let mut frames = FrameAccumulator::new();
    let mut processor = ButtonProcessor::new();
    let mut rotary = RotaryEvents::new();
    let mut buttons = [PolledButton::new(); KEY_COUNT];
    let mut sink = ChannelSink;
    let mut boot = BootAnimation::start(&mut engine);

    let mut ticker = Ticker::every(TICK_PERIOD);
    loop {
        let now = Instant::now().as_millis() as u32;

        if let Some(byte) = source.poll() {
            if let Some(command) = status.feed(byte) {
                dispatch::apply(command, &mut lighting, &mut engine);
            }
        }

        if let Some(direction) = rotary.poll(ROTARY_POSITION.load(Ordering::Relaxed)) {
            sink.send_key(match direction {
                Direction::Clockwise => KEY_VOLUME_UP,
                Direction::CounterClockwise => KEY_VOLUME_DOWN,
            });
        }

        for (button, pin) in buttons.iter_mut().zip(pins.iter()) {
            button.update(pin.is_low(), now);
        }
        let visuals = processor.process(&buttons, &mut lighting, &mut engine, &mut sink);

        boot.tick(&lighting, &mut engine);
        let effect_frame = if engine.is_active() {
            Some(engine.frame(now))
        } else {
            None
        };
        let frame = render::compose(&lighting, &visuals, effect_frame.as_ref());
        strip.write(&frame).await;
        if visuals
            .iter()
            .any(|v| matches!(*v, KeyVisual::TapFired | KeyVisual::LongFired))
        {
            // hold the flash so a 5ms tick doesn't swallow it
            Timer::after(FLASH_HOLD).await;
        }

        if ingest_frames {
            while let Ok(byte) = SERIAL_CHANNEL.try_receive() {
                if let Some(frame_bytes) = frames.feed(byte) {
                    if let Some(command) = decode_frame(&frame_bytes) {
                        dispatch::apply(command, &mut lighting, &mut engine);
                    }
                }
            }
        }

        ticker.next().await;
    }
}
