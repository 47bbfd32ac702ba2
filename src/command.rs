//! Decodes host commands at the boundary: the HID keyboard-LED status byte
//! and the 7-byte serial frame both turn into a [Command] here, once, and are
//! never re-interpreted as raw bits downstream.
//!
//! Status byte layout (low 5 bits): bit4 latch, bit3 param, bits2-0 target
//! code (0 backlight, 1-6 key index + 1, 7 effect/reset). The host toggles the
//! latch bit to mark "new command", because the byte is re-sent on every poll
//! and the lock-LED channel can only carry levels, not edges. Tracking the
//! last-seen latch makes the 0->1 transition the single decode point.

use heapless::Vec;

use crate::lighting::{KEY_COUNT, PALETTE, SPEED_STEP};

const LATCH_BIT: u8 = 0x10;
const PARAM_BIT: u8 = 0x08;
const TARGET_MASK: u8 = 0x07;
const TARGET_EFFECT: u8 = 0x07;

/// Serial frame length: sentinel byte plus six payload bytes.
pub const FRAME_LEN: usize = 7;

/// Bytes that may start a serial frame. 0xCC is the host tool's wrapper
/// prefix; the rest double as opcodes.
const SENTINELS: [u8; 6] = [0xCC, 0xDD, 0xB0, 0xBF, 0xF0, 0x99];

const OP_WRAPPER: u8 = 0xCC;
const OP_BACKLIGHT: u8 = 0xB0;
const OP_KEY: u8 = 0xBF;
const OP_EFFECT: u8 = 0xF0;
const OP_STATUS_PASSTHROUGH: u8 = 0xDD;
const OP_RESET: u8 = 0x99;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Backlight,
    Key(usize),
    Effect,
}

/// On/off request carried by serial commands. Anything outside the wire
/// values 0/1/2 means "leave the current state alone".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnOff {
    Off,
    On,
    Toggle,
    Keep,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Decoded from the status-byte protocol (directly or via 0xDD).
    Status { target: Target, on: bool },
    Backlight {
        on: OnOff,
        color: Option<usize>,
    },
    Key {
        index: usize,
        on: OnOff,
        color: Option<usize>,
    },
    Effect {
        on: OnOff,
        mode: Option<usize>,
        color: Option<usize>,
        speed: Option<u16>,
    },
    Reset,
}

/// Edge-detects the latch bit across repeated status-byte polls.
///
/// Owned by the HID polling path only; serial-origin status bytes (0xDD)
/// bypass it and decode unconditionally.
#[derive(Default)]
pub struct StatusDecoder {
    latch_handled: bool,
}

impl StatusDecoder {
    pub const fn new() -> Self {
        Self {
            latch_handled: false,
        }
    }

    pub fn feed(&mut self, byte: u8) -> Option<Command> {
        if byte & LATCH_BIT == 0 {
            self.latch_handled = false;
            return None;
        }
        if self.latch_handled {
            return None;
        }
        self.latch_handled = true;
        Some(decode_status_bits(byte))
    }
}

/// Decode the target/param fields of a status byte, ignoring the latch bit.
pub fn decode_status_bits(byte: u8) -> Command {
    let on = byte & PARAM_BIT != 0;
    let target = match byte & TARGET_MASK {
        0 => Target::Backlight,
        TARGET_EFFECT => Target::Effect,
        code => Target::Key(code as usize - 1),
    };
    Command::Status { target, on }
}

/// Re-frames the raw serial byte stream: discards bytes one at a time until a
/// sentinel is seen, then buffers the sentinel plus six payload bytes and
/// yields them as one frame.
#[derive(Default)]
pub struct FrameAccumulator {
    buf: Vec<u8, FRAME_LEN>,
}

impl FrameAccumulator {
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn feed(&mut self, byte: u8) -> Option<[u8; FRAME_LEN]> {
        if self.buf.is_empty() && !SENTINELS.contains(&byte) {
            return None;
        }
        // capacity equals FRAME_LEN, so the push cannot fail
        let _ = self.buf.push(byte);
        if self.buf.len() < FRAME_LEN {
            return None;
        }
        let mut frame = [0; FRAME_LEN];
        frame.copy_from_slice(&self.buf);
        self.buf.clear();
        Some(frame)
    }
}

/// Decode a complete frame. Returns None for unknown opcodes and invalid key
/// indices; both are dropped without error.
pub fn decode_frame(frame: &[u8; FRAME_LEN]) -> Option<Command> {
    let (opcode, payload) = if frame[0] == OP_WRAPPER {
        (frame[1], &frame[2..])
    } else {
        (frame[0], &frame[1..])
    };
    match opcode {
        OP_BACKLIGHT => Some(Command::Backlight {
            on: on_off(payload[0]),
            color: palette_index(payload[1]),
        }),
        OP_KEY => {
            let index = key_index(payload[0])?;
            Some(Command::Key {
                index,
                on: on_off(payload[1]),
                color: palette_index(payload[2]),
            })
        }
        OP_EFFECT => Some(Command::Effect {
            on: on_off(payload[0]),
            mode: mode_index(payload[1]),
            color: palette_index(payload[2]),
            speed: speed_tier(payload[3]),
        }),
        OP_STATUS_PASSTHROUGH => Some(decode_status_bits(payload[0])),
        OP_RESET => Some(Command::Reset),
        _ => None,
    }
}

fn on_off(byte: u8) -> OnOff {
    match byte {
        0 => OnOff::Off,
        1 => OnOff::On,
        2 => OnOff::Toggle,
        _ => OnOff::Keep,
    }
}

/// Wire indices are 1-based; 0 or out-of-range means "keep current".
fn palette_index(byte: u8) -> Option<usize> {
    (1..=PALETTE.len() as u8)
        .contains(&byte)
        .then(|| byte as usize - 1)
}

fn mode_index(byte: u8) -> Option<usize> {
    (1..=crate::effect::EFFECT_MODES.len() as u8)
        .contains(&byte)
        .then(|| byte as usize - 1)
}

fn key_index(byte: u8) -> Option<usize> {
    (1..=KEY_COUNT as u8).contains(&byte).then(|| byte as usize - 1)
}

/// Speed tiers 1..=10 select 1000..=10000 ms.
fn speed_tier(byte: u8) -> Option<u16> {
    (1..=10).contains(&byte).then(|| byte as u16 * SPEED_STEP)
}
