//! Defines the key codes the keypad can emit: two logical rows of F-keys for
//! the 6 physical buttons (short presses on row one, long presses on row two)
//! plus the volume keys for the rotary encoder.
//!
//! Intimately related to [crate::scan], which decides when each code fires.

use usbd_hid::descriptor::KeyboardReport;

use crate::lighting::KEY_COUNT;

pub type HidKeyCode = u8;

/// Sentinel for an unmapped position; emission of this code is a no-op.
pub const KEY_NONE: HidKeyCode = 0;

const KEY_F13: HidKeyCode = 0x68;
const KEY_F19: HidKeyCode = 0x6E;

pub const KEY_VOLUME_UP: HidKeyCode = 0x80;
pub const KEY_VOLUME_DOWN: HidKeyCode = 0x81;

/// Short presses map to F13..F18, long presses to F19..F24.
/// Indexed by button index for short, button index + [KEY_COUNT] for long.
pub const BUTTON_KEYS: [HidKeyCode; KEY_COUNT * 2] = [
    KEY_F13, KEY_F13 + 1, KEY_F13 + 2, KEY_F13 + 3, KEY_F13 + 4, KEY_F13 + 5,
    KEY_F19, KEY_F19 + 1, KEY_F19 + 2, KEY_F19 + 3, KEY_F19 + 4, KEY_F19 + 5,
];

/// Build the single-key press report. Every emission is this report followed
/// immediately by [release_report].
pub fn keystroke_report(code: HidKeyCode) -> KeyboardReport {
    let mut report = KeyboardReport::default();
    report.keycodes[0] = code;
    report
}

/// The all-zero release report.
pub fn release_report() -> KeyboardReport {
    KeyboardReport::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_contiguous_f_keys() {
        assert_eq!(BUTTON_KEYS[0], 0x68); // F13
        assert_eq!(BUTTON_KEYS[5], 0x6D); // F18
        assert_eq!(BUTTON_KEYS[6], 0x6E); // F19
        assert_eq!(BUTTON_KEYS[11], 0x73); // F24
    }

    #[test]
    fn keystroke_report_places_code_first() {
        let report = keystroke_report(0x68);
        assert_eq!(report.keycodes, [0x68, 0, 0, 0, 0, 0]);
        assert_eq!(report.modifier, 0);
        assert_eq!(release_report().keycodes, [0; 6]);
    }
}
