//! The keypad's lighting model: one ambient backlight, a per-key override for
//! each of the 6 keys, and the configuration of the ambient animated effect.
//! Pure state plus its defaults; mutated only by [crate::dispatch] and the
//! combo handlers in [crate::scan].

use smart_leds::RGB8;

/// Number of physical keys (and strip pixels, one per key).
pub const KEY_COUNT: usize = 6;

/// Shared color palette for backlight, per-key and effect coloring.
/// All color indices stored in [LightingState] point into this table.
pub const PALETTE: [RGB8; 7] = [
    RGB8::new(0, 0, 255),   // blue
    RGB8::new(0, 255, 255), // cyan
    RGB8::new(0, 255, 0),   // green
    RGB8::new(255, 255, 0), // yellow
    RGB8::new(255, 0, 0),   // red
    RGB8::new(255, 0, 255), // magenta
    RGB8::new(255, 255, 255), // white
];

/// Default backlight color: palette-last (white).
pub const DEFAULT_BACKLIGHT_COLOR: usize = PALETTE.len() - 1;

/// Effect speed bounds, milliseconds per animation cycle.
pub const SPEED_MIN: u16 = 1000;
pub const SPEED_MAX: u16 = 10_000;
pub const SPEED_STEP: u16 = 1000;
pub const DEFAULT_EFFECT_SPEED: u16 = 3000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LightingState {
    pub backlight_on: bool,
    pub backlight_color: usize,
    pub key_lit: [bool; KEY_COUNT],
    pub key_color: [usize; KEY_COUNT],
    pub effect_active: bool,
    pub effect_mode: usize,
    pub effect_color: usize,
    pub effect_speed: u16,
}

impl LightingState {
    pub const fn new() -> Self {
        Self {
            backlight_on: false,
            backlight_color: DEFAULT_BACKLIGHT_COLOR,
            key_lit: [false; KEY_COUNT],
            key_color: [0; KEY_COUNT],
            effect_active: false,
            effect_mode: 0,
            effect_color: 0,
            effect_speed: DEFAULT_EFFECT_SPEED,
        }
    }
}

impl Default for LightingState {
    fn default() -> Self {
        Self::new()
    }
}
