//! Reconciles the lighting state and the per-tick button visuals into one
//! strip frame, and runs the boot countdown that flashes the effect engine
//! briefly at power-up.
//!
//! Per-key priority, highest first: long-press flash, tap flash, held color,
//! key-lit override, the running effect's own pixel, dimmed backlight, off.
//! While an effect runs it owns the strip, so key-lit overrides are not
//! rendered; press feedback still punches through.

use smart_leds::RGB8;

use crate::effect::EffectEngine;
use crate::lighting::{KEY_COUNT, LightingState, PALETTE};
use crate::scan::KeyVisual;

pub type Frame = [RGB8; KEY_COUNT];

/// Press feedback colors, fixed rather than palette-driven.
const COLOR_HELD: RGB8 = RGB8::new(0, 20, 0);
const COLOR_TAP_FLASH: RGB8 = RGB8::new(0, 0, 30);
const COLOR_LONG_FLASH: RGB8 = RGB8::new(0, 20, 20);

const OFF: RGB8 = RGB8::new(0, 0, 0);

/// Backlight renders the palette color at 1/8 brightness.
const BACKLIGHT_DIM_SHIFT: u8 = 3;

pub fn compose(
    lighting: &LightingState,
    visuals: &[KeyVisual; KEY_COUNT],
    effect_frame: Option<&Frame>,
) -> Frame {
    let mut frame = [OFF; KEY_COUNT];
    for (index, pixel) in frame.iter_mut().enumerate() {
        *pixel = match visuals[index] {
            KeyVisual::LongFired => COLOR_LONG_FLASH,
            KeyVisual::TapFired => COLOR_TAP_FLASH,
            KeyVisual::Held => COLOR_HELD,
            KeyVisual::Idle => match effect_frame {
                Some(effect) => effect[index],
                None if lighting.key_lit[index] => PALETTE[lighting.key_color[index]],
                None if lighting.backlight_on => dim(PALETTE[lighting.backlight_color]),
                None => OFF,
            },
        };
    }
    frame
}

fn dim(color: RGB8) -> RGB8 {
    RGB8::new(
        color.r >> BACKLIGHT_DIM_SHIFT,
        color.g >> BACKLIGHT_DIM_SHIFT,
        color.b >> BACKLIGHT_DIM_SHIFT,
    )
}

/// Number of ticks the power-up animation runs before stopping itself.
const BOOT_TICKS: u16 = 600;

/// Countdown threshold below which the engine is shut off.
const BOOT_STOP_BELOW: u16 = 10;

/// Runs the effect engine for a fixed count of ticks after power-up to show
/// the device is alive, without any host interaction. The engine is driven
/// directly; `effect_active` stays false, so a host command that claims the
/// effect meanwhile wins and the countdown leaves it running.
pub struct BootAnimation {
    remaining: u16,
}

impl BootAnimation {
    pub fn start<E: EffectEngine>(engine: &mut E) -> Self {
        engine.start();
        Self {
            remaining: BOOT_TICKS,
        }
    }

    /// Call once per tick; stops the engine when the countdown runs low.
    pub fn tick<E: EffectEngine>(&mut self, lighting: &LightingState, engine: &mut E) {
        if self.remaining == 0 {
            return;
        }
        self.remaining -= 1;
        if self.remaining < BOOT_STOP_BELOW {
            self.remaining = 0;
            if !lighting.effect_active {
                engine.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::EffectMode;

    #[derive(Default)]
    struct FlagEngine {
        active: bool,
    }

    impl EffectEngine for FlagEngine {
        fn start(&mut self) {
            self.active = true;
        }
        fn stop(&mut self) {
            self.active = false;
        }
        fn set_mode(&mut self, _mode: EffectMode) {}
        fn set_color(&mut self, _color: RGB8) {}
        fn set_speed(&mut self, _millis: u16) {}
        fn is_active(&self) -> bool {
            self.active
        }
    }

    const IDLE: [KeyVisual; KEY_COUNT] = [KeyVisual::Idle; KEY_COUNT];

    #[test]
    fn press_feedback_outranks_key_override() {
        let mut lighting = LightingState::new();
        lighting.key_lit[0] = true;
        lighting.key_color[0] = 4;
        let mut visuals = IDLE;
        visuals[0] = KeyVisual::Held;
        let frame = compose(&lighting, &visuals, None);
        assert_eq!(frame[0], COLOR_HELD);

        visuals[0] = KeyVisual::TapFired;
        assert_eq!(compose(&lighting, &visuals, None)[0], COLOR_TAP_FLASH);
        visuals[0] = KeyVisual::LongFired;
        assert_eq!(compose(&lighting, &visuals, None)[0], COLOR_LONG_FLASH);
    }

    #[test]
    fn key_override_outranks_backlight() {
        let mut lighting = LightingState::new();
        lighting.backlight_on = true;
        lighting.key_lit[2] = true;
        lighting.key_color[2] = 0;
        let frame = compose(&lighting, &IDLE, None);
        assert_eq!(frame[2], PALETTE[0]);
        // other keys get the dimmed backlight color
        assert_eq!(frame[0], dim(PALETTE[lighting.backlight_color]));
    }

    #[test]
    fn running_effect_suppresses_key_overrides_but_not_feedback() {
        let mut lighting = LightingState::new();
        lighting.effect_active = true;
        lighting.key_lit[1] = true;
        lighting.key_color[1] = 3;
        let effect_frame = [RGB8::new(9, 9, 9); KEY_COUNT];
        let mut visuals = IDLE;
        visuals[0] = KeyVisual::Held;
        let frame = compose(&lighting, &visuals, Some(&effect_frame));
        assert_eq!(frame[0], COLOR_HELD);
        assert_eq!(frame[1], RGB8::new(9, 9, 9));
    }

    #[test]
    fn all_off_renders_dark() {
        let lighting = LightingState::new();
        assert_eq!(compose(&lighting, &IDLE, None), [OFF; KEY_COUNT]);
    }

    #[test]
    fn boot_animation_stops_the_engine_near_zero() {
        let lighting = LightingState::new();
        let mut engine = FlagEngine::default();
        let mut boot = BootAnimation::start(&mut engine);
        assert!(engine.active);
        for _ in 0..BOOT_TICKS {
            boot.tick(&lighting, &mut engine);
        }
        assert!(!engine.active);
        // further ticks are inert
        boot.tick(&lighting, &mut engine);
        assert!(!engine.active);
    }

    #[test]
    fn boot_animation_leaves_a_host_claimed_effect_running() {
        let mut lighting = LightingState::new();
        let mut engine = FlagEngine::default();
        let mut boot = BootAnimation::start(&mut engine);
        lighting.effect_active = true; // host started an effect mid-countdown
        for _ in 0..BOOT_TICKS {
            boot.tick(&lighting, &mut engine);
        }
        assert!(engine.active);
    }
}
