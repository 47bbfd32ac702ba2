//! Applies decoded [Command]s to the [LightingState] and the effect engine.
//!
//! The status-byte protocol only carries one on/off bit per target, so the
//! dispatcher turns repetition into addressing: pulsing "on" at an
//! already-on target advances its palette color, pulsing "off" at an
//! already-off target resets the color. While an effect is running the key
//! target codes are repurposed as effect controls. Serial commands carry
//! absolute fields and apply directly.

use crate::command::{Command, OnOff, Target};
use crate::effect::{EffectEngine, EFFECT_MODES};
use crate::lighting::{
    LightingState, DEFAULT_EFFECT_SPEED, PALETTE, SPEED_MIN, SPEED_STEP, SPEED_MAX,
};

pub fn apply<E: EffectEngine>(command: Command, lighting: &mut LightingState, engine: &mut E) {
    match command {
        Command::Status { target, on } => apply_status(target, on, lighting, engine),
        Command::Backlight { on, color } => {
            if let Some(color) = color {
                lighting.backlight_color = color;
            }
            if let Some(on) = resolve(on, lighting.backlight_on) {
                lighting.backlight_on = on;
            }
        }
        Command::Key { index, on, color } => {
            if let Some(color) = color {
                lighting.key_color[index] = color;
            }
            if let Some(on) = resolve(on, lighting.key_lit[index]) {
                lighting.key_lit[index] = on;
            }
        }
        Command::Effect {
            on,
            mode,
            color,
            speed,
        } => {
            if let Some(mode) = mode {
                lighting.effect_mode = mode;
                engine.set_mode(EFFECT_MODES[mode]);
            }
            if let Some(color) = color {
                lighting.effect_color = color;
                engine.set_color(PALETTE[color]);
            }
            if let Some(speed) = speed {
                lighting.effect_speed = speed;
                engine.set_speed(speed);
            }
            match resolve(on, lighting.effect_active) {
                Some(true) if !lighting.effect_active => start_effect(lighting, engine),
                Some(false) if lighting.effect_active => stop_effect(lighting, engine),
                _ => {}
            }
        }
        Command::Reset => reset_all(lighting, engine),
    }
}

fn apply_status<E: EffectEngine>(
    target: Target,
    on: bool,
    lighting: &mut LightingState,
    engine: &mut E,
) {
    if target == Target::Effect {
        if on {
            toggle_effect(lighting, engine);
        } else {
            reset_all(lighting, engine);
        }
        return;
    }
    if lighting.effect_active {
        // key codes double as effect controls while an effect runs
        match target {
            Target::Key(0) => advance_effect_mode(lighting, engine),
            Target::Key(1) => advance_effect_color(lighting, engine),
            Target::Key(3) => advance_effect_speed(lighting, engine),
            _ => {}
        }
        return;
    }
    match target {
        Target::Backlight => match (on, lighting.backlight_on) {
            (true, false) => lighting.backlight_on = true,
            (true, true) => {
                lighting.backlight_color = (lighting.backlight_color + 1) % PALETTE.len();
            }
            (false, true) => lighting.backlight_on = false,
            (false, false) => lighting.backlight_color = PALETTE.len() - 1,
        },
        Target::Key(index) => match (on, lighting.key_lit[index]) {
            (true, false) => lighting.key_lit[index] = true,
            (true, true) => {
                lighting.key_color[index] = (lighting.key_color[index] + 1) % PALETTE.len();
            }
            (false, true) => lighting.key_lit[index] = false,
            (false, false) => lighting.key_color[index] = 0,
        },
        Target::Effect => {} // handled above
    }
}

fn resolve(on: OnOff, current: bool) -> Option<bool> {
    match on {
        OnOff::Off => Some(false),
        OnOff::On => Some(true),
        OnOff::Toggle => Some(!current),
        OnOff::Keep => None,
    }
}

pub fn start_effect<E: EffectEngine>(lighting: &mut LightingState, engine: &mut E) {
    lighting.effect_active = true;
    engine.start();
}

pub fn stop_effect<E: EffectEngine>(lighting: &mut LightingState, engine: &mut E) {
    lighting.effect_active = false;
    engine.stop();
}

pub fn toggle_effect<E: EffectEngine>(lighting: &mut LightingState, engine: &mut E) {
    if lighting.effect_active {
        stop_effect(lighting, engine);
    } else {
        start_effect(lighting, engine);
    }
}

pub fn advance_effect_mode<E: EffectEngine>(lighting: &mut LightingState, engine: &mut E) {
    lighting.effect_mode = (lighting.effect_mode + 1) % EFFECT_MODES.len();
    engine.set_mode(EFFECT_MODES[lighting.effect_mode]);
}

pub fn advance_effect_color<E: EffectEngine>(lighting: &mut LightingState, engine: &mut E) {
    lighting.effect_color = (lighting.effect_color + 1) % PALETTE.len();
    engine.set_color(PALETTE[lighting.effect_color]);
}

pub fn advance_effect_speed<E: EffectEngine>(lighting: &mut LightingState, engine: &mut E) {
    lighting.effect_speed = next_effect_speed(lighting.effect_speed);
    engine.set_speed(lighting.effect_speed);
}

/// Each step makes the animation faster; from the fastest it wraps back to
/// the slowest.
pub fn next_effect_speed(speed: u16) -> u16 {
    if speed <= SPEED_MIN {
        SPEED_MAX
    } else {
        speed - SPEED_STEP
    }
}

/// Restore every lighting default and stop the engine. The engine is also
/// re-primed with the default mode, color and speed so the next start looks
/// like a boot start.
pub fn reset_all<E: EffectEngine>(lighting: &mut LightingState, engine: &mut E) {
    *lighting = LightingState::new();
    engine.stop();
    engine.set_mode(EFFECT_MODES[lighting.effect_mode]);
    engine.set_color(PALETTE[lighting.effect_color]);
    engine.set_speed(DEFAULT_EFFECT_SPEED);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::EffectMode;
    use crate::lighting::KEY_COUNT;
    use smart_leds::RGB8;

    #[derive(Default)]
    struct FakeEngine {
        active: bool,
        mode: Option<EffectMode>,
        color: Option<RGB8>,
        speed: Option<u16>,
        starts: usize,
        stops: usize,
    }

    impl EffectEngine for FakeEngine {
        fn start(&mut self) {
            self.active = true;
            self.starts += 1;
        }
        fn stop(&mut self) {
            self.active = false;
            self.stops += 1;
        }
        fn set_mode(&mut self, mode: EffectMode) {
            self.mode = Some(mode);
        }
        fn set_color(&mut self, color: RGB8) {
            self.color = Some(color);
        }
        fn set_speed(&mut self, millis: u16) {
            self.speed = Some(millis);
        }
        fn is_active(&self) -> bool {
            self.active
        }
    }

    fn key_on(index: usize) -> Command {
        Command::Status {
            target: Target::Key(index),
            on: true,
        }
    }

    #[test]
    fn repeated_key_on_cycles_the_color_and_wraps() {
        let mut lighting = LightingState::new();
        let mut engine = FakeEngine::default();
        apply(key_on(2), &mut lighting, &mut engine);
        assert!(lighting.key_lit[2]);
        assert_eq!(lighting.key_color[2], 0);
        for expected in [1, 2, 3, 4, 5, 6, 0] {
            apply(key_on(2), &mut lighting, &mut engine);
            assert!(lighting.key_lit[2]);
            assert_eq!(lighting.key_color[2], expected);
        }
    }

    #[test]
    fn backlight_off_while_off_resets_color_to_palette_last() {
        let mut lighting = LightingState::new();
        let mut engine = FakeEngine::default();
        lighting.backlight_color = 2;
        apply(
            Command::Status {
                target: Target::Backlight,
                on: false,
            },
            &mut lighting,
            &mut engine,
        );
        assert!(!lighting.backlight_on);
        assert_eq!(lighting.backlight_color, PALETTE.len() - 1);
    }

    #[test]
    fn key_off_while_unlit_resets_color_to_zero() {
        let mut lighting = LightingState::new();
        let mut engine = FakeEngine::default();
        lighting.key_color[4] = 5;
        apply(
            Command::Status {
                target: Target::Key(4),
                on: false,
            },
            &mut lighting,
            &mut engine,
        );
        assert!(!lighting.key_lit[4]);
        assert_eq!(lighting.key_color[4], 0);
    }

    #[test]
    fn effect_target_toggles_the_engine() {
        let mut lighting = LightingState::new();
        let mut engine = FakeEngine::default();
        let toggle = Command::Status {
            target: Target::Effect,
            on: true,
        };
        apply(toggle, &mut lighting, &mut engine);
        assert!(lighting.effect_active);
        assert!(engine.active);
        apply(toggle, &mut lighting, &mut engine);
        assert!(!lighting.effect_active);
        assert!(!engine.active);
    }

    #[test]
    fn key_codes_become_effect_controls_while_active() {
        let mut lighting = LightingState::new();
        let mut engine = FakeEngine::default();
        start_effect(&mut lighting, &mut engine);

        apply(key_on(0), &mut lighting, &mut engine);
        assert_eq!(lighting.effect_mode, 1);
        assert_eq!(engine.mode, Some(EFFECT_MODES[1]));
        assert!(!lighting.key_lit[0]);

        apply(key_on(1), &mut lighting, &mut engine);
        assert_eq!(lighting.effect_color, 1);
        assert_eq!(engine.color, Some(PALETTE[1]));

        apply(key_on(3), &mut lighting, &mut engine);
        assert_eq!(lighting.effect_speed, 2000);
        assert_eq!(engine.speed, Some(2000));

        // the remaining key codes do nothing in effect mode
        apply(key_on(2), &mut lighting, &mut engine);
        apply(key_on(4), &mut lighting, &mut engine);
        apply(key_on(5), &mut lighting, &mut engine);
        assert_eq!(lighting.key_lit, [false; KEY_COUNT]);
    }

    #[test]
    fn speed_steps_down_and_wraps_to_slowest() {
        assert_eq!(next_effect_speed(3000), 2000);
        assert_eq!(next_effect_speed(2000), 1000);
        assert_eq!(next_effect_speed(1000), 10_000);
    }

    #[test]
    fn reset_restores_every_default_and_stops_the_engine() {
        let mut lighting = LightingState::new();
        let mut engine = FakeEngine::default();
        for index in 0..KEY_COUNT {
            lighting.key_lit[index] = true;
            lighting.key_color[index] = 3;
        }
        lighting.backlight_on = true;
        lighting.backlight_color = 1;
        start_effect(&mut lighting, &mut engine);
        lighting.effect_mode = 4;
        lighting.effect_color = 2;
        lighting.effect_speed = 9000;

        apply(Command::Reset, &mut lighting, &mut engine);

        assert_eq!(lighting, LightingState::new());
        assert!(!engine.active);
        assert_eq!(engine.mode, Some(EFFECT_MODES[0]));
        assert_eq!(engine.color, Some(PALETTE[0]));
        assert_eq!(engine.speed, Some(3000));
    }

    #[test]
    fn status_reset_byte_matches_serial_reset() {
        let mut a = LightingState::new();
        let mut b = LightingState::new();
        let mut engine_a = FakeEngine::default();
        let mut engine_b = FakeEngine::default();
        a.backlight_on = true;
        b.backlight_on = true;
        apply(
            Command::Status {
                target: Target::Effect,
                on: false,
            },
            &mut a,
            &mut engine_a,
        );
        apply(Command::Reset, &mut b, &mut engine_b);
        assert_eq!(a, b);
    }

    #[test]
    fn serial_key_command_applies_fields_absolutely() {
        let mut lighting = LightingState::new();
        let mut engine = FakeEngine::default();
        apply(
            Command::Key {
                index: 1,
                on: OnOff::On,
                color: Some(4),
            },
            &mut lighting,
            &mut engine,
        );
        assert!(lighting.key_lit[1]);
        assert_eq!(lighting.key_color[1], 4);

        // Toggle flips, Keep leaves the lit state alone
        apply(
            Command::Key {
                index: 1,
                on: OnOff::Toggle,
                color: None,
            },
            &mut lighting,
            &mut engine,
        );
        assert!(!lighting.key_lit[1]);
        apply(
            Command::Key {
                index: 1,
                on: OnOff::Keep,
                color: Some(2),
            },
            &mut lighting,
            &mut engine,
        );
        assert!(!lighting.key_lit[1]);
        assert_eq!(lighting.key_color[1], 2);
    }

    #[test]
    fn serial_effect_command_pushes_fields_to_the_engine() {
        let mut lighting = LightingState::new();
        let mut engine = FakeEngine::default();
        apply(
            Command::Effect {
                on: OnOff::On,
                mode: Some(2),
                color: Some(3),
                speed: Some(5000),
            },
            &mut lighting,
            &mut engine,
        );
        assert!(lighting.effect_active);
        assert_eq!(engine.mode, Some(EffectMode::FireFlicker));
        assert_eq!(engine.color, Some(PALETTE[3]));
        assert_eq!(engine.speed, Some(5000));
        assert_eq!(engine.starts, 1);

        // already running: On again must not restart the engine
        apply(
            Command::Effect {
                on: OnOff::On,
                mode: None,
                color: None,
                speed: None,
            },
            &mut lighting,
            &mut engine,
        );
        assert_eq!(engine.starts, 1);
    }
}
