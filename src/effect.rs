//! Ambient animated effects for the whole strip.
//!
//! The dispatcher and combo handlers only ever talk to the small
//! [EffectEngine] capability trait; [FxEngine] is the in-crate implementation
//! that steps the six catalog animations one frame at a time from a
//! millisecond timestamp, so it runs the same on hardware and in tests.

use smart_leds::hsv::{hsv2rgb, Hsv};
use smart_leds::RGB8;

use crate::lighting::{DEFAULT_EFFECT_SPEED, SPEED_MAX, SPEED_MIN};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectMode {
    Breath,
    Rainbow,
    FireFlicker,
    Fade,
    Scan,
    ChaseColor,
}

/// Fixed catalog order; host mode indices point into this table.
pub const EFFECT_MODES: [EffectMode; 6] = [
    EffectMode::Breath,
    EffectMode::Rainbow,
    EffectMode::FireFlicker,
    EffectMode::Fade,
    EffectMode::Scan,
    EffectMode::ChaseColor,
];

pub trait EffectEngine {
    fn start(&mut self);
    fn stop(&mut self);
    fn set_mode(&mut self, mode: EffectMode);
    fn set_color(&mut self, color: RGB8);
    fn set_speed(&mut self, millis: u16);
    fn is_active(&self) -> bool;
}

pub struct FxEngine<const N: usize> {
    active: bool,
    mode: EffectMode,
    color: RGB8,
    speed: u32,
}

impl<const N: usize> FxEngine<N> {
    pub const fn new() -> Self {
        Self {
            active: false,
            mode: EFFECT_MODES[0],
            color: PALETTE_FALLBACK,
            speed: DEFAULT_EFFECT_SPEED as u32,
        }
    }

    /// Render the animation frame for the given uptime. Only called while
    /// active; an inactive engine yields a dark frame.
    pub fn frame(&self, now_ms: u32) -> [RGB8; N] {
        let mut frame = [RGB8::new(0, 0, 0); N];
        if !self.active {
            return frame;
        }
        let phase = now_ms % self.speed;
        // 0..=255 position within the current animation cycle
        let progress = (phase * 256 / self.speed) as u8;
        match self.mode {
            EffectMode::Breath => {
                let level = triangle(progress);
                frame = [scale(self.color, level); N];
            }
            EffectMode::Rainbow => {
                for (index, pixel) in frame.iter_mut().enumerate() {
                    let hue = progress.wrapping_add((index * 256 / N) as u8);
                    *pixel = hsv2rgb(Hsv {
                        hue,
                        sat: 255,
                        val: 255,
                    });
                }
            }
            EffectMode::FireFlicker => {
                let step = now_ms / (self.speed / 16).max(1);
                for (index, pixel) in frame.iter_mut().enumerate() {
                    let level = 128 | (noise(step, index as u32) & 0x7F);
                    *pixel = scale(self.color, level);
                }
            }
            EffectMode::Fade => {
                frame = [scale(self.color, 255 - progress); N];
            }
            EffectMode::Scan => {
                let span = 2 * (N - 1);
                let step = phase as usize * span / self.speed as usize;
                let position = if step < N { step } else { span - step };
                frame[position.min(N - 1)] = self.color;
            }
            EffectMode::ChaseColor => {
                let offset = progress as usize * N / 256;
                for (index, pixel) in frame.iter_mut().enumerate() {
                    if (index + N - offset) % 3 == 0 {
                        *pixel = self.color;
                    }
                }
            }
        }
        frame
    }
}

impl<const N: usize> Default for FxEngine<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> EffectEngine for FxEngine<N> {
    fn start(&mut self) {
        self.active = true;
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn set_mode(&mut self, mode: EffectMode) {
        self.mode = mode;
    }

    fn set_color(&mut self, color: RGB8) {
        self.color = color;
    }

    fn set_speed(&mut self, millis: u16) {
        self.speed = millis.clamp(SPEED_MIN, SPEED_MAX) as u32;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

const PALETTE_FALLBACK: RGB8 = RGB8::new(0, 0, 255);

fn scale(color: RGB8, level: u8) -> RGB8 {
    RGB8::new(
        (color.r as u16 * level as u16 / 255) as u8,
        (color.g as u16 * level as u16 / 255) as u8,
        (color.b as u16 * level as u16 / 255) as u8,
    )
}

/// Symmetric ramp 0..255..0 across one cycle.
fn triangle(progress: u8) -> u8 {
    if progress < 128 {
        progress * 2
    } else {
        (255 - progress).saturating_mul(2)
    }
}

/// Cheap deterministic flicker noise; not a statistical RNG, just uneven.
fn noise(step: u32, index: u32) -> u8 {
    let mut x = step.wrapping_mul(0x9E37_79B9) ^ index.wrapping_mul(0x85EB_CA6B);
    x ^= x >> 13;
    x = x.wrapping_mul(0xC2B2_AE35);
    (x >> 24) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_engine_renders_dark() {
        let engine: FxEngine<6> = FxEngine::new();
        assert_eq!(engine.frame(1234), [RGB8::new(0, 0, 0); 6]);
    }

    #[test]
    fn scan_lights_a_single_pixel() {
        let mut engine: FxEngine<6> = FxEngine::new();
        engine.set_mode(EffectMode::Scan);
        engine.set_color(RGB8::new(255, 0, 0));
        engine.start();
        for now in (0..3000).step_by(50) {
            let lit = engine.frame(now).iter().filter(|p| p.r > 0).count();
            assert_eq!(lit, 1);
        }
    }

    #[test]
    fn speed_is_clamped_to_bounds() {
        let mut engine: FxEngine<6> = FxEngine::new();
        engine.set_speed(0);
        engine.set_mode(EffectMode::Breath);
        engine.start();
        // would divide by zero if the clamp were missing
        let _ = engine.frame(0);
    }

    #[test]
    fn start_stop_toggles_activity() {
        let mut engine: FxEngine<6> = FxEngine::new();
        assert!(!engine.is_active());
        engine.start();
        assert!(engine.is_active());
        engine.stop();
        assert!(!engine.is_active());
    }
}
