//! Scans the 6 keypad buttons once per tick, classifying each press as a
//! tap, a long press or part of a combo, and emits the matching key code.
//! Uses definitions from [crate::keymap]; combo side effects go through the
//! same helpers as host commands in [crate::dispatch].
//!
//! The suppression flags guarantee exactly one emission per press-release
//! cycle: the long-press code once at the threshold, or the short-press code
//! once at release, never both and never a repeat while held.

use crate::dispatch;
use crate::effect::EffectEngine;
use crate::keymap::{HidKeyCode, BUTTON_KEYS, KEY_NONE};
use crate::lighting::{KEY_COUNT, LightingState};

/// Raw levels settle for this long before an edge is believed.
const DEBOUNCE_MS: u32 = 25;

/// Holding a button this long fires its second-row key code.
pub const LONG_PRESS_MS: u32 = 1000;

/// The combo modifier: holding this button while releasing another triggers
/// the paired action instead of either button's own classification.
pub const COMBO_MODIFIER: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ComboAction {
    ToggleBacklight,
    ToggleEffect,
    AdvanceEffectMode,
    AdvanceEffectColor,
    AdvanceEffectSpeed,
}

/// (released button, action) pairs, checked in this order.
const COMBOS: [(usize, ComboAction); 5] = [
    (0, ComboAction::ToggleBacklight),
    (1, ComboAction::ToggleEffect),
    (2, ComboAction::AdvanceEffectMode),
    (4, ComboAction::AdvanceEffectColor),
    (5, ComboAction::AdvanceEffectSpeed),
];

/// Debounced per-tick view of one button, as the processor needs it.
pub trait ButtonSample {
    fn is_pressed(&self) -> bool;
    /// True only on the tick the stable level dropped back to released.
    fn was_released(&self) -> bool;
    fn pressed_for(&self, ms: u32) -> bool;
}

/// Where emitted key codes go; the USB task implements this over a channel.
pub trait KeySink {
    fn send_key(&mut self, code: HidKeyCode);
}

/// What the render phase should show for a key this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyVisual {
    Idle,
    Held,
    TapFired,
    LongFired,
}

pub struct ButtonProcessor {
    suppressed: [bool; KEY_COUNT],
}

impl ButtonProcessor {
    pub const fn new() -> Self {
        Self {
            suppressed: [false; KEY_COUNT],
        }
    }

    pub fn process<B, S, E>(
        &mut self,
        buttons: &[B; KEY_COUNT],
        lighting: &mut LightingState,
        engine: &mut E,
        sink: &mut S,
    ) -> [KeyVisual; KEY_COUNT]
    where
        B: ButtonSample,
        S: KeySink,
        E: EffectEngine,
    {
        let mut visuals = [KeyVisual::Idle; KEY_COUNT];

        if buttons[COMBO_MODIFIER].is_pressed() {
            let fired = COMBOS
                .iter()
                .find(|(released, _)| buttons[*released].was_released());
            if let Some((_, action)) = fired {
                run_combo(*action, lighting, engine);
                self.suppressed[COMBO_MODIFIER] = true;
                // combos and individual actions are mutually exclusive within
                // a tick; only the release bookkeeping still runs
                for (index, button) in buttons.iter().enumerate() {
                    if button.was_released() {
                        self.suppressed[index] = false;
                    }
                    if button.is_pressed() {
                        visuals[index] = KeyVisual::Held;
                    }
                }
                return visuals;
            }
        }

        for (index, button) in buttons.iter().enumerate() {
            if button.pressed_for(LONG_PRESS_MS) && !self.suppressed[index] {
                emit(sink, BUTTON_KEYS[index + KEY_COUNT]);
                visuals[index] = KeyVisual::LongFired;
                self.suppressed[index] = true;
            } else if button.was_released() && !self.suppressed[index] {
                emit(sink, BUTTON_KEYS[index]);
                visuals[index] = KeyVisual::TapFired;
            } else if button.is_pressed() {
                visuals[index] = KeyVisual::Held;
            }
            if button.was_released() {
                self.suppressed[index] = false;
            }
        }
        visuals
    }
}

impl Default for ButtonProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn emit<S: KeySink>(sink: &mut S, code: HidKeyCode) {
    if code != KEY_NONE {
        sink.send_key(code);
    }
}

fn run_combo<E: EffectEngine>(
    action: ComboAction,
    lighting: &mut LightingState,
    engine: &mut E,
) {
    match action {
        ComboAction::ToggleBacklight => lighting.backlight_on = !lighting.backlight_on,
        ComboAction::ToggleEffect => dispatch::toggle_effect(lighting, engine),
        ComboAction::AdvanceEffectMode => dispatch::advance_effect_mode(lighting, engine),
        ComboAction::AdvanceEffectColor => dispatch::advance_effect_color(lighting, engine),
        ComboAction::AdvanceEffectSpeed => dispatch::advance_effect_speed(lighting, engine),
    }
}

/// Debounces one raw pin level sampled once per tick and tracks how long the
/// stable pressed level has been held.
#[derive(Clone, Copy, Default)]
pub struct PolledButton {
    stable: bool,
    candidate: bool,
    candidate_since: u32,
    pressed_at: u32,
    released: bool,
    now: u32,
}

impl PolledButton {
    pub const fn new() -> Self {
        Self {
            stable: false,
            candidate: false,
            candidate_since: 0,
            pressed_at: 0,
            released: false,
            now: 0,
        }
    }

    pub fn update(&mut self, raw_pressed: bool, now_ms: u32) {
        self.now = now_ms;
        self.released = false;
        if raw_pressed != self.candidate {
            self.candidate = raw_pressed;
            self.candidate_since = now_ms;
        }
        if self.candidate != self.stable
            && now_ms.wrapping_sub(self.candidate_since) >= DEBOUNCE_MS
        {
            self.stable = self.candidate;
            if self.stable {
                self.pressed_at = now_ms;
            } else {
                self.released = true;
            }
        }
    }
}

impl ButtonSample for PolledButton {
    fn is_pressed(&self) -> bool {
        self.stable
    }

    fn was_released(&self) -> bool {
        self.released
    }

    fn pressed_for(&self, ms: u32) -> bool {
        self.stable && self.now.wrapping_sub(self.pressed_at) >= ms
    }
}
