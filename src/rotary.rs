//! Turns the raw rotary encoder position into volume key emissions.
//!
//! The encoder counts 4 raw ticks per mechanical detent, so emissions are
//! gated to one per detent in either direction.

/// Raw encoder ticks per mechanical detent.
const DETENT_TICKS: i32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

/// Tracks the last detent boundary the counter has crossed.
#[derive(Default)]
pub struct RotaryEvents {
    last_detent: i32,
}

impl RotaryEvents {
    pub const fn new() -> Self {
        Self { last_detent: 0 }
    }

    /// Poll with the current raw position; yields at most one step per call.
    pub fn poll(&mut self, position: i32) -> Option<Direction> {
        let delta = position - self.last_detent;
        if delta >= DETENT_TICKS {
            self.last_detent += DETENT_TICKS;
            Some(Direction::Clockwise)
        } else if delta <= -DETENT_TICKS {
            self.last_detent -= DETENT_TICKS;
            Some(Direction::CounterClockwise)
        } else {
            None
        }
    }
}
