use crate::config::{
    STICK_COMMAND_MOVES, STICK_COMMAND_TIMEOUT_US, STICK_LOW, STICK_MOVE_HIGH, STICK_MOVE_LOW,
};
use crate::math::FixedPoint;
use crate::time::Timer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum StickState {
    #[default]
    Start,
    Low,
    High,
}

/// Watches the roll stick while disarmed with the throttle down. Six
/// alternating left/right moves, none more than a second apart, ask for a
/// gyro and accelerometer calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StickCommand {
    state: StickState,
    moves: u8,
    last_move: Timer,
}

impl StickCommand {
    pub const fn new() -> Self {
        Self { state: StickState::Start, moves: 0, last_move: Timer::at(0) }
    }

    /// Feeds one iteration of stick values. Returns `true` exactly once
    /// when the gesture completes.
    pub fn update(&mut self, throttle: FixedPoint, roll: FixedPoint, now: u32) -> bool {
        if throttle >= STICK_LOW {
            return false;
        }

        let position = if roll < STICK_MOVE_LOW {
            Some(StickState::Low)
        } else if roll > STICK_MOVE_HIGH {
            Some(StickState::High)
        } else {
            None
        };

        if let Some(position) = position {
            match (self.state, position) {
                (StickState::Start, _) => {
                    self.moves = 1;
                    self.moved(position, now);
                }
                (StickState::High, StickState::Low) | (StickState::Low, StickState::High) => {
                    self.moves += 1;
                    self.moved(position, now);
                }
                _ => {}
            }
        }

        if self.last_move.elapsed_at(now) > STICK_COMMAND_TIMEOUT_US {
            self.state = StickState::Start;
        }

        if self.moves >= STICK_COMMAND_MOVES {
            info!("stick command: calibrate");
            self.reset();
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.state = StickState::Start;
        self.moves = 0;
    }

    pub fn moves(&self) -> u8 {
        self.moves
    }

    fn moved(&mut self, position: StickState, now: u32) {
        self.state = position;
        self.last_move = Timer::at(now);
    }
}
