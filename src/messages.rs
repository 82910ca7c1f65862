// Message types for the runtime

use serde::{Deserialize, Serialize};

use crate::config::MAX_PWM;
use crate::symbols::DisplayGlyph;

/// Drive wheel; motor A is the left wheel, motor B the right one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wheel {
    Left,
    Right,
}

impl Wheel {
    pub const ALL: [Wheel; 2] = [Wheel::Left, Wheel::Right];

    pub fn index(self) -> usize {
        match self {
            Wheel::Left => 0,
            Wheel::Right => 1,
        }
    }
}

/// Motion intent; one is active at a time and a new one preempts it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionCommand {
    /// Travel `steps` robot lengths forward
    Forward { steps: u32 },
    Backward { steps: u32 },
    /// Pivot counter-clockwise in place
    TurnLeft { degrees: u32 },
    TurnRight { degrees: u32 },
    Stop,
}

impl MotionCommand {
    /// Movement glyph shown while the command is running
    pub fn glyph(&self) -> DisplayGlyph {
        match self {
            MotionCommand::Forward { .. } => DisplayGlyph::Front,
            MotionCommand::Backward { .. } => DisplayGlyph::Back,
            MotionCommand::TurnLeft { .. } => DisplayGlyph::Left,
            MotionCommand::TurnRight { .. } => DisplayGlyph::Right,
            MotionCommand::Stop => DisplayGlyph::Stop,
        }
    }
}

/// Signed speed for one wheel for one control cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelCommand {
    pub wheel: Wheel,
    pub speed: i16,
}

impl WheelCommand {
    /// Saturates `speed` to the PWM range
    pub fn new(wheel: Wheel, speed: i32) -> Self {
        Self {
            wheel,
            speed: speed.clamp(-MAX_PWM, MAX_PWM) as i16,
        }
    }
}

/// Per-wheel controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlState {
    #[default]
    Idle,
    Running,
    Done,
}

/// Actuation published every cycle
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WheelActuation {
    pub left: i16,
    pub right: i16,
}

/// Motion status published every cycle, also consumed by the display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionStatus {
    pub state: ControlState,
    pub command: Option<MotionCommand>,
    pub left_ticks: i32,
    pub right_ticks: i32,
    /// Movement glyph of the active command, `Stop` when idle
    pub glyph: DisplayGlyph,
    /// `Run` while a command is active, `Stop` otherwise
    pub status_glyph: DisplayGlyph,
}

/// Symbol received from the remote keypad publisher
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SymbolMessage {
    pub symbol: u8,
}
