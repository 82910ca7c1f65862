// Keypad map, display glyphs, and symbol -> command routing
//
// Keypad and Bluetooth share one alphabet: the movement glyph codes for the
// arrows, plain ASCII for everything else.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::messages::MotionCommand;

/// Glyphs of the display font pages.
///
/// Movement and status glyphs live on page 67-75, mode glyphs on page 78-79.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayGlyph {
    Front,
    Back,
    Left,
    Right,
    Stop,
    Run,
    Mode1,
    Mode2,
}

impl DisplayGlyph {
    pub const MOVEMENT: [DisplayGlyph; 4] = [
        DisplayGlyph::Front,
        DisplayGlyph::Back,
        DisplayGlyph::Left,
        DisplayGlyph::Right,
    ];
    pub const STATUS: [DisplayGlyph; 2] = [DisplayGlyph::Stop, DisplayGlyph::Run];
    pub const MODES: [DisplayGlyph; 2] = [DisplayGlyph::Mode1, DisplayGlyph::Mode2];

    /// Character code within its font page
    pub const fn code(self) -> u8 {
        match self {
            DisplayGlyph::Front => 0x67,
            DisplayGlyph::Back => 0x69,
            DisplayGlyph::Left => 0x66,
            DisplayGlyph::Right => 0x68,
            DisplayGlyph::Stop => 0xA0,
            DisplayGlyph::Run => 0xB6,
            DisplayGlyph::Mode1 => 0x8A,
            DisplayGlyph::Mode2 => 0x8B,
        }
    }
}

pub const KEYPAD_ROWS: usize = 4;
pub const KEYPAD_COLS: usize = 3;

/// Symbol produced by each keypad position
pub const KEYMAP: [[u8; KEYPAD_COLS]; KEYPAD_ROWS] = [
    [b'1', DisplayGlyph::Front.code(), b'3'],
    [DisplayGlyph::Left.code(), b'5', DisplayGlyph::Right.code()],
    [b'7', DisplayGlyph::Back.code(), b'9'],
    [b'*', b'+', b'#'],
];

/// Symbol at a keypad position, `None` outside the grid
pub fn key_at(row: usize, col: usize) -> Option<u8> {
    KEYMAP.get(row).and_then(|r| r.get(col)).copied()
}

/// Fixed symbol -> command lookup
#[derive(Debug, Clone, Copy)]
pub struct InputRouter {
    /// Robot lengths per straight move
    pub steps: u32,
    /// Pivot angle per turn
    pub turn_degrees: u32,
}

impl Default for InputRouter {
    fn default() -> Self {
        Self {
            steps: 1,
            turn_degrees: 90,
        }
    }
}

impl InputRouter {
    /// Map a symbol to a command; anything else is ignored
    pub fn route(&self, symbol: u8) -> Option<MotionCommand> {
        const FRONT: u8 = DisplayGlyph::Front.code();
        const BACK: u8 = DisplayGlyph::Back.code();
        const LEFT: u8 = DisplayGlyph::Left.code();
        const RIGHT: u8 = DisplayGlyph::Right.code();
        const STOP: u8 = DisplayGlyph::Stop.code();

        let command = match symbol {
            FRONT => MotionCommand::Forward { steps: self.steps },
            BACK => MotionCommand::Backward { steps: self.steps },
            LEFT => MotionCommand::TurnLeft {
                degrees: self.turn_degrees,
            },
            RIGHT => MotionCommand::TurnRight {
                degrees: self.turn_degrees,
            },
            b'#' | STOP => MotionCommand::Stop,
            _ => {
                debug!("Ignoring symbol 0x{:02X}", symbol);
                return None;
            }
        };
        Some(command)
    }
}
