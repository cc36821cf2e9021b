//! Position tracking from executed movement commands
//!
//! The tracker is not an interpreter: it only reads X/Y/Z words from
//! `G0`-`G3` lines and the `G90`/`G91` distance mode. Arcs move straight to
//! their end point. Feed, units and work offsets are ignored. Words inside
//! comments are never read.

use carvecraft_core::{Axis, Position};
use serde::{Deserialize, Serialize};

use crate::parser::{command_words, Word};

/// How axis words are interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMode {
    /// Axis words are target coordinates (`G90`)
    #[default]
    Absolute,
    /// Axis words are offsets from the current coordinate (`G91`)
    Incremental,
}

/// Side-effect class of a command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `G0`-`G3` with at least one axis word
    Motion,
    /// `M0`/`M1`
    ProgramPause,
    /// `M2`/`M30`
    ProgramEnd,
    /// Anything else
    Other,
}

fn is_motion_word(word: &Word) -> bool {
    word.letter == 'G' && [0.0, 1.0, 2.0, 3.0].contains(&word.value)
}

fn has_axis_word(parsed: &[Word]) -> bool {
    parsed.iter().any(|w| Axis::from_letter(w.letter).is_some())
}

fn is_motion(parsed: &[Word]) -> bool {
    parsed.iter().any(is_motion_word) && has_axis_word(parsed)
}

/// Whether a command moves an axis
pub fn is_motion_command(command: &str) -> bool {
    is_motion(&command_words(command))
}

/// Classify a command by the side effect it has on the machine status
///
/// A line that both moves and ends or pauses the program is classified by
/// the program word; check `is_motion_command` for its movement.
pub fn classify_command(command: &str) -> CommandKind {
    let parsed = command_words(command);

    if parsed.iter().any(|w| w.is('M', 2.0) || w.is('M', 30.0)) {
        return CommandKind::ProgramEnd;
    }
    if parsed.iter().any(|w| w.is('M', 0.0) || w.is('M', 1.0)) {
        return CommandKind::ProgramPause;
    }
    if is_motion(&parsed) {
        return CommandKind::Motion;
    }
    CommandKind::Other
}

/// Derives machine coordinates from movement commands
#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    mode: DistanceMode,
}

impl PositionTracker {
    /// Create a tracker in absolute mode
    pub fn new() -> Self {
        Self::default()
    }

    /// Current distance mode
    pub fn mode(&self) -> DistanceMode {
        self.mode
    }

    /// Apply a command to a position
    ///
    /// Mode words on the line take effect before its axis words, so
    /// `G91 G0 X5` moves by 5. Lines without a motion word leave the
    /// position unchanged.
    pub fn apply(&mut self, command: &str, position: Position) -> Position {
        let parsed = command_words(command);

        for word in &parsed {
            if word.is('G', 90.0) {
                self.mode = DistanceMode::Absolute;
            } else if word.is('G', 91.0) {
                self.mode = DistanceMode::Incremental;
            }
        }

        if !parsed.iter().any(is_motion_word) {
            return position;
        }

        let mut next = position;
        for word in &parsed {
            if let Some(axis) = Axis::from_letter(word.letter) {
                let value = match self.mode {
                    DistanceMode::Absolute => word.value,
                    DistanceMode::Incremental => next.axis(axis) + word.value,
                };
                next.set_axis(axis, value);
            }
        }

        tracing::trace!("'{}' moved {} -> {}", command, position, next);
        next
    }

    /// Reset to absolute mode
    pub fn reset(&mut self) {
        self.mode = DistanceMode::Absolute;
    }
}
