//! G-code program documents
//!
//! A `Program` keeps the text exactly as loaded alongside its parsed lines.
//! Files are read and written unchanged.

use carvecraft_core::GcodeError;
use std::path::Path;

use crate::parser::{parse_program, ParseWarning, ParsedProgram, ProgramLine};

/// Built-in demo program: a 20x20mm square outline
pub const SAMPLE_PROGRAM: &str = "; CarveCraft Sample GCode
; Square outline 20x20mm

G90 ; Absolute positioning
G21 ; Millimeter units
G17 ; XY plane selection
G54 ; Use coordinate system 1

; Move to start position
G0 Z5 ; Lift to safe height
G0 X0 Y0 ; Move to origin
G0 Z0.5 ; Move close to work surface

; Start cutting
M3 S10000 ; Start spindle
G4 P2 ; Wait 2 seconds for spindle to reach speed
G1 Z-1 F100 ; Plunge into material
G1 X20 F500 ; Cut to X20
G1 Y20 F500 ; Cut to Y20
G1 X0 F500 ; Cut to X0
G1 Y0 F500 ; Cut back to origin

; Finish
G0 Z10 ; Lift to safe height
M5 ; Stop spindle
M30 ; End program
";

/// A G-code program: source text plus its parsed lines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    text: String,
    parsed: ParsedProgram,
}

impl Program {
    /// Build a program from raw text
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let parsed = parse_program(&text);
        Self { text, parsed }
    }

    /// The built-in sample program
    pub fn sample() -> Self {
        Self::from_text(SAMPLE_PROGRAM)
    }

    /// Load a program from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GcodeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| GcodeError::FileError {
            reason: format!("{}: {}", path.display(), e),
        })?;

        let program = Self::from_text(text);
        tracing::info!(
            "Loaded {} ({} lines, {} commands)",
            path.display(),
            program.lines().len(),
            program.command_count()
        );
        Ok(program)
    }

    /// Write the program text to a file, unchanged
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), GcodeError> {
        let path = path.as_ref();
        std::fs::write(path, &self.text).map_err(|e| GcodeError::FileError {
            reason: format!("{}: {}", path.display(), e),
        })?;
        tracing::info!("Saved program to {}", path.display());
        Ok(())
    }

    /// Source text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the source text and re-parse
    pub fn set_text(&mut self, text: impl Into<String>) {
        *self = Self::from_text(text);
    }

    /// All parsed lines, including blanks and comments
    pub fn lines(&self) -> &[ProgramLine] {
        &self.parsed.lines
    }

    /// Executable command texts, in order
    pub fn commands(&self) -> Vec<String> {
        self.parsed.commands()
    }

    /// Number of executable lines
    pub fn command_count(&self) -> usize {
        self.parsed.lines.iter().filter(|l| l.is_executable()).count()
    }

    /// Warnings produced while parsing
    pub fn warnings(&self) -> &[ParseWarning] {
        &self.parsed.warnings
    }

    /// Whether the program has nothing to execute
    pub fn is_empty(&self) -> bool {
        self.command_count() == 0
    }
}
