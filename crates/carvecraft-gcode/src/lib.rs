//! # CarveCraft G-Code
//!
//! Program parsing, program documents, and position tracking.

pub mod parser;
pub mod program;
pub mod tracker;

pub use parser::{
    command_words, is_executable, parse_line, parse_program, tokenize, words, ParseWarning, ParsedProgram,
    ProgramLine, Word,
};
pub use program::{Program, SAMPLE_PROGRAM};
pub use tracker::{
    classify_command, is_motion_command, CommandKind, DistanceMode, PositionTracker,
};
