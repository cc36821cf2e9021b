//! G-code program line parser
//!
//! Turns raw program text into numbered `ProgramLine`s. Parsing is pure:
//! the same text always yields the same lines and warnings.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// A single line of a G-code program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramLine {
    /// 1-based line number in the source text
    pub line_number: usize,
    /// Command text with comments stripped; empty for blank/comment lines
    pub command: String,
    /// Original line, trimmed
    pub raw: String,
}

impl ProgramLine {
    /// Whether this line carries something to send to the controller
    pub fn is_executable(&self) -> bool {
        !self.command.is_empty()
    }
}

/// Non-fatal problem found while parsing a line
///
/// The offending line is kept with an empty command, so it behaves like a
/// comment when the program runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    /// 1-based line number
    pub line_number: usize,
    /// What was wrong
    pub reason: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line_number, self.reason)
    }
}

/// Result of parsing a whole program
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedProgram {
    /// One entry per source line, in order
    pub lines: Vec<ProgramLine>,
    /// Warnings for malformed lines
    pub warnings: Vec<ParseWarning>,
}

impl ParsedProgram {
    /// Command texts of the executable lines, in order
    pub fn commands(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter(|line| line.is_executable())
            .map(|line| line.command.clone())
            .collect()
    }
}

/// A G-code word: an address letter and its numeric value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Word {
    /// Upper-case address letter
    pub letter: char,
    /// Numeric value
    pub value: f64,
}

impl Word {
    /// Whether this word is `letter` followed by exactly `code` (e.g. G1 == G01)
    pub fn is(&self, letter: char, code: f64) -> bool {
        self.letter == letter && self.value == code
    }
}

fn word_regex() -> &'static Regex {
    static WORD_REGEX: OnceLock<Regex> = OnceLock::new();
    WORD_REGEX.get_or_init(|| {
        Regex::new(r"([A-Za-z])\s*([+-]?(?:\d+\.?\d*|\.\d+))").expect("invalid regex pattern")
    })
}

fn paren_comment_regex() -> &'static Regex {
    static PAREN_REGEX: OnceLock<Regex> = OnceLock::new();
    PAREN_REGEX.get_or_init(|| Regex::new(r"\([^)]*\)").expect("invalid regex pattern"))
}

/// Extract every well-formed word from a command, ignoring anything else
pub fn words(command: &str) -> Vec<Word> {
    word_regex()
        .captures_iter(command)
        .filter_map(|caps| {
            let letter = caps.get(1)?.as_str().chars().next()?.to_ascii_uppercase();
            let value = caps.get(2)?.as_str().parse::<f64>().ok()?;
            Some(Word { letter, value })
        })
        .collect()
}

/// Words of the code part of a command
///
/// `;` and `( )` comments are removed first, so text inside a comment never
/// yields a word. An unterminated `(` comments out the rest of the line.
pub fn command_words(command: &str) -> Vec<Word> {
    let code = command.split(';').next().unwrap_or_default();
    let code = paren_comment_regex().replace_all(code, " ");
    let code = code.split('(').next().unwrap_or_default();
    words(code)
}

/// Split a command into words, failing on anything that is not a word
pub fn tokenize(command: &str) -> Result<Vec<Word>, String> {
    let mut result = Vec::new();
    let mut cursor = 0;

    for caps in word_regex().captures_iter(command) {
        let Some(whole) = caps.get(0) else { continue };
        let gap = &command[cursor..whole.start()];
        if !gap.trim().is_empty() {
            return Err(format!("unexpected '{}'", gap.trim()));
        }
        cursor = whole.end();

        let letter = caps[1].chars().next().map(|c| c.to_ascii_uppercase());
        let value = caps[2].parse::<f64>().ok();
        match (letter, value) {
            (Some(letter), Some(value)) => result.push(Word { letter, value }),
            _ => return Err(format!("malformed word '{}'", whole.as_str())),
        }
    }

    let tail = &command[cursor..];
    if !tail.trim().is_empty() {
        return Err(format!("unexpected '{}'", tail.trim()));
    }

    Ok(result)
}

/// Whether a raw line should be sent at all (not blank, not a `;` comment)
pub fn is_executable(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with(';')
}

/// Strip comments from a trimmed line
///
/// Returns `Err` for an unterminated parenthesized comment.
fn strip_comments(line: &str) -> Result<String, String> {
    let without_semicolon = match line.find(';') {
        Some(idx) => &line[..idx],
        None => line,
    };

    let without_parens = paren_comment_regex().replace_all(without_semicolon, " ");
    if without_parens.contains('(') {
        return Err("unterminated comment".to_string());
    }
    if without_parens.contains(')') {
        return Err("unbalanced ')'".to_string());
    }

    Ok(without_parens.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Parse a single source line
pub fn parse_line(line_number: usize, text: &str) -> (ProgramLine, Option<ParseWarning>) {
    let raw = text.trim().to_string();

    let no_op = |raw: String| ProgramLine {
        line_number,
        command: String::new(),
        raw,
    };

    if raw.is_empty() || raw.starts_with(';') || raw == "%" {
        return (no_op(raw), None);
    }

    let command = match strip_comments(&raw) {
        Ok(command) => command,
        Err(reason) => {
            return (no_op(raw), Some(ParseWarning { line_number, reason }));
        }
    };

    // Controller system commands ($H, $X, $$) are passed through verbatim
    if !command.is_empty() && !command.starts_with('$') {
        if let Err(reason) = tokenize(&command) {
            return (no_op(raw), Some(ParseWarning { line_number, reason }));
        }
    }

    (
        ProgramLine {
            line_number,
            command,
            raw,
        },
        None,
    )
}

/// Parse raw program text into numbered lines
pub fn parse_program(text: &str) -> ParsedProgram {
    let mut program = ParsedProgram::default();

    for (index, line) in text.lines().enumerate() {
        let (parsed, warning) = parse_line(index + 1, line);
        if let Some(warning) = warning {
            tracing::warn!("Parse warning at {}", warning);
            program.warnings.push(warning);
        }
        program.lines.push(parsed);
    }

    program
}
