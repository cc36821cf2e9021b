//! Command/response console history
//!
//! Keeps a bounded log of what was sent to the controller, what came back,
//! errors, and system notices.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Default number of entries kept before the oldest are dropped
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Kind of console entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsoleEntryKind {
    /// Command sent to the controller
    Sent,
    /// Reply received from the controller
    Received,
    /// Error while sending or executing
    Error,
    /// Host-side notice
    System,
}

impl ConsoleEntryKind {
    /// Single-character marker used when rendering the log
    pub fn marker(&self) -> char {
        match self {
            ConsoleEntryKind::Sent => '>',
            ConsoleEntryKind::Received => '<',
            ConsoleEntryKind::Error => '!',
            ConsoleEntryKind::System => '#',
        }
    }
}

/// A single console line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleEntry {
    /// Monotonic id within one log
    pub id: u64,
    /// Entry kind
    pub kind: ConsoleEntryKind,
    /// Text content
    pub content: String,
    /// When the entry was recorded
    pub timestamp: DateTime<Local>,
}

impl fmt::Display for ConsoleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}",
            self.timestamp.format("%H:%M:%S"),
            self.kind.marker(),
            self.content
        )
    }
}

/// Bounded console history
#[derive(Debug, Clone)]
pub struct ConsoleLog {
    entries: VecDeque<ConsoleEntry>,
    max_entries: usize,
    next_id: u64,
}

impl ConsoleLog {
    /// Create a log keeping at most `max_entries` lines
    pub fn new(max_entries: usize) -> Self {
        let mut log = Self {
            entries: VecDeque::new(),
            max_entries: max_entries.max(1),
            next_id: 0,
        };
        log.system("Console initialized. Connect to a device to start sending commands.");
        log
    }

    /// Append an entry, dropping the oldest when full
    pub fn push(&mut self, kind: ConsoleEntryKind, content: impl Into<String>) -> &ConsoleEntry {
        let entry = ConsoleEntry {
            id: self.next_id,
            kind,
            content: content.into(),
            timestamp: Local::now(),
        };
        self.next_id += 1;

        self.entries.push_back(entry);
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
        &self.entries[self.entries.len() - 1]
    }

    /// Record a command sent to the controller
    pub fn sent(&mut self, command: impl Into<String>) {
        self.push(ConsoleEntryKind::Sent, command);
    }

    /// Record a controller reply
    pub fn received(&mut self, reply: impl Into<String>) {
        self.push(ConsoleEntryKind::Received, reply);
    }

    /// Record an error
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(ConsoleEntryKind::Error, message);
    }

    /// Record a host-side notice
    pub fn system(&mut self, message: impl Into<String>) {
        self.push(ConsoleEntryKind::System, message);
    }

    /// Entries oldest first
    pub fn entries(&self) -> impl Iterator<Item = &ConsoleEntry> {
        self.entries.iter()
    }

    /// The most recent `count` entries, oldest first
    pub fn recent(&self, count: usize) -> Vec<ConsoleEntry> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Number of entries held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries and leave a "Console cleared." notice
    pub fn clear(&mut self) {
        self.entries.clear();
        self.system("Console cleared.");
    }
}

impl Default for ConsoleLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}
