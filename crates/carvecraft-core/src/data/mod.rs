//! Data models for machine status, positions, and connections
//!
//! This module provides:
//! - XYZ position tracking
//! - The machine status snapshot published to observers
//! - Connection lifecycle state
//! - Connection settings with baud-rate validation
//! - Serial port descriptors produced by port enumeration
//! - Jog axis and direction identifiers

use crate::error::ConnectionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Baud rates accepted by `ConnectionSettings::validate`
pub const SUPPORTED_BAUD_RATES: [u32; 6] = [9600, 19200, 38400, 57600, 115200, 230400];

/// Default baud rate for Arduino-class controllers
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Position in 3D machine space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X-axis position
    pub x: f64,
    /// Y-axis position
    pub y: f64,
    /// Z-axis position
    pub z: f64,
}

impl Position {
    /// Create a new position with X, Y, Z coordinates
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Coordinate for a single axis
    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Set the coordinate of a single axis
    pub fn set_axis(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X:{:.3} Y:{:.3} Z:{:.3}", self.x, self.y, self.z)
    }
}

/// Snapshot of the machine status
///
/// Owned by the machine state machine; observers only ever see copies.
/// A consistent snapshot satisfies `paused => running` and
/// `!connected => !running && !paused`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineStatus {
    /// A link to the controller is open
    pub connected: bool,
    /// A job is in progress
    pub running: bool,
    /// The running job is paused
    pub paused: bool,
    /// Last known machine position
    pub position: Position,
}

impl MachineStatus {
    /// Whether the snapshot honors the status invariants
    pub fn is_consistent(&self) -> bool {
        (!self.paused || self.running) && (self.connected || (!self.running && !self.paused))
    }

    /// Whether the machine accepts manual commands such as jog and home
    pub fn is_idle(&self) -> bool {
        self.connected && !self.running
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match (self.connected, self.running, self.paused) {
            (false, _, _) => "Disconnected",
            (true, false, _) => "Idle",
            (true, true, false) => "Running",
            (true, true, true) => "Paused",
        };
        write!(f, "{} [{}]", state, self.position)
    }
}

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No link
    #[default]
    Disconnected,
    /// Link is being opened
    Connecting,
    /// Link is open
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

/// Settings used to open a connection
///
/// Immutable once built; the controller keeps its own copy for the
/// lifetime of the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    port: String,
    baud_rate: u32,
}

impl ConnectionSettings {
    /// Create settings for a port and baud rate
    ///
    /// Validation is deferred to `validate`, which `connect` calls before
    /// touching the transport.
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
        }
    }

    /// Port name (e.g., "/dev/ttyACM0", "COM3")
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Baud rate
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Check the port is non-empty and the baud rate is supported
    pub fn validate(&self) -> Result<(), ConnectionError> {
        if self.port.trim().is_empty() {
            return Err(ConnectionError::InvalidSettings {
                reason: "port must not be empty".to_string(),
            });
        }
        if self.baud_rate == 0 {
            return Err(ConnectionError::InvalidSettings {
                reason: "baud rate must be positive".to_string(),
            });
        }
        if !SUPPORTED_BAUD_RATES.contains(&self.baud_rate) {
            return Err(ConnectionError::InvalidSettings {
                reason: format!("baud rate {} not supported", self.baud_rate),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {} baud", self.port, self.baud_rate)
    }
}

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialPortDescriptor {
    /// Unique identifier within one enumeration
    pub id: String,
    /// Port name to pass to `ConnectionSettings`
    pub name: String,
    /// Manufacturer name if available
    pub manufacturer: Option<String>,
}

impl SerialPortDescriptor {
    /// Create a new port descriptor
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            manufacturer: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }
}

impl fmt::Display for SerialPortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.manufacturer {
            Some(mfg) => write!(f, "{} ({})", self.name, mfg),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Axis identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// X-axis (left-right)
    X,
    /// Y-axis (front-back)
    Y,
    /// Z-axis (up-down)
    Z,
}

impl Axis {
    /// The G-code letter for this axis
    pub fn letter(&self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
        }
    }

    /// Parse an axis letter (case-insensitive)
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'X' => Some(Axis::X),
            'Y' => Some(Axis::Y),
            'Z' => Some(Axis::Z),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Jog direction along an axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JogDirection {
    /// Towards positive coordinates
    Positive,
    /// Towards negative coordinates
    Negative,
}

impl JogDirection {
    /// Apply the direction's sign to a distance
    pub fn signed(&self, distance: f64) -> f64 {
        match self {
            JogDirection::Positive => distance,
            JogDirection::Negative => -distance,
        }
    }
}
