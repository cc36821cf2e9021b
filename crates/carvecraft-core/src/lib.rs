//! # CarveCraft Core
//!
//! Core types and utilities for CarveCraft.
//! Provides the machine status model, connection settings, the error
//! taxonomy, the status event bus, and the console history.

pub mod console;
pub mod data;
pub mod error;
pub mod event_bus;

pub use console::{ConsoleEntry, ConsoleEntryKind, ConsoleLog};

pub use data::{
    Axis, ConnectionSettings, ConnectionState, JogDirection, MachineStatus, Position,
    SerialPortDescriptor, DEFAULT_BAUD_RATE, SUPPORTED_BAUD_RATES,
};

pub use error::{ConnectionError, ControllerError, Error, GcodeError, Result};

pub use event_bus::{StatusEventBus, StatusEventBusConfig, SubscriptionId};
