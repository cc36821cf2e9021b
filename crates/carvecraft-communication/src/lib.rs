//! # CarveCraft Communication
//!
//! Talks to an Arduino-class CNC controller: serial and simulated
//! transports, the serialized command channel, the machine state machine,
//! and sequential job execution with pause, resume, and stop.

pub mod communication;
pub mod machine;

pub use communication::{
    is_valid_cnc_port, list_ports, Link, SerialTransport, SimulatedConfig, SimulatedTransport,
    Transport,
};

pub use machine::{
    CommandChannel, ControllerConfig, FlowControl, JobOutcome, JobRunner, MachineController,
    MachineState, RunGate, DEFAULT_COMMAND_TIMEOUT,
};
