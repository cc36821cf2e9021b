//! Machine control: state machine, command channel, job runner, and the
//! operator-facing controller built on top of them.

pub mod channel;
pub mod controller;
pub mod runner;
pub mod state;

pub use channel::{is_rejection, CommandChannel, DEFAULT_COMMAND_TIMEOUT};
pub use controller::{ControllerConfig, MachineController};
pub use runner::{FlowControl, JobOutcome, JobRunner};
pub use state::{MachineState, RunGate};
