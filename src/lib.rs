//! # CarveCraft
//!
//! Control host for Arduino-class CNC controllers over a serial link:
//! - Serial port discovery and connection at a chosen baud rate
//! - Jogging and homing
//! - G-code program loading and sequential execution with pause, resume, and stop
//! - Live machine status and a command/response console
//!
//! ## Architecture
//!
//! CarveCraft is organized as a workspace with multiple crates:
//!
//! 1. **carvecraft-core** - Status model, errors, status event bus, console
//! 2. **carvecraft-gcode** - Program parsing and position tracking
//! 3. **carvecraft-communication** - Transports, command channel, job runner, controller
//! 4. **carvecraft-settings** - Persisted configuration
//! 5. **carvecraft** - Command-line binary that integrates all crates

use std::sync::Arc;
use std::time::Duration;

pub use carvecraft_core::{
    Axis, ConnectionError, ConnectionSettings, ConnectionState, ConsoleEntry, ConsoleEntryKind,
    ControllerError, Error, GcodeError, JogDirection, MachineStatus, Position, Result,
    SerialPortDescriptor, StatusEventBus, SubscriptionId,
};

pub use carvecraft_gcode::{parse_program, Program, ProgramLine, SAMPLE_PROGRAM};

pub use carvecraft_communication::{
    ControllerConfig, FlowControl, JobOutcome, MachineController, SerialTransport,
    SimulatedTransport, Transport,
};

pub use carvecraft_settings::{Config, FlowControlMode};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Controller tuning derived from a configuration
pub fn controller_config(config: &Config) -> ControllerConfig {
    let flow_control = match config.job.flow_control {
        FlowControlMode::Acknowledged => FlowControl::Acknowledged,
        FlowControlMode::FixedDelay => {
            FlowControl::FixedDelay(Duration::from_millis(config.job.line_delay_ms))
        }
    };

    ControllerConfig {
        command_timeout: Duration::from_millis(config.connection.timeout_ms),
        flow_control,
        console_max_entries: config.console.max_entries,
    }
}

/// Build a controller for a configuration
///
/// With `simulate` set the controller talks to the simulated device, which
/// always paces jobs with a fixed delay.
pub fn build_controller(config: &Config, simulate: bool) -> MachineController {
    let mut tuning = controller_config(config);

    let transport: Arc<dyn Transport> = if simulate {
        if tuning.flow_control == FlowControl::Acknowledged {
            tuning.flow_control =
                FlowControl::FixedDelay(Duration::from_millis(config.job.line_delay_ms));
        }
        Arc::new(SimulatedTransport::default())
    } else {
        Arc::new(SerialTransport::new(tuning.command_timeout))
    };

    MachineController::new(transport, tuning)
}

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
