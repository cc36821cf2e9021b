//! Operator-facing machine controller
//!
//! Ties a transport, the machine state, the command channel, and the job
//! runner together behind the operations an operator panel needs. Each
//! controller is an independent handle; several can coexist.

use carvecraft_core::{
    Axis, ConnectionError, ConnectionSettings, ConnectionState, ConsoleEntry, ConsoleLog,
    ControllerError, Error, JogDirection, MachineStatus, Result, SerialPortDescriptor,
    StatusEventBus, SubscriptionId,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use super::channel::{CommandChannel, DEFAULT_COMMAND_TIMEOUT};
use super::runner::{FlowControl, JobOutcome, JobRunner};
use super::state::MachineState;
use crate::communication::{SimulatedTransport, Transport};

/// Controller tuning
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Time to wait for each reply
    pub command_timeout: Duration,
    /// Pacing between job lines
    pub flow_control: FlowControl,
    /// Console history length
    pub console_max_entries: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            flow_control: FlowControl::Acknowledged,
            console_max_entries: carvecraft_core::console::DEFAULT_MAX_ENTRIES,
        }
    }
}

/// A job halted by a pause, kept until it is resumed or stopped
#[derive(Debug, Clone)]
struct SuspendedJob {
    lines: Arc<Vec<String>>,
    next: usize,
}

/// Operator boundary for one machine
pub struct MachineController {
    transport: Arc<dyn Transport>,
    bus: Arc<StatusEventBus>,
    state: Arc<MachineState>,
    channel: Arc<CommandChannel>,
    runner: JobRunner,
    settings: Mutex<Option<ConnectionSettings>>,
    suspended: Mutex<Option<SuspendedJob>>,
    console: Mutex<ConsoleLog>,
}

impl MachineController {
    /// Create a controller over `transport`
    pub fn new(transport: Arc<dyn Transport>, config: ControllerConfig) -> Self {
        let bus = Arc::new(StatusEventBus::new());
        let state = Arc::new(MachineState::new(bus.clone()));
        let channel = Arc::new(CommandChannel::new(state.clone(), config.command_timeout));
        let runner = JobRunner::new(channel.clone(), state.clone(), config.flow_control);

        Self {
            transport,
            bus,
            state,
            channel,
            runner,
            settings: Mutex::new(None),
            suspended: Mutex::new(None),
            console: Mutex::new(ConsoleLog::new(config.console_max_entries)),
        }
    }

    /// Controller over a simulated device with its default latencies
    ///
    /// Uses a fixed 200 ms delay between job lines.
    pub fn simulated() -> Self {
        let config = ControllerConfig {
            flow_control: FlowControl::FixedDelay(Duration::from_millis(200)),
            ..ControllerConfig::default()
        };
        Self::new(Arc::new(SimulatedTransport::default()), config)
    }

    /// Enumerate ports on the transport
    pub async fn list_ports(&self) -> Result<Vec<SerialPortDescriptor>> {
        Ok(self.transport.list_ports().await?)
    }

    /// Open a connection
    ///
    /// Invalid settings are rejected before the transport is contacted.
    pub async fn connect(&self, settings: ConnectionSettings) -> Result<()> {
        if let Err(e) = settings.validate() {
            self.console.lock().error(e.to_string());
            return Err(e.into());
        }
        self.state.begin_connect(settings.port())?;

        tracing::info!("Connecting to {} via {}", settings, self.transport.name());
        match self.transport.open(&settings).await {
            Ok(link) => {
                self.channel.open(link).await;
                *self.settings.lock() = Some(settings.clone());
                if !self.state.connected() {
                    return Err(self.cancel_connect(&settings).await);
                }
                self.console
                    .lock()
                    .system(format!("Connected to {}", settings));
                tracing::info!("Connected to {}", settings);
                Ok(())
            }
            Err(e) => {
                self.state.connect_failed();
                self.console.lock().error(e.to_string());
                tracing::error!("Connection to {} failed: {}", settings, e);
                Err(e.into())
            }
        }
    }

    /// Tear down a link whose connect was overtaken by a disconnect
    async fn cancel_connect(&self, settings: &ConnectionSettings) -> Error {
        self.settings.lock().take();
        if let Err(e) = self.channel.close().await {
            tracing::warn!("Closing cancelled link to {} failed: {}", settings, e);
        }
        let error = ConnectionError::ConnectFailed {
            port: settings.port().to_string(),
            reason: "connection cancelled".to_string(),
        };
        self.console.lock().error(error.to_string());
        tracing::warn!("Connection to {} cancelled", settings);
        error.into()
    }

    /// Close the connection, abandoning any job
    pub async fn disconnect(&self) -> Result<()> {
        self.suspended.lock().take();
        let was_connected = self.state.disconnect();
        let closed = self.channel.close().await;
        self.settings.lock().take();

        if was_connected {
            self.console.lock().system("Disconnected");
            tracing::info!("Disconnected");
        }
        closed.map_err(Into::into)
    }

    /// Send a single command, logging it and its reply to the console
    pub async fn send_command(&self, command: &str) -> Result<String> {
        let command = command.trim();
        self.console.lock().sent(command);

        match self.channel.send(command).await {
            Ok(reply) => {
                self.console.lock().received(reply.clone());
                Ok(reply)
            }
            Err(e) => {
                self.console.lock().error(e.to_string());
                Err(e)
            }
        }
    }

    /// Refuse manual motion unless connected and idle
    fn require_idle(&self, operation: &str) -> Result<()> {
        let status = self.state.snapshot();
        if !status.connected {
            return Err(ConnectionError::NotConnected.into());
        }
        if status.running {
            return Err(ControllerError::InvalidState {
                operation: operation.to_string(),
                state: status.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Jog one axis by a relative distance, then restore absolute mode
    pub async fn jog(
        &self,
        axis: Axis,
        direction: JogDirection,
        distance: f64,
        feed_rate: f64,
    ) -> Result<()> {
        self.require_idle("jog")?;
        let command = format!(
            "G91 G0 {}{} F{}",
            axis.letter(),
            direction.signed(distance),
            feed_rate
        );
        self.send_command(&command).await?;
        self.send_command("G90").await?;
        Ok(())
    }

    /// Run the homing cycle
    pub async fn home(&self) -> Result<()> {
        self.require_idle("home")?;
        self.send_command("G28").await?;
        Ok(())
    }

    /// Run a job
    ///
    /// Returns when the job completes, fails, stops, or pauses. A paused job
    /// is kept and continues on `resume`.
    pub async fn run_program(&self, lines: Vec<String>) -> Result<JobOutcome> {
        let lines = Arc::new(lines);
        self.console
            .lock()
            .system(format!("Running program ({} lines)", lines.len()));

        let outcome = self.runner.run(&lines).await;
        self.settle(lines, outcome)
    }

    /// Record the result of a run, keeping the job if it paused
    fn settle(&self, lines: Arc<Vec<String>>, outcome: Result<JobOutcome>) -> Result<JobOutcome> {
        let mut console = self.console.lock();
        match &outcome {
            Ok(JobOutcome::Paused { next }) => {
                *self.suspended.lock() = Some(SuspendedJob { lines, next: *next });
                console.system("Program paused");
            }
            Ok(JobOutcome::Stopped { .. }) => console.system("Program stopped"),
            Ok(JobOutcome::Completed { .. }) => console.system("Program completed"),
            Err(e) => console.error(format!("Program aborted: {}", e)),
        }
        outcome
    }

    /// Pause the running job at the next line boundary
    pub fn pause(&self) -> bool {
        self.state.pause()
    }

    /// Clear the pause and continue a suspended job
    ///
    /// Returns `None` when there was nothing to continue (not paused, or
    /// the runner had not yet reached a line boundary).
    pub async fn resume(&self) -> Result<Option<JobOutcome>> {
        if !self.state.resume() {
            return Ok(None);
        }

        let suspended = self.suspended.lock().take();
        match suspended {
            Some(job) => {
                self.console.lock().system("Program resumed");
                let outcome = self.runner.run_from(&job.lines, job.next).await;
                self.settle(job.lines, outcome).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Stop the running job and discard any suspended remainder
    pub fn stop(&self) -> bool {
        self.suspended.lock().take();
        self.state.stop()
    }

    /// Whether a paused job is waiting to be resumed
    pub fn has_suspended_job(&self) -> bool {
        self.suspended.lock().is_some()
    }

    /// Current status snapshot
    pub fn status(&self) -> MachineStatus {
        self.state.snapshot()
    }

    /// Connection lifecycle state
    pub fn connection_state(&self) -> ConnectionState {
        self.state.connection_state()
    }

    /// Settings of the current connection
    pub fn settings(&self) -> Option<ConnectionSettings> {
        self.settings.lock().clone()
    }

    /// Subscribe to status snapshots
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&MachineStatus) + Send + Sync + 'static,
    {
        self.bus.subscribe(handler)
    }

    /// Remove a status subscription
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Async receiver of status snapshots
    pub fn status_receiver(&self) -> broadcast::Receiver<MachineStatus> {
        self.bus.receiver()
    }

    /// Console entries, oldest first
    pub fn console_entries(&self) -> Vec<ConsoleEntry> {
        self.console.lock().entries().cloned().collect()
    }

    /// Clear the console
    pub fn clear_console(&self) {
        self.console.lock().clear();
    }
}

impl std::fmt::Debug for MachineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineController")
            .field("transport", &self.transport.name())
            .field("status", &self.status())
            .field("channel", &self.channel)
            .finish()
    }
}
