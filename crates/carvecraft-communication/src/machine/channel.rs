//! Command channel
//!
//! One line out, one reply back. The link sits behind a single async slot
//! that is held from the write until the reply (or timeout), so only one
//! command is ever in flight. Side effects on the machine state are applied
//! after a successful reply.

use carvecraft_core::{ConnectionError, ControllerError, Error, Result};
use carvecraft_gcode::{classify_command, is_motion_command, CommandKind, PositionTracker};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

use super::state::MachineState;
use crate::communication::Link;

/// Default time to wait for a reply
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(5000);

/// Whether a reply line is a controller rejection
pub fn is_rejection(reply: &str) -> bool {
    reply.trim_start().to_ascii_lowercase().starts_with("error")
}

/// Serialized command path to the controller
pub struct CommandChannel {
    slot: AsyncMutex<Option<Box<dyn Link>>>,
    open: AtomicBool,
    state: Arc<MachineState>,
    tracker: Mutex<PositionTracker>,
    timeout: Duration,
}

impl CommandChannel {
    /// Create a closed channel updating `state`
    pub fn new(state: Arc<MachineState>, timeout: Duration) -> Self {
        Self {
            slot: AsyncMutex::new(None),
            open: AtomicBool::new(false),
            state,
            tracker: Mutex::new(PositionTracker::new()),
            timeout,
        }
    }

    /// Install an open link
    ///
    /// The tracker starts over in absolute mode for every new link.
    pub async fn open(&self, link: Box<dyn Link>) {
        let mut slot = self.slot.lock().await;
        *slot = Some(link);
        self.tracker.lock().reset();
        self.open.store(true, Ordering::SeqCst);
    }

    /// Close the link, waiting for any in-flight command to finish first
    pub async fn close(&self) -> std::result::Result<(), ConnectionError> {
        self.open.store(false, Ordering::SeqCst);
        let link = self.slot.lock().await.take();
        match link {
            Some(mut link) => link.close().await,
            None => Ok(()),
        }
    }

    /// Whether a link is installed
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Reply timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send one command and wait for its reply
    ///
    /// Fails with `NotConnected` unless a link is installed and the machine
    /// state is connected.
    pub async fn send(&self, command: &str) -> Result<String> {
        let command = command.trim();
        let mut slot = self.slot.lock().await;
        let link = slot.as_mut().ok_or(ConnectionError::NotConnected)?;
        if !self.state.is_connected() {
            return Err(ConnectionError::NotConnected.into());
        }

        tracing::debug!("-> {}", command);
        let reply = match tokio::time::timeout(self.timeout, link.write_line(command)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::error!("Write of '{}' failed: {}", command, e);
                return Err(ControllerError::CommandFailed {
                    command: command.to_string(),
                    reason: e.to_string(),
                }
                .into());
            }
            Err(_) => {
                tracing::warn!("'{}' timed out after {:?}", command, self.timeout);
                return Err(ControllerError::Timeout {
                    command: command.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                }
                .into());
            }
        };
        tracing::debug!("<- {}", reply);

        if is_rejection(&reply) {
            return Err(Error::Controller(ControllerError::CommandRejected {
                command: command.to_string(),
                reply,
            }));
        }

        self.apply_side_effects(command);
        drop(slot);

        Ok(reply)
    }

    fn apply_side_effects(&self, command: &str) {
        let current = self.state.position();
        let next = self.tracker.lock().apply(command, current);

        if is_motion_command(command) {
            self.state.update_position(next);
        }

        match classify_command(command) {
            CommandKind::Motion | CommandKind::Other => {}
            CommandKind::ProgramPause => {
                if self.state.pause() {
                    tracing::info!("Program paused by '{}'", command);
                }
            }
            CommandKind::ProgramEnd => {
                if self.state.stop() {
                    tracing::info!("Program ended by '{}'", command);
                }
            }
        }
    }
}

impl std::fmt::Debug for CommandChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannel")
            .field("open", &self.is_open())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::{SimulatedTransport, Transport};
    use carvecraft_core::{ConnectionSettings, Position, StatusEventBus};

    async fn open_channel(transport: &SimulatedTransport) -> (CommandChannel, Arc<MachineState>) {
        let state = Arc::new(MachineState::new(Arc::new(StatusEventBus::new())));
        let channel = CommandChannel::new(state.clone(), DEFAULT_COMMAND_TIMEOUT);
        let link = transport
            .open(&ConnectionSettings::new("COM3", 115200))
            .await
            .unwrap();
        state.begin_connect("COM3").unwrap();
        channel.open(link).await;
        state.connected();
        (channel, state)
    }

    #[tokio::test]
    async fn test_send_without_link() {
        let state = Arc::new(MachineState::new(Arc::new(StatusEventBus::new())));
        let channel = CommandChannel::new(state, DEFAULT_COMMAND_TIMEOUT);
        let err = channel.send("G0 X1").await.unwrap_err();
        assert!(err.is_not_connected());
    }

    #[tokio::test]
    async fn test_motion_updates_position() {
        let transport = SimulatedTransport::instant();
        let (channel, state) = open_channel(&transport).await;

        assert_eq!(channel.send("G1 X10 Y5").await.unwrap(), "ok");
        channel.send("G1 Z-2").await.unwrap();
        assert_eq!(state.position(), Position::new(10.0, 5.0, -2.0));
    }

    #[tokio::test]
    async fn test_rejection_is_command_failure() {
        let transport = SimulatedTransport::instant();
        transport.reject_command("G1 X99");
        let (channel, state) = open_channel(&transport).await;

        let err = channel.send("G1 X99").await.unwrap_err();
        assert!(err.is_command_failure());
        assert_eq!(err.command(), Some("G1 X99"));
        assert_eq!(state.position(), Position::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let transport = SimulatedTransport::instant();
        transport.ignore_command("G4 P100");
        let (channel, _) = open_channel(&transport).await;

        let err = channel.send("G4 P100").await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.command(), Some("G4 P100"));
    }

    #[tokio::test]
    async fn test_pause_and_end_words() {
        let transport = SimulatedTransport::instant();
        let (channel, state) = open_channel(&transport).await;

        channel.send("M0").await.unwrap();
        assert!(!state.is_paused());

        state.start_job();
        channel.send("M1").await.unwrap();
        assert!(state.is_running() && state.is_paused());

        channel.send("M30").await.unwrap();
        assert!(!state.is_running() && !state.is_paused());
    }

    #[tokio::test]
    async fn test_comment_text_has_no_side_effects() {
        let transport = SimulatedTransport::instant();
        let (channel, state) = open_channel(&transport).await;
        state.start_job();

        channel.send("G1 X1 ; next: M2 retract").await.unwrap();
        assert!(state.is_running() && !state.is_paused());
        assert_eq!(state.position(), Position::new(1.0, 0.0, 0.0));

        channel.send("G0 X5 ; y 3").await.unwrap();
        assert_eq!(state.position(), Position::new(5.0, 0.0, 0.0));

        channel.send("G4 P1 (M0 wait)").await.unwrap();
        assert!(!state.is_paused());
    }

    #[tokio::test]
    async fn test_motion_on_program_end_line_is_tracked() {
        let transport = SimulatedTransport::instant();
        let (channel, state) = open_channel(&transport).await;
        state.start_job();

        channel.send("G0 Z10 M30").await.unwrap();
        assert!(!state.is_running());
        assert_eq!(state.position(), Position::new(0.0, 0.0, 10.0));
    }

    #[tokio::test]
    async fn test_send_refused_until_state_connected() {
        let transport = SimulatedTransport::instant();
        let state = Arc::new(MachineState::new(Arc::new(StatusEventBus::new())));
        let channel = CommandChannel::new(state.clone(), DEFAULT_COMMAND_TIMEOUT);
        let link = transport
            .open(&ConnectionSettings::new("COM3", 115200))
            .await
            .unwrap();
        state.begin_connect("COM3").unwrap();
        channel.open(link).await;

        assert!(channel.send("G0 X1").await.unwrap_err().is_not_connected());
        assert!(transport.written().is_empty());

        state.connected();
        assert_eq!(channel.send("G0 X1").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_close_then_send() {
        let transport = SimulatedTransport::instant();
        let (channel, _) = open_channel(&transport).await;
        channel.close().await.unwrap();
        assert!(!channel.is_open());
        assert!(channel.send("G0 X1").await.unwrap_err().is_not_connected());
        assert_eq!(transport.open_links(), 0);
    }
}
