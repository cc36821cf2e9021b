//! Machine state machine
//!
//! Owns the one `MachineStatus` of a controller. Every transition that
//! changes a visible field publishes the new snapshot on the status bus
//! before returning. Publishing happens after the lock is released, so
//! handlers may read the state again.

use carvecraft_core::{ConnectionError, ConnectionState, MachineStatus, Position, StatusEventBus};
use parking_lot::RwLock;
use std::sync::Arc;

/// What a job runner should do at a line boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunGate {
    /// Keep dispatching
    Continue,
    /// The job is paused; stop iterating and keep the job
    Paused,
    /// The job is no longer running
    Stopped,
}

#[derive(Debug, Default)]
struct Inner {
    status: MachineStatus,
    connection: ConnectionState,
    port: Option<String>,
}

/// Authoritative machine status
#[derive(Debug)]
pub struct MachineState {
    inner: RwLock<Inner>,
    bus: Arc<StatusEventBus>,
}

impl MachineState {
    /// Create a disconnected machine publishing on `bus`
    pub fn new(bus: Arc<StatusEventBus>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            bus,
        }
    }

    /// Run a transition and publish the result if it changed the status
    fn transition<F>(&self, apply: F) -> bool
    where
        F: FnOnce(&mut Inner) -> bool,
    {
        let published = {
            let mut inner = self.inner.write();
            let before = inner.status;
            if !apply(&mut inner) {
                return false;
            }
            debug_assert!(inner.status.is_consistent());
            (inner.status != before).then_some(inner.status)
        };

        if let Some(status) = published {
            self.bus.publish(status);
        }
        true
    }

    /// Disconnected -> Connecting
    pub fn begin_connect(&self, port: &str) -> Result<(), ConnectionError> {
        let mut inner = self.inner.write();
        match inner.connection {
            ConnectionState::Disconnected => {
                inner.connection = ConnectionState::Connecting;
                inner.port = Some(port.to_string());
                Ok(())
            }
            _ => Err(ConnectionError::AlreadyConnected {
                port: inner.port.clone().unwrap_or_default(),
            }),
        }
    }

    /// Connecting -> Connected/Idle
    pub fn connected(&self) -> bool {
        self.transition(|inner| {
            if inner.connection != ConnectionState::Connecting {
                return false;
            }
            inner.connection = ConnectionState::Connected;
            inner.status.connected = true;
            inner.status.running = false;
            inner.status.paused = false;
            true
        })
    }

    /// Connecting -> Disconnected
    pub fn connect_failed(&self) {
        let mut inner = self.inner.write();
        if inner.connection == ConnectionState::Connecting {
            inner.connection = ConnectionState::Disconnected;
            inner.port = None;
        }
    }

    /// Any state -> Disconnected, clearing the job flags
    pub fn disconnect(&self) -> bool {
        self.transition(|inner| {
            let was = inner.connection;
            inner.connection = ConnectionState::Disconnected;
            inner.port = None;
            inner.status.connected = false;
            inner.status.running = false;
            inner.status.paused = false;
            was != ConnectionState::Disconnected
        })
    }

    /// Idle -> Running; refused when not connected or already running
    pub fn start_job(&self) -> bool {
        self.transition(|inner| {
            if !inner.status.is_idle() {
                return false;
            }
            inner.status.running = true;
            inner.status.paused = false;
            true
        })
    }

    /// Running -> Running/paused
    pub fn pause(&self) -> bool {
        self.transition(|inner| {
            if !inner.status.running || inner.status.paused {
                return false;
            }
            inner.status.paused = true;
            true
        })
    }

    /// Running/paused -> Running
    pub fn resume(&self) -> bool {
        self.transition(|inner| {
            if !inner.status.paused {
                return false;
            }
            inner.status.paused = false;
            true
        })
    }

    /// Running (paused or not) -> Idle
    pub fn stop(&self) -> bool {
        self.transition(|inner| {
            if !inner.status.running {
                return false;
            }
            inner.status.running = false;
            inner.status.paused = false;
            true
        })
    }

    /// Record a new position and publish it
    pub fn update_position(&self, position: Position) {
        let status = {
            let mut inner = self.inner.write();
            inner.status.position = position;
            inner.status
        };
        self.bus.publish(status);
    }

    /// Copy of the current status
    pub fn snapshot(&self) -> MachineStatus {
        self.inner.read().status
    }

    /// Current position
    pub fn position(&self) -> Position {
        self.inner.read().status.position
    }

    /// Connection lifecycle state
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.read().connection
    }

    /// Port of the current or pending connection
    pub fn port(&self) -> Option<String> {
        self.inner.read().port.clone()
    }

    /// Whether a link is open
    pub fn is_connected(&self) -> bool {
        self.inner.read().status.connected
    }

    /// Whether a job is in progress
    pub fn is_running(&self) -> bool {
        self.inner.read().status.running
    }

    /// Whether the running job is paused
    pub fn is_paused(&self) -> bool {
        self.inner.read().status.paused
    }

    /// Decision for the job runner at a line boundary
    pub fn gate(&self) -> RunGate {
        let status = self.snapshot();
        match (status.running, status.paused) {
            (false, _) => RunGate::Stopped,
            (true, true) => RunGate::Paused,
            (true, false) => RunGate::Continue,
        }
    }

    /// Short description of the state for error messages
    pub fn describe(&self) -> String {
        self.snapshot().to_string()
    }
}
