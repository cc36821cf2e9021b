//! Status event bus implementation.
//!
//! Handlers are kept in subscription order and invoked on the publishing
//! thread. Each publish works on a copy of the handler list taken at the
//! start of the call, so handlers added or removed during a publish only
//! take effect from the next one.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::data::MachineStatus;

/// Subscription handle for unsubscribing from status events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new unique subscription ID
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// Type alias for status handler functions
type StatusHandler = Arc<dyn Fn(&MachineStatus) + Send + Sync>;

/// Configuration for the status event bus
#[derive(Debug, Clone)]
pub struct StatusEventBusConfig {
    /// Channel capacity for broadcast receivers.
    pub channel_capacity: usize,
}

impl Default for StatusEventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// Bus delivering machine status snapshots to observers
pub struct StatusEventBus {
    /// Broadcast channel sender for async receivers
    sender: broadcast::Sender<MachineStatus>,
    /// Registered synchronous handlers, in subscription order
    handlers: RwLock<Vec<(SubscriptionId, StatusHandler)>>,
    /// Configuration
    config: StatusEventBusConfig,
}

impl StatusEventBus {
    /// Create a new bus with default configuration
    pub fn new() -> Self {
        Self::with_config(StatusEventBusConfig::default())
    }

    /// Create a new bus with custom configuration
    pub fn with_config(config: StatusEventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            handlers: RwLock::new(Vec::new()),
            config,
        }
    }

    /// Publish a status snapshot
    ///
    /// Every handler subscribed when the call starts is invoked exactly once,
    /// in subscription order, before this returns. Returns the number of
    /// handlers plus broadcast receivers that were reached.
    pub fn publish(&self, status: MachineStatus) -> usize {
        let handlers: Vec<StatusHandler> = self
            .handlers
            .read()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in &handlers {
            handler(&status);
        }

        let receivers = self.sender.send(status).unwrap_or(0);
        handlers.len() + receivers
    }

    /// Subscribe to status snapshots with a synchronous handler
    ///
    /// The handler runs on the publishing thread, so it should return
    /// quickly.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&MachineStatus) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.handlers.write().push((id, Arc::new(handler)));
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Unsubscribe a handler
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(sub, _)| *sub != id);
        let removed = handlers.len() != before;
        if removed {
            tracing::debug!("Subscription {} removed", id);
        }
        removed
    }

    /// Get a receiver for async consumption in a tokio task
    pub fn receiver(&self) -> broadcast::Receiver<MachineStatus> {
        self.sender.subscribe()
    }

    /// Number of registered synchronous handlers
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Get the current configuration
    pub fn config(&self) -> &StatusEventBusConfig {
        &self.config
    }
}

impl Default for StatusEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatusEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusEventBus")
            .field("subscribers", &self.subscriber_count())
            .field("config", &self.config)
            .finish()
    }
}
