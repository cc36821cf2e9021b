//! # Status Event Bus
//!
//! Publishes machine status snapshots to every interested observer.
//!
//! ## Overview
//!
//! - The machine state machine publishes a snapshot after every visible change
//! - Observers register synchronous handlers and get a `SubscriptionId` back
//! - Async consumers can take a broadcast receiver instead
//!
//! ## Usage
//!
//! ```rust
//! use carvecraft_core::event_bus::StatusEventBus;
//! use carvecraft_core::MachineStatus;
//!
//! let bus = StatusEventBus::new();
//! let id = bus.subscribe(|status| println!("status: {}", status));
//! bus.publish(MachineStatus::default());
//! bus.unsubscribe(id);
//! ```

mod bus;

pub use bus::*;
