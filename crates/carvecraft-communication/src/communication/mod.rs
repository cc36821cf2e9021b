//! Transport boundary to the controller
//!
//! A `Transport` enumerates ports and opens links; a `Link` carries one
//! line out and one reply line back per call. Two transports ship with the
//! crate: the real serial one and a simulated device.

pub mod serial;
pub mod simulated;

use async_trait::async_trait;
use carvecraft_core::{ConnectionError, ConnectionSettings, SerialPortDescriptor};
use std::io;

pub use serial::{is_valid_cnc_port, list_ports, SerialTransport};
pub use simulated::{SimulatedConfig, SimulatedTransport};

/// Source of controller links
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Enumerate the ports this transport can open
    async fn list_ports(&self) -> Result<Vec<SerialPortDescriptor>, ConnectionError>;

    /// Open a link with already-validated settings
    async fn open(&self, settings: &ConnectionSettings) -> Result<Box<dyn Link>, ConnectionError>;
}

/// An open line-oriented link to the controller
#[async_trait]
pub trait Link: Send {
    /// Port this link is attached to
    fn port(&self) -> &str;

    /// Write one command line and wait for the single reply line
    ///
    /// The line terminator is added by the link. The returned reply is
    /// trimmed.
    async fn write_line(&mut self, line: &str) -> io::Result<String>;

    /// Release the underlying port
    async fn close(&mut self) -> Result<(), ConnectionError>;
}
