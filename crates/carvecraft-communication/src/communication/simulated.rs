//! Simulated controller
//!
//! Stands in for hardware during development and tests. Every command is
//! acknowledged with `ok` after a fixed latency. Test code can make the
//! device fail, reject, or ignore specific commands and refuse ports.

use async_trait::async_trait;
use carvecraft_core::{ConnectionError, ConnectionSettings, SerialPortDescriptor};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use super::{Link, Transport};

/// Latencies and port list of the simulated device
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// Delay before the port list is returned
    pub list_delay: Duration,
    /// Delay before a link opens
    pub connect_delay: Duration,
    /// Delay while a link closes
    pub disconnect_delay: Duration,
    /// Delay before each reply
    pub command_delay: Duration,
    /// Ports reported by `list_ports`
    pub ports: Vec<SerialPortDescriptor>,
}

impl SimulatedConfig {
    /// Same ports, no latency
    pub fn instant() -> Self {
        Self {
            list_delay: Duration::ZERO,
            connect_delay: Duration::ZERO,
            disconnect_delay: Duration::ZERO,
            command_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            list_delay: Duration::from_millis(1000),
            connect_delay: Duration::from_millis(1500),
            disconnect_delay: Duration::from_millis(500),
            command_delay: Duration::from_millis(100),
            ports: vec![
                SerialPortDescriptor::new("COM3", "COM3").with_manufacturer("Arduino"),
                SerialPortDescriptor::new("COM4", "COM4").with_manufacturer("CH340"),
                SerialPortDescriptor::new("/dev/ttyACM0", "/dev/ttyACM0")
                    .with_manufacturer("Arduino"),
            ],
        }
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    failing: HashSet<String>,
    rejecting: HashSet<String>,
    silent: HashSet<String>,
    refused_ports: HashSet<String>,
    written: Vec<String>,
    open_attempts: usize,
    open_links: usize,
}

/// Transport backed by a simulated device
///
/// Clones share the same device, so a test can keep a handle after passing
/// the transport to a controller.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    config: SimulatedConfig,
    device: Arc<Mutex<DeviceState>>,
}

impl SimulatedTransport {
    /// Create a simulated device with the given latencies
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            device: Arc::new(Mutex::new(DeviceState::default())),
        }
    }

    /// Create a simulated device with no latency
    pub fn instant() -> Self {
        Self::new(SimulatedConfig::instant())
    }

    /// Make writes of `command` fail with a link error
    pub fn fail_command(&self, command: impl Into<String>) {
        self.device.lock().failing.insert(command.into());
    }

    /// Make the device answer `command` with an `error:` reply
    pub fn reject_command(&self, command: impl Into<String>) {
        self.device.lock().rejecting.insert(command.into());
    }

    /// Make the device never answer `command`
    pub fn ignore_command(&self, command: impl Into<String>) {
        self.device.lock().silent.insert(command.into());
    }

    /// Make `open` refuse a port
    pub fn refuse_port(&self, port: impl Into<String>) {
        self.device.lock().refused_ports.insert(port.into());
    }

    /// Every line written to the device, in order
    pub fn written(&self) -> Vec<String> {
        self.device.lock().written.clone()
    }

    /// Number of times `open` was called
    pub fn open_attempts(&self) -> usize {
        self.device.lock().open_attempts
    }

    /// Number of links currently open
    pub fn open_links(&self) -> usize {
        self.device.lock().open_links
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new(SimulatedConfig::default())
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn list_ports(&self) -> Result<Vec<SerialPortDescriptor>, ConnectionError> {
        tokio::time::sleep(self.config.list_delay).await;
        Ok(self.config.ports.clone())
    }

    async fn open(&self, settings: &ConnectionSettings) -> Result<Box<dyn Link>, ConnectionError> {
        self.device.lock().open_attempts += 1;
        tokio::time::sleep(self.config.connect_delay).await;

        let port = settings.port().to_string();
        let mut device = self.device.lock();
        if device.refused_ports.contains(&port) {
            return Err(ConnectionError::ConnectFailed {
                port,
                reason: "port refused by device".to_string(),
            });
        }
        device.open_links += 1;
        drop(device);

        tracing::debug!("Simulated link opened on {}", settings);
        Ok(Box::new(SimulatedLink {
            port,
            command_delay: self.config.command_delay,
            disconnect_delay: self.config.disconnect_delay,
            device: self.device.clone(),
            closed: false,
        }))
    }
}

/// Link to the simulated device
pub struct SimulatedLink {
    port: String,
    command_delay: Duration,
    disconnect_delay: Duration,
    device: Arc<Mutex<DeviceState>>,
    closed: bool,
}

#[async_trait]
impl Link for SimulatedLink {
    fn port(&self) -> &str {
        &self.port
    }

    async fn write_line(&mut self, line: &str) -> io::Result<String> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "link closed"));
        }

        let (fail, reject, silent) = {
            let mut device = self.device.lock();
            device.written.push(line.to_string());
            (
                device.failing.contains(line),
                device.rejecting.contains(line),
                device.silent.contains(line),
            )
        };

        if fail {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("simulated write failure for '{}'", line),
            ));
        }
        if silent {
            std::future::pending::<()>().await;
        }

        tokio::time::sleep(self.command_delay).await;

        if reject {
            Ok("error:20".to_string())
        } else {
            Ok("ok".to_string())
        }
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        if self.closed {
            return Ok(());
        }
        tokio::time::sleep(self.disconnect_delay).await;
        self.closed = true;
        self.device.lock().open_links -= 1;
        Ok(())
    }
}

impl Drop for SimulatedLink {
    fn drop(&mut self) {
        if !self.closed {
            self.device.lock().open_links -= 1;
        }
    }
}
