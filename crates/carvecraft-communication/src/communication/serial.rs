//! Serial port transport
//!
//! Drives a real controller over USB serial. Port I/O is blocking, so every
//! operation runs on the blocking thread pool.
//!
//! Flow control is acknowledgment based: after writing a line the link
//! reads until the controller answers `ok` or `error...`. Anything else the
//! firmware prints in between (banners, status chatter) is logged and
//! skipped.

use async_trait::async_trait;
use carvecraft_core::{ConnectionError, ConnectionSettings, SerialPortDescriptor};
use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{Link, Transport};

/// Poll interval for individual serial reads
const READ_POLL: Duration = Duration::from_millis(10);

/// List available serial ports on the system
///
/// Filters ports to include only CNC controller patterns:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortDescriptor>, ConnectionError> {
    match serialport::available_ports() {
        Ok(ports) => Ok(ports
            .iter()
            .filter(|port| is_valid_cnc_port(&port.port_name))
            .map(|port| {
                let descriptor = SerialPortDescriptor::new(&port.port_name, &port.port_name);
                match &port.port_type {
                    serialport::SerialPortType::UsbPort(usb_info) => {
                        match usb_info.manufacturer.as_deref() {
                            Some(mfg) => descriptor.with_manufacturer(mfg),
                            None => descriptor,
                        }
                    }
                    _ => descriptor,
                }
            })
            .collect()),
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Err(ConnectionError::PortEnumeration {
                reason: e.to_string(),
            })
        }
    }
}

/// Check if a port name matches CNC controller patterns
pub fn is_valid_cnc_port(port_name: &str) -> bool {
    // Windows COM ports
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    // Linux USB and ACM devices
    if port_name.starts_with("/dev/ttyUSB") || port_name.starts_with("/dev/ttyACM") {
        return true;
    }

    // macOS serial and modem devices
    port_name.starts_with("/dev/cu.usbserial-") || port_name.starts_with("/dev/cu.usbmodem")
}

/// Whether a reply line acknowledges the command
fn is_acknowledgment(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower == "ok" || lower.starts_with("error")
}

/// Transport for real serial hardware
#[derive(Debug, Clone)]
pub struct SerialTransport {
    reply_timeout: Duration,
}

impl SerialTransport {
    /// Create a transport that gives up waiting for a reply after `reply_timeout`
    ///
    /// Use the same value as the command channel timeout so the blocking
    /// reader is released when the channel gives up.
    pub fn new(reply_timeout: Duration) -> Self {
        Self { reply_timeout }
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new(Duration::from_millis(5000))
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn name(&self) -> &str {
        "serial"
    }

    async fn list_ports(&self) -> Result<Vec<SerialPortDescriptor>, ConnectionError> {
        tokio::task::spawn_blocking(list_ports)
            .await
            .map_err(|e| ConnectionError::PortEnumeration {
                reason: e.to_string(),
            })?
    }

    async fn open(&self, settings: &ConnectionSettings) -> Result<Box<dyn Link>, ConnectionError> {
        let port_name = settings.port().to_string();
        let baud_rate = settings.baud_rate();

        let name = port_name.clone();
        let opened = tokio::task::spawn_blocking(move || {
            serialport::new(&name, baud_rate)
                .timeout(READ_POLL)
                .flow_control(serialport::FlowControl::None)
                .open()
        })
        .await
        .map_err(|e| ConnectionError::ConnectFailed {
            port: port_name.clone(),
            reason: e.to_string(),
        })?;

        match opened {
            Ok(port) => {
                tracing::info!("Opened serial port {} at {} baud", port_name, baud_rate);
                Ok(Box::new(SerialLink {
                    port_name,
                    inner: Arc::new(Mutex::new(SerialInner {
                        port: Some(port),
                        buffer: String::new(),
                    })),
                    reply_timeout: self.reply_timeout,
                }))
            }
            Err(e) => {
                tracing::warn!("Failed to open serial port {}: {}", port_name, e);
                Err(ConnectionError::ConnectFailed {
                    port: port_name,
                    reason: e.to_string(),
                })
            }
        }
    }
}

struct SerialInner {
    port: Option<Box<dyn serialport::SerialPort>>,
    /// Bytes read past the last complete line
    buffer: String,
}

impl SerialInner {
    fn take_line(&mut self) -> Option<String> {
        let end = self.buffer.find('\n')?;
        let line = self.buffer[..end].trim().to_string();
        self.buffer.drain(..=end);
        Some(line)
    }

    /// Drop input left over from an earlier command, such as a late
    /// acknowledgment for one that timed out
    fn discard_pending(&mut self) {
        if !self.buffer.is_empty() {
            tracing::debug!("Discarding stale input: {:?}", self.buffer);
            self.buffer.clear();
        }
        if let Some(port) = self.port.as_mut() {
            if let Err(e) = port.clear(serialport::ClearBuffer::Input) {
                tracing::warn!("Failed to clear serial input: {}", e);
            }
        }
    }

    fn exchange(&mut self, line: &str, reply_timeout: Duration) -> io::Result<String> {
        self.discard_pending();

        let port = self
            .port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port closed"))?;

        port.write_all(line.as_bytes())?;
        port.write_all(b"\n")?;
        port.flush()?;

        let deadline = Instant::now() + reply_timeout;
        let mut chunk = [0u8; 256];

        loop {
            while let Some(reply) = self.take_line() {
                if reply.is_empty() {
                    continue;
                }
                if is_acknowledgment(&reply) {
                    return Ok(reply);
                }
                tracing::debug!("Controller: {}", reply);
            }

            if Instant::now() >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "no acknowledgment from controller",
                ));
            }

            let port = self
                .port
                .as_mut()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port closed"))?;
            match port.read(&mut chunk) {
                Ok(0) => {}
                Ok(n) => self.buffer.push_str(&String::from_utf8_lossy(&chunk[..n])),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e),
            }
        }
    }
}

/// Open serial link
pub struct SerialLink {
    port_name: String,
    inner: Arc<Mutex<SerialInner>>,
    reply_timeout: Duration,
}

#[async_trait]
impl Link for SerialLink {
    fn port(&self) -> &str {
        &self.port_name
    }

    async fn write_line(&mut self, line: &str) -> io::Result<String> {
        let inner = self.inner.clone();
        let line = line.to_string();
        let reply_timeout = self.reply_timeout;

        tokio::task::spawn_blocking(move || inner.lock().exchange(&line, reply_timeout))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut inner = inner.lock();
            inner.buffer.clear();
            inner.port.take()
        })
        .await
        .map_err(|e| ConnectionError::CloseFailed {
            port: self.port_name.clone(),
            reason: e.to_string(),
        })?;

        tracing::info!("Closed serial port {}", self.port_name);
        Ok(())
    }
}
