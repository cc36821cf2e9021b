//! Controller behavior against a hand-written transport double
use async_trait::async_trait;
use carvecraft_communication::{ControllerConfig, Link, MachineController, Transport};
use carvecraft_core::{ConnectionError, ConnectionSettings, SerialPortDescriptor};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

/// Transport that replays scripted replies and records what it was asked
#[derive(Default)]
struct ScriptedTransport {
    replies: Arc<Mutex<VecDeque<String>>>,
    written: Arc<Mutex<Vec<String>>>,
    opened: Arc<Mutex<Vec<ConnectionSettings>>>,
}

struct ScriptedLink {
    replies: Arc<Mutex<VecDeque<String>>>,
    written: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn list_ports(&self) -> Result<Vec<SerialPortDescriptor>, ConnectionError> {
        Ok(vec![SerialPortDescriptor::new("port-1", "/dev/ttyUSB0")])
    }

    async fn open(&self, settings: &ConnectionSettings) -> Result<Box<dyn Link>, ConnectionError> {
        self.opened.lock().push(settings.clone());
        Ok(Box::new(ScriptedLink {
            replies: self.replies.clone(),
            written: self.written.clone(),
        }))
    }
}

#[async_trait]
impl Link for ScriptedLink {
    fn port(&self) -> &str {
        "/dev/ttyUSB0"
    }

    async fn write_line(&mut self, line: &str) -> io::Result<String> {
        self.written.lock().push(line.to_string());
        self.replies
            .lock()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        Ok(())
    }
}

fn scripted(replies: &[&str]) -> (Arc<ScriptedTransport>, MachineController) {
    let transport = Arc::new(ScriptedTransport::default());
    transport
        .replies
        .lock()
        .extend(replies.iter().map(|r| r.to_string()));
    let controller = MachineController::new(transport.clone(), ControllerConfig::default());
    (transport, controller)
}

#[tokio::test]
async fn test_settings_passed_through_unchanged() {
    let (transport, controller) = scripted(&[]);
    let settings = ConnectionSettings::new("/dev/ttyUSB0", 230400);
    controller.connect(settings.clone()).await.unwrap();
    assert_eq!(*transport.opened.lock(), vec![settings]);
}

#[tokio::test]
async fn test_error_reply_is_rejection() {
    let (_, controller) = scripted(&["ok", "error:9"]);
    controller
        .connect(ConnectionSettings::new("/dev/ttyUSB0", 115200))
        .await
        .unwrap();

    assert_eq!(controller.send_command("G0 X1").await.unwrap(), "ok");
    let err = controller.send_command("G0 X2").await.unwrap_err();
    assert!(err.is_command_failure());
    assert!(err.to_string().contains("error:9"));
    assert_eq!(controller.status().position.x, 1.0);
}

#[tokio::test]
async fn test_link_error_aborts_job() {
    let (transport, controller) = scripted(&["ok"]);
    controller
        .connect(ConnectionSettings::new("/dev/ttyUSB0", 115200))
        .await
        .unwrap();

    let lines = vec!["G1 X1".to_string(), "G1 X2".to_string(), "G1 X3".to_string()];
    let err = controller.run_program(lines).await.unwrap_err();

    assert_eq!(err.command(), Some("G1 X2"));
    assert!(!controller.status().running);
    assert_eq!(*transport.written.lock(), vec!["G1 X1", "G1 X2"]);
}

#[tokio::test]
async fn test_commands_are_trimmed_before_sending() {
    let (transport, controller) = scripted(&["ok"]);
    controller
        .connect(ConnectionSettings::new("/dev/ttyUSB0", 115200))
        .await
        .unwrap();

    controller.send_command("  G28 \n").await.unwrap();
    assert_eq!(*transport.written.lock(), vec!["G28"]);
}
