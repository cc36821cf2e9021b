use carvecraft_communication::{
    ControllerConfig, FlowControl, JobOutcome, MachineController, SimulatedTransport,
};
use carvecraft_core::{
    Axis, ConnectionError, ConnectionSettings, ConnectionState, ConsoleEntryKind, Error,
    JogDirection, MachineStatus, Position,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn controller(transport: &SimulatedTransport) -> Arc<MachineController> {
    Arc::new(MachineController::new(
        Arc::new(transport.clone()),
        ControllerConfig::default(),
    ))
}

async fn connected(transport: &SimulatedTransport) -> Arc<MachineController> {
    let controller = controller(transport);
    controller
        .connect(ConnectionSettings::new("COM3", 115200))
        .await
        .unwrap();
    controller
}

fn job(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| l.to_string()).collect()
}

#[tokio::test]
async fn test_connect_publishes_connected_status() {
    let transport = SimulatedTransport::instant();
    let controller = controller(&transport);
    let seen = Arc::new(Mutex::new(Vec::<MachineStatus>::new()));

    let sink = seen.clone();
    controller.subscribe(move |status| sink.lock().push(*status));

    controller
        .connect(ConnectionSettings::new("/dev/ttyACM0", 57600))
        .await
        .unwrap();

    assert_eq!(controller.connection_state(), ConnectionState::Connected);
    assert_eq!(seen.lock().len(), 1);
    assert!(seen.lock()[0].connected);
    assert_eq!(
        controller.settings(),
        Some(ConnectionSettings::new("/dev/ttyACM0", 57600))
    );
}

#[tokio::test]
async fn test_invalid_settings_never_reach_transport() {
    let transport = SimulatedTransport::instant();
    let controller = controller(&transport);

    for settings in [
        ConnectionSettings::new("", 115200),
        ConnectionSettings::new("COM3", 0),
        ConnectionSettings::new("COM3", 14400),
    ] {
        let err = controller.connect(settings).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::InvalidSettings { .. })
        ));
    }

    assert_eq!(transport.open_attempts(), 0);
    assert_eq!(controller.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_refused_port_returns_to_disconnected() {
    let transport = SimulatedTransport::instant();
    transport.refuse_port("COM4");
    let controller = controller(&transport);

    let err = controller
        .connect(ConnectionSettings::new("COM4", 115200))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Connection(ConnectionError::ConnectFailed { .. })
    ));
    assert_eq!(controller.connection_state(), ConnectionState::Disconnected);
    assert!(!controller.status().connected);

    // A later attempt on a working port succeeds
    controller
        .connect(ConnectionSettings::new("COM3", 115200))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_connect_twice_fails() {
    let transport = SimulatedTransport::instant();
    let controller = connected(&transport).await;

    let err = controller
        .connect(ConnectionSettings::new("COM4", 115200))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Connection(ConnectionError::AlreadyConnected { .. })
    ));
    assert_eq!(transport.open_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_connect_cancels_it() {
    let transport = SimulatedTransport::default();
    let controller = controller(&transport);

    let connecting = controller.clone();
    let handle = tokio::spawn(async move {
        connecting
            .connect(ConnectionSettings::new("COM3", 115200))
            .await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(controller.connection_state(), ConnectionState::Connecting);
    controller.disconnect().await.unwrap();

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        Error::Connection(ConnectionError::ConnectFailed { .. })
    ));
    assert_eq!(controller.connection_state(), ConnectionState::Disconnected);
    assert!(!controller.status().connected);
    assert_eq!(transport.open_links(), 0);
    assert_eq!(controller.settings(), None);

    let err = controller.send_command("G0 X7").await.unwrap_err();
    assert!(err.is_not_connected());
    assert_eq!(controller.status().position, Position::default());
    assert!(transport.written().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reply_timeout_aborts_job() {
    let transport = SimulatedTransport::instant();
    transport.ignore_command("G1 X2");
    let controller = connected(&transport).await;
    let seen = Arc::new(Mutex::new(Vec::<MachineStatus>::new()));
    let sink = seen.clone();
    controller.subscribe(move |status| sink.lock().push(*status));

    let err = controller
        .run_program(job(&["G1 X1", "G1 X2", "G1 X3"]))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.command(), Some("G1 X2"));
    let status = controller.status();
    assert!(!status.running && !status.paused);
    assert_eq!(status.position, Position::new(1.0, 0.0, 0.0));
    assert_eq!(seen.lock().last().map(|s| s.running), Some(false));
    assert_eq!(transport.written(), vec!["G1 X1", "G1 X2"]);
}

#[tokio::test]
async fn test_comment_in_job_line_does_not_end_job() {
    let transport = SimulatedTransport::instant();
    let controller = connected(&transport).await;

    let outcome = controller
        .run_program(job(&["G1 X1 ; next: M2 retract", "G1 X2", "G1 X3 (M0)"]))
        .await
        .unwrap();

    assert_eq!(outcome, JobOutcome::Completed { dispatched: 3 });
    assert_eq!(controller.status().position, Position::new(3.0, 0.0, 0.0));
    assert_eq!(transport.written().len(), 3);
}

#[tokio::test]
async fn test_send_while_disconnected() {
    let transport = SimulatedTransport::instant();
    let controller = controller(&transport);

    let err = controller.send_command("G0 X1").await.unwrap_err();
    assert!(err.is_not_connected());
    assert!(transport.written().is_empty());
}

#[tokio::test]
async fn test_jog_sequence() {
    let transport = SimulatedTransport::instant();
    let controller = connected(&transport).await;
    controller.clear_console();

    controller
        .jog(Axis::X, JogDirection::Negative, 10.0, 1000.0)
        .await
        .unwrap();
    controller
        .jog(Axis::Z, JogDirection::Positive, 0.1, 500.0)
        .await
        .unwrap();

    assert_eq!(
        transport.written(),
        vec!["G91 G0 X-10 F1000", "G90", "G91 G0 Z0.1 F500", "G90"]
    );
    assert_eq!(controller.status().position, Position::new(-10.0, 0.0, 0.1));

    let kinds: Vec<_> = controller
        .console_entries()
        .iter()
        .skip(1)
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds[..4],
        [
            ConsoleEntryKind::Sent,
            ConsoleEntryKind::Received,
            ConsoleEntryKind::Sent,
            ConsoleEntryKind::Received
        ]
    );
}

#[tokio::test]
async fn test_home_refused_while_running() {
    let transport = SimulatedTransport::instant();
    let controller = connected(&transport).await;

    let pauser = controller.clone();
    let paused_once = Arc::new(AtomicBool::new(false));
    let flag = paused_once.clone();
    controller.subscribe(move |status| {
        if status.running && !status.paused && !flag.swap(true, Ordering::SeqCst) {
            pauser.pause();
        }
    });

    let outcome = controller.run_program(job(&["G0 X1", "G0 X2"])).await.unwrap();
    assert!(outcome.is_paused());

    assert!(controller.home().await.is_err());
    assert!(controller
        .jog(Axis::Y, JogDirection::Positive, 1.0, 100.0)
        .await
        .is_err());
    assert!(!transport.written().contains(&"G28".to_string()));
}

#[tokio::test]
async fn test_job_abort_reports_failing_line() {
    let transport = SimulatedTransport::instant();
    transport.reject_command("G1 X9 Q1");
    let controller = connected(&transport).await;

    let err = controller
        .run_program(job(&["G1 X1", "G1 X9 Q1", "G1 X2"]))
        .await
        .unwrap_err();

    let status = controller.status();
    assert!(!status.running);
    assert_eq!(status.position, Position::new(1.0, 0.0, 0.0));
    assert!(err.to_string().contains("G1 X9 Q1"));
    assert!(!transport.written().contains(&"G1 X2".to_string()));
}

#[tokio::test]
async fn test_pause_after_second_line_then_stop() {
    let transport = SimulatedTransport::instant();
    let controller = connected(&transport).await;

    let pauser = controller.clone();
    controller.subscribe(move |status| {
        if status.running && status.position.x == 2.0 {
            pauser.pause();
        }
    });

    let outcome = controller
        .run_program(job(&["G1 X1", "G1 X2", "G1 X3", "G1 X4", "G1 X5"]))
        .await
        .unwrap();

    assert_eq!(outcome, JobOutcome::Paused { next: 2 });
    assert!(!transport.written().contains(&"G1 X3".to_string()));
    let status = controller.status();
    assert!(status.running && status.paused);

    assert!(controller.stop());
    let status = controller.status();
    assert!(!status.running && !status.paused);
    assert_eq!(status.position.x, 2.0);
    assert!(!controller.has_suspended_job());
}

#[tokio::test]
async fn test_resume_continues_from_interruption() {
    let transport = SimulatedTransport::instant();
    let controller = connected(&transport).await;

    let outcome = controller
        .run_program(job(&["G1 X1", "M0", "G1 X3", "G1 Y4"]))
        .await
        .unwrap();
    assert_eq!(outcome, JobOutcome::Paused { next: 2 });
    assert!(controller.has_suspended_job());

    let resumed = controller.resume().await.unwrap();
    assert_eq!(resumed, Some(JobOutcome::Completed { dispatched: 2 }));
    assert_eq!(controller.status().position, Position::new(3.0, 4.0, 0.0));
    assert!(!controller.status().running);
    assert_eq!(transport.written(), vec!["G1 X1", "M0", "G1 X3", "G1 Y4"]);
}

#[tokio::test]
async fn test_resume_without_pause_is_noop() {
    let transport = SimulatedTransport::instant();
    let controller = connected(&transport).await;
    assert_eq!(controller.resume().await.unwrap(), None);
    assert!(!controller.stop());
    assert!(!controller.pause());
}

#[tokio::test]
async fn test_disconnect_clears_job_and_closes_link() {
    let transport = SimulatedTransport::instant();
    let controller = connected(&transport).await;

    controller
        .run_program(job(&["G1 X1", "M1", "G1 X2"]))
        .await
        .unwrap();
    assert!(controller.status().paused);

    controller.disconnect().await.unwrap();
    let status = controller.status();
    assert!(!status.connected && !status.running && !status.paused);
    assert!(!controller.has_suspended_job());
    assert_eq!(transport.open_links(), 0);
    assert_eq!(controller.settings(), None);

    let err = controller.run_program(job(&["G1 X1"])).await.unwrap_err();
    assert!(err.is_not_connected());
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_paced_run() {
    let transport = SimulatedTransport::instant();
    let controller = Arc::new(MachineController::new(
        Arc::new(transport.clone()),
        ControllerConfig {
            flow_control: FlowControl::FixedDelay(Duration::from_millis(200)),
            ..ControllerConfig::default()
        },
    ));
    controller
        .connect(ConnectionSettings::new("COM3", 115200))
        .await
        .unwrap();

    let runner = controller.clone();
    let handle = tokio::spawn(async move {
        runner
            .run_program(job(&["G0 X1", "G0 X2", "G0 X3", "G0 X4"]))
            .await
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(controller.stop());

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome, JobOutcome::Stopped { next: 2 });
    assert_eq!(transport.written(), vec!["G0 X1", "G0 X2"]);
}

#[tokio::test]
async fn test_independent_controllers() {
    let first = SimulatedTransport::instant();
    let second = SimulatedTransport::instant();
    let a = connected(&first).await;
    let b = connected(&second).await;

    a.send_command("G0 X5").await.unwrap();
    assert_eq!(a.status().position.x, 5.0);
    assert_eq!(b.status().position.x, 0.0);
}

#[tokio::test]
async fn test_list_simulated_ports() {
    let transport = SimulatedTransport::instant();
    let controller = controller(&transport);
    let ports = controller.list_ports().await.unwrap();
    assert_eq!(ports.len(), 3);
    assert_eq!(ports[0].to_string(), "COM3 (Arduino)");
}
