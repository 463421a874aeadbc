//! Integration tests for raw impulse files and the async host loop.

use std::io::Write;
use std::time::Duration;

use rustrow::config::MonitorConfig;
use rustrow::metrics::{HeartRateMeasurement, SessionState, StatisticsEvent};
use rustrow::monitor::{self, Monitor, MonitorCommand, ReplayError, StrokeProfile};
use tokio::sync::mpsc;

#[test]
fn test_replay_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# simulated rower, one impulse per line").unwrap();
    for value in StrokeProfile::default().train(4) {
        writeln!(file, "{value}").unwrap();
    }
    file.flush().unwrap();

    let impulses = monitor::parse_impulse_file(file.path()).unwrap();
    assert_eq!(impulses.len(), 128);

    let outcome = monitor::replay(&MonitorConfig::default(), &impulses);
    assert_eq!(outcome.metrics.strokes_total, 4);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = monitor::parse_impulse_file(&dir.path().join("missing.txt")).unwrap_err();
    assert!(matches!(err, ReplayError::Io(_)));
}

#[test]
fn test_replay_is_deterministic() {
    let impulses = StrokeProfile::default().train(3);
    let first = monitor::replay(&MonitorConfig::default(), &impulses);
    let second = monitor::replay(&MonitorConfig::default(), &impulses);
    assert_eq!(first.metrics, second.metrics);
    assert_eq!(first.events, second.events);
}

#[tokio::test]
async fn test_run_processes_commands_until_channel_closes() {
    let config = MonitorConfig {
        web_update_interval_ms: 10,
        peripheral_update_interval_ms: 10,
        ..Default::default()
    };
    let mut monitor = Monitor::with_system_clock(&config);
    let events = monitor.event_receiver();

    let (tx, rx) = mpsc::channel(64);
    let sender = tokio::spawn(async move {
        for value in StrokeProfile::default().train(2) {
            tx.send(MonitorCommand::Impulse(value)).await.unwrap();
        }
        tx.send(MonitorCommand::HeartRate(HeartRateMeasurement {
            heartrate: 125,
            battery_level: Some(90),
        }))
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
    });

    monitor.run(rx).await;
    sender.await.unwrap();

    let metrics = monitor.metrics();
    assert_eq!(metrics.session_state, SessionState::Rowing);
    assert_eq!(metrics.strokes_total, 2);
    assert_eq!(metrics.heartrate, 125);

    let received: Vec<StatisticsEvent> = events.try_iter().collect();
    assert!(received
        .iter()
        .any(|e| matches!(e, StatisticsEvent::WebMetricsUpdate(_))));
    assert!(received
        .iter()
        .any(|e| matches!(e, StatisticsEvent::PeripheralMetricsUpdate(_))));
}

#[tokio::test]
async fn test_realtime_replay_runs_at_recorded_pace() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for value in [0.02, 0.015, 0.01, -0.01, 0.015, 0.02] {
        writeln!(file, "{value}").unwrap();
    }
    file.flush().unwrap();
    let impulses = monitor::parse_impulse_file(file.path()).unwrap();

    let mut monitor = Monitor::with_system_clock(&MonitorConfig::default());
    let (tx, rx) = mpsc::channel(16);
    let started = std::time::Instant::now();
    let feeder = tokio::spawn(monitor::feed_realtime(impulses, false, tx));

    monitor.run(rx).await;
    feeder.await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(90));
    assert_eq!(monitor.engine().state().total_number_of_impulses, 6);
    assert_eq!(monitor.rejected_impulses(), 0);
}

#[tokio::test]
async fn test_realtime_replay_loops_until_stopped() {
    let impulses = vec![0.002; 5];
    let mut monitor = Monitor::with_system_clock(&MonitorConfig::default());
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(monitor::feed_realtime(impulses, true, tx));

    let finished = tokio::time::timeout(Duration::from_millis(200), monitor.run(rx)).await;

    assert!(finished.is_err(), "a looped recording never closes the channel");
    assert!(monitor.engine().state().total_number_of_impulses > 5);
}

#[tokio::test]
async fn test_realtime_replay_of_empty_recording_closes_channel() {
    let mut monitor = Monitor::with_system_clock(&MonitorConfig::default());
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(monitor::feed_realtime(Vec::new(), true, tx));

    tokio::time::timeout(Duration::from_secs(1), monitor.run(rx))
        .await
        .unwrap();
    assert_eq!(monitor.engine().state().total_number_of_impulses, 0);
}
