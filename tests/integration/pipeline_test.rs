//! Integration tests for the impulse to metrics pipeline.

use std::sync::Arc;

use rustrow::config::MonitorConfig;
use rustrow::metrics::{ManualClock, SessionState, StatisticsEvent};
use rustrow::monitor::{self, Monitor, MonitorCommand, StrokeProfile};

fn count(events: &[StatisticsEvent], predicate: fn(&StatisticsEvent) -> bool) -> usize {
    events.iter().filter(|event| predicate(event)).count()
}

#[test]
fn test_simulated_session_produces_metrics() {
    let impulses = StrokeProfile::default().train(5);
    let outcome = monitor::replay(&MonitorConfig::default(), &impulses);

    let metrics = &outcome.metrics;
    assert_eq!(metrics.session_state, SessionState::Rowing);
    assert_eq!(metrics.strokes_total, 5);
    assert!(metrics.distance_total > 0.0);
    assert!(metrics.power > 0.0);
    assert!(metrics.speed > 0.0);
    assert!(metrics.split.is_finite());
    assert!(metrics.strokes_per_minute > 0.0);
    assert!(metrics.calories_total > 0.0);
    assert!(metrics.drag_factor > 0.0);

    let events = &outcome.events;
    assert_eq!(
        count(events, |e| matches!(e, StatisticsEvent::DriveFinished(_))),
        5
    );
    assert_eq!(
        count(events, |e| matches!(e, StatisticsEvent::RecoveryFinished(_))),
        5
    );
}

#[test]
fn test_distance_never_decreases_across_events() {
    let impulses = StrokeProfile::default().train(6);
    let outcome = monitor::replay(&MonitorConfig::default(), &impulses);

    let mut last = 0.0;
    for event in &outcome.events {
        if let StatisticsEvent::DriveFinished(m) | StatisticsEvent::RecoveryFinished(m) = event {
            assert!(m.distance_total >= last);
            last = m.distance_total;
        }
    }
    assert!(last > 0.0);
}

#[test]
fn test_long_gap_pauses_and_next_stroke_resumes() {
    let profile = StrokeProfile::default();
    let mut impulses = profile.train(3);
    impulses.push(12.0);

    let paused = monitor::replay(&MonitorConfig::default(), &impulses);
    assert_eq!(paused.metrics.session_state, SessionState::Paused);
    assert_eq!(paused.metrics.strokes_total, 3);
    assert_eq!(paused.metrics.power, 0.0);
    assert!(paused.metrics.distance_total > 0.0);
    assert_eq!(
        count(&paused.events, |e| *e == StatisticsEvent::RowingPaused),
        1
    );

    impulses.extend(profile.train(2));
    let resumed = monitor::replay(&MonitorConfig::default(), &impulses);
    assert_eq!(resumed.metrics.session_state, SessionState::Rowing);
    assert_eq!(resumed.metrics.strokes_total, 5);
}

#[test]
fn test_dual_sensor_session() {
    let config = MonitorConfig {
        dual_sensor: true,
        ..Default::default()
    };
    let profile = StrokeProfile::default();
    let impulses: Vec<f64> = (0..3).flat_map(|_| profile.signed_stroke()).collect();

    let outcome = monitor::replay(&config, &impulses);
    assert_eq!(outcome.metrics.strokes_total, 3);
    assert!(outcome.metrics.distance_total > 0.0);
    assert_eq!(outcome.rejected, 0);
}

#[test]
fn test_reset_then_no_impulses_is_empty() {
    let mut monitor = Monitor::new(&MonitorConfig::default(), Arc::new(ManualClock::new()));
    for value in StrokeProfile::default().train(3) {
        monitor.handle_command(MonitorCommand::Impulse(value));
    }
    monitor.handle_command(MonitorCommand::Reset);

    let metrics = monitor.metrics();
    assert_eq!(metrics.session_state, SessionState::WaitingForStart);
    assert_eq!(metrics.distance_total, 0.0);
    assert_eq!(metrics.duration_total, 0.0);
    assert_eq!(metrics.strokes_total, 0);
    assert_eq!(metrics.calories_total, 0.0);
}

#[test]
fn test_stop_command_freezes_session() {
    let mut monitor = Monitor::new(&MonitorConfig::default(), Arc::new(ManualClock::new()));
    let profile = StrokeProfile::default();
    for value in profile.train(2) {
        let _ = monitor.handle_raw_impulse(value);
    }
    monitor.handle_command(MonitorCommand::Stop);
    let frozen = monitor.metrics();

    for value in profile.train(2) {
        let _ = monitor.handle_raw_impulse(value);
    }
    let metrics = monitor.metrics();
    assert_eq!(metrics.session_state, SessionState::Stopped);
    assert_eq!(metrics.strokes_total, frozen.strokes_total);
    assert_eq!(metrics.distance_total, frozen.distance_total);
}
