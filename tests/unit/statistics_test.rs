//! Unit tests for the session statistics.

use std::sync::Arc;
use std::time::Duration;

use rustrow::engine::{CyclePhase, KeyMetrics, StrokeEvent, StrokeSink};
use rustrow::metrics::{
    HeartRateMeasurement, ManualClock, MetricsSource, RowingStatistics, SessionState,
    StatisticsConfig, StatisticsEvent, StrokeAverages, StrokeState,
};

fn stroke(duration: f64, phase: CyclePhase) -> StrokeEvent {
    StrokeEvent {
        time_since_start: 20.0,
        power: 200.0,
        duration,
        duration_drive_phase: 0.8,
        stroke_distance: 9.0,
        distance: 120.0,
        speed: 4.0,
        number_of_strokes: 7,
        instantaneous_torque: 2.0,
        drag_factor: 1400.0,
        phase,
        plausible: true,
    }
}

fn statistics() -> (RowingStatistics, ManualClock) {
    let clock = ManualClock::new();
    let stats = RowingStatistics::new(StatisticsConfig::default(), Arc::new(clock.clone()));
    (stats, clock)
}

fn row_one_stroke(stats: &mut RowingStatistics, duration: f64) {
    stats.handle_recovery_end(&stroke(duration, CyclePhase::Drive));
    stats.handle_drive_end(&stroke(duration, CyclePhase::Recovery));
}

#[test]
fn test_metrics_after_a_plausible_stroke() {
    let (mut stats, _) = statistics();
    row_one_stroke(&mut stats, 2.5);

    let metrics = stats.metrics();
    assert_eq!(metrics.session_state, SessionState::Rowing);
    assert_eq!(metrics.strokes_total, 7);
    assert_eq!(metrics.distance_total, 120.0);
    assert_eq!(metrics.distance, 9.0);
    assert!((metrics.power - 200.0).abs() < 1e-9);
    assert!((metrics.speed - 14.4).abs() < 1e-9);
    assert!((metrics.split - 125.0).abs() < 1e-9);
    assert_eq!(metrics.split_formatted, "02:05");
    assert!((metrics.strokes_per_minute - 24.0).abs() < 1e-9);
    assert!((metrics.power_ratio - 0.32).abs() < 1e-9);
    assert_eq!(metrics.stroke_state, StrokeState::Recovery);
    assert_eq!(metrics.drag_factor, 1400.0);
    assert_eq!(metrics.duration_total_formatted, "00:20");
}

#[test]
fn test_short_stroke_updates_totals_but_not_averages() {
    let (mut stats, _) = statistics();
    row_one_stroke(&mut stats, 2.5);
    let before = stats.averages();
    let calories_before = stats.calories_total();

    // below minimum_drive_time + minimum_recovery_time
    row_one_stroke(&mut stats, 0.8);

    assert_eq!(stats.averages(), before);
    assert!(stats.calories_total() > calories_before);
    assert_eq!(stats.metrics().stroke_time, 0.8);
}

#[test]
fn test_long_stroke_updates_totals_but_not_averages() {
    let (mut stats, _) = statistics();
    row_one_stroke(&mut stats, 2.5);
    let before = stats.averages();

    row_one_stroke(&mut stats, 12.0);
    assert_eq!(stats.averages(), before);
}

#[test]
fn test_implausible_engine_stroke_skips_averages() {
    let (mut stats, _) = statistics();
    let mut event = stroke(2.5, CyclePhase::Recovery);
    event.plausible = false;

    stats.handle_recovery_end(&event);
    stats.handle_drive_end(&event);
    assert_eq!(stats.averages(), StrokeAverages::default());
    assert_eq!(stats.metrics().strokes_total, 7);
}

#[test]
fn test_engine_pause_resets_averages_and_keeps_totals() {
    let (mut stats, _) = statistics();
    let events = stats.event_receiver();
    row_one_stroke(&mut stats, 2.5);
    let per_minute = stats.metrics().calories_per_minute;

    stats.handle_pause(3.5);

    let metrics = stats.metrics();
    assert_eq!(metrics.session_state, SessionState::Paused);
    assert_eq!(stats.averages(), StrokeAverages::default());
    assert_eq!(metrics.distance_total, 120.0);
    assert_eq!(metrics.strokes_total, 7);
    assert_eq!(metrics.power, 0.0);
    assert_eq!(metrics.speed, 0.0);
    assert_eq!(metrics.strokes_per_minute, 0.0);
    assert!(metrics.split.is_infinite());
    // the gap counts as time without calories
    assert!(metrics.calories_per_minute < per_minute);

    let paused = events
        .try_iter()
        .filter(|event| *event == StatisticsEvent::RowingPaused)
        .count();
    assert_eq!(paused, 1);
}

#[test]
fn test_pause_before_start_is_ignored() {
    let (mut stats, _) = statistics();
    let events = stats.event_receiver();

    stats.handle_pause(5.0);
    assert_eq!(stats.session_state(), SessionState::WaitingForStart);
    assert_eq!(events.try_iter().count(), 0);
}

#[test]
fn test_recovery_end_resumes_paused_session() {
    let (mut stats, clock) = statistics();
    row_one_stroke(&mut stats, 2.5);

    clock.advance(Duration::from_secs(11));
    stats.poll_timers();
    assert_eq!(stats.session_state(), SessionState::Paused);

    stats.handle_recovery_end(&stroke(2.5, CyclePhase::Drive));
    assert_eq!(stats.session_state(), SessionState::Rowing);
}

#[test]
fn test_drive_end_pushes_pause_deadline_back() {
    let (mut stats, clock) = statistics();
    row_one_stroke(&mut stats, 2.5);

    for _ in 0..5 {
        clock.advance(Duration::from_secs(6));
        stats.poll_timers();
        stats.handle_drive_end(&stroke(2.5, CyclePhase::Recovery));
    }
    assert_eq!(stats.session_state(), SessionState::Rowing);
}

#[test]
fn test_stop_then_reset() {
    let (mut stats, _) = statistics();
    row_one_stroke(&mut stats, 2.5);
    stats.handle_heartrate_measurement(HeartRateMeasurement {
        heartrate: 140,
        battery_level: None,
    });

    stats.stop();
    stats.update_key_metrics(&KeyMetrics {
        time_since_start: 99.0,
        distance: 999.0,
        instantaneous_torque: 0.0,
    });
    assert_eq!(stats.metrics().distance_total, 120.0);

    stats.reset();
    let metrics = stats.metrics();
    assert_eq!(metrics.session_state, SessionState::WaitingForStart);
    assert_eq!(metrics.distance_total, 0.0);
    assert_eq!(metrics.calories_total, 0.0);
    assert_eq!(metrics.strokes_total, 0);
    assert_eq!(metrics.heartrate, 0);
    assert_eq!(metrics.stroke_state, StrokeState::WaitingForDrive);
    assert_eq!(stats.next_deadline(), None);
}
