//! Property tests for the rowing pipeline invariants.

use std::sync::Arc;

use proptest::prelude::*;
use rustrow::config::{MonitorConfig, RowerSettings};
use rustrow::engine::{CyclePhase, Impulse, KeyMetrics, RowingEngine, StrokeEvent, StrokeSink};
use rustrow::metrics::{
    ManualClock, MetricsSource, RowingStatistics, SessionState, StatisticsConfig,
};
use rustrow::monitor::{Monitor, StrokeProfile};

/// Records distances in callback order plus the drag factor of every phase end.
#[derive(Debug, Default)]
struct Trace {
    distances: Vec<f64>,
    drag_factors: Vec<f64>,
    drive_ends: usize,
    recovery_ends: usize,
    pauses: usize,
}

impl StrokeSink for Trace {
    fn update_key_metrics(&mut self, metrics: &KeyMetrics) {
        self.distances.push(metrics.distance);
    }

    fn handle_drive_end(&mut self, stroke: &StrokeEvent) {
        self.drive_ends += 1;
        self.distances.push(stroke.distance);
        self.drag_factors.push(stroke.drag_factor);
    }

    fn handle_recovery_end(&mut self, stroke: &StrokeEvent) {
        self.recovery_ends += 1;
        self.distances.push(stroke.distance);
        self.drag_factors.push(stroke.drag_factor);
    }

    fn handle_pause(&mut self, _gap_seconds: f64) {
        self.pauses += 1;
    }
}

fn short_phase_settings() -> RowerSettings {
    RowerSettings {
        minimum_drive_time: 0.2,
        minimum_recovery_time: 0.3,
        ..Default::default()
    }
}

fn run(settings: RowerSettings, impulses: &[f64]) -> Trace {
    let mut engine = RowingEngine::new(settings, Trace::default());
    for &value in impulses {
        engine.handle_rotation_impulse(Impulse::new(value).unwrap());
    }
    engine.into_sink()
}

fn stroke(duration: f64, phase: CyclePhase) -> StrokeEvent {
    StrokeEvent {
        time_since_start: 30.0,
        power: 180.0,
        duration,
        duration_drive_phase: 0.7,
        stroke_distance: 8.0,
        distance: 200.0,
        speed: 3.8,
        number_of_strokes: 12,
        instantaneous_torque: 1.5,
        drag_factor: 1500.0,
        phase,
        plausible: true,
    }
}

proptest! {
    /// N alternating drive and recovery runs yield N/2 strokes.
    #[test]
    fn stroke_count_matches_runs(
        drive_impulses in 8usize..=12,
        recovery_impulses in 10usize..=20,
        strokes in 1usize..=6,
    ) {
        let profile = StrokeProfile {
            drive_impulses,
            recovery_impulses,
            ..Default::default()
        };
        let trace = run(short_phase_settings(), &profile.train(strokes));

        prop_assert_eq!(trace.recovery_ends, strokes);
        prop_assert_eq!(trace.drive_ends, strokes);
        prop_assert_eq!(trace.pauses, 0);
    }

    #[test]
    fn distance_never_decreases(
        drive_impulses in 8usize..=12,
        recovery_impulses in 10usize..=20,
        strokes in 1usize..=6,
    ) {
        let profile = StrokeProfile {
            drive_impulses,
            recovery_impulses,
            ..Default::default()
        };
        let trace = run(short_phase_settings(), &profile.train(strokes));

        for pair in trace.distances.windows(2) {
            prop_assert!(pair[1] >= pair[0] - 1e-9, "distance went from {} to {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn drag_factor_step_is_bounded(
        drive_impulses in 8usize..=12,
        recovery_impulses in 10usize..=20,
        strokes in 2usize..=6,
        max_change in 0.05f64..0.5,
    ) {
        let settings = RowerSettings {
            damping_constant_max_change: max_change,
            ..short_phase_settings()
        };
        let profile = StrokeProfile {
            drive_impulses,
            recovery_impulses,
            ..Default::default()
        };
        let trace = run(settings, &profile.train(strokes));

        let mut previous = 1500.0;
        for &drag in &trace.drag_factors {
            prop_assert!((drag / previous - 1.0).abs() <= max_change + 1e-9);
            previous = drag;
        }
    }

    /// Gaps below the pause threshold never pause, gaps at or above it do.
    #[test]
    fn pause_only_at_threshold(gap in 0.5f64..6.0) {
        let profile = StrokeProfile::default();
        let mut impulses = profile.train(1);
        impulses.push(gap);
        let trace = run(RowerSettings::default(), &impulses);

        prop_assert_eq!(trace.pauses, usize::from(gap >= 3.0));
    }

    /// Strokes outside the plausible duration range change totals only.
    #[test]
    fn implausible_durations_leave_averages(
        duration in prop_oneof![0.01f64..1.19, 10.01f64..100.0],
    ) {
        let clock = ManualClock::new();
        let mut stats = RowingStatistics::new(StatisticsConfig::default(), Arc::new(clock));
        stats.handle_recovery_end(&stroke(2.5, CyclePhase::Drive));
        stats.handle_drive_end(&stroke(2.5, CyclePhase::Recovery));
        let before = stats.averages();
        let calories = stats.calories_total();

        let mut next = stroke(duration, CyclePhase::Drive);
        next.number_of_strokes = 13;
        stats.handle_recovery_end(&next);
        next.phase = CyclePhase::Recovery;
        stats.handle_drive_end(&next);

        prop_assert_eq!(stats.averages(), before);
        prop_assert_eq!(stats.metrics().strokes_total, 13);
        prop_assert!(stats.calories_total() > calories);
    }

    /// Reset followed by no impulses reads as an empty session.
    #[test]
    fn reset_yields_empty_session(strokes in 0usize..=4, flank_length in 2usize..=4) {
        let mut config = MonitorConfig::default();
        config.rower_settings.flank_length = flank_length;
        let mut monitor = Monitor::new(&config, Arc::new(ManualClock::new()));
        for value in StrokeProfile::default().train(strokes) {
            let _ = monitor.handle_raw_impulse(value);
        }

        monitor.reset();
        let metrics = monitor.metrics();
        prop_assert_eq!(metrics.session_state, SessionState::WaitingForStart);
        prop_assert_eq!(metrics.distance_total, 0.0);
        prop_assert_eq!(metrics.duration_total, 0.0);
        prop_assert_eq!(metrics.strokes_total, 0);
        prop_assert_eq!(metrics.calories_total, 0.0);
        prop_assert_eq!(monitor.engine().total_linear_distance(), 0.0);
    }
}
