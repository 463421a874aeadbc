//! Session statistics on top of the rowing engine.
//!
//! Receives completed phases through [`StrokeSink`], keeps totals and
//! smoothed per-stroke values, and runs the session state machine:
//!
//! ```text
//! WaitingForStart --recovery end--> Rowing --no drive for maximum_stroke_time--> Paused
//!                                   Rowing <--------recovery end--------------- Paused
//! any --stop()--> Stopped --reset()--> WaitingForStart
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, Sender};

use crate::config::MonitorConfig;
use crate::engine::types::{CyclePhase, KeyMetrics, StrokeEvent, StrokeSink};
use crate::metrics::smoothing::{IntervalAverage, WeightedAverage};
use crate::metrics::timer::{Clock, DebounceTimer, SystemClock};
use crate::metrics::types::{
    format_time, HeartRateMeasurement, Metrics, SessionState, StatisticsEvent, StrokeState,
};

/// Narrow read interface for consumers of session metrics.
pub trait MetricsSource {
    /// Current snapshot.
    fn metrics(&self) -> Metrics;

    fn session_state(&self) -> SessionState;
}

/// Settings of the statistics aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsConfig {
    /// Strokes averaged into displayed values
    pub num_of_phases_for_averaging: usize,
    /// Shortest plausible stroke in seconds
    pub minimum_stroke_time: f64,
    /// Longest plausible stroke in seconds, also the pause timeout
    pub maximum_stroke_time: f64,
    /// Silence after which heart rate reads as zero
    pub heartrate_timeout: Duration,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for StatisticsConfig {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            num_of_phases_for_averaging: config.num_of_phases_for_averaging_screen_data,
            minimum_stroke_time: config.rower_settings.minimum_cycle_length(),
            maximum_stroke_time: config.maximum_stroke_time,
            heartrate_timeout: Duration::try_from_secs_f64(config.heartrate_timeout_secs)
                .unwrap_or(Duration::from_secs(6)),
        }
    }
}

impl StatisticsConfig {
    fn pause_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.maximum_stroke_time).unwrap_or(Duration::from_secs(10))
    }
}

/// Raw averager outputs, without the display gating of [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StrokeAverages {
    pub stroke_duration: f64,
    pub power: f64,
    /// m/s
    pub speed: f64,
    pub power_ratio: f64,
}

/// Aggregates engine output into session metrics.
pub struct RowingStatistics {
    config: StatisticsConfig,
    clock: Arc<dyn Clock>,
    session_state: SessionState,
    pause_timer: DebounceTimer,
    heartrate_timer: DebounceTimer,

    stroke_average: WeightedAverage,
    power_average: WeightedAverage,
    speed_average: WeightedAverage,
    power_ratio_average: WeightedAverage,
    calories_per_minute: IntervalAverage,
    calories_per_hour: IntervalAverage,

    distance_total: f64,
    duration_total: f64,
    strokes_total: u32,
    calories_total: f64,
    heartrate: u8,
    heartrate_battery_level: u8,
    last_stroke_duration: f64,
    last_stroke_distance: f64,
    last_stroke_speed: f64,
    last_stroke_state: StrokeState,
    instantaneous_torque: f64,
    drag_factor: f64,

    last_web_metrics: Option<Metrics>,
    event_tx: Option<Sender<StatisticsEvent>>,
}

impl RowingStatistics {
    pub fn new(config: StatisticsConfig, clock: Arc<dyn Clock>) -> Self {
        let window = config.num_of_phases_for_averaging;
        Self {
            config,
            clock,
            session_state: SessionState::WaitingForStart,
            pause_timer: DebounceTimer::new(),
            heartrate_timer: DebounceTimer::new(),
            stroke_average: WeightedAverage::new(window),
            power_average: WeightedAverage::new(window),
            speed_average: WeightedAverage::new(window),
            power_ratio_average: WeightedAverage::new(window),
            calories_per_minute: IntervalAverage::per_minute(),
            calories_per_hour: IntervalAverage::per_hour(),
            distance_total: 0.0,
            duration_total: 0.0,
            strokes_total: 0,
            calories_total: 0.0,
            heartrate: 0,
            heartrate_battery_level: 0,
            last_stroke_duration: 0.0,
            last_stroke_distance: 0.0,
            last_stroke_speed: 0.0,
            last_stroke_state: StrokeState::WaitingForDrive,
            instantaneous_torque: 0.0,
            drag_factor: 0.0,
            last_web_metrics: None,
            event_tx: None,
        }
    }

    /// Statistics on the wall clock.
    pub fn with_system_clock(config: StatisticsConfig) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    /// Get a receiver for statistics events. Replaces any earlier receiver.
    pub fn event_receiver(&mut self) -> Receiver<StatisticsEvent> {
        let (tx, rx) = crossbeam::channel::unbounded();
        self.event_tx = Some(tx);
        rx
    }

    fn send_event(&self, event: StatisticsEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// Store a heart rate reading and restart the staleness timer.
    pub fn handle_heartrate_measurement(&mut self, measurement: HeartRateMeasurement) {
        self.heartrate_timer
            .reschedule(self.clock.now(), self.config.heartrate_timeout);
        self.heartrate = measurement.heartrate;
        self.heartrate_battery_level = measurement.battery_level.unwrap_or(0);
    }

    /// Earliest pending timer deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.pause_timer.deadline(), self.heartrate_timer.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fire every timer whose deadline has passed.
    pub fn poll_timers(&mut self) {
        let now = self.clock.now();

        if self.pause_timer.fire_if_due(now) && self.session_state == SessionState::Rowing {
            tracing::info!(
                "no drive for {} s, pausing session",
                self.config.maximum_stroke_time
            );
            self.pause_rowing();
        }

        if self.heartrate_timer.fire_if_due(now) {
            tracing::debug!("heart rate monitor went silent");
            self.heartrate = 0;
            self.heartrate_battery_level = 0;
        }
    }

    /// Emit a web update if the snapshot changed since the last one.
    pub fn emit_web_metrics(&mut self) {
        let metrics = self.metrics();
        if self.last_web_metrics.as_ref() != Some(&metrics) {
            self.send_event(StatisticsEvent::WebMetricsUpdate(metrics.clone()));
            self.last_web_metrics = Some(metrics);
        }
    }

    /// Emit a peripheral update, changed or not.
    pub fn emit_peripheral_metrics(&mut self) {
        self.send_event(StatisticsEvent::PeripheralMetricsUpdate(self.metrics()));
    }

    /// End the session. Engine events are ignored until [`reset`](Self::reset).
    pub fn stop(&mut self) {
        self.pause_timer.cancel();
        self.session_state = SessionState::Stopped;
        tracing::info!("session stopped");
    }

    /// Pause an active session.
    pub fn pause(&mut self) {
        if self.session_state == SessionState::Rowing {
            self.pause_timer.cancel();
            self.pause_rowing();
        }
    }

    /// Cancel all timers and return to an empty session.
    pub fn reset(&mut self) {
        self.pause_timer.cancel();
        self.heartrate_timer.cancel();

        self.reset_averages();
        self.calories_per_minute.reset();
        self.calories_per_hour.reset();

        self.distance_total = 0.0;
        self.duration_total = 0.0;
        self.strokes_total = 0;
        self.calories_total = 0.0;
        self.heartrate = 0;
        self.heartrate_battery_level = 0;
        self.last_stroke_duration = 0.0;
        self.last_stroke_distance = 0.0;
        self.last_stroke_speed = 0.0;
        self.last_stroke_state = StrokeState::WaitingForDrive;
        self.instantaneous_torque = 0.0;
        self.drag_factor = 0.0;
        self.last_web_metrics = None;
        self.session_state = SessionState::WaitingForStart;

        tracing::info!("session reset");
    }

    /// Raw averager outputs.
    pub fn averages(&self) -> StrokeAverages {
        StrokeAverages {
            stroke_duration: self.stroke_average.average(),
            power: self.power_average.average(),
            speed: self.speed_average.average(),
            power_ratio: self.power_ratio_average.average(),
        }
    }

    pub fn calories_total(&self) -> f64 {
        self.calories_total
    }

    fn pause_rowing(&mut self) {
        self.reset_averages();
        self.last_stroke_state = StrokeState::Recovery;
        self.session_state = SessionState::Paused;
        self.send_event(StatisticsEvent::RowingPaused);
    }

    fn reset_averages(&mut self) {
        self.stroke_average.reset();
        self.power_average.reset();
        self.speed_average.reset();
        self.power_ratio_average.reset();
    }

    fn is_plausible(&self, stroke: &StrokeEvent) -> bool {
        stroke.plausible
            && stroke.duration > self.config.minimum_stroke_time
            && stroke.duration < self.config.maximum_stroke_time
    }

    fn record_stroke(&mut self, stroke: &StrokeEvent) {
        self.duration_total = stroke.time_since_start;
        self.distance_total = stroke.distance;
        self.last_stroke_distance = stroke.stroke_distance;
        self.last_stroke_speed = stroke.speed;
        self.last_stroke_state = match stroke.phase {
            CyclePhase::Drive => StrokeState::Driving,
            CyclePhase::Recovery => StrokeState::Recovery,
        };
        self.instantaneous_torque = stroke.instantaneous_torque;
        self.drag_factor = stroke.drag_factor;
    }

    fn is_active(&self) -> bool {
        matches!(
            self.session_state,
            SessionState::Rowing | SessionState::Paused
        )
    }

    fn gated(&self, value: f64) -> f64 {
        if value > 0.0 && self.last_stroke_speed > 0.0 && self.session_state == SessionState::Rowing
        {
            value
        } else {
            0.0
        }
    }
}

impl StrokeSink for RowingStatistics {
    fn update_key_metrics(&mut self, metrics: &KeyMetrics) {
        if self.session_state == SessionState::Stopped {
            return;
        }
        self.duration_total = metrics.time_since_start;
        self.distance_total = metrics.distance;
        self.instantaneous_torque = metrics.instantaneous_torque;
    }

    fn handle_drive_end(&mut self, stroke: &StrokeEvent) {
        if self.session_state == SessionState::Stopped {
            return;
        }
        self.pause_timer
            .reschedule(self.clock.now(), self.config.pause_timeout());

        // http://eodg.atm.ox.ac.uk/user/dudhia/rowing/physics/ergometer.html#section11
        let calories = (4.0 * self.power_average.average() + 350.0) * stroke.duration / 4200.0;

        if self.is_plausible(stroke) {
            self.stroke_average.push(stroke.duration);
            self.power_average.push(stroke.power);
            self.speed_average.push(stroke.speed);
            self.calories_per_minute.push(calories, stroke.duration);
            self.calories_per_hour.push(calories, stroke.duration);
        } else {
            tracing::debug!(
                "stroke of {:.3} s considered unreliable, skipped stroke statistics",
                stroke.duration
            );
        }

        self.calories_total += calories;
        self.last_stroke_duration = stroke.duration;
        self.record_stroke(stroke);

        self.send_event(StatisticsEvent::DriveFinished(self.metrics()));
    }

    fn handle_recovery_end(&mut self, stroke: &StrokeEvent) {
        match self.session_state {
            SessionState::Stopped => return,
            SessionState::WaitingForStart => tracing::info!("session started"),
            SessionState::Paused => tracing::info!("session resumed"),
            SessionState::Rowing => {}
        }
        self.session_state = SessionState::Rowing;

        if self.is_plausible(stroke) {
            self.power_ratio_average
                .push(stroke.duration_drive_phase / stroke.duration);
        } else {
            tracing::debug!(
                "stroke of {:.3} s considered unreliable, skipped power ratio",
                stroke.duration
            );
        }

        self.strokes_total = stroke.number_of_strokes;
        self.record_stroke(stroke);

        self.send_event(StatisticsEvent::RecoveryFinished(self.metrics()));
    }

    fn handle_pause(&mut self, gap_seconds: f64) {
        if self.session_state == SessionState::Rowing {
            self.pause_timer.cancel();
            self.pause_rowing();
        }
        if self.is_active() {
            self.calories_per_minute.push(0.0, gap_seconds);
            self.calories_per_hour.push(0.0, gap_seconds);
        }
    }
}

impl MetricsSource for RowingStatistics {
    fn metrics(&self) -> Metrics {
        let rowing = self.session_state == SessionState::Rowing;
        let speed_average = self.speed_average.average();
        let stroke_average = self.stroke_average.average();

        let split = if speed_average != 0.0 && self.last_stroke_speed > 0.0 {
            500.0 / speed_average
        } else {
            f64::INFINITY
        };

        let averaged_stroke_time = if stroke_average > self.config.minimum_stroke_time
            && stroke_average < self.config.maximum_stroke_time
            && self.last_stroke_speed > 0.0
            && rowing
        {
            stroke_average
        } else {
            0.0
        };

        Metrics {
            session_state: self.session_state,
            duration_total: self.duration_total,
            duration_total_formatted: format_time(self.duration_total),
            strokes_total: self.strokes_total,
            distance_total: self.distance_total.max(0.0),
            calories_total: self.calories_total,
            calories_per_minute: self.calories_per_minute.average().max(0.0),
            calories_per_hour: self.calories_per_hour.average().max(0.0),
            stroke_time: self.last_stroke_duration,
            distance: self.gated(self.last_stroke_distance),
            power: self.gated(self.power_average.average()),
            split,
            split_formatted: format_time(split),
            power_ratio: self.gated(self.power_ratio_average.average()),
            instantaneous_torque: self.instantaneous_torque,
            strokes_per_minute: if averaged_stroke_time != 0.0 {
                60.0 / averaged_stroke_time
            } else {
                0.0
            },
            speed: self.gated(speed_average) * 3.6,
            stroke_state: self.last_stroke_state,
            drag_factor: self.drag_factor,
            heartrate: self.heartrate,
            heartrate_battery_level: self.heartrate_battery_level,
        }
    }

    fn session_state(&self) -> SessionState {
        self.session_state
    }
}
