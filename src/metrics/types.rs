//! Session metrics exposed to displays and peripherals.

use serde::{Deserialize, Serialize};

/// Lifecycle of a rowing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    #[default]
    WaitingForStart,
    Rowing,
    Paused,
    Stopped,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::WaitingForStart => write!(f, "Waiting for start"),
            SessionState::Rowing => write!(f, "Rowing"),
            SessionState::Paused => write!(f, "Paused"),
            SessionState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Stroke state as shown on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StrokeState {
    #[serde(rename = "DRIVING")]
    Driving,
    #[serde(rename = "RECOVERY")]
    Recovery,
    #[default]
    #[serde(rename = "LET'S GO")]
    WaitingForDrive,
}

/// Heart rate reading from an external monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateMeasurement {
    /// Beats per minute
    pub heartrate: u8,
    /// Battery level in percent, if the monitor reports one
    #[serde(default)]
    pub battery_level: Option<u8>,
}

/// Snapshot of the session, derived on demand.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub session_state: SessionState,
    /// Seconds since the session started
    pub duration_total: f64,
    pub duration_total_formatted: String,
    pub strokes_total: u32,
    /// Meters
    pub distance_total: f64,
    /// kcal
    pub calories_total: f64,
    pub calories_per_minute: f64,
    pub calories_per_hour: f64,
    /// Duration of the last stroke in seconds
    pub stroke_time: f64,
    /// Distance of the last stroke in meters
    pub distance: f64,
    /// Watts
    pub power: f64,
    /// Seconds per 500 m, infinite while not moving (serialized as null)
    pub split: f64,
    pub split_formatted: String,
    /// Share of the stroke spent in the drive
    pub power_ratio: f64,
    /// N·m
    pub instantaneous_torque: f64,
    pub strokes_per_minute: f64,
    /// km/h
    pub speed: f64,
    pub stroke_state: StrokeState,
    /// ×10⁶
    pub drag_factor: f64,
    pub heartrate: u8,
    pub heartrate_battery_level: u8,
}

/// Notifications pushed by the statistics aggregator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "metrics", rename_all = "camelCase")]
pub enum StatisticsEvent {
    DriveFinished(Metrics),
    RecoveryFinished(Metrics),
    WebMetricsUpdate(Metrics),
    PeripheralMetricsUpdate(Metrics),
    RowingPaused,
}

/// Format seconds as `mm:ss`, or `hh:mm:ss` from one hour on. Infinite
/// and NaN values render as `∞`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "∞".to_string();
    }

    let total = seconds.max(0.0).floor() as u64;
    let hours = total / 3600;
    let minutes = (total / 60) % 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}
