//! Engine input and output types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Phase of the rowing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    /// Force is applied and the flywheel accelerates
    Drive,
    /// The flywheel coasts and decelerates under drag
    Recovery,
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CyclePhase::Drive => write!(f, "Drive"),
            CyclePhase::Recovery => write!(f, "Recovery"),
        }
    }
}

/// Flywheel state reported directly by a dual-sensor rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlywheelHint {
    Powered,
    Unpowered,
}

/// One time delta between two consecutive flywheel sensor triggers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impulse {
    seconds: f64,
    hint: Option<FlywheelHint>,
}

impl Impulse {
    /// Impulse from a single-sensor rig. The sign carries no meaning.
    pub fn new(seconds: f64) -> Result<Self, ImpulseError> {
        Ok(Self {
            seconds: validate(seconds)?,
            hint: None,
        })
    }

    /// Impulse from a dual-sensor rig: positive is powered, negative coasting.
    pub fn with_direction(seconds: f64) -> Result<Self, ImpulseError> {
        let magnitude = validate(seconds)?;
        let hint = if seconds > 0.0 {
            FlywheelHint::Powered
        } else {
            FlywheelHint::Unpowered
        };
        Ok(Self {
            seconds: magnitude,
            hint: Some(hint),
        })
    }

    /// Parse a raw value as delivered by the capture process.
    pub fn from_raw(raw: f64, dual_sensor: bool) -> Result<Self, ImpulseError> {
        if dual_sensor {
            Self::with_direction(raw)
        } else {
            Self::new(raw)
        }
    }

    /// Duration in seconds, always strictly positive.
    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    pub fn hint(&self) -> Option<FlywheelHint> {
        self.hint
    }
}

fn validate(seconds: f64) -> Result<f64, ImpulseError> {
    if !seconds.is_finite() {
        return Err(ImpulseError::NotFinite(seconds));
    }
    if seconds == 0.0 {
        return Err(ImpulseError::Zero);
    }
    Ok(seconds.abs())
}

/// Impulses rejected at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ImpulseError {
    #[error("impulse duration is not a finite number: {0}")]
    NotFinite(f64),

    #[error("impulse duration is zero")]
    Zero,
}

/// Per-impulse refresh of the live values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KeyMetrics {
    /// Seconds since the engine was reset
    pub time_since_start: f64,
    /// Cumulative linear distance in meters, including the phase in progress
    pub distance: f64,
    /// Instantaneous torque on the flywheel in N·m
    pub instantaneous_torque: f64,
}

/// Snapshot emitted when a drive or recovery phase completes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrokeEvent {
    /// Seconds since the engine was reset
    pub time_since_start: f64,
    /// Average power over the last cycle in watts
    pub power: f64,
    /// Duration of the last cycle (drive + recovery) in seconds
    pub duration: f64,
    /// Duration of the last drive phase in seconds
    pub duration_drive_phase: f64,
    /// Linear distance covered by the last drive and recovery in meters
    pub stroke_distance: f64,
    /// Cumulative linear distance in meters
    pub distance: f64,
    /// Average linear speed over the last cycle in m/s
    pub speed: f64,
    /// Strokes started since the reset
    pub number_of_strokes: u32,
    /// Instantaneous torque in N·m
    pub instantaneous_torque: f64,
    /// Drag factor in use, ×10⁶
    pub drag_factor: f64,
    /// Phase that has just started
    pub phase: CyclePhase,
    /// False when speed and power were held from the previous cycle
    pub plausible: bool,
}

/// Consumer of engine output. The statistics aggregator is the production
/// implementation; tests plug in recorders.
pub trait StrokeSink {
    /// Called on every impulse that does not complete a phase.
    fn update_key_metrics(&mut self, metrics: &KeyMetrics);

    /// Called once when a drive phase completes.
    fn handle_drive_end(&mut self, stroke: &StrokeEvent);

    /// Called once when a recovery phase completes, i.e. a new stroke starts.
    fn handle_recovery_end(&mut self, stroke: &StrokeEvent);

    /// Called when a single impulse gap reached the pause threshold.
    fn handle_pause(&mut self, gap_seconds: f64);
}
