//! Physical settings of the rowing machine.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Rower-specific settings. Immutable once the engine is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowerSettings {
    /// Number of sensor impulses per flywheel revolution
    pub num_of_impulses_per_revolution: u32,
    /// Length of the moving average applied to impulse durations
    pub smoothing: usize,
    /// Number of consecutive impulse pairs that make up a flank
    pub flank_length: usize,
    /// Flank pairs that may contradict the trend before it is rejected
    pub number_of_errors_allowed: usize,
    /// Natural deceleration of the unpowered flywheel in rad/s² (0 disables)
    pub natural_deceleration: f64,
    /// Flywheel moment of inertia in kg·m²
    pub flywheel_inertia: f64,
    /// Empirical constant relating drag factor to boat distance
    pub magic_constant: f64,
    /// Nominal drag factor (×10⁻⁶ kg·m²)
    pub drag_factor: f64,
    /// Recalibrate the drag factor from each recovery
    pub auto_adjust_drag_factor: bool,
    /// Strokes averaged into the drag factor
    pub damping_constant_smoothing: usize,
    /// Maximum relative drag factor change per stroke
    pub damping_constant_max_change: f64,
    /// Shortest plausible impulse in seconds
    pub minimum_time_between_impulses: f64,
    /// Longest plausible impulse in seconds
    pub maximum_time_between_impulses: f64,
    /// Smallest allowed ratio between consecutive clean impulses
    pub maximum_downward_change: f64,
    /// Largest allowed ratio between consecutive clean impulses
    pub maximum_upward_change: f64,
    /// Minimum drive duration in seconds
    pub minimum_drive_time: f64,
    /// Minimum recovery duration in seconds
    pub minimum_recovery_time: f64,
    /// Single impulse gap in seconds that counts as a pause
    pub maximum_impulse_time_before_pause: f64,
}

impl Default for RowerSettings {
    fn default() -> Self {
        Self {
            num_of_impulses_per_revolution: 1,
            smoothing: 1,
            flank_length: 2,
            number_of_errors_allowed: 0,
            natural_deceleration: 0.0,
            flywheel_inertia: 0.5,
            magic_constant: 2.8,
            drag_factor: 1500.0,
            auto_adjust_drag_factor: true,
            damping_constant_smoothing: 5,
            damping_constant_max_change: 0.2,
            minimum_time_between_impulses: 0.014,
            maximum_time_between_impulses: 0.5,
            maximum_downward_change: 0.2,
            maximum_upward_change: 1.75,
            minimum_drive_time: 0.3,
            minimum_recovery_time: 0.9,
            maximum_impulse_time_before_pause: 3.0,
        }
    }
}

impl RowerSettings {
    /// Angular displacement of the flywheel between two impulses, in radians.
    pub fn angular_displacement_per_impulse(&self) -> f64 {
        (2.0 * std::f64::consts::PI) / self.num_of_impulses_per_revolution as f64
    }

    /// Shortest stroke that is considered plausible.
    pub fn minimum_cycle_length(&self) -> f64 {
        self.minimum_drive_time + self.minimum_recovery_time
    }

    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_of_impulses_per_revolution == 0 {
            return Err(invalid("num_of_impulses_per_revolution must be positive"));
        }
        if self.smoothing == 0 {
            return Err(invalid("smoothing must be at least 1"));
        }
        if self.flank_length < 2 {
            return Err(invalid("flank_length must be at least 2"));
        }
        if self.number_of_errors_allowed >= self.flank_length {
            return Err(invalid("number_of_errors_allowed must be below flank_length"));
        }
        if !(self.natural_deceleration <= 0.0) {
            return Err(invalid("natural_deceleration must be zero or negative"));
        }
        if self.damping_constant_smoothing == 0 {
            return Err(invalid("damping_constant_smoothing must be at least 1"));
        }

        let positive = [
            ("flywheel_inertia", self.flywheel_inertia),
            ("magic_constant", self.magic_constant),
            ("drag_factor", self.drag_factor),
            ("minimum_time_between_impulses", self.minimum_time_between_impulses),
            ("maximum_time_between_impulses", self.maximum_time_between_impulses),
            ("minimum_drive_time", self.minimum_drive_time),
            ("minimum_recovery_time", self.minimum_recovery_time),
            (
                "maximum_impulse_time_before_pause",
                self.maximum_impulse_time_before_pause,
            ),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidSetting(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        if !(self.damping_constant_max_change > 0.0 && self.damping_constant_max_change < 1.0) {
            return Err(invalid("damping_constant_max_change must be between 0 and 1"));
        }
        if self.minimum_time_between_impulses >= self.maximum_time_between_impulses {
            return Err(invalid(
                "minimum_time_between_impulses must be below maximum_time_between_impulses",
            ));
        }
        if !(self.maximum_downward_change > 0.0 && self.maximum_downward_change < 1.0) {
            return Err(invalid("maximum_downward_change must be between 0 and 1"));
        }
        if !(self.maximum_upward_change > 1.0) {
            return Err(invalid("maximum_upward_change must be above 1"));
        }
        if self.minimum_cycle_length() >= self.maximum_impulse_time_before_pause {
            return Err(invalid(
                "minimum_drive_time + minimum_recovery_time must be below maximum_impulse_time_before_pause",
            ));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::InvalidSetting(message.to_string())
}
