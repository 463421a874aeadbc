//! Rowing engine: the Drive/Recovery state machine and the flywheel physics.
//!
//! Physics of rowing after Anu Dudhia
//! (<http://eodg.atm.ox.ac.uk/user/dudhia/rowing/physics>) and Dave Vernooy's
//! ergware notes. The flywheel is modelled as a rotating mass slowed by air
//! or water resistance proportional to ω²:
//!
//! - drag factor from the free deceleration of a recovery:
//!   `k = -I · (1/ω_start - 1/ω_end) / t_recovery`
//! - torque: `τ = I · dω/dt + k · ω²`
//! - linear distance per radian: `(k / magic_constant)^(1/3)`
//! - cycle power: `P = k · (θ_cycle / t_cycle)³`

use crate::config::RowerSettings;
use crate::engine::flank::FlankDetector;
use crate::engine::types::{
    CyclePhase, FlywheelHint, Impulse, KeyMetrics, StrokeEvent, StrokeSink,
};
use crate::metrics::smoothing::MovingAverage;

/// Where the phase boundary lies relative to the current impulse.
#[derive(Debug, Clone, Copy)]
struct Boundary {
    /// Seconds back from the current impulse
    time_back: f64,
    /// Impulses back from the current impulse
    impulses_back: f64,
    /// Duration of the impulse at the boundary
    impulse_length: f64,
}

/// Mutable engine state, owned by exactly one [`RowingEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    pub cycle_phase: CyclePhase,
    pub total_time: f64,
    pub total_number_of_impulses: u64,
    pub stroke_number: u32,
    pub drive_phase_start_time: f64,
    /// Impulse count at which the drive started
    pub drive_phase_start_impulses: f64,
    pub drive_phase_length: f64,
    pub drive_phase_angular_displacement: f64,
    pub drive_linear_distance: f64,
    pub recovery_phase_start_time: f64,
    /// Impulse count at which the recovery started
    pub recovery_phase_start_impulses: f64,
    pub recovery_phase_length: f64,
    pub recovery_phase_angular_displacement: f64,
    pub recovery_start_angular_velocity: f64,
    pub recovery_end_angular_velocity: f64,
    pub recovery_linear_distance: f64,
    /// Latest raw drag estimate (SI units)
    pub current_drag_factor: f64,
    /// Smoothed drag factor in use (SI units)
    pub drag_factor: f64,
    pub cycle_length: f64,
    pub linear_cycle_velocity: f64,
    pub total_linear_distance: f64,
    pub averaged_cycle_power: f64,
    pub current_torque: f64,
    pub previous_angular_velocity: f64,
    pub current_angular_velocity: f64,
}

impl EngineState {
    /// State right after a reset.
    ///
    /// Phase lengths and displacements are seeded with a plausible default
    /// cycle (8 m, one third drive) so the first transition is accepted.
    pub fn initial(settings: &RowerSettings) -> Self {
        let displacement_per_impulse = settings.angular_displacement_per_impulse();
        let nominal_drag = settings.drag_factor / 1e6;
        let default_cycle_displacement =
            8.0 / (nominal_drag / settings.magic_constant).powf(1.0 / 3.0);

        Self {
            cycle_phase: CyclePhase::Recovery,
            total_time: 0.0,
            total_number_of_impulses: 0,
            stroke_number: 0,
            drive_phase_start_time: 0.0,
            drive_phase_start_impulses: 0.0,
            drive_phase_length: 2.0 * settings.minimum_drive_time,
            drive_phase_angular_displacement: default_cycle_displacement / 3.0,
            drive_linear_distance: 0.0,
            recovery_phase_start_time: -2.0 * settings.minimum_recovery_time,
            recovery_phase_start_impulses: (-(2.0 / 3.0) * default_cycle_displacement
                / displacement_per_impulse)
                .round(),
            recovery_phase_length: 2.0 * settings.minimum_recovery_time,
            recovery_phase_angular_displacement: (2.0 / 3.0) * default_cycle_displacement,
            recovery_start_angular_velocity: 0.0,
            recovery_end_angular_velocity: 0.0,
            recovery_linear_distance: 0.0,
            current_drag_factor: nominal_drag,
            drag_factor: nominal_drag,
            cycle_length: settings.minimum_cycle_length(),
            linear_cycle_velocity: 0.0,
            total_linear_distance: 0.0,
            averaged_cycle_power: 0.0,
            current_torque: 0.0,
            previous_angular_velocity: 0.0,
            current_angular_velocity: 0.0,
        }
    }
}

/// Turns flywheel impulses into strokes and pushes them to a [`StrokeSink`].
pub struct RowingEngine<S: StrokeSink> {
    settings: RowerSettings,
    flank: FlankDetector,
    drag_average: MovingAverage,
    angular_displacement_per_impulse: f64,
    state: EngineState,
    sink: S,
}

impl<S: StrokeSink> RowingEngine<S> {
    /// Create an engine feeding `sink`. Settings are expected to be validated.
    pub fn new(settings: RowerSettings, sink: S) -> Self {
        let mut drag_average = MovingAverage::new(settings.damping_constant_smoothing);
        drag_average.fill(settings.drag_factor / 1e6);

        Self {
            flank: FlankDetector::new(&settings),
            drag_average,
            angular_displacement_per_impulse: settings.angular_displacement_per_impulse(),
            state: EngineState::initial(&settings),
            settings,
            sink,
        }
    }

    /// Return to the initial state. The sink is left untouched.
    pub fn reset(&mut self) {
        self.flank.reset();
        self.drag_average.fill(self.settings.drag_factor / 1e6);
        self.state = EngineState::initial(&self.settings);
        tracing::debug!("rowing engine reset");
    }

    /// Process one flywheel impulse.
    pub fn handle_rotation_impulse(&mut self, impulse: Impulse) {
        let dt = impulse.seconds();

        self.state.total_time += dt;
        self.state.total_number_of_impulses += 1;
        self.flank.push_value(dt);

        let (powered, unpowered, boundary) = match impulse.hint() {
            Some(hint) => {
                let powered = hint == FlywheelHint::Powered;
                let boundary = Boundary {
                    time_back: 0.0,
                    impulses_back: 0.0,
                    impulse_length: dt,
                };
                (powered, !powered, boundary)
            }
            None => (
                self.flank.is_flywheel_powered(),
                self.flank.is_flywheel_unpowered(),
                self.flank_boundary(),
            ),
        };

        match self.state.cycle_phase {
            CyclePhase::Drive => {
                if unpowered {
                    self.state.drive_phase_length = (self.state.total_time - boundary.time_back)
                        - self.state.drive_phase_start_time;
                    if self.state.drive_phase_length >= self.settings.minimum_drive_time {
                        self.start_recovery_phase(dt, boundary);
                    } else {
                        tracing::debug!(
                            "time {:.4} s, impulse {}: flank suggests no power ({:.1} rad/s²), but drive length {:.4} s is below {} s",
                            self.state.total_time,
                            self.state.total_number_of_impulses,
                            self.flank.acceleration_at_begin_of_flank(),
                            self.state.drive_phase_length,
                            self.settings.minimum_drive_time
                        );
                        self.update_drive_phase(dt, boundary);
                    }
                } else {
                    self.update_drive_phase(dt, boundary);
                }
            }
            CyclePhase::Recovery => {
                if powered {
                    self.state.recovery_phase_length = (self.state.total_time
                        - boundary.time_back)
                        - self.state.recovery_phase_start_time;
                    if self.state.recovery_phase_length >= self.settings.minimum_recovery_time {
                        self.start_drive_phase(dt, boundary);
                    } else {
                        tracing::debug!(
                            "time {:.4} s, impulse {}: flank suggests power ({:.1} rad/s²), but recovery length {:.4} s is below {} s",
                            self.state.total_time,
                            self.state.total_number_of_impulses,
                            self.flank.acceleration_at_begin_of_flank(),
                            self.state.recovery_phase_length,
                            self.settings.minimum_recovery_time
                        );
                        self.update_recovery_phase(dt, boundary);
                    }
                } else {
                    self.update_recovery_phase(dt, boundary);
                }
            }
        }

        if dt >= self.settings.maximum_impulse_time_before_pause {
            tracing::info!("impulse gap of {:.2} s, signalling pause", dt);
            self.sink.handle_pause(dt);
        }
    }

    fn flank_boundary(&self) -> Boundary {
        Boundary {
            time_back: self.flank.time_to_begin_of_flank(),
            impulses_back: self.flank.no_impulses_to_begin_flank() as f64,
            impulse_length: self.flank.impulse_length_at_begin_flank(),
        }
    }

    /// Concludes the recovery and starts a new stroke.
    fn start_drive_phase(&mut self, dt: f64, boundary: Boundary) {
        tracing::debug!("recovery phase completed");
        self.update_cycle_length();

        self.state.recovery_phase_angular_displacement = self.displacement_since(
            self.state.recovery_phase_start_impulses,
            boundary,
        );

        // Distance uses the drag factor that was active during the recovery.
        self.state.recovery_linear_distance =
            self.rowed_distance_ratio() * self.state.recovery_phase_angular_displacement;
        self.state.total_linear_distance += self.state.recovery_linear_distance;

        self.update_drag_factor(boundary.impulse_length);

        self.state.current_torque = self.calculate_torque(dt);
        let plausible = self.cycle_is_plausible();
        self.state.linear_cycle_velocity = self.calculate_linear_velocity();
        self.state.averaged_cycle_power = self.calculate_cycle_power();

        self.state.stroke_number += 1;
        self.state.drive_phase_start_time = self.state.total_time - boundary.time_back;
        self.state.drive_phase_start_impulses =
            self.state.total_number_of_impulses as f64 - boundary.impulses_back;
        self.state.cycle_phase = CyclePhase::Drive;

        tracing::debug!(
            "drive phase started at {:.4} s, impulse {}",
            self.state.total_time,
            self.state.total_number_of_impulses
        );

        let stroke = self.stroke_event(CyclePhase::Drive, plausible);
        self.sink.handle_recovery_end(&stroke);
    }

    fn update_drive_phase(&mut self, dt: f64, boundary: Boundary) {
        self.state.drive_phase_angular_displacement =
            self.displacement_since(self.state.drive_phase_start_impulses, boundary);
        self.state.drive_linear_distance =
            self.rowed_distance_ratio() * self.state.drive_phase_angular_displacement;
        self.state.current_torque = self.calculate_torque(dt);

        self.sink.update_key_metrics(&KeyMetrics {
            time_since_start: self.state.total_time,
            distance: self.state.total_linear_distance + self.state.drive_linear_distance,
            instantaneous_torque: self.state.current_torque,
        });
    }

    /// Concludes the drive and starts the recovery.
    fn start_recovery_phase(&mut self, dt: f64, boundary: Boundary) {
        tracing::debug!("drive phase completed");
        self.update_cycle_length();

        self.state.drive_phase_angular_displacement =
            self.displacement_since(self.state.drive_phase_start_impulses, boundary);
        self.state.drive_linear_distance =
            self.rowed_distance_ratio() * self.state.drive_phase_angular_displacement;
        self.state.total_linear_distance += self.state.drive_linear_distance;

        self.state.current_torque = self.calculate_torque(dt);
        let plausible = self.cycle_is_plausible();
        self.state.linear_cycle_velocity = self.calculate_linear_velocity();
        self.state.averaged_cycle_power = self.calculate_cycle_power();

        self.state.recovery_phase_start_time = self.state.total_time - boundary.time_back;
        self.state.recovery_phase_start_impulses =
            self.state.total_number_of_impulses as f64 - boundary.impulses_back;
        if boundary.impulse_length > 0.0 {
            self.state.recovery_start_angular_velocity =
                self.angular_displacement_per_impulse / boundary.impulse_length;
        } else {
            tracing::error!(
                "time {:.4} s, impulse {}: division by 0 prevented, impulse length at begin of flank is {} s",
                self.state.total_time,
                self.state.total_number_of_impulses,
                boundary.impulse_length
            );
        }
        self.state.cycle_phase = CyclePhase::Recovery;

        tracing::debug!(
            "recovery phase started at {:.4} s, impulse {}",
            self.state.total_time,
            self.state.total_number_of_impulses
        );

        let stroke = self.stroke_event(CyclePhase::Recovery, plausible);
        self.sink.handle_drive_end(&stroke);
    }

    fn update_recovery_phase(&mut self, dt: f64, boundary: Boundary) {
        self.state.recovery_phase_angular_displacement =
            self.displacement_since(self.state.recovery_phase_start_impulses, boundary);
        self.state.recovery_linear_distance =
            self.rowed_distance_ratio() * self.state.recovery_phase_angular_displacement;
        self.state.current_torque = self.calculate_torque(dt);

        self.sink.update_key_metrics(&KeyMetrics {
            time_since_start: self.state.total_time,
            distance: self.state.total_linear_distance + self.state.recovery_linear_distance,
            instantaneous_torque: self.state.current_torque,
        });
    }

    fn displacement_since(&self, start_impulses: f64, boundary: Boundary) -> f64 {
        ((self.state.total_number_of_impulses as f64 - boundary.impulses_back) - start_impulses)
            * self.angular_displacement_per_impulse
    }

    /// Meters per radian of flywheel rotation. Zero until the first stroke:
    /// the warm-start recovery was never rowed.
    fn rowed_distance_ratio(&self) -> f64 {
        if self.state.stroke_number == 0 {
            0.0
        } else {
            self.distance_ratio()
        }
    }

    fn distance_ratio(&self) -> f64 {
        (self.state.drag_factor / self.settings.magic_constant).powf(1.0 / 3.0)
    }

    fn update_cycle_length(&mut self) {
        if self.settings.minimum_recovery_time <= self.state.recovery_phase_length
            && self.settings.minimum_drive_time <= self.state.drive_phase_length
        {
            self.state.cycle_length =
                self.state.recovery_phase_length + self.state.drive_phase_length;
        } else {
            tracing::debug!(
                "cycle length not plausible: recovery {:.4} s, drive {:.4} s",
                self.state.recovery_phase_length,
                self.state.drive_phase_length
            );
        }
    }

    fn update_drag_factor(&mut self, impulse_length: f64) {
        if impulse_length <= 0.0 {
            tracing::error!(
                "time {:.4} s, impulse {}: division by 0 prevented, impulse length at begin of flank is {} s",
                self.state.total_time,
                self.state.total_number_of_impulses,
                impulse_length
            );
            return;
        }

        self.state.recovery_end_angular_velocity =
            self.angular_displacement_per_impulse / impulse_length;
        let start_velocity = self.state.recovery_start_angular_velocity;
        let end_velocity = self.state.recovery_end_angular_velocity;

        if self.state.recovery_phase_length < self.settings.minimum_recovery_time
            || start_velocity <= 0.0
            || end_velocity <= 0.0
        {
            tracing::debug!(
                "drag factor not updated: recovery {:.4} s, start velocity {:.2} rad/s, end velocity {:.2} rad/s",
                self.state.recovery_phase_length,
                start_velocity,
                end_velocity
            );
            return;
        }

        let estimate = -self.settings.flywheel_inertia
            * ((1.0 / start_velocity) - (1.0 / end_velocity))
            / self.state.recovery_phase_length;
        self.state.current_drag_factor = estimate;

        if !self.settings.auto_adjust_drag_factor {
            tracing::info!("calculated drag factor: {:.2}", estimate * 1e6);
            return;
        }

        // the estimate may differ from the current average by at most max_change
        let previous = self.drag_average.average();
        let max_change = self.settings.damping_constant_max_change;
        let applied = self.drag_average.push_clamped(
            estimate,
            previous * (1.0 - max_change),
            previous * (1.0 + max_change),
        );
        self.state.drag_factor = self.drag_average.average();

        if applied == estimate {
            tracing::info!("calculated drag factor: {:.2}", estimate * 1e6);
        } else {
            tracing::warn!(
                "calculated drag factor {:.2} is too far off {:.2}, pushed {:.2}, average now {:.2}",
                estimate * 1e6,
                previous * 1e6,
                applied * 1e6,
                self.state.drag_factor * 1e6
            );
        }
    }

    fn cycle_is_plausible(&self) -> bool {
        self.state.drive_phase_length > self.settings.minimum_drive_time
            && self.state.cycle_length > self.settings.minimum_cycle_length()
    }

    /// Average linear velocity over the cycle, not the peak speed.
    fn calculate_linear_velocity(&self) -> f64 {
        if self.cycle_is_plausible() {
            self.distance_ratio()
                * ((self.state.recovery_phase_angular_displacement
                    + self.state.drive_phase_angular_displacement)
                    / self.state.cycle_length)
        } else {
            tracing::warn!(
                "time {:.4} s, impulse {}: cycle length {:.4} s not plausible, keeping speed",
                self.state.total_time,
                self.state.total_number_of_impulses,
                self.state.cycle_length
            );
            self.state.linear_cycle_velocity
        }
    }

    /// Average power over the cycle, not the peak power.
    fn calculate_cycle_power(&self) -> f64 {
        if self.cycle_is_plausible() {
            self.state.drag_factor
                * ((self.state.recovery_phase_angular_displacement
                    + self.state.drive_phase_angular_displacement)
                    / self.state.cycle_length)
                    .powi(3)
        } else {
            self.state.averaged_cycle_power
        }
    }

    fn calculate_torque(&mut self, dt: f64) -> f64 {
        if dt <= 0.0 {
            return self.state.current_torque;
        }
        self.state.previous_angular_velocity = self.state.current_angular_velocity;
        self.state.current_angular_velocity = self.angular_displacement_per_impulse / dt;

        self.settings.flywheel_inertia
            * ((self.state.current_angular_velocity - self.state.previous_angular_velocity) / dt)
            + self.state.drag_factor * self.state.current_angular_velocity.powi(2)
    }

    fn stroke_event(&self, phase: CyclePhase, plausible: bool) -> StrokeEvent {
        StrokeEvent {
            time_since_start: self.state.total_time,
            power: self.state.averaged_cycle_power,
            duration: self.state.cycle_length,
            duration_drive_phase: self.state.drive_phase_length,
            stroke_distance: self.state.drive_linear_distance + self.state.recovery_linear_distance,
            distance: self.state.total_linear_distance,
            speed: self.state.linear_cycle_velocity,
            number_of_strokes: self.state.stroke_number,
            instantaneous_torque: self.state.current_torque,
            drag_factor: self.state.drag_factor * 1e6,
            phase,
            plausible,
        }
    }

    pub fn settings(&self) -> &RowerSettings {
        &self.settings
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn phase(&self) -> CyclePhase {
        self.state.cycle_phase
    }

    pub fn stroke_number(&self) -> u32 {
        self.state.stroke_number
    }

    /// Smoothed drag factor in the conventional ×10⁶ units.
    pub fn drag_factor(&self) -> f64 {
        self.state.drag_factor * 1e6
    }

    pub fn total_linear_distance(&self) -> f64 {
        self.state.total_linear_distance
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
