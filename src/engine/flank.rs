//! Flank detection on impulse durations.
//!
//! A flank is a sustained trend in consecutive impulse durations: shrinking
//! durations mean the flywheel is being accelerated (drive), growing ones mean
//! it decelerates under drag (recovery). The detector keeps the last
//! `flank_length + 1` impulses and only reports a trend once every pair in
//! that window agrees (minus `number_of_errors_allowed`), so a single outlier
//! cannot flip the classification.
//!
//! Detection lags the real phase boundary by the window length. The
//! `*_begin_of_flank` accessors let the engine attribute the boundary to the
//! impulse where the trend actually started.

use std::collections::VecDeque;

use crate::config::RowerSettings;
use crate::metrics::smoothing::MovingAverage;

/// Sliding-window acceleration trend detector.
#[derive(Debug, Clone)]
pub struct FlankDetector {
    flank_length: usize,
    number_of_errors_allowed: usize,
    natural_deceleration: f64,
    minimum_time_between_impulses: f64,
    maximum_time_between_impulses: f64,
    maximum_downward_change: f64,
    maximum_upward_change: f64,
    angular_displacement_per_impulse: f64,
    /// Raw durations, newest first
    dirty: VecDeque<f64>,
    /// Noise-filtered durations, newest first
    clean: VecDeque<f64>,
    /// Angular velocity per clean duration, newest first
    angular_velocity: VecDeque<f64>,
    /// Angular acceleration per clean duration, newest first
    angular_acceleration: VecDeque<f64>,
    smoother: MovingAverage,
    sequential_corrections: usize,
    max_sequential_corrections: usize,
    primed: bool,
}

impl FlankDetector {
    pub fn new(settings: &RowerSettings) -> Self {
        let flank_length = settings.flank_length.max(2);
        let mut detector = Self {
            flank_length,
            number_of_errors_allowed: settings.number_of_errors_allowed,
            natural_deceleration: settings.natural_deceleration,
            minimum_time_between_impulses: settings.minimum_time_between_impulses,
            maximum_time_between_impulses: settings.maximum_time_between_impulses,
            maximum_downward_change: settings.maximum_downward_change,
            maximum_upward_change: settings.maximum_upward_change,
            angular_displacement_per_impulse: settings.angular_displacement_per_impulse(),
            dirty: VecDeque::with_capacity(flank_length + 2),
            clean: VecDeque::with_capacity(flank_length + 2),
            angular_velocity: VecDeque::with_capacity(flank_length + 2),
            angular_acceleration: VecDeque::with_capacity(flank_length + 2),
            smoother: MovingAverage::new(settings.smoothing),
            sequential_corrections: 0,
            max_sequential_corrections: settings.smoothing.max(2),
            primed: false,
        };
        detector.reset();
        detector
    }

    /// Forget all history. The next impulse primes the window.
    pub fn reset(&mut self) {
        let slots = self.flank_length + 1;
        let idle = self.maximum_time_between_impulses;

        self.dirty.clear();
        self.dirty.extend(std::iter::repeat(0.0).take(slots));
        self.clean.clear();
        self.clean.extend(std::iter::repeat(idle).take(slots));
        self.angular_velocity.clear();
        self.angular_velocity
            .extend(std::iter::repeat(self.angular_displacement_per_impulse / idle).take(slots));
        self.angular_acceleration.clear();
        self.angular_acceleration
            .extend(std::iter::repeat(0.0).take(slots));

        self.smoother.reset();
        self.sequential_corrections = 0;
        self.primed = false;
    }

    /// Ingest the newest impulse duration in seconds (positive magnitude).
    pub fn push_value(&mut self, duration: f64) {
        if !self.primed {
            self.prime(duration);
            return;
        }

        let previous_clean = self.clean[0];
        let previous_velocity = self.angular_velocity[0];

        let mut value = duration;
        if !(self.minimum_time_between_impulses..=self.maximum_time_between_impulses)
            .contains(&duration)
        {
            tracing::debug!(
                "noise filter corrected impulse {:.4} s (outside plausible range), using {:.4} s",
                duration,
                previous_clean
            );
            value = previous_clean;
        }

        self.smoother.push(value);
        let average = self.smoother.average();
        if average < self.maximum_downward_change * previous_clean
            || average > self.maximum_upward_change * previous_clean
        {
            if self.sequential_corrections <= self.max_sequential_corrections {
                tracing::debug!(
                    "noise filter corrected impulse {:.4} s (too abrupt against {:.4} s)",
                    value,
                    previous_clean
                );
                self.smoother.replace_last(previous_clean);
            } else {
                tracing::debug!(
                    "noise filter passed impulse {:.4} s after {} corrections in a row",
                    value,
                    self.sequential_corrections
                );
            }
            self.sequential_corrections += 1;
        } else if self.sequential_corrections > 0 {
            self.sequential_corrections -= 1;
        }

        let clean = self.smoother.average();
        let (velocity, acceleration) = if clean > 0.0 {
            let velocity = self.angular_displacement_per_impulse / clean;
            (velocity, (velocity - previous_velocity) / clean)
        } else {
            tracing::error!("clean impulse of 0 s encountered, division by 0 prevented");
            (0.0, 0.0)
        };

        self.shift(duration, clean, velocity, acceleration);
    }

    fn prime(&mut self, duration: f64) {
        let clean = duration.clamp(
            self.minimum_time_between_impulses,
            self.maximum_time_between_impulses,
        );
        let velocity = self.angular_displacement_per_impulse / clean;

        for slot in self.clean.iter_mut() {
            *slot = clean;
        }
        for slot in self.angular_velocity.iter_mut() {
            *slot = velocity;
        }
        for slot in self.angular_acceleration.iter_mut() {
            *slot = 0.0;
        }
        for slot in self.dirty.iter_mut() {
            *slot = 0.0;
        }
        self.dirty[0] = duration;
        self.smoother.fill(clean);
        self.primed = true;
    }

    fn shift(&mut self, dirty: f64, clean: f64, velocity: f64, acceleration: f64) {
        let slots = self.flank_length + 1;
        self.dirty.push_front(dirty);
        self.dirty.truncate(slots);
        self.clean.push_front(clean);
        self.clean.truncate(slots);
        self.angular_velocity.push_front(velocity);
        self.angular_velocity.truncate(slots);
        self.angular_acceleration.push_front(acceleration);
        self.angular_acceleration.truncate(slots);
    }

    /// The flywheel consistently decelerates over the window.
    pub fn is_flywheel_unpowered(&self) -> bool {
        let errors = if self.natural_deceleration < 0.0 {
            (0..self.flank_length)
                .filter(|&i| self.angular_acceleration[i] > self.natural_deceleration)
                .count()
        } else {
            (1..=self.flank_length)
                .filter(|&i| self.clean[i] >= self.clean[i - 1])
                .count()
        };
        errors <= self.number_of_errors_allowed
    }

    /// The flywheel consistently accelerates (or holds speed) over the window.
    pub fn is_flywheel_powered(&self) -> bool {
        let mut errors = (1..=self.flank_length)
            .filter(|&i| self.clean[i] < self.clean[i - 1])
            .count();
        if self.natural_deceleration < 0.0 {
            errors += (0..self.flank_length)
                .filter(|&i| self.angular_acceleration[i] < self.natural_deceleration)
                .count();
        }
        errors <= self.number_of_errors_allowed
    }

    /// Seconds between the start of the current flank and now.
    pub fn time_to_begin_of_flank(&self) -> f64 {
        self.dirty.iter().take(self.flank_length).sum()
    }

    /// Impulses between the start of the current flank and now.
    pub fn no_impulses_to_begin_flank(&self) -> usize {
        self.flank_length
    }

    /// Clean impulse duration just before the flank started.
    pub fn impulse_length_at_begin_flank(&self) -> f64 {
        self.clean[self.flank_length]
    }

    /// Angular acceleration at the start of the flank in rad/s².
    pub fn acceleration_at_begin_of_flank(&self) -> f64 {
        self.angular_acceleration[self.flank_length - 1]
    }

    /// Angular velocity of the newest clean impulse in rad/s.
    pub fn current_angular_velocity(&self) -> f64 {
        self.angular_velocity[0]
    }
}
