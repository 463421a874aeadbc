//! Synthetic impulse trains for demos and tests.

/// Shape of one synthetic stroke: linearly shrinking impulses during the
/// drive, linearly growing ones during the recovery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeProfile {
    pub drive_impulses: usize,
    /// First drive impulse in seconds
    pub drive_start: f64,
    /// Decrease per drive impulse in seconds
    pub drive_step: f64,
    pub recovery_impulses: usize,
    /// First recovery impulse in seconds
    pub recovery_start: f64,
    /// Increase per recovery impulse in seconds
    pub recovery_step: f64,
}

impl Default for StrokeProfile {
    /// A stroke of about 2 s that passes the default rower settings.
    fn default() -> Self {
        Self {
            drive_impulses: 12,
            drive_start: 0.06,
            drive_step: 0.002,
            recovery_impulses: 20,
            recovery_start: 0.035,
            recovery_step: 0.004,
        }
    }
}

impl StrokeProfile {
    pub fn drive(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.drive_impulses).map(move |k| self.drive_start - self.drive_step * k as f64)
    }

    pub fn recovery(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.recovery_impulses)
            .map(move |k| self.recovery_start + self.recovery_step * k as f64)
    }

    /// Drive followed by recovery.
    pub fn stroke(&self) -> Vec<f64> {
        self.drive().chain(self.recovery()).collect()
    }

    /// Same as [`stroke`](Self::stroke), with the sign marking the phase the
    /// way a dual-sensor rig reports it.
    pub fn signed_stroke(&self) -> Vec<f64> {
        self.drive()
            .chain(self.recovery().map(|value| -value))
            .collect()
    }

    /// `strokes` consecutive strokes.
    pub fn train(&self, strokes: usize) -> Vec<f64> {
        let stroke = self.stroke();
        std::iter::repeat(stroke)
            .take(strokes)
            .flatten()
            .collect()
    }

    /// Total duration of one stroke in seconds.
    pub fn stroke_duration(&self) -> f64 {
        self.drive().chain(self.recovery()).sum()
    }
}
