//! Smoothing primitives shared by the engine and the statistics aggregator.
//!
//! These know nothing about rowing. Every averager reports 0.0 when it holds
//! no data, and `reset()` always returns it to that empty state.

use std::collections::VecDeque;

/// Arithmetic mean of the last `window_size` pushed values.
///
/// Used for the drag factor, where the window is seeded with the nominal
/// value so a single stroke can only nudge the estimate.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    /// Buffer of recent values, oldest at the front
    buffer: VecDeque<f64>,
    /// Window size in samples
    window_size: usize,
}

impl MovingAverage {
    /// Create a new moving average with the given window size (at least 1).
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            buffer: VecDeque::with_capacity(window_size + 1),
            window_size,
        }
    }

    /// Add a new value, dropping the oldest one once the window is full.
    pub fn push(&mut self, value: f64) {
        self.buffer.push_back(value);
        if self.buffer.len() > self.window_size {
            self.buffer.pop_front();
        }
    }

    /// Push `value` clamped to `[min, max]`. Returns the value that was
    /// actually pushed.
    pub fn push_clamped(&mut self, value: f64, min: f64, max: f64) -> f64 {
        let pushed = if min <= max { value.clamp(min, max) } else { value };
        self.push(pushed);
        pushed
    }

    /// Overwrite the most recently pushed value. No-op when empty.
    pub fn replace_last(&mut self, value: f64) {
        if let Some(last) = self.buffer.back_mut() {
            *last = value;
        }
    }

    /// Discard the history and fill the whole window with `value`.
    pub fn fill(&mut self, value: f64) {
        self.buffer.clear();
        self.buffer.extend(std::iter::repeat(value).take(self.window_size));
    }

    /// Get the current average.
    pub fn average(&self) -> f64 {
        if self.buffer.is_empty() {
            0.0
        } else {
            self.sum() / self.buffer.len() as f64
        }
    }

    fn sum(&self) -> f64 {
        self.buffer.iter().sum()
    }

    /// Check if the buffer is full.
    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.window_size
    }

    /// Reset to the empty state.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Get the number of samples in the buffer.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Recency-weighted mean of the last `window_size` values.
///
/// The newest value gets weight `n`, the one before it `n - 1`, down to 1 for
/// the oldest, so recent strokes dominate without older ones being dropped.
#[derive(Debug, Clone)]
pub struct WeightedAverage {
    /// Buffer of recent values, oldest at the front
    buffer: VecDeque<f64>,
    window_size: usize,
}

impl WeightedAverage {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            buffer: VecDeque::with_capacity(window_size + 1),
            window_size,
        }
    }

    pub fn push(&mut self, value: f64) {
        self.buffer.push_back(value);
        if self.buffer.len() > self.window_size {
            self.buffer.pop_front();
        }
    }

    pub fn average(&self) -> f64 {
        let n = self.buffer.len();
        if n == 0 {
            return 0.0;
        }

        let weighted: f64 = self
            .buffer
            .iter()
            .enumerate()
            .map(|(i, value)| value * (i + 1) as f64)
            .sum();
        let weights = (n * (n + 1)) as f64 / 2.0;

        weighted / weights
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Accumulates `(value, duration)` pairs and reports a rate over a fixed
/// trailing window, e.g. kcal per minute from per-stroke calories.
#[derive(Debug, Clone)]
pub struct IntervalAverage {
    /// Window length in seconds
    window_secs: f64,
    /// `(value, duration)` pairs, oldest at the front
    samples: VecDeque<(f64, f64)>,
    /// Sum of durations currently held
    duration: f64,
    /// Sum of values currently held
    sum: f64,
}

impl IntervalAverage {
    /// Create an averager normalising to `window_secs` seconds.
    pub fn new(window_secs: f64) -> Self {
        Self {
            window_secs,
            samples: VecDeque::new(),
            duration: 0.0,
            sum: 0.0,
        }
    }

    /// Rate per minute.
    pub fn per_minute() -> Self {
        Self::new(60.0)
    }

    /// Rate per hour.
    pub fn per_hour() -> Self {
        Self::new(60.0 * 60.0)
    }

    /// Add a value that was accumulated over `duration` seconds.
    ///
    /// Pairs with a non-positive or non-finite duration are ignored.
    pub fn push(&mut self, value: f64, duration: f64) {
        if !(duration.is_finite() && duration > 0.0) || !value.is_finite() {
            return;
        }

        self.samples.push_back((value, duration));
        self.duration += duration;
        self.sum += value;

        while self.duration > self.window_secs {
            match self.samples.pop_front() {
                Some((old_value, old_duration)) => {
                    self.duration -= old_duration;
                    self.sum -= old_value;
                }
                None => break,
            }
        }

        if self.samples.is_empty() {
            self.duration = 0.0;
            self.sum = 0.0;
        }
    }

    /// Get the rate normalised over the window.
    pub fn average(&self) -> f64 {
        if self.duration > 0.0 {
            self.sum / self.duration * self.window_secs
        } else {
            0.0
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.duration = 0.0;
        self.sum = 0.0;
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
