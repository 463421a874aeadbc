//! Session statistics, smoothing and timers.

pub mod smoothing;
pub mod statistics;
pub mod timer;
pub mod types;

pub use smoothing::{IntervalAverage, MovingAverage, WeightedAverage};
pub use statistics::{MetricsSource, RowingStatistics, StatisticsConfig, StrokeAverages};
pub use timer::{Clock, DebounceTimer, ManualClock, SystemClock};
pub use types::{
    format_time, HeartRateMeasurement, Metrics, SessionState, StatisticsEvent, StrokeState,
};
