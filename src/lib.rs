//! RustRow - Rowing Machine Monitor
//!
//! Turns the impulses of a flywheel rotation sensor into rowing metrics:
//! stroke detection, drag factor calibration, power, pace and calories.
//! The engine is protocol-agnostic; displays and peripherals consume the
//! metrics snapshot and the statistics events.

pub mod config;
pub mod engine;
pub mod metrics;
pub mod monitor;

// Re-export commonly used types
pub use config::{MonitorConfig, RowerSettings};
pub use engine::{Impulse, RowingEngine, StrokeEvent, StrokeSink};
pub use metrics::{Metrics, MetricsSource, RowingStatistics, SessionState, StatisticsEvent};
pub use monitor::{Monitor, MonitorCommand};
