//! Stroke detection and flywheel physics.
//!
//! Impulses flow through the [`FlankDetector`] into the [`RowingEngine`],
//! which hands completed phases to a [`StrokeSink`].

pub mod flank;
pub mod rowing;
pub mod types;

pub use flank::FlankDetector;
pub use rowing::{EngineState, RowingEngine};
pub use types::{
    CyclePhase, FlywheelHint, Impulse, ImpulseError, KeyMetrics, StrokeEvent, StrokeSink,
};
