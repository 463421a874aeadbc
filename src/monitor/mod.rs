//! Host loop around the engine and the statistics aggregator.
//!
//! One task owns the [`Monitor`] and processes commands in arrival order.
//! Timer expiry and periodic emission happen on that same task.

pub mod replay;
pub mod simulation;

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Receiver;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::config::MonitorConfig;
use crate::engine::{Impulse, ImpulseError, RowingEngine};
use crate::metrics::{
    Clock, HeartRateMeasurement, Metrics, MetricsSource, RowingStatistics, StatisticsConfig,
    StatisticsEvent, SystemClock,
};

pub use replay::{
    feed_realtime, parse_impulse_file, parse_impulses, replay, ReplayError, ReplayOutcome,
};
pub use simulation::StrokeProfile;

/// Input accepted by the monitor task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonitorCommand {
    /// Raw signed impulse duration in seconds
    Impulse(f64),
    HeartRate(HeartRateMeasurement),
    Pause,
    Stop,
    Reset,
}

/// Rowing engine plus session statistics, driven by one owner.
pub struct Monitor {
    engine: RowingEngine<RowingStatistics>,
    clock: Arc<dyn Clock>,
    dual_sensor: bool,
    web_update_interval: Duration,
    peripheral_update_interval: Duration,
    rejected_impulses: u64,
}

impl Monitor {
    /// Build a monitor from a validated configuration.
    pub fn new(config: &MonitorConfig, clock: Arc<dyn Clock>) -> Self {
        let statistics = RowingStatistics::new(StatisticsConfig::from(config), clock.clone());
        Self {
            engine: RowingEngine::new(config.rower_settings.clone(), statistics),
            clock,
            dual_sensor: config.dual_sensor,
            web_update_interval: config.web_update_interval(),
            peripheral_update_interval: config.peripheral_update_interval(),
            rejected_impulses: 0,
        }
    }

    /// Monitor on the wall clock.
    pub fn with_system_clock(config: &MonitorConfig) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    /// Get a receiver for statistics events.
    pub fn event_receiver(&mut self) -> Receiver<StatisticsEvent> {
        self.engine.sink_mut().event_receiver()
    }

    pub fn engine(&self) -> &RowingEngine<RowingStatistics> {
        &self.engine
    }

    pub fn statistics(&self) -> &RowingStatistics {
        self.engine.sink()
    }

    pub fn metrics(&self) -> Metrics {
        self.engine.sink().metrics()
    }

    /// Impulses rejected at ingestion since the monitor was created.
    pub fn rejected_impulses(&self) -> u64 {
        self.rejected_impulses
    }

    /// Validate and process one raw impulse. Due timers fire first.
    pub fn handle_raw_impulse(&mut self, raw: f64) -> Result<(), ImpulseError> {
        self.engine.sink_mut().poll_timers();

        match Impulse::from_raw(raw, self.dual_sensor) {
            Ok(impulse) => {
                self.engine.handle_rotation_impulse(impulse);
                Ok(())
            }
            Err(e) => {
                self.rejected_impulses += 1;
                tracing::warn!("rejected impulse {}: {}", raw, e);
                Err(e)
            }
        }
    }

    pub fn handle_command(&mut self, command: MonitorCommand) {
        match command {
            MonitorCommand::Impulse(raw) => {
                // already logged and counted
                let _ = self.handle_raw_impulse(raw);
            }
            MonitorCommand::HeartRate(measurement) => {
                self.engine
                    .sink_mut()
                    .handle_heartrate_measurement(measurement);
            }
            MonitorCommand::Pause => self.engine.sink_mut().pause(),
            MonitorCommand::Stop => self.engine.sink_mut().stop(),
            MonitorCommand::Reset => self.reset(),
        }
    }

    /// Cancel timers, clear statistics, then reset the engine.
    pub fn reset(&mut self) {
        self.engine.sink_mut().reset();
        self.engine.reset();
    }

    /// Fire due statistics timers.
    pub fn poll_timers(&mut self) {
        self.engine.sink_mut().poll_timers();
    }

    /// Process commands until the channel closes, emitting web and
    /// peripheral updates at their configured intervals.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<MonitorCommand>) {
        let mut web = tokio::time::interval(self.web_update_interval);
        web.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut peripheral = tokio::time::interval(self.peripheral_update_interval);
        peripheral.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("monitor running");

        loop {
            let wait = self
                .engine
                .sink()
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(self.clock.now()));

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                _ = web.tick() => self.engine.sink_mut().emit_web_metrics(),
                _ = peripheral.tick() => self.engine.sink_mut().emit_peripheral_metrics(),
                _ = tokio::time::sleep(wait.unwrap_or(Duration::ZERO)), if wait.is_some() => {
                    self.engine.sink_mut().poll_timers();
                }
            }
        }

        tracing::info!("command channel closed, monitor stopped");
    }
}
