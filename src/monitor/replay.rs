//! Replay of recorded raw impulse files.
//!
//! A raw file holds one signed impulse duration in seconds per line. Blank
//! lines and `#` comments are skipped. [`replay`] runs on a [`ManualClock`]
//! advanced by each impulse, so timers fire at the same recorded time on
//! every run. [`feed_realtime`] instead sends the impulses to a running
//! [`Monitor`] at the pace they were recorded.

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::MonitorConfig;
use crate::metrics::{ManualClock, Metrics, StatisticsEvent};
use crate::monitor::{Monitor, MonitorCommand};

/// Errors while reading an impulse recording.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: cannot parse '{value}' as seconds")]
    Parse { line: usize, value: String },
}

/// Result of a replay.
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    /// Final snapshot
    pub metrics: Metrics,
    /// Every event emitted during the replay, in order
    pub events: Vec<StatisticsEvent>,
    /// Impulses rejected at ingestion
    pub rejected: u64,
}

/// Parse raw impulses from a reader.
pub fn parse_impulses<R: BufRead>(reader: R) -> Result<Vec<f64>, ReplayError> {
    let mut impulses = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let value = line.trim();
        if value.is_empty() || value.starts_with('#') {
            continue;
        }

        let seconds = value.parse::<f64>().map_err(|_| ReplayError::Parse {
            line: index + 1,
            value: value.to_string(),
        })?;
        impulses.push(seconds);
    }

    Ok(impulses)
}

/// Parse a raw impulse file.
pub fn parse_impulse_file(path: &Path) -> Result<Vec<f64>, ReplayError> {
    let file = std::fs::File::open(path)?;
    let impulses = parse_impulses(std::io::BufReader::new(file))?;
    tracing::info!("loaded {} impulses from {}", impulses.len(), path.display());
    Ok(impulses)
}

/// Feed `impulses` through a fresh monitor in recorded time.
pub fn replay(config: &MonitorConfig, impulses: &[f64]) -> ReplayOutcome {
    let clock = ManualClock::new();
    let mut monitor = Monitor::new(config, Arc::new(clock.clone()));
    let events = monitor.event_receiver();

    for &raw in impulses {
        if let Ok(elapsed) = Duration::try_from_secs_f64(raw.abs()) {
            clock.advance(elapsed);
        }
        // rejected impulses are counted by the monitor
        let _ = monitor.handle_raw_impulse(raw);
    }
    monitor.poll_timers();

    ReplayOutcome {
        metrics: monitor.metrics(),
        events: events.try_iter().collect(),
        rejected: monitor.rejected_impulses(),
    }
}

/// Send `impulses` to a monitor task, sleeping for each impulse duration
/// before sending it. With `looped` the recording restarts at the end.
///
/// Returns when the recording is done or the monitor hung up. Dropping the
/// sender on return closes the monitor's command channel.
pub async fn feed_realtime(
    impulses: Vec<f64>,
    looped: bool,
    commands: mpsc::Sender<MonitorCommand>,
) {
    if impulses.is_empty() {
        return;
    }

    let mut passes = 0u64;
    loop {
        for &raw in &impulses {
            if let Ok(elapsed) = Duration::try_from_secs_f64(raw.abs()) {
                tokio::time::sleep(elapsed).await;
            }
            if commands.send(MonitorCommand::Impulse(raw)).await.is_err() {
                tracing::debug!("monitor hung up after {} passes", passes);
                return;
            }
        }

        passes += 1;
        if !looped {
            break;
        }
        tracing::debug!("recording finished pass {}, restarting", passes);
    }
}
