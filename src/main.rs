//! RustRow - Rowing Machine Monitor
//!
//! Command line entry point.

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rustrow::config::{self, MonitorConfig};
use rustrow::monitor::{self, Monitor, MonitorCommand, ReplayOutcome, StrokeProfile};
use rustrow::StatisticsEvent;

/// rowing machine monitor: flywheel impulses in, rowing metrics out
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Cli {
    /// configuration file (defaults to the user config directory)
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// replay a recorded raw impulse file
    Replay {
        /// file with one impulse duration in seconds per line
        file: PathBuf,

        /// print every statistics event as a JSON line
        #[clap(long)]
        events: bool,

        /// feed the impulses at recorded pace through the live monitor loop
        #[clap(long)]
        realtime: bool,

        /// restart the recording when it ends (realtime only)
        #[clap(long = "loop", requires = "realtime")]
        looped: bool,
    },
    /// row a synthetic session
    Simulate {
        /// number of strokes to row
        #[clap(short = 'n', long, default_value_t = 10)]
        strokes: usize,
    },
    /// read impulses from stdin and print web updates as JSON lines
    Live,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => config::load_config().context("failed to load config")?,
    };

    // stdout carries JSON, logs go to stderr
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting RustRow v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Replay {
            file,
            events,
            realtime,
            looped,
        } => {
            let impulses = monitor::parse_impulse_file(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            if realtime {
                let (tx, rx) = mpsc::channel(256);
                tokio::spawn(monitor::feed_realtime(impulses, looped, tx));
                run_streaming(&config, events, rx).await
            } else {
                let outcome = monitor::replay(&config, &impulses);
                print_outcome(&outcome, events)
            }
        }
        Command::Simulate { strokes } => {
            let profile = StrokeProfile::default();
            let impulses: Vec<f64> = if config.dual_sensor {
                std::iter::repeat(profile.signed_stroke())
                    .take(strokes)
                    .flatten()
                    .collect()
            } else {
                profile.train(strokes)
            };
            let outcome = monitor::replay(&config, &impulses);
            print_outcome(&outcome, false)
        }
        Command::Live => run_live(&config).await,
    }
}

fn print_outcome(outcome: &ReplayOutcome, events: bool) -> anyhow::Result<()> {
    if events {
        for event in &outcome.events {
            println!("{}", serde_json::to_string(event)?);
        }
    }
    if outcome.rejected > 0 {
        tracing::warn!("{} impulses were rejected", outcome.rejected);
    }
    println!("{}", serde_json::to_string_pretty(&outcome.metrics)?);
    Ok(())
}

async fn run_live(config: &MonitorConfig) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let value = line.trim();
                    if value.is_empty() || value.starts_with('#') {
                        continue;
                    }
                    match value.parse::<f64>() {
                        Ok(seconds) => {
                            if tx.send(MonitorCommand::Impulse(seconds)).await.is_err() {
                                break;
                            }
                        }
                        Err(_) => tracing::warn!("ignoring malformed impulse '{}'", value),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    run_streaming(config, false, rx).await
}

/// Run a wall clock monitor on `commands` until the channel closes, printing
/// web updates (or every event with `all_events`) as JSON lines.
async fn run_streaming(
    config: &MonitorConfig,
    all_events: bool,
    commands: mpsc::Receiver<MonitorCommand>,
) -> anyhow::Result<()> {
    let mut monitor = Monitor::with_system_clock(config);
    let events = monitor.event_receiver();

    let printer = std::thread::spawn(move || {
        for event in events.iter() {
            let line = match &event {
                StatisticsEvent::WebMetricsUpdate(metrics) => serde_json::to_string(metrics),
                _ if all_events => serde_json::to_string(&event),
                _ => continue,
            };
            match line {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::error!("failed to serialize metrics: {}", e),
            }
        }
    });

    monitor.run(commands).await;
    drop(monitor);

    printer
        .join()
        .map_err(|_| anyhow!("metrics printer thread panicked"))?;
    Ok(())
}
