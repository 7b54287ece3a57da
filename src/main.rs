use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use smart_signal::config::{Config, SourceKind};
use smart_signal::feed::{CountSource, DirectorySource, SimulatedSource};
use smart_signal::telemetry::{LogSink, TelemetryRecord, TelemetrySink, ThingSpeakClient};
use smart_signal::{Direction, DirectionCount, SignalPolicy, SmartIntersection};

#[derive(Parser)]
#[command(name = "smart-signal")]
#[command(version, about = "Density-driven four-way traffic signal controller")]
struct Cli {
    /// YAML configuration file; built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control loop with an operator console on stdin
    Run {
        /// Count source, overriding the config file
        #[arg(long, value_parser = ["simulated", "directory"])]
        source: Option<String>,

        /// Folder of detector reports for the directory source
        #[arg(long)]
        captures: Option<PathBuf>,

        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Print the green-time plan for one set of counts
    Plan {
        north: u32,
        east: u32,
        south: u32,
        west: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("smart_signal={}", cli.log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Command::Run {
            source,
            captures,
            ticks,
        } => {
            let mut config = config;
            if let Some(source) = source {
                config.feed.source = match source.as_str() {
                    "directory" => SourceKind::Directory,
                    _ => SourceKind::Simulated,
                };
            }
            if let Some(dir) = captures {
                config.feed.captures_dir = dir;
            }
            run(config, ticks)
        }
        Command::Plan {
            north,
            east,
            south,
            west,
        } => plan(&config, DirectionCount::new(north, east, south, west)),
    }
}

#[derive(Serialize)]
struct PlanEntry {
    direction: Direction,
    vehicles: u32,
    density_percent: f64,
    green_time_secs: u32,
}

#[derive(Serialize)]
struct SignalPlan {
    roads: Vec<PlanEntry>,
    next_direction: Direction,
    next_green_time_secs: u32,
}

fn plan(config: &Config, counts: DirectionCount) -> Result<()> {
    let policy = SignalPolicy::new(config.signal.clone());
    let roads = counts
        .iter()
        .map(|(direction, vehicles)| PlanEntry {
            direction,
            vehicles,
            density_percent: policy.density(vehicles),
            green_time_secs: policy.green_time_for(vehicles),
        })
        .collect();
    let next = policy.next_phase(&counts);
    let plan = SignalPlan {
        roads,
        next_direction: next.active_direction,
        next_green_time_secs: next.time_remaining,
    };
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn run(config: Config, max_ticks: Option<u64>) -> Result<()> {
    info!("🚦 Smart signal controller starting");

    let policy = SignalPolicy::new(config.signal.clone());
    let intersection = Arc::new(SmartIntersection::new(policy, config.feed.stale_after()));

    let mut source: Box<dyn CountSource> = match config.feed.source {
        SourceKind::Simulated => Box::new(SimulatedSource::new(config.signal.max_capacity_per_road)),
        SourceKind::Directory => Box::new(DirectorySource::new(
            &config.feed.captures_dir,
            config.detection.confidence_threshold,
            config.density,
        )),
    };
    info!(source = source.name(), "count source ready");

    let mut sink: Box<dyn TelemetrySink> = if config.telemetry.thingspeak.is_configured() {
        let client = ThingSpeakClient::new(&config.telemetry.thingspeak)?;
        if let Err(e) = client.verify_connection() {
            warn!("thingspeak unreachable, updates will keep retrying: {e}");
        }
        Box::new(client)
    } else {
        info!("no ThingSpeak key configured, telemetry goes to the log");
        Box::new(LogSink)
    };

    let running = Arc::new(AtomicBool::new(true));
    spawn_console(Arc::clone(&intersection), Arc::clone(&running));

    let tick_interval = config.feed.tick_interval();
    let poll_interval = config.feed.poll_interval();
    let mut last_poll: Option<Instant> = None;
    let mut ticks = 0u64;

    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if last_poll.is_none_or(|at| now.duration_since(at) >= poll_interval) {
            last_poll = Some(now);
            match source.poll() {
                Ok(observations) => {
                    for observation in observations {
                        intersection.ingest(observation);
                        let record = TelemetryRecord::new(
                            &observation,
                            intersection.status().state,
                            &config.density,
                        );
                        if let Err(e) = sink.publish(&record) {
                            warn!("telemetry: {e}");
                        }
                    }
                }
                Err(e) => error!(source = source.name(), "poll failed: {e}"),
            }
        }

        intersection.tick();
        ticks += 1;
        if max_ticks.is_some_and(|max| ticks >= max) {
            break;
        }
        std::thread::sleep(tick_interval);
    }

    running.store(false, Ordering::SeqCst);
    println!("\n{}", intersection.stats().summary());
    Ok(())
}

/// Reads operator commands from stdin on a background thread.
fn spawn_console(intersection: Arc<SmartIntersection>, running: Arc<AtomicBool>) {
    println!("Controls:");
    println!("  n / e / s / w - Force a direction green");
    println!("  r             - Reset override and emergency");
    println!("  x [dir]       - Raise an emergency (optionally on a direction)");
    println!("  p             - Print current status");
    println!("  q             - Quit");

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            if !running.load(Ordering::SeqCst) {
                break;
            }
            match parse_command(&line) {
                Some(ConsoleCommand::Force(direction)) => intersection.force(direction),
                Some(ConsoleCommand::Reset) => intersection.reset(),
                Some(ConsoleCommand::Emergency(direction)) => {
                    intersection.raise_emergency(direction)
                }
                Some(ConsoleCommand::Status) => {
                    let status = intersection.status();
                    println!(
                        "{} open, {} s left, mode {:?}, override {:?}",
                        status.state.active_direction,
                        status.state.time_remaining,
                        status.state.mode(),
                        status.override_direction
                    );
                    if let Some(observation) = status.latest {
                        println!("latest counts: {:?}", observation.counts);
                    }
                }
                Some(ConsoleCommand::Quit) => {
                    running.store(false, Ordering::SeqCst);
                    break;
                }
                None => println!("unknown command: {}", line.trim()),
            }
        }
    });
}

#[derive(Debug, PartialEq)]
enum ConsoleCommand {
    Force(Direction),
    Reset,
    Emergency(Option<Direction>),
    Status,
    Quit,
}

fn parse_command(line: &str) -> Option<ConsoleCommand> {
    let mut words = line.split_whitespace();
    let head = words.next()?.to_ascii_lowercase();
    match head.as_str() {
        "r" | "reset" => Some(ConsoleCommand::Reset),
        "p" | "status" => Some(ConsoleCommand::Status),
        "q" | "quit" => Some(ConsoleCommand::Quit),
        "x" | "emergency" => match words.next() {
            None => Some(ConsoleCommand::Emergency(None)),
            Some(dir) => dir.parse().ok().map(|d| ConsoleCommand::Emergency(Some(d))),
        },
        other => other.parse().ok().map(ConsoleCommand::Force),
    }
}
