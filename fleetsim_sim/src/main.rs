//! FleetSim CLI
//!
//! Run a world description for a fixed simulated duration.

use clap::Parser;
use fleetsim_sim::{RunnerConfig, SimRunner};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// FleetSim multi-vehicle simulator
#[derive(Parser, Debug)]
#[command(name = "fleetsim")]
#[command(about = "Run a FleetSim world description", long_about = None)]
struct Args {
    /// World description file (XML)
    #[arg(short, long)]
    world: PathBuf,
    
    /// Simulated seconds to run
    #[arg(short, long, default_value = "10")]
    duration: f64,
    
    /// Simulated seconds advanced per iteration
    #[arg(short, long, default_value = "0.05")]
    step: f64,
    
    /// Pace the simulation to the wall clock
    #[arg(long)]
    realtime: bool,
    
    /// Show the GUI while running
    #[arg(long)]
    gui: bool,
    
    /// Count messages published on these topics
    #[arg(long, num_args = 1..)]
    subscribe: Vec<String>,
    
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
    
    /// JSON summary on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    
    // Initialize logging (RUST_LOG overrides --verbose)
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }
    
    if !args.json {
        info!("FleetSim v{}", env!("CARGO_PKG_VERSION"));
    }
    
    let config = RunnerConfig {
        duration: args.duration,
        step: args.step,
        realtime: args.realtime || args.gui,
        gui: args.gui,
        subscribe: args.subscribe.clone(),
        ..RunnerConfig::new(&args.world)
    };
    
    let summary = match SimRunner::new(config).and_then(|mut runner| runner.run()) {
        Ok(summary) => summary,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    
    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!("Failed to encode summary: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        info!(
            "Ran {} steps, t = {:.3}s in {:.2}s wall",
            summary.steps, summary.final_time_secs, summary.wall_time_secs
        );
        for (vehicle, count) in &summary.observations {
            info!("  {vehicle}: {count} observations");
        }
        for (topic, count) in &summary.messages {
            info!("  {topic}: {count} messages");
        }
        let d = &summary.dispatch;
        if d.dropped > 0 || d.panicked > 0 {
            error!("Dispatch dropped {} jobs, {} panicked", d.dropped, d.panicked);
        }
    }
    
    ExitCode::SUCCESS
}
