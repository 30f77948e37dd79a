//! Headless battle runner.
//!
//! Runs battles without graphics for CI checks and benchmarking.
//!
//! # Usage
//!
//! ```bash
//! # Run a scenario and print metrics as JSON
//! cargo run -p dots_headless -- run --scenario scenarios/line_battle.ron
//!
//! # Override the scenario's tick count
//! cargo run -p dots_headless -- run --scenario scenarios/line_battle.ron --ticks 300
//!
//! # Verify determinism
//! cargo run -p dots_headless -- verify --scenario scenarios/line_battle.ron --runs 5
//!
//! # Measure throughput
//! cargo run --release -p dots_headless -- bench --dots 4000 --ticks 200
//! ```
//!
//! Results go to stdout as JSON; logs go to stderr. `RUST_LOG` overrides
//! the log level chosen by `--verbose`.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dots_headless::{benchmark, verify_determinism, BattleRunner, Scenario};

#[derive(Parser)]
#[command(name = "dots_headless")]
#[command(about = "Headless battle runner for CI verification and benchmarking")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print its metrics
    Run {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Ticks to run (defaults to the scenario's own count)
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Verify determinism by running a scenario multiple times
    Verify {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Ticks per run (defaults to the scenario's own count)
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Measure ticks per second on a generated two-army battle
    Bench {
        /// Total number of dots
        #[arg(short, long, default_value = "2000")]
        dots: usize,

        /// Ticks to measure
        #[arg(short, long, default_value = "500")]
        ticks: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is reserved for results
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Commands::Run { scenario, ticks } => cmd_run(&scenario, ticks),
        Commands::Verify {
            scenario,
            runs,
            ticks,
        } => cmd_verify(&scenario, runs, ticks),
        Commands::Bench { dots, ticks } => cmd_bench(dots, ticks),
    }
}

fn load_scenario(path: &Path) -> Scenario {
    match Scenario::load(path) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Failed to load scenario: {e}");
            std::process::exit(1);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to serialize results: {e}");
            std::process::exit(1);
        }
    }
}

/// Run a scenario and print its metrics
fn cmd_run(path: &Path, ticks: Option<u64>) {
    let scenario = load_scenario(path);
    let ticks = ticks.unwrap_or(scenario.ticks);

    let metrics = match BattleRunner::new(&scenario).and_then(|runner| runner.run(ticks)) {
        Ok(metrics) => metrics,
        Err(e) => {
            eprintln!("Battle failed: {e}");
            std::process::exit(1);
        }
    };

    print_json(&metrics);
}

/// Verify determinism
fn cmd_verify(path: &Path, runs: u32, ticks: Option<u64>) {
    let scenario = load_scenario(path);
    let ticks = ticks.unwrap_or(scenario.ticks);

    tracing::info!(
        "Verifying determinism: {} ({} runs of {} ticks)",
        scenario.name,
        runs,
        ticks
    );

    let report = match verify_determinism(&scenario, runs, ticks) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Verification failed: {e}");
            std::process::exit(1);
        }
    };

    print_json(&report);

    if report.deterministic {
        eprintln!("PASS: All {runs} runs produced identical results");
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        std::process::exit(1);
    }
}

/// Run benchmark
fn cmd_bench(dots: usize, ticks: u64) {
    tracing::info!("Running {} tick benchmark with {} dots", ticks, dots);

    let report = match benchmark(dots, ticks) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Benchmark failed: {e}");
            std::process::exit(1);
        }
    };

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BENCHMARK RESULTS");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Dots: {}", report.dots);
    eprintln!("Ticks: {}", report.ticks);
    eprintln!("Duration: {:.3}s", report.elapsed_secs);
    eprintln!("Ticks/second: {:.1}", report.ticks_per_second);
    eprintln!("Final dots: {}", report.final_dots);
    eprintln!("State hash: {:016x}", report.final_state_hash);

    print_json(&report);
}
