//! Headless battle runner for CI verification and benchmarking.
//!
//! This crate runs battles from RON scenario files without graphics:
//!
//! - **Runs**: play a scenario and report [`BattleMetrics`] as JSON
//! - **Verification**: run a scenario several times and compare state hashes
//! - **Benchmarks**: measure ticks per second on generated two-army battles
//!
//! # Example
//!
//! ```bash
//! # Run a scenario
//! cargo run -p dots_headless -- run --scenario crates/dots_headless/scenarios/line_battle.ron
//!
//! # Verify determinism
//! cargo run -p dots_headless -- verify --scenario crates/dots_headless/scenarios/line_battle.ron --runs 5
//!
//! # Benchmark 4000 dots
//! cargo run --release -p dots_headless -- bench --dots 4000 --ticks 200
//! ```

pub mod metrics;
pub mod runner;
pub mod scenario;

pub use metrics::{BattleMetrics, EndReason, MetricsCollector, TeamMetrics};
pub use runner::{benchmark, verify_determinism, BattleRunner, BenchReport, VerifyReport};
pub use scenario::{Scenario, ScenarioError};
