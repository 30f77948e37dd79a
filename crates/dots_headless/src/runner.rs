//! Headless battle runner.
//!
//! Runs scenarios to completion without graphics, verifies that repeated
//! runs agree, and measures raw tick throughput.

use std::time::Instant;

use dots_core::battle::Battle;
use serde::{Deserialize, Serialize};

use crate::metrics::{BattleMetrics, EndReason, MetricsCollector};
use crate::scenario::{Scenario, ScenarioError};

/// Drives one battle built from a scenario.
pub struct BattleRunner {
    battle: Battle,
    scenario_name: String,
    time_delta: f64,
    stop_on_elimination: bool,
}

impl BattleRunner {
    /// Build the scenario's battle.
    pub fn new(scenario: &Scenario) -> Result<Self, ScenarioError> {
        Ok(Self {
            battle: scenario.build()?,
            scenario_name: scenario.name.clone(),
            time_delta: scenario.time_delta,
            stop_on_elimination: scenario.stop_on_elimination,
        })
    }

    /// The battle being run.
    #[must_use]
    pub fn battle(&self) -> &Battle {
        &self.battle
    }

    /// Run up to `max_ticks` ticks and report what happened.
    ///
    /// Stops early once at most one team has dots left, if the scenario
    /// asks for it.
    pub fn run(mut self, max_ticks: u64) -> Result<BattleMetrics, ScenarioError> {
        let mut collector = MetricsCollector::new(&self.scenario_name, self.time_delta, &self.battle);
        let mut end_reason = EndReason::TickLimit;

        tracing::info!(
            scenario = %self.scenario_name,
            max_ticks,
            dots = self.battle.dots().len(),
            "Starting battle"
        );

        for _ in 0..max_ticks {
            let events = self.battle.tick(self.time_delta)?;
            collector.record_tick(&events, &self.battle);

            if !events.dots_killed.is_empty() {
                tracing::debug!(tick = events.tick, killed = events.dots_killed.len(), "Dots killed");
            }

            if self.stop_on_elimination && self.is_decided() {
                end_reason = EndReason::Elimination;
                tracing::info!(tick = events.tick, "Battle decided by elimination");
                break;
            }
        }

        let metrics = collector.finalize(&self.battle, end_reason);
        tracing::info!(
            ticks = metrics.ticks_run,
            shots = metrics.shots_fired,
            killed = metrics.total_killed(),
            winner = ?metrics.winner,
            "Battle finished"
        );
        Ok(metrics)
    }

    /// At most one team still has living dots.
    fn is_decided(&self) -> bool {
        let standing = self
            .battle
            .dots()
            .dots()
            .values()
            .filter(|dot| !dot.is_dead())
            .map(|dot| dot.team)
            .fold(Vec::new(), |mut teams, team| {
                if !teams.contains(&team) {
                    teams.push(team);
                }
                teams
            });
        standing.len() <= 1
    }
}

/// Result of running the same scenario several times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Ticks per run.
    pub ticks: u64,
    /// Final state hash of each run.
    pub hashes: Vec<u64>,
    /// Whether every run ended in the same state.
    pub deterministic: bool,
}

/// Run `scenario` `runs` times for `ticks` ticks each and compare the
/// final state hashes.
///
/// Early elimination stops are disabled so every run covers the same
/// number of ticks.
pub fn verify_determinism(scenario: &Scenario, runs: u32, ticks: u64) -> Result<VerifyReport, ScenarioError> {
    let mut hashes = Vec::with_capacity(runs as usize);

    for run in 0..runs {
        let mut battle = scenario.build()?;
        for _ in 0..ticks {
            battle.tick(scenario.time_delta)?;
        }
        let hash = battle.state_hash();
        tracing::debug!(run, hash = format_args!("{hash:016x}"), "Verification run complete");
        hashes.push(hash);
    }

    let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    if !deterministic {
        tracing::warn!(?hashes, "Runs diverged");
    }

    Ok(VerifyReport {
        ticks,
        hashes,
        deterministic,
    })
}

/// Throughput measurement for a generated battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchReport {
    /// Dots at the start of the run.
    pub dots: usize,
    /// Ticks measured (after warmup).
    pub ticks: u64,
    /// Wall-clock seconds for the measured ticks.
    pub elapsed_secs: f64,
    /// Measured ticks per second.
    pub ticks_per_second: f64,
    /// Dots left at the end.
    pub final_dots: usize,
    /// Final state hash.
    pub final_state_hash: u64,
}

/// Ticks run before measuring, so aiming and shooting are under way.
pub const BENCH_WARMUP_TICKS: u64 = 10;

/// Run a generated two-army battle of about `dots` dots for `ticks` ticks
/// and report ticks per second.
pub fn benchmark(dots: usize, ticks: u64) -> Result<BenchReport, ScenarioError> {
    let per_side = dots.div_ceil(2).max(1);
    let columns = ((per_side as f64).sqrt().ceil() as usize).max(1);
    let scenario = Scenario::two_armies(per_side, columns);
    let mut battle = scenario.build()?;
    let starting_dots = battle.dots().len();

    for _ in 0..BENCH_WARMUP_TICKS {
        battle.tick(scenario.time_delta)?;
    }

    let start = Instant::now();
    for _ in 0..ticks {
        battle.tick(scenario.time_delta)?;
    }
    let elapsed = start.elapsed().as_secs_f64();

    Ok(BenchReport {
        dots: starting_dots,
        ticks,
        elapsed_secs: elapsed,
        ticks_per_second: if elapsed > 0.0 { ticks as f64 / elapsed } else { f64::INFINITY },
        final_dots: battle.dots().len(),
        final_state_hash: battle.state_hash(),
    })
}
