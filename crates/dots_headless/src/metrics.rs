//! Battle metrics collection.
//!
//! A [`MetricsCollector`] folds the [`TickEvents`] of every tick into a
//! [`BattleMetrics`] report that the CLI prints as JSON.

use std::collections::BTreeMap;

use dots_core::battle::{Battle, TickEvents};
use dots_core::team::TeamId;
use serde::{Deserialize, Serialize};

/// Complete metrics for a single battle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattleMetrics {
    /// Scenario name.
    pub scenario: String,
    /// Ticks actually simulated.
    pub ticks_run: u64,
    /// Milliseconds per tick.
    pub time_delta: f64,
    /// Total shots fired.
    pub shots_fired: u64,
    /// Projectiles that ran out of range.
    pub projectiles_expired: u64,
    /// Projectile hits on buildings.
    pub building_hits: u64,
    /// Buildings brought to zero health.
    pub buildings_destroyed: u64,
    /// Per-team metrics, keyed by team name.
    pub teams: BTreeMap<String, TeamMetrics>,
    /// Last team standing, if the battle ended by elimination.
    pub winner: Option<String>,
    /// Why the run stopped.
    pub end_reason: EndReason,
    /// Final battle state hash (for determinism validation).
    pub final_state_hash: u64,
}

/// Metrics for a single team.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamMetrics {
    /// Team name.
    pub team: String,
    /// Dots at the start of the run.
    pub starting_dots: usize,
    /// Dots alive at the end of the run.
    pub survivors: usize,
    /// Dots of this team killed by projectiles.
    pub dots_killed: u64,
    /// Shots fired by this team.
    pub shots_fired: u64,
    /// Tick of this team's first shot.
    pub first_shot_tick: Option<u64>,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The tick budget ran out.
    #[default]
    TickLimit,
    /// At most one team has dots left.
    Elimination,
}

/// Accumulates metrics while a battle runs.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    metrics: BattleMetrics,
    team_names: BTreeMap<TeamId, String>,
}

impl MetricsCollector {
    /// Start collecting for `battle`, recording each team's starting size.
    #[must_use]
    pub fn new(scenario: impl Into<String>, time_delta: f64, battle: &Battle) -> Self {
        let mut metrics = BattleMetrics {
            scenario: scenario.into(),
            time_delta,
            ..Default::default()
        };
        let mut team_names = BTreeMap::new();

        for team in battle.dots().teams().iter() {
            team_names.insert(team.id, team.name.clone());
            metrics.teams.insert(
                team.name.clone(),
                TeamMetrics {
                    team: team.name.clone(),
                    starting_dots: team.dots_count,
                    survivors: team.dots_count,
                    ..Default::default()
                },
            );
        }

        Self {
            metrics,
            team_names,
        }
    }

    /// Fold one tick's events in.
    ///
    /// Must be called right after the tick, while killed dots are still in
    /// the battle so their team can be looked up.
    pub fn record_tick(&mut self, events: &TickEvents, battle: &Battle) {
        self.metrics.ticks_run = events.tick;
        self.metrics.shots_fired += events.shots.len() as u64;
        self.metrics.projectiles_expired += events.projectiles_expired.len() as u64;
        self.metrics.building_hits += events.buildings_hit.len() as u64;
        self.metrics.buildings_destroyed +=
            events.buildings_hit.iter().filter(|hit| hit.destroyed).count() as u64;

        for shot in &events.shots {
            if let Some(team) = self.team_mut(shot.team) {
                team.shots_fired += 1;
                team.first_shot_tick.get_or_insert(events.tick);
            }
        }

        for &dot in &events.dots_killed {
            let Some(team_id) = battle.get_dot(dot).map(|d| d.team) else {
                continue;
            };
            if let Some(team) = self.team_mut(team_id) {
                team.dots_killed += 1;
            }
        }
    }

    /// Finish the report with the battle's final state.
    ///
    /// Survivors are dots still alive; killed dots waiting for the next
    /// sweep do not count.
    #[must_use]
    pub fn finalize(mut self, battle: &Battle, end_reason: EndReason) -> BattleMetrics {
        let mut alive: BTreeMap<TeamId, usize> = BTreeMap::new();
        for dot in battle.dots().dots().values().filter(|dot| !dot.is_dead()) {
            *alive.entry(dot.team).or_default() += 1;
        }

        for (id, name) in &self.team_names {
            if let Some(metrics) = self.metrics.teams.get_mut(name) {
                metrics.survivors = alive.get(id).copied().unwrap_or(0);
            }
        }

        self.metrics.winner = match end_reason {
            EndReason::Elimination => alive
                .keys()
                .next()
                .and_then(|id| self.team_names.get(id))
                .cloned(),
            EndReason::TickLimit => None,
        };
        self.metrics.end_reason = end_reason;
        self.metrics.final_state_hash = battle.state_hash();
        self.metrics
    }

    fn team_mut(&mut self, id: TeamId) -> Option<&mut TeamMetrics> {
        let name = self.team_names.get(&id)?;
        self.metrics.teams.get_mut(name)
    }
}

impl BattleMetrics {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Total dots killed across all teams.
    #[must_use]
    pub fn total_killed(&self) -> u64 {
        self.teams.values().map(|t| t.dots_killed).sum()
    }
}
