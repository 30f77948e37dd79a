//! Scenario loading and battle setup.
//!
//! Scenarios define the initial battle state for headless runs: the battle
//! configuration, teams with their loose dots and squads, buildings, the
//! opening orders and how long to run.
//!
//! Teams, squads and buildings are referenced by name in the file and
//! resolved to ids when the battle is built.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use dots_core::battle::Battle;
use dots_core::building::BuildingId;
use dots_core::config::{BattleConfig, DotTemplate};
use dots_core::dot::DotSpawnParams;
use dots_core::error::SimError;
use dots_core::geometry::Point;
use dots_core::squad::{Slot, SquadId};
use dots_core::team::TeamId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The battle core rejected the setup.
    #[error("Battle setup failed: {0}")]
    Simulation(#[from] SimError),
    /// A team, squad or building name is used twice.
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName {
        /// What kind of entity was named.
        kind: &'static str,
        /// The repeated name.
        name: String,
    },
    /// A reference to a team, squad or building that is not declared.
    #[error("Unknown {kind} referenced: {name}")]
    UnknownReference {
        /// What kind of entity was referenced.
        kind: &'static str,
        /// The unresolved name.
        name: String,
    },
    /// Run parameters out of range.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Battle configuration; omitted fields keep their defaults.
    #[serde(default)]
    pub config: BattleConfig,
    /// Number of ticks to run unless overridden on the command line.
    pub ticks: u64,
    /// Milliseconds per tick.
    #[serde(default = "default_time_delta")]
    pub time_delta: f64,
    /// Stop as soon as at most one team has dots left.
    #[serde(default = "default_true")]
    pub stop_on_elimination: bool,
    /// Participating teams.
    pub teams: Vec<TeamSetup>,
    /// Buildings placed before any dot.
    #[serde(default)]
    pub buildings: Vec<BuildingSetup>,
}

fn default_time_delta() -> f64 {
    100.0
}

fn default_true() -> bool {
    true
}

fn default_spacing() -> f64 {
    10.0
}

fn default_columns() -> usize {
    1
}

impl Default for Scenario {
    fn default() -> Self {
        Self::two_armies(50, 5)
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Two facing blocks of `per_side` loose dots, `columns` dots wide.
    ///
    /// The battlefield is sized to fit both blocks with a 120 unit gap, so
    /// the front ranks start inside each other's default attack range.
    #[must_use]
    pub fn two_armies(per_side: usize, columns: usize) -> Self {
        const SPACING: f64 = 10.0;
        const GAP: f64 = 120.0;
        const MARGIN: f64 = 100.0;

        let columns = columns.max(1);
        let rows = per_side.div_ceil(columns);
        let block_width = (columns - 1) as f64 * SPACING;

        let mut config = BattleConfig::default();
        config.grid.width = 2.0 * (block_width + MARGIN) + GAP;
        config.grid.height = (rows.max(1) - 1) as f64 * SPACING + 2.0 * MARGIN;

        let army = |name: &str, x: f64| TeamSetup {
            name: name.to_string(),
            dots: vec![DotBlock {
                position: (x, MARGIN),
                count: per_side,
                columns,
                spacing: SPACING,
                template: None,
                advance_to: None,
                allow_attack: true,
            }],
            squads: Vec::new(),
        };

        Self {
            name: format!("Two armies ({per_side} per side)"),
            description: "Generated line battle between two blocks of loose dots".to_string(),
            config,
            ticks: 1000,
            time_delta: default_time_delta(),
            stop_on_elimination: true,
            teams: vec![army("red", MARGIN), army("blue", MARGIN + block_width + GAP)],
            buildings: Vec::new(),
        }
    }

    /// Total number of dots the scenario spawns.
    #[must_use]
    pub fn dots_count(&self) -> usize {
        self.teams
            .iter()
            .map(|team| {
                team.dots.iter().map(|block| block.count).sum::<usize>()
                    + team.squads.iter().map(|squad| squad.slots.len()).sum::<usize>()
            })
            .sum()
    }

    /// Check run parameters and name uniqueness.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if !(self.time_delta.is_finite() && self.time_delta > 0.0) {
            return Err(ScenarioError::Invalid(format!(
                "time_delta must be a positive number, got {}",
                self.time_delta
            )));
        }
        if self.teams.is_empty() {
            return Err(ScenarioError::Invalid("scenario has no teams".to_string()));
        }

        let mut seen = BTreeSet::new();
        for team in &self.teams {
            check_unique(&mut seen, "team", &team.name)?;
        }
        let mut seen = BTreeSet::new();
        for squad in self.teams.iter().flat_map(|t| &t.squads) {
            check_unique(&mut seen, "squad", &squad.name)?;
        }
        let mut seen = BTreeSet::new();
        for building in &self.buildings {
            check_unique(&mut seen, "building", &building.name)?;
        }

        Ok(())
    }

    /// Build the battle this scenario describes.
    ///
    /// Teams are registered in file order, then buildings, then each
    /// team's loose dots followed by its squads. Squad orders are applied
    /// last, once every squad and building id is known.
    pub fn build(&self) -> Result<Battle, ScenarioError> {
        self.validate()?;

        let mut battle = Battle::new(self.config)?;

        let mut teams: BTreeMap<&str, TeamId> = BTreeMap::new();
        for team in &self.teams {
            teams.insert(&team.name, battle.add_team(&team.name));
        }

        let mut buildings: BTreeMap<&str, BuildingId> = BTreeMap::new();
        for building in &self.buildings {
            let team = resolve(&teams, "team", &building.team)?;
            let id = battle.add_building(
                team,
                point(building.position),
                building.width,
                building.height,
                building.health,
            )?;
            buildings.insert(&building.name, id);
        }

        let mut squads: BTreeMap<&str, SquadId> = BTreeMap::new();
        for setup in &self.teams {
            let team = teams[setup.name.as_str()];

            for block in &setup.dots {
                for position in block.positions() {
                    let dot = battle.spawn_dot(DotSpawnParams {
                        team,
                        position,
                        template: block.template,
                    })?;
                    if let Some(destination) = block.destination_for(position) {
                        battle.order_move(dot, [destination])?;
                    }
                    if !block.allow_attack {
                        battle.set_dot_allow_attack(dot, false)?;
                    }
                }
            }

            for squad in &setup.squads {
                let slots = squad
                    .slots
                    .iter()
                    .map(|slot| Slot::new(point(slot.position), slot.angle))
                    .collect();
                let id = battle.create_squad(team, slots)?;
                for (index, slot) in squad.slots.iter().enumerate() {
                    let dot = battle.spawn_dot(DotSpawnParams {
                        team,
                        position: point(slot.spawn.unwrap_or(slot.position)),
                        template: squad.template,
                    })?;
                    battle.assign_dot_to_slot(id, index, dot)?;
                }
                squads.insert(&squad.name, id);
            }
        }

        for squad in self.teams.iter().flat_map(|t| &t.squads) {
            let id = squads[squad.name.as_str()];
            let target_squads = squad
                .attack_squads
                .iter()
                .map(|name| resolve(&squads, "squad", name))
                .collect::<Result<Vec<_>, _>>()?;
            let target_buildings = squad
                .attack_buildings
                .iter()
                .map(|name| resolve(&buildings, "building", name))
                .collect::<Result<Vec<_>, _>>()?;

            battle.set_attack_target_squads(id, target_squads)?;
            battle.set_attack_target_buildings(id, target_buildings)?;
            battle.set_allow_attack(id, squad.allow_attack)?;
            if squad.shoot_once {
                battle.order_shoot_once(id)?;
            }
            if squad.move_to_slots {
                battle.order_move_squad(id)?;
            }
        }

        tracing::info!(
            scenario = %self.name,
            teams = self.teams.len(),
            dots = self.dots_count(),
            squads = squads.len(),
            buildings = buildings.len(),
            "Scenario built"
        );

        Ok(battle)
    }
}

fn point((x, y): (f64, f64)) -> Point {
    Point::new(x, y)
}

fn check_unique<'a>(
    seen: &mut BTreeSet<&'a str>,
    kind: &'static str,
    name: &'a str,
) -> Result<(), ScenarioError> {
    if !seen.insert(name) {
        return Err(ScenarioError::DuplicateName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

fn resolve<T: Copy>(
    ids: &BTreeMap<&str, T>,
    kind: &'static str,
    name: &str,
) -> Result<T, ScenarioError> {
    ids.get(name)
        .copied()
        .ok_or_else(|| ScenarioError::UnknownReference {
            kind,
            name: name.to_string(),
        })
}

/// Setup for a single team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSetup {
    /// Team name, unique within the scenario.
    pub name: String,
    /// Blocks of loose dots.
    #[serde(default)]
    pub dots: Vec<DotBlock>,
    /// Squads, each spawning one dot per slot.
    #[serde(default)]
    pub squads: Vec<SquadSetup>,
}

/// A rectangular block of loose dots.
///
/// Dots are laid out row by row from `position`, `columns` per row,
/// `spacing` apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DotBlock {
    /// Center of the first dot (x, y).
    pub position: (f64, f64),
    /// Number of dots.
    pub count: usize,
    /// Dots per row.
    #[serde(default = "default_columns")]
    pub columns: usize,
    /// Distance between neighbors.
    #[serde(default = "default_spacing")]
    pub spacing: f64,
    /// Stats override; the battle's defaults when omitted.
    #[serde(default)]
    pub template: Option<DotTemplate>,
    /// Where the first dot of the block marches to; the rest keep their
    /// offsets.
    #[serde(default)]
    pub advance_to: Option<(f64, f64)>,
    /// Whether the block may open fire.
    #[serde(default = "default_true")]
    pub allow_attack: bool,
}

impl DotBlock {
    /// Spawn positions, row by row.
    #[must_use]
    pub fn positions(&self) -> Vec<Point> {
        let columns = self.columns.max(1);
        (0..self.count)
            .map(|i| {
                Point::new(
                    self.position.0 + (i % columns) as f64 * self.spacing,
                    self.position.1 + (i / columns) as f64 * self.spacing,
                )
            })
            .collect()
    }

    fn destination_for(&self, spawn: Point) -> Option<Point> {
        self.advance_to
            .map(|(x, y)| spawn + Point::new(x - self.position.0, y - self.position.1))
    }
}

/// A squad and its opening orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquadSetup {
    /// Squad name, unique within the scenario.
    pub name: String,
    /// Formation slots; one dot is spawned per slot.
    pub slots: Vec<SlotSetup>,
    /// Stats override for the squad's dots.
    #[serde(default)]
    pub template: Option<DotTemplate>,
    /// Names of squads whose dots this squad may target.
    #[serde(default)]
    pub attack_squads: Vec<String>,
    /// Names of buildings this squad attacks.
    #[serde(default)]
    pub attack_buildings: Vec<String>,
    /// Whether the squad may open fire.
    #[serde(default = "default_true")]
    pub allow_attack: bool,
    /// Grant every member one shot even while attacks are forbidden.
    #[serde(default)]
    pub shoot_once: bool,
    /// Order members to walk to their slots at start.
    #[serde(default)]
    pub move_to_slots: bool,
}

/// One formation slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotSetup {
    /// Slot position (x, y).
    pub position: (f64, f64),
    /// Facing of the slot's dot, in radians.
    #[serde(default)]
    pub angle: f64,
    /// Where the slot's dot is spawned; the slot position when omitted.
    #[serde(default)]
    pub spawn: Option<(f64, f64)>,
}

/// Placement of a building at scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingSetup {
    /// Building name, unique within the scenario.
    pub name: String,
    /// Owning team name.
    pub team: String,
    /// Center (x, y).
    pub position: (f64, f64),
    /// Extent along x.
    pub width: f64,
    /// Extent along y.
    pub height: f64,
    /// Starting health.
    pub health: f64,
}
