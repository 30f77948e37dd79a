//! Battle driver.
//!
//! [`Battle`] owns the dot store, the projectile resolver, squads and
//! buildings, and advances them together. The external order surface
//! (squad assignments, movement, attack permissions) lives here so that
//! both sides of every relation are updated in the same call.
//!
//! # Determinism
//!
//! A battle has no internal clock and no randomness. Every collection is
//! iterated in id order, so two battles built by the same calls and ticked
//! with the same `time_delta` sequence stay bit-identical; see
//! [`Battle::state_hash`].
//!
//! # Example
//!
//! ```
//! use dots_core::battle::Battle;
//! use dots_core::config::BattleConfig;
//! use dots_core::dot::DotSpawnParams;
//! use dots_core::geometry::Point;
//!
//! let mut battle = Battle::new(BattleConfig::default()).unwrap();
//! let red = battle.add_team("red");
//! let blue = battle.add_team("blue");
//!
//! battle.spawn_dot(DotSpawnParams {
//!     team: red,
//!     position: Point::new(100.0, 100.0),
//!     ..Default::default()
//! }).unwrap();
//! battle.spawn_dot(DotSpawnParams {
//!     team: blue,
//!     position: Point::new(150.0, 100.0),
//!     ..Default::default()
//! }).unwrap();
//!
//! let events = battle.tick(100.0).unwrap();
//! assert_eq!(events.tick, 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::building::{Building, BuildingId, Buildings};
use crate::config::BattleConfig;
use crate::dot::{Dot, DotId, DotSpawnParams};
use crate::dots_controller::{DotsController, ProjectileSpawn};
use crate::error::{Result, SimError};
use crate::geometry::Point;
use crate::projectile::{BuildingHit, ProjectileId, ProjectilesController};
use crate::squad::{Slot, Squad, SquadId, Squads};
use crate::team::TeamId;

/// Events generated during one battle tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickEvents {
    /// Tick number these events belong to (1 for the first tick).
    pub tick: u64,
    /// Shots fired this tick.
    pub shots: Vec<ProjectileSpawn>,
    /// Dots removed from the battle this tick.
    pub dots_removed: Vec<DotId>,
    /// Dots brought to zero health this tick; removed on the next tick.
    pub dots_killed: Vec<DotId>,
    /// Damage dealt to buildings this tick.
    pub buildings_hit: Vec<BuildingHit>,
    /// Projectiles that ran out of range this tick.
    pub projectiles_expired: Vec<ProjectileId>,
}

/// A complete battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battle {
    config: BattleConfig,
    tick: u64,
    dots: DotsController,
    projectiles: ProjectilesController,
    squads: Squads,
    buildings: Buildings,
}

impl Battle {
    /// Create an empty battle.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn new(config: BattleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            dots: DotsController::new(&config.grid)?,
            config,
            tick: 0,
            projectiles: ProjectilesController::new(),
            squads: Squads::new(),
            buildings: Buildings::new(),
        })
    }

    /// Number of ticks run so far.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Configuration the battle was built with.
    #[must_use]
    pub const fn config(&self) -> &BattleConfig {
        &self.config
    }

    /// The dot store.
    #[must_use]
    pub const fn dots(&self) -> &DotsController {
        &self.dots
    }

    /// Projectiles in flight.
    #[must_use]
    pub const fn projectiles(&self) -> &ProjectilesController {
        &self.projectiles
    }

    /// All squads.
    #[must_use]
    pub const fn squads(&self) -> &Squads {
        &self.squads
    }

    /// All buildings.
    #[must_use]
    pub const fn buildings(&self) -> &Buildings {
        &self.buildings
    }

    /// Look up a live dot.
    #[must_use]
    pub fn get_dot(&self, id: DotId) -> Option<&Dot> {
        self.dots.get_dot(id)
    }

    /// Live dots of a team, or `None` for an unknown team.
    #[must_use]
    pub fn dots_count(&self, team: TeamId) -> Option<usize> {
        self.dots.dots_count(team)
    }

    // ========================================================================
    // Teams and dots
    // ========================================================================

    /// Register a team.
    pub fn add_team(&mut self, name: impl Into<String>) -> TeamId {
        self.dots.add_team(name)
    }

    /// Spawn a dot, using the configured defaults when no template is given.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TeamNotFound`] for an unknown team.
    pub fn spawn_dot(&mut self, params: DotSpawnParams) -> Result<DotId> {
        let template = params.template.unwrap_or(self.config.dot_defaults);
        self.dots.add_dot(params.team, params.position, &template)
    }

    /// Remove a dot immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DotNotFound`] if the dot is not alive.
    pub fn remove_dot(&mut self, id: DotId) -> Result<Dot> {
        self.dots.remove_dot(id, &mut self.squads)
    }

    /// Replace a dot's path.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DotNotFound`] if the dot is not alive.
    pub fn order_move(&mut self, dot: DotId, path: impl IntoIterator<Item = Point>) -> Result<()> {
        self.dots.set_path(dot, path)
    }

    /// Set a single dot's attack permission.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DotNotFound`] if the dot is not alive.
    pub fn set_dot_allow_attack(&mut self, dot: DotId, allow: bool) -> Result<()> {
        self.dots.set_allow_attack(dot, allow)
    }

    // ========================================================================
    // Squads
    // ========================================================================

    /// Create a squad with the given empty slots.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TeamNotFound`] for an unknown team.
    pub fn create_squad(&mut self, team: TeamId, slots: Vec<Slot>) -> Result<SquadId> {
        if !self.dots.teams().contains(team) {
            return Err(SimError::TeamNotFound(team));
        }
        Ok(self.squads.create(team, slots))
    }

    /// Put a dot into a squad slot.
    ///
    /// The dot leaves any slot it held before, and the slot's previous
    /// occupant is released.
    ///
    /// # Errors
    ///
    /// Returns an error if the squad, slot or dot does not exist.
    pub fn assign_dot_to_slot(&mut self, squad_id: SquadId, slot_index: usize, dot_id: DotId) -> Result<()> {
        let squad = self.squads.get(squad_id).ok_or(SimError::SquadNotFound(squad_id))?;
        let slot = squad.slots.get(slot_index).ok_or(SimError::SlotNotFound {
            squad: squad_id,
            slot: slot_index,
        })?;
        let previous_occupant = slot.dot;
        let dot = self.dots.get_dot(dot_id).ok_or(SimError::DotNotFound(dot_id))?;
        let previous_slot = dot.squad.zip(dot.slot);

        if let Some((old_squad, old_index)) = previous_slot {
            if let Some(old_slot) = self
                .squads
                .get_mut(old_squad)
                .and_then(|s| s.slots.get_mut(old_index))
            {
                if old_slot.dot == Some(dot_id) {
                    old_slot.dot = None;
                }
            }
        }
        if let Some(occupant) = previous_occupant.filter(|&o| o != dot_id) {
            self.dots.set_slot(occupant, None)?;
        }

        if let Some(slot) = self
            .squads
            .get_mut(squad_id)
            .and_then(|s| s.slots.get_mut(slot_index))
        {
            slot.dot = Some(dot_id);
        }
        self.dots.set_slot(dot_id, Some((squad_id, slot_index)))
    }

    /// Remove a squad and release its members.
    ///
    /// Other squads still naming it as a target skip it from now on.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::SquadNotFound`] if the squad does not exist.
    pub fn remove_squad(&mut self, id: SquadId) -> Result<Squad> {
        let squad = self.squads.remove(id).ok_or(SimError::SquadNotFound(id))?;
        for dot in squad.dots() {
            if self.dots.get_dot(dot).is_some_and(|d| d.squad == Some(id)) {
                self.dots.set_slot(dot, None)?;
            }
        }
        Ok(squad)
    }

    /// Dots in a squad, in slot order.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::SquadNotFound`] if the squad does not exist.
    pub fn squad_dots(&self, id: SquadId) -> Result<Vec<DotId>> {
        let squad = self.squads.get(id).ok_or(SimError::SquadNotFound(id))?;
        Ok(squad.dots().collect())
    }

    /// Restrict a squad's targets to dots of the given squads. An empty set
    /// lifts the restriction.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::SquadNotFound`] if the squad does not exist.
    pub fn set_attack_target_squads(&mut self, id: SquadId, targets: impl IntoIterator<Item = SquadId>) -> Result<()> {
        let squad = self.squad_mut(id)?;
        squad.attack_target_squads = targets.into_iter().collect();
        Ok(())
    }

    /// Order a squad to attack the given buildings, in id order.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::SquadNotFound`] if the squad does not exist.
    pub fn set_attack_target_buildings(
        &mut self,
        id: SquadId,
        targets: impl IntoIterator<Item = BuildingId>,
    ) -> Result<()> {
        let squad = self.squad_mut(id)?;
        squad.attack_target_buildings = targets.into_iter().collect();
        Ok(())
    }

    /// Allow or forbid a squad to attack.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::SquadNotFound`] if the squad does not exist.
    pub fn set_allow_attack(&mut self, id: SquadId, allow: bool) -> Result<()> {
        self.squad_mut(id)?.allow_attack = allow;
        Ok(())
    }

    /// Grant every current member a single shot, even while attacks are
    /// forbidden.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::SquadNotFound`] if the squad does not exist.
    pub fn order_shoot_once(&mut self, id: SquadId) -> Result<()> {
        let squad = self.squad_mut(id)?;
        squad.shoot_once_dots = squad.dots().collect();
        squad.allow_shoot_once = !squad.shoot_once_dots.is_empty();
        Ok(())
    }

    /// Send every member to its slot position.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::SquadNotFound`] if the squad does not exist.
    pub fn order_move_squad(&mut self, id: SquadId) -> Result<()> {
        let squad = self.squads.get(id).ok_or(SimError::SquadNotFound(id))?;
        let moves: Vec<(DotId, Point)> = squad
            .slots
            .iter()
            .filter_map(|slot| slot.dot.map(|dot| (dot, slot.position)))
            .collect();
        for (dot, position) in moves {
            self.dots.set_path(dot, [position])?;
        }
        Ok(())
    }

    fn squad_mut(&mut self, id: SquadId) -> Result<&mut Squad> {
        self.squads.get_mut(id).ok_or(SimError::SquadNotFound(id))
    }

    // ========================================================================
    // Buildings
    // ========================================================================

    /// Place a building.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TeamNotFound`] for an unknown team.
    pub fn add_building(
        &mut self,
        team: TeamId,
        position: Point,
        width: f64,
        height: f64,
        health: f64,
    ) -> Result<BuildingId> {
        if !self.dots.teams().contains(team) {
            return Err(SimError::TeamNotFound(team));
        }
        Ok(self.buildings.add(team, position, width, height, health))
    }

    /// Remove a building and drop every dot's target link to it.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::BuildingNotFound`] if no such building exists.
    pub fn remove_building(&mut self, id: BuildingId) -> Result<Building> {
        let building = self.buildings.remove(id).ok_or(SimError::BuildingNotFound(id))?;
        self.dots.clear_building_target(id);
        Ok(building)
    }

    /// Damage a building. Returns `true` if this destroyed it.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::BuildingNotFound`] if no such building exists.
    pub fn damage_building(&mut self, id: BuildingId, damage: f64) -> Result<bool> {
        self.buildings.damage(id, damage)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance the battle by `time_delta` milliseconds.
    ///
    /// Runs the dot store, launches the shots it decided on, then resolves
    /// every projectile in flight including the new ones.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvariantViolation`] if targeting state is
    /// corrupt. The battle must not be ticked again after that.
    pub fn tick(&mut self, time_delta: f64) -> Result<TickEvents> {
        let dots_output = self.dots.tick(time_delta, &mut self.squads, &self.buildings)?;

        for spawn in &dots_output.projectiles_to_shoot {
            self.projectiles.shoot_projectile(spawn);
        }

        let projectiles_output = self
            .projectiles
            .tick(time_delta, &mut self.dots, &mut self.buildings)?;

        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Battle state hash");
        }

        Ok(TickEvents {
            tick: self.tick,
            shots: dots_output.projectiles_to_shoot,
            dots_removed: dots_output.dots_removed,
            dots_killed: projectiles_output.dots_killed,
            buildings_hit: projectiles_output.buildings_hit,
            projectiles_expired: projectiles_output.expired,
        })
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Hash of the battle state, for desync and determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);

        self.dots.len().hash(&mut hasher);
        for dot in self.dots.dots().values() {
            dot.id.hash(&mut hasher);
            dot.team.hash(&mut hasher);
            dot.position.x.to_bits().hash(&mut hasher);
            dot.position.y.to_bits().hash(&mut hasher);
            dot.angle.to_bits().hash(&mut hasher);
            dot.health.to_bits().hash(&mut hasher);
            dot.attack_cooldown_left.to_bits().hash(&mut hasher);
            dot.aiming_time_left.to_bits().hash(&mut hasher);
            dot.attack_target_dot.hash(&mut hasher);
            dot.attack_target_building.hash(&mut hasher);
            dot.path.len().hash(&mut hasher);
        }

        self.projectiles.len().hash(&mut hasher);
        for projectile in self.projectiles.iter() {
            projectile.id.hash(&mut hasher);
            projectile.position.x.to_bits().hash(&mut hasher);
            projectile.position.y.to_bits().hash(&mut hasher);
            projectile.fly_distance_left.to_bits().hash(&mut hasher);
        }

        for building in self.buildings.iter() {
            building.id.hash(&mut hasher);
            building.health.to_bits().hash(&mut hasher);
        }

        for squad in self.squads.iter() {
            squad.id.hash(&mut hasher);
            squad.allow_attack.hash(&mut hasher);
            squad.allow_shoot_once.hash(&mut hasher);
            for slot in &squad.slots {
                slot.dot.hash(&mut hasher);
            }
        }

        hasher.finish()
    }

    /// Serialize the battle to a compact binary snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Serialization`] if encoding fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| SimError::Serialization(format!("failed to serialize battle: {e}")))
    }

    /// Restore a battle from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Serialization`] if decoding fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| SimError::Serialization(format!("failed to deserialize battle: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duel() -> (Battle, DotId, DotId) {
        let mut battle = Battle::new(BattleConfig::default()).unwrap();
        let red = battle.add_team("red");
        let blue = battle.add_team("blue");
        let a = battle
            .spawn_dot(DotSpawnParams {
                team: red,
                position: Point::new(100.0, 100.0),
                ..Default::default()
            })
            .unwrap();
        let b = battle
            .spawn_dot(DotSpawnParams {
                team: blue,
                position: Point::new(150.0, 100.0),
                ..Default::default()
            })
            .unwrap();
        (battle, a, b)
    }

    #[test]
    fn test_battle_new() {
        let battle = Battle::new(BattleConfig::default()).unwrap();
        assert_eq!(battle.current_tick(), 0);
        assert!(battle.dots().is_empty());
        assert!(battle.projectiles().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = BattleConfig::default();
        config.grid.cell_size = 0.0;
        assert!(matches!(
            Battle::new(config),
            Err(SimError::InvalidGridDimensions { .. })
        ));
    }

    #[test]
    fn test_duel_trades_shots_until_both_die() {
        let (mut battle, a, b) = duel();

        let mut shots = 0;
        let mut killed = Vec::new();
        let mut removed = Vec::new();
        for _ in 0..40 {
            let events = battle.tick(100.0).unwrap();
            shots += events.shots.len();
            killed.extend(events.dots_killed);
            removed.extend(events.dots_removed);
        }

        // Two volleys of one shot each; the second kills both. Projectiles
        // resolve in launch order, so `a`'s shot lands first.
        assert_eq!(shots, 4);
        assert_eq!(killed, vec![b, a]);
        assert_eq!(removed, vec![a, b]);
        assert_eq!(battle.dots_count(0), Some(0));
        assert_eq!(battle.dots_count(1), Some(0));
        assert!(battle.projectiles().is_empty());
    }

    #[test]
    fn test_deterministic_hash() {
        let (mut first, _, _) = duel();
        let (mut second, _, _) = duel();

        for _ in 0..15 {
            first.tick(100.0).unwrap();
            second.tick(100.0).unwrap();
            assert_eq!(first.state_hash(), second.state_hash());
        }
    }

    #[test]
    fn test_serialization_roundtrip() {
        let (mut battle, _, _) = duel();
        for _ in 0..6 {
            battle.tick(100.0).unwrap();
        }

        let bytes = battle.serialize().unwrap();
        let mut restored = Battle::deserialize(&bytes).unwrap();
        assert_eq!(battle.state_hash(), restored.state_hash());

        battle.tick(100.0).unwrap();
        restored.tick(100.0).unwrap();
        assert_eq!(battle.state_hash(), restored.state_hash());
    }

    #[test]
    fn test_deserialize_garbage_fails() {
        assert!(matches!(
            Battle::deserialize(&[1, 2, 3]),
            Err(SimError::Serialization(_))
        ));
    }

    #[test]
    fn test_assign_dot_to_slot_keeps_both_sides() {
        let (mut battle, a, b) = duel();
        let squad = battle
            .create_squad(0, vec![Slot::new(Point::new(100.0, 100.0), 0.5); 2])
            .unwrap();

        battle.assign_dot_to_slot(squad, 0, a).unwrap();
        assert_eq!(battle.squad_dots(squad).unwrap(), vec![a]);
        assert_eq!(battle.get_dot(a).unwrap().slot, Some(0));

        // Moving the dot frees its old slot.
        battle.assign_dot_to_slot(squad, 1, a).unwrap();
        assert_eq!(battle.squads().get(squad).unwrap().slots[0].dot, None);
        assert_eq!(battle.get_dot(a).unwrap().slot, Some(1));

        // Replacing the occupant releases it.
        battle.assign_dot_to_slot(squad, 1, b).unwrap();
        assert_eq!(battle.get_dot(a).unwrap().squad, None);
        assert_eq!(battle.squad_dots(squad).unwrap(), vec![b]);

        assert!(matches!(
            battle.assign_dot_to_slot(squad, 5, a),
            Err(SimError::SlotNotFound { slot: 5, .. })
        ));
    }

    #[test]
    fn test_remove_squad_releases_members() {
        let (mut battle, a, _) = duel();
        let squad = battle
            .create_squad(0, vec![Slot::new(Point::new(100.0, 100.0), 0.0)])
            .unwrap();
        battle.assign_dot_to_slot(squad, 0, a).unwrap();

        let removed = battle.remove_squad(squad).unwrap();
        assert!(removed.removed);
        assert_eq!(battle.get_dot(a).unwrap().squad, None);
        assert!(matches!(
            battle.squad_dots(squad),
            Err(SimError::SquadNotFound(_))
        ));
    }

    #[test]
    fn test_order_move_squad_sends_members_to_slots() {
        let (mut battle, a, _) = duel();
        let squad = battle
            .create_squad(0, vec![Slot::new(Point::new(100.0, 60.0), 0.0)])
            .unwrap();
        battle.assign_dot_to_slot(squad, 0, a).unwrap();
        battle.order_move_squad(squad).unwrap();

        for _ in 0..10 {
            battle.tick(100.0).unwrap();
        }
        let dot = battle.get_dot(a).unwrap();
        assert!(dot.position.approx_eq(Point::new(100.0, 60.0), 1e-9));
        assert!(!dot.is_moving());
    }

    #[test]
    fn test_order_shoot_once_marks_members() {
        let (mut battle, a, _) = duel();
        let squad = battle
            .create_squad(0, vec![Slot::new(Point::new(100.0, 100.0), 0.0)])
            .unwrap();
        battle.assign_dot_to_slot(squad, 0, a).unwrap();
        battle.set_allow_attack(squad, false).unwrap();
        battle.order_shoot_once(squad).unwrap();

        let squad = battle.squads().get(squad).unwrap();
        assert!(squad.allow_shoot_once);
        assert!(squad.shoot_once_dots.contains(&a));
    }

    #[test]
    fn test_squad_attacks_building() {
        let (mut battle, a, b) = duel();
        battle.remove_dot(b).unwrap();
        let building = battle
            .add_building(1, Point::new(150.0, 100.0), 10.0, 10.0, 1.0)
            .unwrap();
        let squad = battle
            .create_squad(0, vec![Slot::new(Point::new(100.0, 100.0), 0.0)])
            .unwrap();
        battle.assign_dot_to_slot(squad, 0, a).unwrap();
        battle.set_attack_target_buildings(squad, [building]).unwrap();

        let mut hits = Vec::new();
        for _ in 0..10 {
            hits.extend(battle.tick(100.0).unwrap().buildings_hit);
        }
        assert_eq!(hits.len(), 1);
        assert!(hits[0].destroyed);
        assert!(battle.buildings().get_alive(building).is_none());
    }

    #[test]
    fn test_remove_building_clears_targets() {
        let (mut battle, a, b) = duel();
        battle.remove_dot(b).unwrap();
        let building = battle
            .add_building(1, Point::new(150.0, 100.0), 10.0, 10.0, 5.0)
            .unwrap();
        let squad = battle
            .create_squad(0, vec![Slot::new(Point::new(100.0, 100.0), 0.0)])
            .unwrap();
        battle.assign_dot_to_slot(squad, 0, a).unwrap();
        battle.set_attack_target_buildings(squad, [building]).unwrap();
        battle.tick(100.0).unwrap();
        assert_eq!(battle.get_dot(a).unwrap().attack_target_building, Some(building));

        battle.remove_building(building).unwrap();
        assert_eq!(battle.get_dot(a).unwrap().attack_target_building, None);
        assert!(battle.tick(100.0).is_ok());
    }

    #[test]
    fn test_unknown_team_rejected() {
        let mut battle = Battle::new(BattleConfig::default()).unwrap();
        assert!(matches!(
            battle.create_squad(3, Vec::new()),
            Err(SimError::TeamNotFound(3))
        ));
        assert!(matches!(
            battle.spawn_dot(DotSpawnParams {
                team: 3,
                ..Default::default()
            }),
            Err(SimError::TeamNotFound(3))
        ));
    }
}
