//! Dot store and per-tick combat loop.
//!
//! The controller owns every live dot together with the spatial grid that
//! indexes them. Each tick runs a fixed sequence of phases over all dots in
//! id order:
//!
//! 1. **Aiming** - count down cooldown and aiming timers
//! 2. **Targeting** - validate the current target or search for a new one
//! 3. **Shooting** - emit projectile spawns for dots ready to fire
//! 4. **Movement** - follow paths and re-index moved dots
//! 5. **Death sweep** - remove dots with no health left
//! 6. **Slot sync** - turn squad members to face their slot's facing
//!
//! A phase finishes for every dot before the next phase starts. This is not
//! the same as stepping each dot through all six phases before moving on to
//! the next dot: every dot picks its target before any dot shoots, and no
//! dot moves until every dot has had its chance to fire from where it stood
//! at the start of the tick. The controller never owns projectiles; it only
//! reports what should be fired.

use serde::{Deserialize, Serialize};

use crate::building::{BuildingId, Buildings};
use crate::config::{DotTemplate, GridConfig, ProjectileParams};
use crate::dot::{Dot, DotId, DotMap};
use crate::error::{Result, SimError};
use crate::geometry::{distance_between, line_intersects_rect, Line, Point};
use crate::grid::DotsGrid;
use crate::squad::{SquadId, Squads};
use crate::team::{TeamId, Teams};

/// A shot decided by the dot store, to be turned into a projectile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSpawn {
    /// Shooter; excluded from the projectile's collision checks.
    pub from_dot: DotId,
    /// Shooter's team.
    pub team: TeamId,
    /// Shooter position at the moment of firing.
    pub from: Point,
    /// Aim point: target dot position or building center.
    pub to: Point,
    /// Building being shot at, if any.
    pub target_building: Option<BuildingId>,
    /// Projectile stats copied from the shooter.
    pub params: ProjectileParams,
}

/// Effects produced by one dot store tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DotsTickOutput {
    /// Projectiles to hand to the resolver.
    pub projectiles_to_shoot: Vec<ProjectileSpawn>,
    /// Dots removed by the death sweep.
    pub dots_removed: Vec<DotId>,
}

/// Owner of all dots, their grid registration and team counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DotsController {
    dots: DotMap,
    grid: DotsGrid,
    teams: Teams,
    next_id: DotId,
    /// Largest hitbox half-diagonal seen, used to pad collision queries.
    max_half_diagonal: f64,
}

impl DotsController {
    /// Create an empty store over a fresh grid.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidGridDimensions`] for a degenerate grid.
    pub fn new(grid: &GridConfig) -> Result<Self> {
        Ok(Self {
            dots: DotMap::new(),
            grid: DotsGrid::new(grid.cell_size, grid.width, grid.height)?,
            teams: Teams::new(),
            next_id: 1,
            max_half_diagonal: 0.0,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// All live dots in id order.
    #[must_use]
    pub const fn dots(&self) -> &DotMap {
        &self.dots
    }

    /// Look up a live dot.
    #[must_use]
    pub fn get_dot(&self, id: DotId) -> Option<&Dot> {
        self.dots.get(&id)
    }

    /// The spatial index.
    #[must_use]
    pub const fn grid(&self) -> &DotsGrid {
        &self.grid
    }

    /// Registered teams.
    #[must_use]
    pub const fn teams(&self) -> &Teams {
        &self.teams
    }

    /// Largest hitbox half-diagonal among all dots ever added.
    #[must_use]
    pub const fn max_half_diagonal(&self) -> f64 {
        self.max_half_diagonal
    }

    /// Number of live dots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dots.len()
    }

    /// Whether no dot is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dots.is_empty()
    }

    /// Live dots of a team.
    #[must_use]
    pub fn dots_count(&self, team: TeamId) -> Option<usize> {
        self.teams.get(team).map(|t| t.dots_count)
    }

    // ========================================================================
    // Store mutation
    // ========================================================================

    /// Register a team.
    pub fn add_team(&mut self, name: impl Into<String>) -> TeamId {
        self.teams.add(name)
    }

    /// Create a dot and register it in the grid.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TeamNotFound`] if `team` is not registered.
    pub fn add_dot(&mut self, team: TeamId, position: Point, template: &DotTemplate) -> Result<DotId> {
        let Some(team_entry) = self.teams.get_mut(team) else {
            return Err(SimError::TeamNotFound(team));
        };
        team_entry.dots_count += 1;

        let id = self.next_id;
        self.next_id += 1;

        let mut dot = Dot::new(id, team, position, template);
        self.grid.add_dot(&mut dot);
        self.max_half_diagonal = self.max_half_diagonal.max(dot.half_diagonal());
        self.dots.insert(id, dot);

        tracing::trace!(dot = id, team, x = position.x, y = position.y, "Dot added");
        Ok(id)
    }

    /// Remove a dot, clearing every relation that points at it.
    ///
    /// Deregisters it from the grid, drops attacker and target links,
    /// frees its slot and decrements its team counter.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DotNotFound`] if the dot is not alive.
    pub fn remove_dot(&mut self, id: DotId, squads: &mut Squads) -> Result<Dot> {
        let Some(mut dot) = self.dots.remove(&id) else {
            return Err(SimError::DotNotFound(id));
        };

        self.grid.remove_dot(&mut dot);

        for attacker_id in &dot.attack_targeted_by_dots {
            if let Some(attacker) = self.dots.get_mut(attacker_id) {
                attacker.attack_target_dot = None;
            }
        }
        dot.attack_targeted_by_dots.clear();

        if let Some(target_id) = dot.attack_target_dot.take() {
            if let Some(target) = self.dots.get_mut(&target_id) {
                target.attack_targeted_by_dots.remove(&id);
            }
        }
        dot.attack_target_building = None;

        if let Some(squad) = dot.squad.and_then(|s| squads.get_mut(s)) {
            if let Some(slot) = dot.slot.and_then(|i| squad.slots.get_mut(i)) {
                if slot.dot == Some(id) {
                    slot.dot = None;
                }
            }
            squad.shoot_once_dots.remove(&id);
        }
        dot.squad = None;
        dot.slot = None;

        if let Some(team) = self.teams.get_mut(dot.team) {
            team.dots_count = team.dots_count.saturating_sub(1);
        }

        dot.removed = true;
        tracing::trace!(dot = id, "Dot removed");
        Ok(dot)
    }

    /// Replace a dot's path. An empty path stops it.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DotNotFound`] if the dot is not alive.
    pub fn set_path(&mut self, id: DotId, path: impl IntoIterator<Item = Point>) -> Result<()> {
        let dot = self.dots.get_mut(&id).ok_or(SimError::DotNotFound(id))?;
        dot.path = path.into_iter().collect();
        Ok(())
    }

    /// Set a dot's own attack permission.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DotNotFound`] if the dot is not alive.
    pub fn set_allow_attack(&mut self, id: DotId, allow: bool) -> Result<()> {
        let dot = self.dots.get_mut(&id).ok_or(SimError::DotNotFound(id))?;
        dot.allow_attack = allow;
        Ok(())
    }

    /// Record a dot's squad slot, or clear it with `None`.
    ///
    /// Only the dot side is updated; the caller owns the slot side.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DotNotFound`] if the dot is not alive.
    pub fn set_slot(&mut self, id: DotId, slot: Option<(SquadId, usize)>) -> Result<()> {
        let dot = self.dots.get_mut(&id).ok_or(SimError::DotNotFound(id))?;
        dot.squad = slot.map(|(squad, _)| squad);
        dot.slot = slot.map(|(_, index)| index);
        Ok(())
    }

    /// Subtract health from a dot. Returns `true` if this damage killed it.
    ///
    /// Dead dots stay in the store until the next death sweep.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DotNotFound`] if the dot is not alive.
    pub fn damage_dot(&mut self, id: DotId, damage: f64) -> Result<bool> {
        let dot = self.dots.get_mut(&id).ok_or(SimError::DotNotFound(id))?;
        let was_alive = !dot.is_dead();
        dot.health -= damage;
        Ok(was_alive && dot.is_dead())
    }

    /// Drop every dot's target link to a building.
    pub fn clear_building_target(&mut self, building: BuildingId) {
        for dot in self.dots.values_mut() {
            if dot.attack_target_building == Some(building) {
                dot.attack_target_building = None;
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Dots within `range` of `point` that satisfy `predicate`.
    pub fn get_dots_in_range<F>(&self, point: Point, range: f64, predicate: F) -> Vec<DotId>
    where
        F: Fn(&Dot) -> bool,
    {
        self.grid.get_dots_in_range(&self.dots, point, range, predicate)
    }

    /// Whether a shot from `shooter` to `target` would cross the hitbox of
    /// another dot on the shooter's team.
    #[must_use]
    pub fn check_has_shoot_intersection_with_own_team(&self, shooter: &Dot, target: Point) -> bool {
        let line = Line::new(shooter.position, target);
        self.grid.iterate_dots_along_line(line).any(|id| {
            id != shooter.id
                && self
                    .dots
                    .get(&id)
                    .is_some_and(|d| d.team == shooter.team && line_intersects_rect(line, &d.hit_box))
        })
    }

    /// Whether a dot may acquire targets and fire, given its squad's orders.
    #[must_use]
    pub fn can_attack(dot: &Dot, squads: &Squads) -> bool {
        match dot.squad.and_then(|s| squads.get(s)) {
            Some(squad) => (squad.allow_attack && dot.allow_attack) || squad.has_shoot_once(dot.id),
            None => dot.allow_attack,
        }
    }

    /// Position a dot is shooting at, if it has a target.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvariantViolation`] if the target no longer
    /// exists.
    pub fn target_position(&self, dot: &Dot, buildings: &Buildings) -> Result<Option<Point>> {
        if let Some(target_id) = dot.attack_target_dot {
            return match self.dots.get(&target_id) {
                Some(target) if !target.removed => Ok(Some(target.position)),
                _ => Err(invariant_violation(format!(
                    "dot {} targets dot {target_id} which does not exist",
                    dot.id
                ))),
            };
        }

        if let Some(building_id) = dot.attack_target_building {
            return match buildings.get(building_id) {
                Some(building) => Ok(Some(building.position)),
                None => Err(invariant_violation(format!(
                    "dot {} targets building {building_id} which does not exist",
                    dot.id
                ))),
            };
        }

        Ok(None)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance every dot by `time_delta` milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvariantViolation`] when targeting state refers
    /// to an entity that no longer exists. The tick is abandoned at that
    /// point.
    pub fn tick(
        &mut self,
        time_delta: f64,
        squads: &mut Squads,
        buildings: &Buildings,
    ) -> Result<DotsTickOutput> {
        let mut output = DotsTickOutput::default();
        let ids: Vec<DotId> = self.dots.keys().copied().collect();

        for &id in &ids {
            self.update_aiming(id, time_delta, buildings)?;
        }

        for &id in &ids {
            self.update_target(id, squads, buildings)?;
        }

        for &id in &ids {
            if let Some(spawn) = self.try_shoot(id, squads, buildings)? {
                output.projectiles_to_shoot.push(spawn);
            }
        }

        for &id in &ids {
            self.move_dot(id, time_delta);
        }

        for &id in &ids {
            if self.dots.get(&id).is_some_and(Dot::is_dead) {
                self.remove_dot(id, squads)?;
                output.dots_removed.push(id);
            }
        }

        self.sync_slots(squads);

        tracing::debug!(
            shots = output.projectiles_to_shoot.len(),
            removed = output.dots_removed.len(),
            dots = self.dots.len(),
            "Dots tick complete"
        );

        Ok(output)
    }

    /// Phase 1: cooldown and aiming timers.
    fn update_aiming(&mut self, id: DotId, time_delta: f64, buildings: &Buildings) -> Result<()> {
        let Some(dot) = self.dots.get(&id) else {
            return Ok(());
        };
        if dot.is_moving() {
            return Ok(());
        }

        let cooldown_left = (dot.attack_cooldown_left - time_delta).max(0.0);
        let target = if dot.has_target() && cooldown_left <= 0.0 {
            self.target_position(dot, buildings)?
        } else {
            None
        };

        let Some(dot) = self.dots.get_mut(&id) else {
            return Ok(());
        };
        dot.attack_cooldown_left = cooldown_left;

        let keep_aiming = target.is_some_and(|p| distance_between(dot.position, p) <= dot.attack_range)
            && dot.aiming_target_dot == dot.attack_target_dot;
        if keep_aiming {
            dot.aiming_time_left = (dot.aiming_time_left - time_delta).max(0.0);
        } else {
            dot.reset_aiming();
        }

        Ok(())
    }

    /// Phase 2: drop an illegal target, then search if there is none.
    fn update_target(&mut self, id: DotId, squads: &Squads, buildings: &Buildings) -> Result<()> {
        let Some(dot) = self.dots.get(&id) else {
            return Ok(());
        };
        if dot.attack_cooldown_left > 0.0 || dot.is_moving() {
            return Ok(());
        }

        if dot.has_target() {
            if self.is_target_valid(dot, squads, buildings)? {
                return Ok(());
            }
            self.clear_target(id);
        }

        let Some(dot) = self.dots.get(&id) else {
            return Ok(());
        };
        if !Self::can_attack(dot, squads) {
            return Ok(());
        }

        let squad = dot.squad.and_then(|s| squads.get(s));

        if let Some(squad) = squad.filter(|s| !s.attack_target_buildings.is_empty()) {
            let chosen = squad.attack_target_buildings.iter().copied().find(|&building_id| {
                buildings.get_alive(building_id).is_some_and(|b| {
                    b.team != dot.team
                        && distance_between(dot.position, b.position) <= dot.attack_range
                        && !self.check_has_shoot_intersection_with_own_team(dot, b.position)
                })
            });
            if let Some(building_id) = chosen {
                self.assign_building_target(id, building_id);
            }
            return Ok(());
        }

        let mut candidates: Vec<(DotId, f64)> = match squad.filter(|s| !s.attack_target_squads.is_empty()) {
            Some(squad) => squad
                .attack_target_squads
                .iter()
                .filter_map(|&s| squads.get(s))
                .flat_map(|target_squad| target_squad.dots())
                .filter_map(|candidate_id| self.dots.get(&candidate_id))
                .filter(|candidate| is_enemy(dot, candidate))
                .map(|candidate| (candidate.id, distance_between(dot.position, candidate.position)))
                .filter(|&(_, distance)| distance <= dot.attack_range)
                .collect(),
            None => self
                .get_dots_in_range(dot.position, dot.attack_range, |candidate| is_enemy(dot, candidate))
                .into_iter()
                .filter_map(|candidate_id| self.dots.get(&candidate_id))
                .map(|candidate| (candidate.id, distance_between(dot.position, candidate.position)))
                .collect(),
        };
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));

        let chosen = candidates.into_iter().find_map(|(candidate_id, _)| {
            let candidate = self.dots.get(&candidate_id)?;
            (!self.check_has_shoot_intersection_with_own_team(dot, candidate.position))
                .then_some(candidate_id)
        });
        if let Some(target_id) = chosen {
            self.assign_dot_target(id, target_id);
        }

        Ok(())
    }

    fn is_target_valid(&self, dot: &Dot, squads: &Squads, buildings: &Buildings) -> Result<bool> {
        if !Self::can_attack(dot, squads) {
            return Ok(false);
        }

        let squad = dot.squad.and_then(|s| squads.get(s));
        let target_buildings = squad.map(|s| &s.attack_target_buildings);
        let target_squads = squad.map(|s| &s.attack_target_squads);

        let Some(position) = self.target_position(dot, buildings)? else {
            return Ok(false);
        };

        let consistent = if let Some(target_id) = dot.attack_target_dot {
            let target = self.dots.get(&target_id);
            let squad_ok = match target_squads.filter(|s| !s.is_empty()) {
                Some(allowed) => target.and_then(|t| t.squad).is_some_and(|s| allowed.contains(&s)),
                None => true,
            };
            target.is_some_and(|t| is_enemy(dot, t))
                && squad_ok
                && target_buildings.map_or(true, |b| b.is_empty())
        } else if let Some(building_id) = dot.attack_target_building {
            buildings.get_alive(building_id).is_some_and(|b| b.team != dot.team)
                && target_buildings.is_some_and(|b| b.contains(&building_id))
        } else {
            false
        };

        Ok(consistent
            && distance_between(dot.position, position) <= dot.attack_range
            && !self.check_has_shoot_intersection_with_own_team(dot, position))
    }

    /// Phase 3: fire at the target if every condition holds.
    fn try_shoot(
        &mut self,
        id: DotId,
        squads: &mut Squads,
        buildings: &Buildings,
    ) -> Result<Option<ProjectileSpawn>> {
        let Some(dot) = self.dots.get(&id) else {
            return Ok(None);
        };
        if dot.attack_cooldown_left > 0.0 || dot.aiming_time_left > 0.0 {
            return Ok(None);
        }
        let Some(to) = self.target_position(dot, buildings)? else {
            return Ok(None);
        };
        if distance_between(dot.position, to) > dot.attack_range
            || !Self::can_attack(dot, squads)
            || self.check_has_shoot_intersection_with_own_team(dot, to)
        {
            return Ok(None);
        }

        let spawn = ProjectileSpawn {
            from_dot: id,
            team: dot.team,
            from: dot.position,
            to,
            target_building: dot.attack_target_building,
            params: dot.projectile,
        };

        if let Some(dot) = self.dots.get_mut(&id) {
            dot.attack_cooldown_left = dot.attack_cooldown;
            dot.reset_aiming();
        }
        tracing::trace!(dot = id, x = to.x, y = to.y, "Dot fired");

        self.consume_shoot_once(id, squads);
        Ok(Some(spawn))
    }

    fn consume_shoot_once(&mut self, id: DotId, squads: &mut Squads) {
        let Some(squad_id) = self.dots.get(&id).and_then(|d| d.squad) else {
            return;
        };
        let Some(squad) = squads.get_mut(squad_id) else {
            return;
        };
        if !squad.has_shoot_once(id) {
            return;
        }

        squad.shoot_once_dots.remove(&id);
        if let Some(dot) = self.dots.get_mut(&id) {
            dot.allow_attack = false;
        }
        self.clear_target(id);

        let volley_pending = squad
            .shoot_once_dots
            .iter()
            .any(|member| self.dots.get(member).is_some_and(Dot::has_target));
        if !volley_pending {
            squad.allow_shoot_once = false;
        }
    }

    /// Phase 4: step along the path and re-index.
    fn move_dot(&mut self, id: DotId, time_delta: f64) {
        let Some(dot) = self.dots.get_mut(&id) else {
            return;
        };
        let Some(&destination) = dot.path.front() else {
            return;
        };

        let step = dot.speed * time_delta;
        let remaining = distance_between(dot.position, destination);
        let next = if remaining <= step {
            dot.path.pop_front();
            destination
        } else {
            dot.position + (destination - dot.position) * (step / remaining)
        };

        let delta = next - dot.position;
        if delta != Point::ZERO {
            dot.angle = delta.y.atan2(delta.x);
        }
        dot.position = next;
        dot.update_hit_box();
        self.grid.update_dot(dot);

        dot.reset_aiming();
        if dot.attack_cooldown_left > 0.0 {
            dot.attack_cooldown_left = dot.attack_cooldown;
        }
    }

    /// Phase 6: match slot facing.
    fn sync_slots(&mut self, squads: &Squads) {
        for dot in self.dots.values_mut() {
            let (Some(squad_id), Some(slot_index)) = (dot.squad, dot.slot) else {
                continue;
            };
            let Some(slot) = squads.get(squad_id).and_then(|s| s.slots.get(slot_index)) else {
                continue;
            };
            dot.angle = slot.angle;
            dot.update_hit_box();
            self.grid.update_dot(dot);
        }
    }

    fn assign_dot_target(&mut self, id: DotId, target_id: DotId) {
        if let Some(target) = self.dots.get_mut(&target_id) {
            target.attack_targeted_by_dots.insert(id);
        }
        if let Some(dot) = self.dots.get_mut(&id) {
            dot.attack_target_dot = Some(target_id);
            dot.attack_target_building = None;
            dot.reset_aiming();
        }
        tracing::trace!(dot = id, target = target_id, "Target acquired");
    }

    fn assign_building_target(&mut self, id: DotId, building_id: BuildingId) {
        if let Some(dot) = self.dots.get_mut(&id) {
            dot.attack_target_building = Some(building_id);
            dot.reset_aiming();
        }
        tracing::trace!(dot = id, building = building_id, "Building target acquired");
    }

    fn clear_target(&mut self, id: DotId) {
        let Some(dot) = self.dots.get_mut(&id) else {
            return;
        };
        let previous = dot.attack_target_dot.take();
        dot.attack_target_building = None;

        if let Some(target) = previous.and_then(|t| self.dots.get_mut(&t)) {
            target.attack_targeted_by_dots.remove(&id);
        }
        tracing::trace!(dot = id, "Target cleared");
    }
}

fn is_enemy(dot: &Dot, candidate: &Dot) -> bool {
    candidate.team != dot.team && !candidate.removed && !candidate.is_dead()
}

fn invariant_violation(message: String) -> SimError {
    tracing::error!(%message, "Invariant violation");
    SimError::InvariantViolation(message)
}
