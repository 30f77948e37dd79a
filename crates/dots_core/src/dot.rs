//! The dot: a single mobile combat unit.
//!
//! Dots are plain data. The dot store owns them in an id-keyed map and
//! every relation to another entity (attack target, attackers, squad,
//! slot, team) is expressed as an id, never as a reference.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::building::BuildingId;
use crate::config::{DotTemplate, ProjectileParams};
use crate::geometry::{hit_box, Point, Rect};
use crate::squad::SquadId;
use crate::team::TeamId;

/// Unique identifier for dots, stable for the lifetime of a battle.
pub type DotId = u64;

/// Dots keyed by id. Iteration order is registration order.
pub type DotMap = BTreeMap<DotId, Dot>;

/// Parameters for spawning a new dot.
#[derive(Debug, Clone, Default)]
pub struct DotSpawnParams {
    /// Owning team.
    pub team: TeamId,
    /// Initial center position.
    pub position: Point,
    /// Stats; the battle's defaults are used when `None`.
    pub template: Option<DotTemplate>,
}

/// A single combat unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dot {
    /// Unique identifier.
    pub id: DotId,
    /// Owning team.
    pub team: TeamId,

    /// Center of the hitbox.
    pub position: Point,
    /// Hitbox width.
    pub width: f64,
    /// Hitbox height.
    pub height: f64,
    /// Facing, in radians.
    pub angle: f64,
    /// Rotated rectangle derived from position, size and angle.
    pub hit_box: Rect,

    /// Remaining health; the dot dies at or below zero.
    pub health: f64,
    /// Maximum shooting distance.
    pub attack_range: f64,
    /// Full cooldown after a shot, in milliseconds.
    pub attack_cooldown: f64,
    /// Cooldown remaining before the next shot.
    pub attack_cooldown_left: f64,
    /// Full aiming wind-up, in milliseconds.
    pub aiming_duration: f64,
    /// Aiming remaining before a shot can be fired.
    pub aiming_time_left: f64,
    /// Projectiles fired by this dot.
    pub projectile: ProjectileParams,

    /// Dot currently targeted. Exclusive with `attack_target_building`.
    pub attack_target_dot: Option<DotId>,
    /// Building currently targeted. Exclusive with `attack_target_dot`.
    pub attack_target_building: Option<BuildingId>,
    /// Dots currently targeting this one.
    pub attack_targeted_by_dots: BTreeSet<DotId>,
    /// Target that aiming progress belongs to.
    pub aiming_target_dot: Option<DotId>,

    /// Waypoints; the front is the current destination.
    pub path: VecDeque<Point>,
    /// World units per millisecond.
    pub speed: f64,

    /// Squad membership, maintained by the squad layer.
    pub squad: Option<SquadId>,
    /// Slot index within `squad`.
    pub slot: Option<usize>,
    /// When false the dot neither acquires nor fires unless its squad
    /// grants a one-shot exception.
    pub allow_attack: bool,

    /// Grid cells this dot is registered under.
    pub grid_square_indexes: Vec<usize>,
    /// Tombstone set on removal.
    pub removed: bool,
}

impl Dot {
    /// Create a dot facing angle zero with idle timers.
    #[must_use]
    pub fn new(id: DotId, team: TeamId, position: Point, template: &DotTemplate) -> Self {
        Self {
            id,
            team,
            position,
            width: template.width,
            height: template.height,
            angle: 0.0,
            hit_box: hit_box(position, template.width, template.height, 0.0),
            health: template.health,
            attack_range: template.attack_range,
            attack_cooldown: template.attack_cooldown,
            attack_cooldown_left: 0.0,
            aiming_duration: template.aiming_duration,
            aiming_time_left: 0.0,
            projectile: template.projectile,
            attack_target_dot: None,
            attack_target_building: None,
            attack_targeted_by_dots: BTreeSet::new(),
            aiming_target_dot: None,
            path: VecDeque::new(),
            speed: template.speed,
            squad: None,
            slot: None,
            allow_attack: true,
            grid_square_indexes: Vec::new(),
            removed: false,
        }
    }

    /// Recompute the hitbox from position, size and angle.
    ///
    /// Must be followed by a grid update when the dot is registered.
    pub fn update_hit_box(&mut self) {
        self.hit_box = hit_box(self.position, self.width, self.height, self.angle);
    }

    /// Whether the dot has a dot or building target.
    #[must_use]
    pub fn has_target(&self) -> bool {
        self.attack_target_dot.is_some() || self.attack_target_building.is_some()
    }

    /// Whether the dot is following a path.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        !self.path.is_empty()
    }

    /// Whether the dot has died.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }

    /// Restart the aiming wind-up against the current target.
    pub fn reset_aiming(&mut self) {
        self.aiming_time_left = self.aiming_duration;
        self.aiming_target_dot = self.attack_target_dot;
    }

    /// Half of the hitbox diagonal: the farthest any corner reaches from
    /// the center.
    #[must_use]
    pub fn half_diagonal(&self) -> f64 {
        self.width.hypot(self.height) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_dot_is_idle() {
        let dot = Dot::new(7, 1, Point::new(10.0, 20.0), &DotTemplate::default());
        assert_eq!(dot.id, 7);
        assert_eq!(dot.angle, 0.0);
        assert_eq!(dot.attack_cooldown_left, 0.0);
        assert_eq!(dot.aiming_time_left, 0.0);
        assert!(!dot.has_target());
        assert!(!dot.is_moving());
        assert!(dot.allow_attack);
        assert_eq!(dot.hit_box.center(), Point::new(10.0, 20.0));
    }

    #[test]
    fn test_update_hit_box_follows_position() {
        let mut dot = Dot::new(1, 0, Point::ZERO, &DotTemplate::default());
        dot.position = Point::new(5.0, 5.0);
        dot.angle = 0.5;
        dot.update_hit_box();
        assert_eq!(dot.hit_box, hit_box(Point::new(5.0, 5.0), 4.0, 4.0, 0.5));
    }

    #[test]
    fn test_reset_aiming_tracks_target() {
        let mut dot = Dot::new(1, 0, Point::ZERO, &DotTemplate::default());
        dot.attack_target_dot = Some(9);
        dot.reset_aiming();
        assert_eq!(dot.aiming_time_left, dot.aiming_duration);
        assert_eq!(dot.aiming_target_dot, Some(9));
    }
}
