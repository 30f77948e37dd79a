//! Projectiles in flight and their collision resolution.
//!
//! Each tick a projectile sweeps a straight segment of `speed * time_delta`
//! along its fixed angle. Every dot except the firer whose hitbox crosses
//! that segment is a candidate, and the one whose entry point lies
//! farthest from the projectile's current position takes the hit. The
//! resolver only applies damage and reports kills; removing dead dots is
//! the dot store's job on its next tick.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::building::{BuildingId, Buildings};
use crate::dot::DotId;
use crate::dots_controller::{DotsController, ProjectileSpawn};
use crate::error::Result;
use crate::geometry::{
    distance_between, first_line_rect_intersection, is_point_in_rect, line_intersects_rect, Line,
    Point,
};
use crate::team::TeamId;

/// Unique identifier for projectiles.
pub type ProjectileId = u64;

/// A projectile in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Unique identifier.
    pub id: ProjectileId,
    /// Firer; never collides with its own projectile.
    pub from_dot: DotId,
    /// Firer's team.
    pub team: TeamId,
    /// Current position.
    pub position: Point,
    /// Direction of travel, fixed at launch.
    pub angle: f64,
    /// World units per millisecond.
    pub speed: f64,
    /// Health removed on hit.
    pub damage: f64,
    /// Distance left before the projectile expires.
    pub fly_distance_left: f64,
    /// Visual radius.
    pub radius: f64,
    /// Building this projectile was fired at.
    pub target_building: Option<BuildingId>,
}

/// Damage dealt to a building by a projectile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildingHit {
    /// Building that was hit.
    pub building: BuildingId,
    /// Health removed.
    pub damage: f64,
    /// Whether this hit destroyed it.
    pub destroyed: bool,
}

/// Effects produced by one resolver tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectilesTickOutput {
    /// Dots hit this tick, in resolution order.
    pub dots_hit: Vec<DotId>,
    /// Dots whose health dropped to zero or below this tick.
    pub dots_killed: Vec<DotId>,
    /// Buildings damaged this tick.
    pub buildings_hit: Vec<BuildingHit>,
    /// Projectiles that ran out of fly distance.
    pub expired: Vec<ProjectileId>,
}

/// Owner of all projectiles in flight.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectilesController {
    projectiles: BTreeMap<ProjectileId, Projectile>,
    next_id: ProjectileId,
}

impl ProjectilesController {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self {
            projectiles: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Launch a projectile from a shot decision.
    ///
    /// A shot at its own origin flies along angle zero.
    pub fn shoot_projectile(&mut self, spawn: &ProjectileSpawn) -> ProjectileId {
        let id = self.next_id;
        self.next_id += 1;

        let delta = spawn.to - spawn.from;
        let angle = if delta == Point::ZERO {
            0.0
        } else {
            delta.y.atan2(delta.x)
        };

        self.projectiles.insert(
            id,
            Projectile {
                id,
                from_dot: spawn.from_dot,
                team: spawn.team,
                position: spawn.from,
                angle,
                speed: spawn.params.speed,
                damage: spawn.params.damage,
                fly_distance_left: spawn.params.fly_distance,
                radius: spawn.params.radius,
                target_building: spawn.target_building,
            },
        );
        id
    }

    /// Projectiles in flight, in launch order.
    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.values()
    }

    /// Look up a projectile.
    #[must_use]
    pub fn get(&self, id: ProjectileId) -> Option<&Projectile> {
        self.projectiles.get(&id)
    }

    /// Number of projectiles in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    /// Whether nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    /// Advance every projectile by `time_delta` milliseconds and resolve
    /// hits.
    ///
    /// # Errors
    ///
    /// Propagates store errors from applying damage, which only occur if
    /// the grid and the dot store disagree.
    pub fn tick(
        &mut self,
        time_delta: f64,
        dots: &mut DotsController,
        buildings: &mut Buildings,
    ) -> Result<ProjectilesTickOutput> {
        let mut output = ProjectilesTickOutput::default();
        let ids: Vec<ProjectileId> = self.projectiles.keys().copied().collect();

        for id in ids {
            let Some(projectile) = self.projectiles.get(&id) else {
                continue;
            };

            let travel = (projectile.speed * time_delta).min(projectile.fly_distance_left);
            let direction = Point::new(projectile.angle.cos(), projectile.angle.sin());
            let segment = Line::new(projectile.position, projectile.position + direction * travel);

            if let Some(dot_id) = find_hit_dot(projectile, segment, dots) {
                let damage = projectile.damage;
                self.projectiles.remove(&id);
                output.dots_hit.push(dot_id);
                if dots.damage_dot(dot_id, damage)? {
                    output.dots_killed.push(dot_id);
                }
                continue;
            }

            if let Some(building_id) = projectile.target_building {
                let reached = buildings.get_alive(building_id).is_some_and(|b| {
                    line_intersects_rect(segment, &b.hit_box) || is_point_in_rect(segment.p2, &b.hit_box)
                });
                if reached {
                    let damage = projectile.damage;
                    self.projectiles.remove(&id);
                    let destroyed = buildings.damage(building_id, damage)?;
                    output.buildings_hit.push(BuildingHit {
                        building: building_id,
                        damage,
                        destroyed,
                    });
                    continue;
                }
            }

            let Some(projectile) = self.projectiles.get_mut(&id) else {
                continue;
            };
            projectile.position = segment.p2;
            projectile.fly_distance_left -= travel;
            if projectile.fly_distance_left <= 0.0 {
                self.projectiles.remove(&id);
                output.expired.push(id);
            }
        }

        tracing::debug!(
            in_flight = self.projectiles.len(),
            hits = output.dots_hit.len(),
            kills = output.dots_killed.len(),
            buildings_hit = output.buildings_hit.len(),
            expired = output.expired.len(),
            "Projectiles tick complete"
        );

        Ok(output)
    }
}

/// Dot hit by `segment`: among all crossed hitboxes of live dots, the one
/// whose entry point is farthest from the projectile. Ties keep the earlier
/// candidate.
///
/// Dots killed earlier in the same tick are still in the store until the
/// next death sweep and must not absorb further hits.
fn find_hit_dot(projectile: &Projectile, segment: Line, dots: &DotsController) -> Option<DotId> {
    let reach = segment.length() / 2.0 + dots.max_half_diagonal();
    let candidates = dots.get_dots_in_range(segment.midpoint(), reach, |dot| {
        dot.id != projectile.from_dot && !dot.is_dead()
    });

    let mut best: Option<(DotId, f64)> = None;
    for dot_id in candidates {
        let Some(dot) = dots.get_dot(dot_id) else {
            continue;
        };
        let Some(entry) = first_line_rect_intersection(segment, &dot.hit_box) else {
            continue;
        };
        let distance = distance_between(projectile.position, entry);
        if best.map_or(true, |(_, farthest)| distance > farthest) {
            best = Some((dot_id, distance));
        }
    }

    best.map(|(dot_id, _)| dot_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DotTemplate, GridConfig, ProjectileParams};

    fn setup() -> (DotsController, TeamId, TeamId) {
        let mut dots = DotsController::new(&GridConfig {
            cell_size: 10.0,
            width: 200.0,
            height: 200.0,
        })
        .unwrap();
        let red = dots.add_team("red");
        let blue = dots.add_team("blue");
        (dots, red, blue)
    }

    fn spawn_at(from_dot: DotId, team: TeamId, from: Point, to: Point, params: ProjectileParams) -> ProjectileSpawn {
        ProjectileSpawn {
            from_dot,
            team,
            from,
            to,
            target_building: None,
            params,
        }
    }

    fn params(speed: f64, damage: f64, fly_distance: f64) -> ProjectileParams {
        ProjectileParams {
            speed,
            damage,
            fly_distance,
            radius: 1.0,
        }
    }

    #[test]
    fn test_projectile_kill() {
        let (mut dots, red, blue) = setup();
        let shooter = dots.add_dot(red, Point::new(40.0, 50.0), &DotTemplate::default()).unwrap();
        let target = dots.add_dot(blue, Point::new(50.0, 50.0), &DotTemplate::default()).unwrap();
        assert_eq!(dots.get_dot(target).unwrap().health, 2.0);

        let mut projectiles = ProjectilesController::new();
        projectiles.shoot_projectile(&spawn_at(
            shooter,
            red,
            Point::new(40.0, 50.0),
            Point::new(50.0, 50.0),
            params(1.0, 2.0, 200.0),
        ));

        let output = projectiles.tick(10.0, &mut dots, &mut Buildings::new()).unwrap();
        assert_eq!(output.dots_hit, vec![target]);
        assert_eq!(output.dots_killed, vec![target]);
        assert!(dots.get_dot(target).unwrap().health <= 0.0);
        assert!(projectiles.is_empty());
    }

    #[test]
    fn test_firer_is_never_hit() {
        let (mut dots, red, _) = setup();
        let shooter = dots.add_dot(red, Point::new(40.0, 50.0), &DotTemplate::default()).unwrap();

        let mut projectiles = ProjectilesController::new();
        projectiles.shoot_projectile(&spawn_at(
            shooter,
            red,
            Point::new(40.0, 50.0),
            Point::new(80.0, 50.0),
            params(1.0, 2.0, 200.0),
        ));

        let output = projectiles.tick(10.0, &mut dots, &mut Buildings::new()).unwrap();
        assert!(output.dots_hit.is_empty());
        assert_eq!(dots.get_dot(shooter).unwrap().health, 2.0);
        let projectile = projectiles.iter().next().unwrap();
        assert!(projectile.position.approx_eq(Point::new(50.0, 50.0), 1e-9));
        assert!((projectile.fly_distance_left - 190.0).abs() < 1e-9);
    }

    #[test]
    fn test_hit_selects_farthest_intersection() {
        let (mut dots, red, blue) = setup();
        let shooter = dots.add_dot(red, Point::new(30.0, 50.0), &DotTemplate::default()).unwrap();
        let near = dots.add_dot(blue, Point::new(50.0, 50.0), &DotTemplate::default()).unwrap();
        let far = dots.add_dot(blue, Point::new(56.0, 50.0), &DotTemplate::default()).unwrap();

        let mut projectiles = ProjectilesController::new();
        projectiles.shoot_projectile(&spawn_at(
            shooter,
            red,
            Point::new(40.0, 50.0),
            Point::new(60.0, 50.0),
            params(2.0, 1.0, 200.0),
        ));

        // Both hitboxes cross this tick's segment; the one entered last
        // along the segment absorbs the hit, not the first one crossed.
        let output = projectiles.tick(10.0, &mut dots, &mut Buildings::new()).unwrap();
        assert_eq!(output.dots_hit, vec![far]);
        assert_eq!(dots.get_dot(near).unwrap().health, 2.0);
        assert_eq!(dots.get_dot(far).unwrap().health, 1.0);
        assert!(output.dots_killed.is_empty());
    }

    #[test]
    fn test_dead_dot_does_not_absorb_hit() {
        let (mut dots, red, blue) = setup();
        let shooter = dots.add_dot(red, Point::new(40.0, 50.0), &DotTemplate::default()).unwrap();
        let target = dots.add_dot(blue, Point::new(50.0, 50.0), &DotTemplate::default()).unwrap();
        let corpse = dots.add_dot(blue, Point::new(53.0, 50.0), &DotTemplate::default()).unwrap();
        assert!(dots.damage_dot(corpse, 2.0).unwrap());

        let mut projectiles = ProjectilesController::new();
        projectiles.shoot_projectile(&spawn_at(
            shooter,
            red,
            Point::new(40.0, 50.0),
            Point::new(60.0, 50.0),
            params(1.5, 1.0, 200.0),
        ));

        let output = projectiles.tick(10.0, &mut dots, &mut Buildings::new()).unwrap();
        assert_eq!(output.dots_hit, vec![target]);
        assert!(output.dots_killed.is_empty());
        assert_eq!(dots.get_dot(target).unwrap().health, 1.0);
    }

    #[test]
    fn test_volley_spreads_over_live_dots() {
        let (mut dots, red, blue) = setup();
        let shooter = dots.add_dot(red, Point::new(40.0, 50.0), &DotTemplate::default()).unwrap();
        let near = dots.add_dot(blue, Point::new(50.0, 50.0), &DotTemplate::default()).unwrap();
        let far = dots.add_dot(blue, Point::new(53.0, 50.0), &DotTemplate::default()).unwrap();

        let mut projectiles = ProjectilesController::new();
        for _ in 0..3 {
            projectiles.shoot_projectile(&spawn_at(
                shooter,
                red,
                Point::new(40.0, 50.0),
                Point::new(60.0, 50.0),
                params(1.5, 1.0, 200.0),
            ));
        }

        // Two shots kill the farther dot; the third goes to the one left.
        let output = projectiles.tick(10.0, &mut dots, &mut Buildings::new()).unwrap();
        assert_eq!(output.dots_hit, vec![far, far, near]);
        assert_eq!(output.dots_killed, vec![far]);
        assert_eq!(dots.get_dot(near).unwrap().health, 1.0);
    }

    #[test]
    fn test_projectile_expires_after_fly_distance() {
        let (mut dots, red, _) = setup();
        let mut projectiles = ProjectilesController::new();
        let id = projectiles.shoot_projectile(&spawn_at(
            99,
            red,
            Point::new(10.0, 10.0),
            Point::new(10.0, 100.0),
            params(1.0, 1.0, 25.0),
        ));

        let mut buildings = Buildings::new();
        assert!(projectiles.tick(10.0, &mut dots, &mut buildings).unwrap().expired.is_empty());
        assert!(projectiles.tick(10.0, &mut dots, &mut buildings).unwrap().expired.is_empty());
        let output = projectiles.tick(10.0, &mut dots, &mut buildings).unwrap();
        assert_eq!(output.expired, vec![id]);
        assert!(projectiles.is_empty());
    }

    #[test]
    fn test_projectile_damages_target_building() {
        let (mut dots, red, blue) = setup();
        let mut buildings = Buildings::new();
        let building = buildings.add(blue, Point::new(100.0, 50.0), 10.0, 10.0, 1.0);

        let mut projectiles = ProjectilesController::new();
        let mut spawn = spawn_at(
            7,
            red,
            Point::new(80.0, 50.0),
            Point::new(100.0, 50.0),
            params(1.0, 1.0, 200.0),
        );
        spawn.target_building = Some(building);
        projectiles.shoot_projectile(&spawn);

        let first = projectiles.tick(10.0, &mut dots, &mut buildings).unwrap();
        assert!(first.buildings_hit.is_empty());

        let second = projectiles.tick(10.0, &mut dots, &mut buildings).unwrap();
        assert_eq!(
            second.buildings_hit,
            vec![BuildingHit {
                building,
                damage: 1.0,
                destroyed: true,
            }]
        );
        assert!(projectiles.is_empty());
    }

    #[test]
    fn test_shot_at_own_position_flies_along_zero_angle() {
        let mut projectiles = ProjectilesController::new();
        let id = projectiles.shoot_projectile(&spawn_at(
            1,
            0,
            Point::new(5.0, 5.0),
            Point::new(5.0, 5.0),
            ProjectileParams::default(),
        ));
        assert_eq!(projectiles.get(id).unwrap().angle, 0.0);
    }
}
