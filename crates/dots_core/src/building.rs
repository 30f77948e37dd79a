//! Buildings as attack targets.
//!
//! Economy, capture and production live outside the battle core; here a
//! building is only a team-owned rectangle with health that squads can be
//! ordered to shoot at.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::geometry::{hit_box, Point, Rect};
use crate::team::TeamId;

/// Unique identifier for buildings.
pub type BuildingId = u64;

/// A static, team-owned target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    /// Unique identifier.
    pub id: BuildingId,
    /// Owning team.
    pub team: TeamId,
    /// Center; this is the point dots aim at.
    pub position: Point,
    /// Footprint width.
    pub width: f64,
    /// Footprint height.
    pub height: f64,
    /// Axis-aligned footprint.
    pub hit_box: Rect,
    /// Remaining health.
    pub health: f64,
    /// Tombstone set on removal.
    pub removed: bool,
}

impl Building {
    /// Whether the building can still be targeted.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.removed && self.health > 0.0
    }
}

/// Registry of buildings, iterated in id order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Buildings {
    buildings: BTreeMap<BuildingId, Building>,
    next_id: BuildingId,
}

impl Buildings {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buildings: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Place a building and return its id.
    pub fn add(
        &mut self,
        team: TeamId,
        position: Point,
        width: f64,
        height: f64,
        health: f64,
    ) -> BuildingId {
        let id = self.next_id;
        self.next_id += 1;
        self.buildings.insert(
            id,
            Building {
                id,
                team,
                position,
                width,
                height,
                hit_box: hit_box(position, width, height, 0.0),
                health,
                removed: false,
            },
        );
        id
    }

    /// Remove a building, returning it tombstoned.
    pub fn remove(&mut self, id: BuildingId) -> Option<Building> {
        let mut building = self.buildings.remove(&id)?;
        building.removed = true;
        Some(building)
    }

    /// Get a building by id.
    #[must_use]
    pub fn get(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(&id)
    }

    /// Get a mutable building by id.
    pub fn get_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        self.buildings.get_mut(&id)
    }

    /// Subtract health from a building. Returns `true` if this damage
    /// destroyed it.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::BuildingNotFound`] if no such building exists.
    pub fn damage(&mut self, id: BuildingId, damage: f64) -> Result<bool> {
        let building = self
            .buildings
            .get_mut(&id)
            .ok_or(SimError::BuildingNotFound(id))?;
        let was_alive = building.health > 0.0;
        building.health -= damage;
        Ok(was_alive && building.health <= 0.0)
    }

    /// Live building by id, if it can still be targeted.
    #[must_use]
    pub fn get_alive(&self, id: BuildingId) -> Option<&Building> {
        self.get(id).filter(|b| b.is_alive())
    }

    /// Iterate buildings in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Building> {
        self.buildings.values()
    }

    /// Number of buildings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    /// Check if there are no buildings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }
}
