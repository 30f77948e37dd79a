//! Squads and formation slots.
//!
//! The formation layer decides where slots are and which dot fills which
//! slot; this module only stores the result. The targeting logic reads a
//! squad's attack permissions and its target assignments.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::building::BuildingId;
use crate::dot::DotId;
use crate::geometry::Point;
use crate::team::TeamId;

/// Unique identifier for squads.
pub type SquadId = u64;

/// A formation position, optionally occupied by one dot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Where the occupant should stand.
    pub position: Point,
    /// Facing the occupant holds while in the slot.
    pub angle: f64,
    /// Occupant.
    pub dot: Option<DotId>,
}

impl Slot {
    /// An empty slot.
    #[must_use]
    pub const fn new(position: Point, angle: f64) -> Self {
        Self {
            position,
            angle,
            dot: None,
        }
    }
}

/// A group of dots held in formation slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Squad {
    /// Unique identifier.
    pub id: SquadId,
    /// Owning team.
    pub team: TeamId,
    /// Formation slots.
    pub slots: Vec<Slot>,
    /// Members may acquire targets and fire.
    pub allow_attack: bool,
    /// A one-shot volley is pending for `shoot_once_dots`.
    pub allow_shoot_once: bool,
    /// Members allowed exactly one more shot even when attacks are off.
    pub shoot_once_dots: BTreeSet<DotId>,
    /// Enemy squads members must pick targets from.
    pub attack_target_squads: BTreeSet<SquadId>,
    /// Buildings members must pick targets from.
    pub attack_target_buildings: BTreeSet<BuildingId>,
    /// Tombstone set on removal.
    pub removed: bool,
}

impl Squad {
    /// Dots occupying slots, in slot order.
    pub fn dots(&self) -> impl Iterator<Item = DotId> + '_ {
        self.slots.iter().filter_map(|slot| slot.dot)
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn dots_count(&self) -> usize {
        self.dots().count()
    }

    /// Whether `dot` holds a pending one-shot exception.
    #[must_use]
    pub fn has_shoot_once(&self, dot: DotId) -> bool {
        self.allow_shoot_once && self.shoot_once_dots.contains(&dot)
    }
}

/// Registry of squads, iterated in id order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Squads {
    squads: BTreeMap<SquadId, Squad>,
    next_id: SquadId,
}

impl Squads {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            squads: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Create a squad with empty slots.
    pub fn create(&mut self, team: TeamId, slots: Vec<Slot>) -> SquadId {
        let id = self.next_id;
        self.next_id += 1;
        self.squads.insert(
            id,
            Squad {
                id,
                team,
                slots,
                allow_attack: true,
                allow_shoot_once: false,
                shoot_once_dots: BTreeSet::new(),
                attack_target_squads: BTreeSet::new(),
                attack_target_buildings: BTreeSet::new(),
                removed: false,
            },
        );
        id
    }

    /// Remove a squad, returning it tombstoned.
    pub fn remove(&mut self, id: SquadId) -> Option<Squad> {
        let mut squad = self.squads.remove(&id)?;
        squad.removed = true;
        Some(squad)
    }

    /// Get a squad by id.
    #[must_use]
    pub fn get(&self, id: SquadId) -> Option<&Squad> {
        self.squads.get(&id)
    }

    /// Get a mutable squad by id.
    pub fn get_mut(&mut self, id: SquadId) -> Option<&mut Squad> {
        self.squads.get_mut(&id)
    }

    /// Check if a squad exists.
    #[must_use]
    pub fn contains(&self, id: SquadId) -> bool {
        self.squads.contains_key(&id)
    }

    /// Iterate squads in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Squad> {
        self.squads.values()
    }

    /// Iterate squads mutably in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Squad> {
        self.squads.values_mut()
    }

    /// Number of squads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.squads.len()
    }

    /// Check if there are no squads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.squads.is_empty()
    }
}
