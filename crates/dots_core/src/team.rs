//! Teams and their live-dot counters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Unique identifier for teams.
pub type TeamId = u32;

/// A side in the battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Unique identifier.
    pub id: TeamId,
    /// Display name.
    pub name: String,
    /// Number of live dots on this team.
    pub dots_count: usize,
}

/// Registry of teams, iterated in id order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Teams {
    teams: BTreeMap<TeamId, Team>,
    next_id: TeamId,
}

impl Teams {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new team and return its id.
    pub fn add(&mut self, name: impl Into<String>) -> TeamId {
        let id = self.next_id;
        self.next_id += 1;
        self.teams.insert(
            id,
            Team {
                id,
                name: name.into(),
                dots_count: 0,
            },
        );
        id
    }

    /// Get a team by id.
    #[must_use]
    pub fn get(&self, id: TeamId) -> Option<&Team> {
        self.teams.get(&id)
    }

    /// Get a mutable team by id.
    pub fn get_mut(&mut self, id: TeamId) -> Option<&mut Team> {
        self.teams.get_mut(&id)
    }

    /// Check if a team exists.
    #[must_use]
    pub fn contains(&self, id: TeamId) -> bool {
        self.teams.contains_key(&id)
    }

    /// Iterate teams in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Team> {
        self.teams.values()
    }

    /// Number of registered teams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.teams.len()
    }

    /// Check if no team is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_ids_are_sequential() {
        let mut teams = Teams::new();
        let red = teams.add("red");
        let blue = teams.add("blue");
        assert_eq!(red, 0);
        assert_eq!(blue, 1);
        assert_eq!(teams.get(blue).unwrap().name, "blue");
        assert_eq!(teams.get(red).unwrap().dots_count, 0);
        assert_eq!(teams.len(), 2);
    }
}
