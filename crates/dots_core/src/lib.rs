//! # Dots Core
//!
//! Deterministic battle core for the dots battle simulation.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No input handling
//! - No system randomness or clocks (time advances by an explicit delta)
//!
//! This separation enables:
//! - Headless runs and benchmarks
//! - Snapshot and replay of battle state
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`geometry`] - Points, oriented rectangles, intersection tests
//! - [`grid`] - Uniform spatial grid with range queries and ray walks
//! - [`dots_controller`] - Dot store and per-tick combat loop
//! - [`projectile`] - Projectiles in flight and hit resolution
//! - [`battle`] - Battle driver tying everything together
//! - [`squad`], [`building`], [`team`] - Collaborators the combat loop reads

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod battle;
pub mod building;
pub mod config;
pub mod dot;
pub mod dots_controller;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod projectile;
pub mod squad;
pub mod team;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::battle::{Battle, TickEvents};
    pub use crate::building::{Building, BuildingId, Buildings};
    pub use crate::config::{BattleConfig, DotTemplate, GridConfig, ProjectileParams};
    pub use crate::dot::{Dot, DotId, DotSpawnParams};
    pub use crate::dots_controller::{DotsController, DotsTickOutput, ProjectileSpawn};
    pub use crate::error::{Result, SimError};
    pub use crate::geometry::{Line, Point, Rect};
    pub use crate::grid::DotsGrid;
    pub use crate::projectile::{BuildingHit, Projectile, ProjectileId, ProjectilesController};
    pub use crate::squad::{Slot, Squad, SquadId, Squads};
    pub use crate::team::{Team, TeamId, Teams};
}
