//! Battle configuration.
//!
//! Construction-time constants only: grid geometry plus the default stats
//! new dots and their projectiles are spawned with. Configurations are
//! plain serde structs and can be written as RON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Uniform grid geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Edge length of one square cell, in world units.
    pub cell_size: f64,
    /// Battlefield width in world units.
    pub width: f64,
    /// Battlefield height in world units.
    pub height: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: 50.0,
            width: 2000.0,
            height: 2000.0,
        }
    }
}

/// Parameters of the projectiles a dot fires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileParams {
    /// World units per millisecond.
    pub speed: f64,
    /// Health removed from the dot that is hit.
    pub damage: f64,
    /// Distance the projectile may travel before it expires.
    pub fly_distance: f64,
    /// Visual radius, carried for observers.
    pub radius: f64,
}

impl Default for ProjectileParams {
    fn default() -> Self {
        Self {
            speed: 0.5,
            damage: 1.0,
            fly_distance: 200.0,
            radius: 1.0,
        }
    }
}

/// Stats a dot is spawned with.
///
/// Durations are milliseconds, speeds are world units per millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DotTemplate {
    /// Hitbox width (along the facing direction).
    pub width: f64,
    /// Hitbox height.
    pub height: f64,
    /// Starting health.
    pub health: f64,
    /// Movement speed.
    pub speed: f64,
    /// Maximum distance to a target that can be shot.
    pub attack_range: f64,
    /// Delay after firing before the next shot.
    pub attack_cooldown: f64,
    /// Wind-up between acquiring a target and firing at it.
    pub aiming_duration: f64,
    /// Projectiles fired by this dot.
    pub projectile: ProjectileParams,
}

impl Default for DotTemplate {
    fn default() -> Self {
        Self {
            width: 4.0,
            height: 4.0,
            health: 2.0,
            speed: 0.05,
            attack_range: 150.0,
            attack_cooldown: 2000.0,
            aiming_duration: 500.0,
            projectile: ProjectileParams::default(),
        }
    }
}

impl DotTemplate {
    fn validate(&self) -> Result<()> {
        let checks = [
            ("width", self.width),
            ("height", self.height),
            ("health", self.health),
            ("speed", self.speed),
            ("attack_range", self.attack_range),
            ("attack_cooldown", self.attack_cooldown),
            ("aiming_duration", self.aiming_duration),
            ("projectile.speed", self.projectile.speed),
            ("projectile.damage", self.projectile.damage),
            ("projectile.fly_distance", self.projectile.fly_distance),
            ("projectile.radius", self.projectile.radius),
        ];

        for (name, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::Config(format!(
                    "dot template field `{name}` must be a non-negative number, got {value}"
                )));
            }
        }

        Ok(())
    }
}

/// Complete configuration for a [`Battle`](crate::battle::Battle).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Spatial grid geometry.
    pub grid: GridConfig,
    /// Stats for dots spawned without an explicit template.
    pub dot_defaults: DotTemplate,
}

impl BattleConfig {
    /// Parse a configuration from a RON string and validate it.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let config: Self = ron::from_str(ron).map_err(|e| SimError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SimError::Config(format!("failed to read '{}': {e}", path.display()))
        })?;
        Self::from_ron_str(&contents)
    }

    /// Reject configurations that would build a degenerate battlefield.
    pub fn validate(&self) -> Result<()> {
        let GridConfig {
            cell_size,
            width,
            height,
        } = self.grid;
        if !(cell_size > 0.0 && width > 0.0 && height > 0.0)
            || !(cell_size.is_finite() && width.is_finite() && height.is_finite())
        {
            return Err(SimError::InvalidGridDimensions {
                cell_size,
                width,
                height,
            });
        }

        self.dot_defaults.validate()
    }
}
