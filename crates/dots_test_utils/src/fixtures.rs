//! Test fixtures and helpers.
//!
//! Pre-built battles for consistent testing. All fixtures use the
//! default dot template unless stated otherwise.

use dots_core::battle::Battle;
use dots_core::config::{BattleConfig, GridConfig};
use dots_core::dot::{DotId, DotSpawnParams};
use dots_core::geometry::Point;
use dots_core::squad::{Slot, SquadId};
use dots_core::team::TeamId;

/// Time step used by fixtures and harness helpers, in milliseconds.
pub const TICK_MS: f64 = 100.0;

/// Horizontal gap between the two armies of [`two_armies`].
pub const ARMY_GAP: f64 = 120.0;

/// Spacing between neighboring dots inside one army.
pub const ARMY_SPACING: f64 = 10.0;

/// Config with a custom battlefield and default dot stats.
#[must_use]
pub fn config(cell_size: f64, width: f64, height: f64) -> BattleConfig {
    BattleConfig {
        grid: GridConfig {
            cell_size,
            width,
            height,
        },
        ..BattleConfig::default()
    }
}

/// Spawn a default dot.
///
/// # Panics
///
/// Panics if the team does not exist.
pub fn spawn(battle: &mut Battle, team: TeamId, x: f64, y: f64) -> DotId {
    battle
        .spawn_dot(DotSpawnParams {
            team,
            position: Point::new(x, y),
            ..Default::default()
        })
        .expect("fixture team exists")
}

/// Two opposing dots 50 units apart, well inside each other's range.
#[must_use]
pub fn duel() -> Battle {
    let mut battle = Battle::new(BattleConfig::default()).expect("default config is valid");
    let red = battle.add_team("red");
    let blue = battle.add_team("blue");
    spawn(&mut battle, red, 100.0, 100.0);
    spawn(&mut battle, blue, 150.0, 100.0);
    battle
}

/// Two facing blocks of `per_side` dots each, `columns` dots wide.
///
/// Red stands on the left, blue on the right, separated by
/// [`ARMY_GAP`].
#[must_use]
pub fn two_armies(per_side: usize, columns: usize) -> Battle {
    let columns = columns.max(1);
    let rows = per_side.div_ceil(columns);
    let width = 2.0 * columns as f64 * ARMY_SPACING + ARMY_GAP + 200.0;
    let height = rows as f64 * ARMY_SPACING + 200.0;

    let mut battle = Battle::new(config(50.0, width, height)).expect("fixture config is valid");
    let red = battle.add_team("red");
    let blue = battle.add_team("blue");

    let red_right_edge = 100.0 + (columns - 1) as f64 * ARMY_SPACING;
    let blue_left_edge = red_right_edge + ARMY_GAP;

    for i in 0..per_side {
        let column = (i % columns) as f64;
        let row = (i / columns) as f64;
        let y = 100.0 + row * ARMY_SPACING;
        spawn(&mut battle, red, 100.0 + column * ARMY_SPACING, y);
        spawn(&mut battle, blue, blue_left_edge + column * ARMY_SPACING, y);
    }

    battle
}

/// Two squads of `size` dots in a line formation, each ordered to attack
/// the other. Returns the battle and the (red, blue) squad ids.
#[must_use]
pub fn squad_skirmish(size: usize) -> (Battle, SquadId, SquadId) {
    let mut battle = Battle::new(BattleConfig::default()).expect("default config is valid");
    let red = battle.add_team("red");
    let blue = battle.add_team("blue");

    let mut squad_ids = Vec::new();
    for (team, x, angle) in [(red, 200.0, 0.0), (blue, 300.0, std::f64::consts::PI)] {
        let slots: Vec<Slot> = (0..size)
            .map(|i| Slot::new(Point::new(x, 100.0 + i as f64 * ARMY_SPACING), angle))
            .collect();
        let positions: Vec<Point> = slots.iter().map(|s| s.position).collect();
        let squad = battle.create_squad(team, slots).expect("fixture team exists");
        for (index, position) in positions.into_iter().enumerate() {
            let dot = spawn(&mut battle, team, position.x, position.y);
            battle
                .assign_dot_to_slot(squad, index, dot)
                .expect("fixture slot exists");
        }
        squad_ids.push(squad);
    }

    let (red_squad, blue_squad) = (squad_ids[0], squad_ids[1]);
    battle
        .set_attack_target_squads(red_squad, [blue_squad])
        .expect("fixture squad exists");
    battle
        .set_attack_target_squads(blue_squad, [red_squad])
        .expect("fixture squad exists");

    (battle, red_squad, blue_squad)
}

/// Tick a battle `ticks` times with [`TICK_MS`].
///
/// # Panics
///
/// Panics if a tick reports an invariant violation.
pub fn run(battle: &mut Battle, ticks: u64) {
    for _ in 0..ticks {
        battle.tick(TICK_MS).expect("battle tick failed");
    }
}
