//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a battle produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! The battle core uses `f64` geometry, so determinism rests on doing the
//! same operations in the same order every run:
//!
//! - **Iteration order**: dots, squads, buildings and projectiles live in
//!   id-keyed `BTreeMap`s and grid buckets are `BTreeSet`s, so every scan
//!   visits entities in id order.
//!
//! - **Time**: the battle has no clock. Time only advances through the
//!   `time_delta` passed to `tick`.
//!
//! - **Target ties**: equal-distance candidates keep their grid scan order
//!   through a stable sort.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual phases (aiming, targeting, movement)
//! 2. **Property tests**: random layouts must still replay identically
//! 3. **Integration tests**: full battles are reproducible
//! 4. **Parallel tests**: running N battles on threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use dots_core::battle::Battle;

use crate::fixtures::TICK_MS;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic battle).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the battle was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Battle is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `ticks` - Number of ticks per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance state by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use dots_test_utils::determinism::verify_determinism;
/// use dots_test_utils::fixtures::{duel, TICK_MS};
///
/// let result = verify_determinism(
///     3,
///     50,
///     duel,
///     |battle| { battle.tick(TICK_MS).unwrap(); },
///     |battle| battle.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    if !is_deterministic {
        tracing::warn!(runs, ticks, ?hashes, "Determinism check diverged");
    }

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a battle `runs` times with [`TICK_MS`] steps and compare final
/// hashes.
///
/// # Panics
///
/// Panics if a tick reports an invariant violation.
pub fn verify_battle_determinism<F>(setup_fn: F, runs: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> Battle,
{
    verify_determinism(
        runs,
        num_ticks,
        &setup_fn,
        |battle| {
            battle.tick(TICK_MS).expect("battle tick failed");
        },
        Battle::state_hash,
    )
}

/// Run N battles on scoped threads and collect their final hashes.
///
/// # Panics
///
/// Panics if a thread panics or a tick reports an invariant violation.
pub fn run_parallel_battles<F>(setup_fn: F, num_battles: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> Battle + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_battles)
            .map(|_| {
                s.spawn(|| {
                    let mut battle = setup_fn();
                    for _ in 0..num_ticks {
                        battle.tick(TICK_MS).expect("battle tick failed");
                    }
                    battle.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("battle thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two battle runs tick-by-tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs match, `Some(tick)` for the first tick whose state
/// hashes differ.
///
/// # Panics
///
/// Panics if a tick reports an invariant violation.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Battle,
{
    let mut first = setup_fn();
    let mut second = setup_fn();

    if first.state_hash() != second.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        first.tick(TICK_MS).expect("battle tick failed");
        second.tick(TICK_MS).expect("battle tick failed");

        if first.state_hash() != second.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a snapshot taken after `num_ticks` restores to the same
/// state and keeps evolving identically for `continue_ticks` more ticks.
///
/// # Panics
///
/// Panics if a tick reports an invariant violation.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_ticks: u64, continue_ticks: u64) -> bool
where
    F: Fn() -> Battle,
{
    let mut battle = setup_fn();
    for _ in 0..num_ticks {
        battle.tick(TICK_MS).expect("battle tick failed");
    }

    let Ok(bytes) = battle.serialize() else {
        return false;
    };
    let Ok(mut restored) = Battle::deserialize(&bytes) else {
        return false;
    };

    if battle.state_hash() != restored.state_hash() {
        return false;
    }

    for _ in 0..continue_ticks {
        battle.tick(TICK_MS).expect("battle tick failed");
        restored.tick(TICK_MS).expect("battle tick failed");
    }

    battle.state_hash() == restored.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{duel, squad_skirmish, two_armies};

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 10, || 0u64, |n| *n += 1, |n| *n);
        assert!(result.is_deterministic);
        assert_eq!(result.unique_hashes(), vec![10]);
    }

    #[test]
    fn test_detects_divergence() {
        let counter = std::cell::Cell::new(0u64);
        let result = verify_determinism(
            2,
            1,
            || {
                counter.set(counter.get() + 1);
                counter.get()
            },
            |_| {},
            |n| *n,
        );
        assert!(!result.is_deterministic);
        assert_eq!(result.unique_hashes().len(), 2);
    }

    #[test]
    fn test_duel_determinism() {
        verify_battle_determinism(duel, 3, 60).assert_deterministic();
    }

    #[test]
    fn test_army_determinism() {
        verify_battle_determinism(|| two_armies(20, 5), 2, 80).assert_deterministic();
    }

    #[test]
    fn test_squad_skirmish_has_no_divergence() {
        assert_eq!(find_first_divergence(|| squad_skirmish(4).0, 60), None);
    }

    #[test]
    fn test_parallel_battles_match() {
        run_parallel_battles(|| two_armies(10, 5), 4, 50).assert_deterministic();
    }

    #[test]
    fn test_serialization_mid_battle() {
        assert!(verify_serialization_determinism(|| two_armies(10, 5), 25, 25));
    }

    #[test]
    fn test_compute_hash_is_stable() {
        assert_eq!(compute_hash(&(1u32, "a")), compute_hash(&(1u32, "a")));
    }
}
