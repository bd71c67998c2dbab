//! Determinism testing utilities.
//!
//! Provides a harness for verifying that timelines, predictions and whole
//! attempts produce identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Batch prediction is only ground truth if it is exactly reproducible.
//! Sources of non-determinism include:
//!
//! - **Floating-point math**: We use fixed-point arithmetic via
//!   [`pathlock_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Agents are always visited in sorted id
//!   order or level order.
//!
//! - **Input order**: Prediction must not depend on the order paths are
//!   passed in.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use pathlock_core::orchestrator::MoveOrchestrator;

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
    /// Get all unique hashes (should be 1 for a deterministic run).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the runs were deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Attempt is non-deterministic!\n\
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

/// Run a stateful process multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `ticks` - Number of steps per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance the state by one step
/// * `hash` - Function to compute the state hash
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
        tracing::debug!(?hashes, ticks, "Runs diverged");
    }

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Play an attempt twice from the same setup at a fixed tick and compare
/// the final state hashes.
///
/// `setup` must return an orchestrator with its paths already selected.
pub fn verify_attempt_determinism<F>(setup: F, dt: pathlock_core::math::Fixed, ticks: u64) -> bool
where
    F: Fn() -> MoveOrchestrator,
{
    verify_determinism(
        2,
        ticks,
        &setup,
        |orch| {
            orch.tick(dt);
        },
        MoveOrchestrator::state_hash,
    )
    .is_deterministic
}

/// Play `runs` copies of an attempt on scoped threads and collect their
/// final hashes.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_attempts<F>(
    setup: F,
    dt: pathlock_core::math::Fixed,
    runs: usize,
    ticks: u64,
) -> DeterminismResult
where
    F: Fn() -> MoveOrchestrator + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..runs)
            .map(|_| {
                s.spawn(|| {
                    let mut orch = setup();
                    for _ in 0..ticks {
                        orch.tick(dt);
                    }
                    orch.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("attempt thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks,
    }
}

/// Compare two attempts tick-by-tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the attempts stay identical, `Some(tick)` if they diverge at
/// that tick.
pub fn find_first_divergence<F>(setup: F, dt: pathlock_core::math::Fixed, ticks: u64) -> Option<u64>
where
    F: Fn() -> MoveOrchestrator,
{
    let mut first = setup();
    let mut second = setup();

    if first.state_hash() != second.state_hash() {
        return Some(0);
    }

    for tick in 1..=ticks {
        first.tick(dt);
        second.tick(dt);

        if first.state_hash() != second.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for grid puzzles.
///
/// These strategies generate random but reproducible cells, paths and
/// speeds for property-based testing.
pub mod strategies {
    use pathlock_core::grid::{Direction, GridCell};
    use pathlock_core::math::Fixed;
    use proptest::prelude::*;

    /// Any cell on a `width` x `height` grid.
    pub fn arb_cell(width: i32, height: i32) -> impl Strategy<Value = GridCell> {
        (0..width, 0..height).prop_map(|(x, y)| GridCell::new(x, y))
    }

    /// Any cardinal direction.
    pub fn arb_direction() -> impl Strategy<Value = Direction> {
        prop::sample::select(Direction::ALL.to_vec())
    }

    /// Axis-aligned path on a `width` x `height` grid with up to
    /// `max_segments` segments.
    ///
    /// Runs are clamped to the grid, and zero-length runs dropped, so
    /// every consecutive pair differs on exactly one axis.
    pub fn arb_axis_path(
        width: i32,
        height: i32,
        max_segments: usize,
    ) -> impl Strategy<Value = Vec<GridCell>> {
        let longest = width.max(height);
        (
            arb_cell(width, height),
            prop::collection::vec((arb_direction(), 1..longest), 1..=max_segments),
        )
            .prop_map(move |(start, runs)| {
                let mut path = vec![start];
                let mut last = start;
                for (direction, distance) in runs {
                    let raw = last.offset(direction, distance);
                    let next = GridCell::new(raw.x.clamp(0, width - 1), raw.y.clamp(0, height - 1));
                    if next != last {
                        path.push(next);
                        last = next;
                    }
                }
                path
            })
    }

    /// Agent speed between 0.5 and 8 world units per second.
    pub fn arb_speed() -> impl Strategy<Value = Fixed> {
        (1i32..=16).prop_map(|halves| Fixed::from_num(halves) / Fixed::from_num(2))
    }

    /// Query time between 0 and 60 seconds, in hundredths.
    pub fn arb_time() -> impl Strategy<Value = Fixed> {
        (0i32..6000).prop_map(|hundredths| Fixed::from_num(hundredths) / Fixed::from_num(100))
    }
}
