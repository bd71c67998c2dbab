//! Headless puzzle runner for scripted play and CI verification.
//!
//! This crate drives the puzzle core without a presentation layer. It can be
//! controlled via JSON commands on stdin, with responses and game events on
//! stdout. This enables:
//!
//! - **Scripted play**: A controller selects paths and steps time
//! - **Scenario checks**: Known solutions and known collisions pinned in CI
//! - **Determinism checks**: Replaying a scenario must give identical hashes
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from controller (select, tick, restart, etc.)
//! - **stdout**: Responses and events (JSON)
//! - **stderr**: Debug logs (human-readable)
//!
//! See [`protocol`] module for the full command/response format.
//!
//! # Example
//!
//! ```bash
//! # Run interactively
//! echo '{"cmd":"query"}' | cargo run -p pathlock_headless -- run --level assets/levels/crossing.ron
//!
//! # Run a scenario
//! cargo run -p pathlock_headless -- scenario assets/scenarios/crossing_collides.ron
//!
//! # Verify determinism
//! cargo run -p pathlock_headless -- verify assets/scenarios/crossing_collides.ron --runs 5
//! ```

pub mod protocol;
pub mod runner;
pub mod scenario;

pub use protocol::{Command, Response};
pub use runner::{run_scenario, verify_scenario, HeadlessConfig, HeadlessRunner, ScenarioOutcome};
pub use scenario::{Expectation, Outcome, Scenario, ScenarioError};
