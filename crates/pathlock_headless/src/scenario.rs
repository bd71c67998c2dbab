//! Scenario loading and configuration.
//!
//! A scenario names a level, the cells to select for each agent, and the
//! outcome the attempt is expected to reach. Scenarios are how puzzle
//! solutions (and known failures) are pinned down in CI.

use std::path::{Path, PathBuf};

use pathlock_core::error::GameError;
use pathlock_core::grid::GridCell;
use pathlock_core::level::{LevelContext, LevelData};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The level could not be loaded.
    #[error(transparent)]
    Level(#[from] GameError),
}

/// Where a scenario's level comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LevelSource {
    /// Level file path, relative to the scenario file.
    File(String),
    /// Level embedded in the scenario.
    Inline(LevelData),
}

/// Cells to select for one agent, in click order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSelections {
    /// Agent id.
    pub agent: String,
    /// Cells to select; the start cell is implied.
    pub cells: Vec<GridCell>,
}

/// How an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Every agent reached its goal.
    Cleared,
    /// A collision aborted the attempt.
    Collided,
    /// Selections left some agent without a committed path.
    Incomplete,
    /// The time limit ran out mid-motion.
    TimedOut,
}

/// Expected result of a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    /// Required outcome.
    pub outcome: Outcome,
    /// Cell the collision must happen on, when `outcome` is `Collided`.
    #[serde(default)]
    pub collision_cell: Option<GridCell>,
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Level to play.
    pub level: LevelSource,
    /// Selections applied before motion starts.
    #[serde(default)]
    pub selections: Vec<AgentSelections>,
    /// Ticks per second of game time.
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,
    /// Game-time limit in seconds.
    #[serde(default = "default_max_seconds")]
    pub max_seconds: u32,
    /// Expected result; `None` just reports.
    #[serde(default)]
    pub expect: Option<Expectation>,
}

fn default_tick_rate() -> u32 {
    60
}

fn default_max_seconds() -> u32 {
    30
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        tracing::debug!(name = %scenario.name, path = %path.display(), "Loaded scenario");
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Load and validate the scenario's level.
    ///
    /// File paths resolve against `base_dir` when given.
    pub fn load_level(&self, base_dir: Option<&Path>) -> Result<LevelContext, ScenarioError> {
        match &self.level {
            LevelSource::Inline(data) => Ok(LevelContext::load(data)?),
            LevelSource::File(file) => {
                let path = match base_dir {
                    Some(dir) => dir.join(file),
                    None => PathBuf::from(file),
                };
                Ok(LevelContext::from_file(&path)?)
            }
        }
    }
}
