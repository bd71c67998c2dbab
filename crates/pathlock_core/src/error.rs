//! Error types for the puzzle core.
//!
//! Illegal selections and collisions are normal gameplay outcomes and
//! never show up here. These errors cover broken level data and callers
//! that drive the orchestrator out of order.

use thiserror::Error;

use crate::grid::GridCell;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all puzzle core errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Level data failed validation; loading was refused.
    #[error("Invalid level: {}", format_errors(.0))]
    InvalidLevel(Vec<LevelValidationError>),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// An agent id that the level does not contain.
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// An operation was issued in a phase that does not allow it.
    #[error("Cannot {action} while {phase}")]
    PhaseViolation {
        /// What the caller attempted.
        action: &'static str,
        /// Phase the orchestrator was in.
        phase: String,
    },

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}

/// A single failed level invariant.
///
/// [`crate::level::LevelData::validate`] reports every failure it finds
/// rather than stopping at the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelValidationError {
    /// Levels need between two and four agents.
    #[error("Level needs 2-4 agents, found {0}")]
    AgentCount(usize),

    /// Levels need at least one goal.
    #[error("Level has no goals")]
    NoGoals,

    /// Grid dimensions must be positive.
    #[error("Grid must be at least 1x1, got {width}x{height}")]
    EmptyGrid {
        /// Configured width.
        width: i32,
        /// Configured height.
        height: i32,
    },

    /// The grid spans more world units than distances can be computed over.
    #[error("Grid {width}x{height} with cell size {cell_size} reaches past ±{max} world units", max = crate::level::MAX_WORLD_EXTENT)]
    WorldTooLarge {
        /// Configured width.
        width: i32,
        /// Configured height.
        height: i32,
        /// Configured cell size.
        cell_size: crate::math::Fixed,
    },

    /// Cell size must be positive.
    #[error("Cell size must be positive")]
    NonPositiveCellSize,

    /// Move speed must be positive.
    #[error("Move speed must be positive")]
    NonPositiveMoveSpeed,

    /// Two agents share an id.
    #[error("Duplicate agent id '{0}'")]
    DuplicateAgentId(String),

    /// Two agents share a start cell.
    #[error("Agents '{first}' and '{second}' share start cell {cell}")]
    SharedStartCell {
        /// First agent placed on the cell.
        first: String,
        /// Second agent placed on the cell.
        second: String,
        /// The shared cell.
        cell: GridCell,
    },

    /// An agent starts off the grid or on a missing tile.
    #[error("Agent '{agent}' starts on {cell}, which has no walkable tile")]
    StartNotWalkable {
        /// Agent id.
        agent: String,
        /// Start cell.
        cell: GridCell,
    },

    /// A goal sits off the grid or on a missing tile.
    #[error("Goal {index} at {cell} has no walkable tile")]
    GoalNotWalkable {
        /// Goal index.
        index: usize,
        /// Goal cell.
        cell: GridCell,
    },

    /// An agent has a move budget of zero.
    #[error("Agent '{0}' needs a move budget of at least 1")]
    ZeroMoveBudget(String),

    /// An agent references a goal index that does not exist.
    #[error("Agent '{agent}' is assigned to goal {index}, but the level has {goal_count} goals")]
    GoalIndexOutOfRange {
        /// Agent id.
        agent: String,
        /// Referenced index.
        index: usize,
        /// Number of goals in the level.
        goal_count: usize,
    },

    /// A goal lists an agent id that does not exist.
    #[error("Goal {index} lists unknown agent '{agent}'")]
    UnknownAssignedAgent {
        /// Goal index.
        index: usize,
        /// Unknown agent id.
        agent: String,
    },

    /// No goal in the level may be used by this agent.
    #[error("Agent '{0}' has no usable goal")]
    NoUsableGoal(String),

    /// Every usable goal is cut off from the agent's start by missing tiles.
    #[error("Agent '{0}' cannot reach any of its goals")]
    UnreachableGoal(String),
}

fn format_errors(errors: &[LevelValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
