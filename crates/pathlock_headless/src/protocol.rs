//! JSON protocol for headless puzzle sessions.
//!
//! The headless runner communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Commands from the controller
//! **Output (stdout):** Responses and game events
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready","version":"1.0",...}`
//! 2. Controller loads a level (unless one was given on the command line)
//! 3. Controller selects cells for every agent
//! 4. Controller ticks; motion starts after the start delay or on `start`
//! 5. The attempt ends with `level_cleared` or `game_over`; `restart` retries
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","level":null}
//! -> {"cmd":"load_level","path":"assets/levels/crossing.ron"}
//! <- {"type":"level_loaded","name":"crossing","agents":["a","b"]}
//! -> {"cmd":"select","agent":"a","x":4,"y":1}
//! <- {"type":"selection","agent":"a","x":4,"y":1,"outcome":"completed","remaining":1}
//! -> {"cmd":"select","agent":"b","x":2,"y":0}
//! <- {"type":"selection","agent":"b","x":2,"y":0,"outcome":"completed","remaining":1}
//! <- {"type":"paths_ready","predicted":{"time":1.8,"x":2,"y":1,...}}
//! -> {"cmd":"tick","count":240}
//! <- {"type":"started","clock":0.0}
//! <- {"type":"collision","time":1.8,...}
//! <- {"type":"game_over","message":"Agents a, b collided at (2, 1)","clock":1.8}
//! <- {"type":"ack","cmd":"tick"}
//! ```

use serde::{Deserialize, Serialize};

use pathlock_core::collision::{CollisionEvent, CollisionKind};
use pathlock_core::grid::GridCell;
use pathlock_core::math::{Fixed, Vec2Fixed};
use pathlock_core::orchestrator::AgentFrame;
use pathlock_core::selection::SelectionOutcome;

// ============================================================================
// Input Commands (Controller -> Runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Load a level file, replacing the current session.
    LoadLevel { path: String },

    /// Select a cell for an agent.
    Select { agent: String, x: i32, y: i32 },

    /// Undo an agent's most recent selection.
    Undo { agent: String },

    /// List the cells an agent may select next.
    Legal { agent: String },

    /// Start motion without waiting for the start delay.
    Start,

    /// Advance the game by N ticks (default: 1).
    Tick {
        #[serde(default = "default_tick_count")]
        count: u32,
        /// Seconds per tick; defaults to the runner's tick rate.
        #[serde(default)]
        dt: Option<f64>,
    },

    /// Query current state without advancing time.
    Query,

    /// Report the stored collision prediction.
    Predict,

    /// Reset the level for a new attempt.
    Restart,

    /// Report the current state hash (for determinism verification).
    Hash,

    /// Quit the session.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

// ============================================================================
// Output Responses (Runner -> Controller)
// ============================================================================

/// Responses and events sent from the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready {
        version: String,
        level: Option<String>,
    },

    /// Acknowledgment of a command.
    Ack { cmd: String },

    /// Error processing a command.
    Error {
        message: String,
        cmd: Option<String>,
    },

    /// A level was loaded.
    LevelLoaded { name: String, agents: Vec<String> },

    /// Result of a `select` or `undo`.
    Selection {
        agent: String,
        x: i32,
        y: i32,
        outcome: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        remaining: u32,
    },

    /// Cells an agent may select next.
    Legal { agent: String, cells: Vec<(i32, i32)> },

    /// Every path is committed; carries the batch prediction.
    PathsReady { predicted: Option<CollisionOutput> },

    /// Motion began.
    Started { clock: f64 },

    /// Current game state.
    State {
        phase: String,
        attempt: u32,
        clock: f64,
        agents: Vec<AgentState>,
        hash: u64,
    },

    /// Stored prediction.
    Prediction { predicted: Option<CollisionOutput> },

    /// A live collision aborted the attempt.
    Collision(CollisionOutput),

    /// Every agent arrived without colliding.
    LevelCleared { clock: f64 },

    /// The attempt failed.
    GameOver { message: String, clock: f64 },

    /// The level was reset.
    Restarted { attempt: u32 },

    /// State hash for determinism verification.
    StateHash { hash: u64 },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// State Types
// ============================================================================

/// State of a single agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub cell: (i32, i32),
    pub moving: bool,
    pub completed: bool,
    pub remaining_budget: u32,
    /// Selected cells, starting with the start cell.
    pub path: Vec<(i32, i32)>,
}

impl AgentState {
    /// Build from a frame and the agent's bookkeeping.
    #[must_use]
    pub fn from_frame(frame: &AgentFrame, completed: bool, remaining_budget: u32, path: &[GridCell]) -> Self {
        Self {
            id: frame.agent.to_string(),
            x: frame.position.x.to_num(),
            y: frame.position.y.to_num(),
            cell: frame.cell.into(),
            moving: frame.moving,
            completed,
            remaining_budget,
            path: path.iter().map(|&c| c.into()).collect(),
        }
    }
}

/// A collision, flattened for JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionOutput {
    pub time: f64,
    pub x: i32,
    pub y: i32,
    pub point: (f64, f64),
    pub agents: Vec<String>,
    pub distance: f64,
    pub kind: String,
    pub message: String,
}

impl From<&CollisionEvent> for CollisionOutput {
    fn from(event: &CollisionEvent) -> Self {
        Self {
            time: to_f64(event.time),
            x: event.cell.x,
            y: event.cell.y,
            point: point(event.point),
            agents: event.agents.iter().map(ToString::to_string).collect(),
            distance: to_f64(event.distance),
            kind: match event.kind {
                CollisionKind::SameTile => "same_tile",
                CollisionKind::CloseProximity => "close_proximity",
            }
            .to_string(),
            message: event.to_string(),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Fixed-point value as `f64` for output.
#[must_use]
pub fn to_f64(value: Fixed) -> f64 {
    value.to_num()
}

fn point(value: Vec2Fixed) -> (f64, f64) {
    (value.x.to_num(), value.y.to_num())
}

impl Response {
    /// Create a ready response.
    pub fn ready(level: Option<&str>) -> Self {
        Self::Ready {
            version: "1.0".to_string(),
            level: level.map(String::from),
        }
    }

    /// Create an acknowledgment.
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Describe a selection outcome.
    pub fn selection(agent: &str, cell: GridCell, outcome: SelectionOutcome, remaining: u32) -> Self {
        let (outcome, reason) = match outcome {
            SelectionOutcome::Extended { .. } => ("extended", None),
            SelectionOutcome::Completed => ("completed", None),
            SelectionOutcome::Undone => ("undone", None),
            SelectionOutcome::Rejected(reason) => ("rejected", Some(reason.to_string())),
        };
        Self::Selection {
            agent: agent.to_string(),
            x: cell.x,
            y: cell.y,
            outcome: outcome.to_string(),
            reason,
            remaining,
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get command name for acknowledgment.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadLevel { .. } => "load_level",
            Self::Select { .. } => "select",
            Self::Undo { .. } => "undo",
            Self::Legal { .. } => "legal",
            Self::Start => "start",
            Self::Tick { .. } => "tick",
            Self::Query => "query",
            Self::Predict => "predict",
            Self::Restart => "restart",
            Self::Hash => "hash",
            Self::Quit => "quit",
        }
    }
}
