//! Agents: the pieces players draw paths for.

use serde::{Deserialize, Serialize};

use crate::grid::GridCell;

/// Unique identifier for an agent within a level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Create an agent id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AgentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display color for an agent. The core never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentColor(pub u8, pub u8, pub u8);

impl Default for AgentColor {
    fn default() -> Self {
        Self(255, 255, 255)
    }
}

impl AgentColor {
    /// Hex form, e.g. `#ff8000`.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Runtime state of one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    /// Agent id.
    pub id: AgentId,
    /// Cell the agent starts every attempt on.
    pub start: GridCell,
    /// Presentation color.
    pub color: AgentColor,
    /// Maximum number of path segments.
    pub move_budget: u32,
    /// Segments still available to the current draft path.
    pub remaining_budget: u32,
    /// Cell the agent currently occupies.
    pub current_cell: GridCell,
    /// True once the agent's path has been validated end to end.
    pub completed: bool,
}

impl Agent {
    /// Create an agent standing on its start cell with a full budget.
    #[must_use]
    pub fn new(id: AgentId, start: GridCell, move_budget: u32, color: AgentColor) -> Self {
        Self {
            id,
            start,
            color,
            move_budget,
            remaining_budget: move_budget,
            current_cell: start,
            completed: false,
        }
    }

    /// Segments already spent on the current draft.
    #[must_use]
    pub fn segments_used(&self) -> u32 {
        self.move_budget - self.remaining_budget
    }

    /// Put the agent back on its start cell with a fresh budget.
    pub fn reset(&mut self) {
        self.remaining_budget = self.move_budget;
        self.current_cell = self.start;
        self.completed = false;
    }
}
