//! Goal cells and who may finish on them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::grid::GridCell;

/// How many agents, and which ones, may end on a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalType {
    /// Reserved for its assigned agents, and consumed by the first one
    /// whose path ends on it.
    Individual,
    /// Any assigned agent, any number of times.
    Shared,
    /// Anyone.
    Single,
}

/// A goal cell with its assignment and claim state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goal {
    /// Position in the level's goal list.
    pub index: usize,
    /// Cell the goal sits on.
    pub cell: GridCell,
    /// Usage rule.
    pub goal_type: GoalType,
    /// Agents assigned to this goal.
    pub assigned: BTreeSet<AgentId>,
    /// Agent whose committed path consumed this goal (`Individual` only).
    pub claimed_by: Option<AgentId>,
}

impl Goal {
    /// Create an unclaimed goal with no assigned agents.
    #[must_use]
    pub fn new(index: usize, cell: GridCell, goal_type: GoalType) -> Self {
        Self {
            index,
            cell,
            goal_type,
            assigned: BTreeSet::new(),
            claimed_by: None,
        }
    }

    /// Whether `agent` may end its path here right now.
    #[must_use]
    pub fn can_use(&self, agent: &AgentId) -> bool {
        match self.goal_type {
            GoalType::Individual => {
                self.assigned.contains(agent)
                    && self.claimed_by.as_ref().map_or(true, |owner| owner == agent)
            }
            GoalType::Shared => self.assigned.contains(agent),
            GoalType::Single => true,
        }
    }

    /// Whether `agent` is eligible for this goal at all, ignoring claims.
    #[must_use]
    pub fn is_eligible(&self, agent: &AgentId) -> bool {
        match self.goal_type {
            GoalType::Individual | GoalType::Shared => self.assigned.contains(agent),
            GoalType::Single => true,
        }
    }

    /// Record that `agent` finished on this goal. No-op for shared goal types.
    pub fn claim(&mut self, agent: &AgentId) {
        if self.goal_type == GoalType::Individual {
            self.claimed_by = Some(agent.clone());
        }
    }

    /// Release a claim held by `agent`.
    pub fn release(&mut self, agent: &AgentId) {
        if self.claimed_by.as_ref() == Some(agent) {
            self.claimed_by = None;
        }
    }
}
