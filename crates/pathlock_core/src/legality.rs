//! Path legality: which cells an agent may select next, and whether a
//! finished path is acceptable.
//!
//! Paths are drawn as straight cardinal runs between flags. A run may not
//! cross a missing tile or another agent, and the last two selections are
//! constrained so an agent can never spend its budget without ending on a
//! goal it is allowed to use.

use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::goals::Goal;
use crate::grid::{Direction, GridCell};
use crate::level::LevelContext;

/// Why a selection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// The candidate is diagonal to the path's last cell.
    NotAxisAligned,
    /// The candidate is the path's last cell.
    SameCell,
    /// The candidate is outside the grid.
    OutOfBounds,
    /// A missing tile or another agent lies on the run.
    Blocked,
    /// The run would continue past a goal the agent could stop on.
    BeyondGoal,
    /// The run is longer than the checker allows.
    TooFar,
    /// No segments left.
    BudgetExhausted,
    /// Last segment: the candidate must be a usable goal.
    NotAGoal,
    /// Second to last segment: no usable goal is in a clear straight line
    /// from the candidate.
    NoGoalInSight,
    /// The agent's path is already complete.
    AlreadyCompleted,
    /// Nothing to undo.
    NothingToUndo,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::NotAxisAligned => "cell is not in a straight line",
            Self::SameCell => "cell is already the end of the path",
            Self::OutOfBounds => "cell is outside the grid",
            Self::Blocked => "the way is blocked",
            Self::BeyondGoal => "the run passes a reachable goal",
            Self::TooFar => "the run is too long",
            Self::BudgetExhausted => "no moves left",
            Self::NotAGoal => "the last move must end on a goal",
            Self::NoGoalInSight => "no goal would be reachable with the last move",
            Self::AlreadyCompleted => "path is already complete",
            Self::NothingToUndo => "nothing to undo",
        };
        f.write_str(text)
    }
}

/// Read-only legality queries against a level.
#[derive(Debug, Clone, Copy)]
pub struct PathChecker<'a> {
    level: &'a LevelContext,
    max_distance: i32,
}

impl<'a> PathChecker<'a> {
    /// Create a checker whose rays span the whole grid.
    #[must_use]
    pub fn new(level: &'a LevelContext) -> Self {
        Self {
            level,
            max_distance: level.grid().max_dimension(),
        }
    }

    /// Limit how far a single run may reach.
    #[must_use]
    pub fn with_max_distance(mut self, max_distance: i32) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// True if `cell` has no walkable tile or is occupied by an agent other
    /// than `exclude`.
    #[must_use]
    pub fn has_obstacle_at(&self, cell: GridCell, exclude: Option<&AgentId>) -> bool {
        if !self.level.grid().is_walkable(cell) {
            return true;
        }
        self.level
            .agents()
            .iter()
            .any(|a| a.current_cell == cell && Some(&a.id) != exclude)
    }

    /// True if any cell after `from` up to and including `to` is an
    /// obstacle. Diagonal or identical pairs count as blocked.
    #[must_use]
    pub fn has_obstacle_in_path(&self, from: GridCell, to: GridCell, exclude: Option<&AgentId>) -> bool {
        let line = from.line_to(to);
        line.is_empty() || line.iter().any(|&cell| self.has_obstacle_at(cell, exclude))
    }

    /// Whether a single straight run from `from` to `to` is legal for `agent`.
    #[must_use]
    pub fn is_valid_single_step(&self, from: GridCell, to: GridCell, agent: &AgentId) -> bool {
        self.single_step(from, to, agent).is_ok()
    }

    fn single_step(&self, from: GridCell, to: GridCell, agent: &AgentId) -> Result<(), RejectReason> {
        if from == to {
            return Err(RejectReason::SameCell);
        }
        if !from.shares_axis_with(to) {
            return Err(RejectReason::NotAxisAligned);
        }
        if !self.level.grid().in_bounds(to) {
            return Err(RejectReason::OutOfBounds);
        }
        if self.has_obstacle_in_path(from, to, Some(agent)) {
            return Err(RejectReason::Blocked);
        }
        Ok(())
    }

    /// Walk outward from `from` and collect every cell a run could end on.
    ///
    /// Stops at the first blocked cell, after `max_distance` cells, or right
    /// after a goal the agent may use.
    #[must_use]
    pub fn reachable_cells_in_direction(
        &self,
        from: GridCell,
        direction: Direction,
        agent: &AgentId,
        max_distance: i32,
    ) -> Vec<GridCell> {
        let mut cells = Vec::new();
        for distance in 1..=max_distance {
            let cell = from.offset(direction, distance);
            if !self.level.grid().in_bounds(cell) || self.has_obstacle_at(cell, Some(agent)) {
                break;
            }
            cells.push(cell);
            if self.is_goal_cell(cell, agent) {
                break;
            }
        }
        cells
    }

    /// Whether `cell` holds a goal `agent` may finish on.
    #[must_use]
    pub fn is_goal_cell(&self, cell: GridCell, agent: &AgentId) -> bool {
        self.level.goals_at(cell).any(|g| g.can_use(agent))
    }

    /// Goals `agent` may finish on.
    #[must_use]
    pub fn usable_goals(&self, agent: &AgentId) -> Vec<&'a Goal> {
        self.level.goals().iter().filter(|g| g.can_use(agent)).collect()
    }

    /// Segments `agent` could still add to `path`.
    fn remaining(&self, path: &[GridCell], agent: &AgentId) -> u32 {
        let budget = self.level.agent(agent).map_or(0, |a| a.move_budget);
        let used = path.len().saturating_sub(1) as u32;
        budget.saturating_sub(used)
    }

    /// Check whether `to` may be appended to `path`.
    ///
    /// `path` starts at the agent's start cell; an empty path is treated as
    /// the start cell alone.
    pub fn check_selection(&self, path: &[GridCell], to: GridCell, agent: &AgentId) -> Result<(), RejectReason> {
        let Some(state) = self.level.agent(agent) else {
            return Err(RejectReason::Blocked);
        };
        let from = path.last().copied().unwrap_or(state.start);

        let remaining = self.remaining(path, agent);
        if remaining == 0 {
            return Err(RejectReason::BudgetExhausted);
        }

        self.single_step(from, to, agent)?;

        let Some(direction) = from.direction_to(to) else {
            return Err(RejectReason::NotAxisAligned);
        };
        if (to.x - from.x).abs() + (to.y - from.y).abs() > self.max_distance {
            return Err(RejectReason::TooFar);
        }
        if !self
            .reachable_cells_in_direction(from, direction, agent, self.max_distance)
            .contains(&to)
        {
            return Err(RejectReason::BeyondGoal);
        }

        match remaining {
            1 if !self.is_goal_cell(to, agent) => Err(RejectReason::NotAGoal),
            2 if !self.has_goal_in_sight(to, agent) => Err(RejectReason::NoGoalInSight),
            _ => Ok(()),
        }
    }

    /// Whether `to` may be appended to `path`.
    #[must_use]
    pub fn is_legal_selection(&self, path: &[GridCell], to: GridCell, agent: &AgentId) -> bool {
        self.check_selection(path, to, agent).is_ok()
    }

    /// True if some usable goal shares an axis with `cell` and the straight
    /// run to it is clear. A usable goal on `cell` itself qualifies.
    fn has_goal_in_sight(&self, cell: GridCell, agent: &AgentId) -> bool {
        self.usable_goals(agent).iter().any(|goal| {
            goal.cell == cell
                || (goal.cell.shares_axis_with(cell)
                    && !self.has_obstacle_in_path(cell, goal.cell, Some(agent)))
        })
    }

    /// Every cell that may legally be appended to `path`, scanning the four
    /// directions in order.
    #[must_use]
    pub fn legal_next_selections(&self, path: &[GridCell], agent: &AgentId) -> Vec<GridCell> {
        let Some(state) = self.level.agent(agent) else {
            return Vec::new();
        };
        let from = path.last().copied().unwrap_or(state.start);
        Direction::ALL
            .iter()
            .flat_map(|&d| self.reachable_cells_in_direction(from, d, agent, self.max_distance))
            .filter(|&cell| self.is_legal_selection(path, cell, agent))
            .collect()
    }

    /// Full-path check: at least two cells, starts on the agent's start
    /// cell, every run straight and clear, within budget, and ending on a
    /// usable goal.
    #[must_use]
    pub fn validate_path(&self, path: &[GridCell], agent: &AgentId) -> bool {
        let Some(state) = self.level.agent(agent) else {
            return false;
        };
        let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
            return false;
        };
        path.len() >= 2
            && first == state.start
            && path.len() - 1 <= state.move_budget as usize
            && path
                .windows(2)
                .all(|pair| self.is_valid_single_step(pair[0], pair[1], agent))
            && self.is_goal_cell(last, agent)
    }
}
