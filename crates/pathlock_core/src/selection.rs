//! Per-agent path drafting: extend, undo, complete.

use std::collections::BTreeMap;

use crate::agent::AgentId;
use crate::error::Result;
use crate::grid::GridCell;
use crate::legality::{PathChecker, RejectReason};
use crate::level::LevelContext;

/// Result of a selection or undo request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// The cell was appended; the path is not finished yet.
    Extended {
        /// Segments still available.
        remaining: u32,
    },
    /// The cell finished a valid path, which is now committed.
    Completed,
    /// The most recent cell was removed.
    Undone,
    /// The request was refused; nothing changed.
    Rejected(RejectReason),
}

/// Draft and committed paths for every agent of a level.
///
/// Drafts always start on the agent's start cell. Budget and completion
/// state live on the agents in the [`LevelContext`], so every mutating call
/// takes the level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathBook {
    drafts: BTreeMap<AgentId, Vec<GridCell>>,
    committed: BTreeMap<AgentId, Vec<GridCell>>,
}

impl PathBook {
    /// Create an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current draft for `agent`; empty if it has not selected anything.
    #[must_use]
    pub fn draft(&self, agent: &AgentId) -> &[GridCell] {
        self.drafts.get(agent).map_or(&[], Vec::as_slice)
    }

    /// Committed path for `agent`, if its path is complete.
    #[must_use]
    pub fn committed(&self, agent: &AgentId) -> Option<&[GridCell]> {
        self.committed.get(agent).map(Vec::as_slice)
    }

    /// Every committed path, keyed by agent.
    #[must_use]
    pub fn committed_paths(&self) -> &BTreeMap<AgentId, Vec<GridCell>> {
        &self.committed
    }

    /// True once every agent of `level` has a committed path.
    #[must_use]
    pub fn all_committed(&self, level: &LevelContext) -> bool {
        level.agent_ids().all(|id| self.committed.contains_key(id))
    }

    /// Handle a player selecting `cell` for `agent`.
    ///
    /// Selecting the last cell of the draft again undoes it, even on a
    /// completed path.
    pub fn select(&mut self, level: &mut LevelContext, agent: &AgentId, cell: GridCell) -> Result<SelectionOutcome> {
        let state = level.require_agent(agent)?;
        let start = state.start;
        let completed = state.completed;

        let draft = self.drafts.entry(agent.clone()).or_insert_with(|| vec![start]);
        if draft.len() > 1 && draft.last() == Some(&cell) {
            return self.undo(level, agent);
        }
        if completed {
            return Ok(SelectionOutcome::Rejected(RejectReason::AlreadyCompleted));
        }

        let checker = PathChecker::new(level);
        if let Err(reason) = checker.check_selection(draft, cell, agent) {
            tracing::debug!(%agent, %cell, %reason, "Selection rejected");
            return Ok(SelectionOutcome::Rejected(reason));
        }
        let reached_goal = checker.is_goal_cell(cell, agent);

        draft.push(cell);
        let state = level.agent_mut(agent)?;
        state.remaining_budget = state.remaining_budget.saturating_sub(1);
        let remaining = state.remaining_budget;
        tracing::debug!(%agent, %cell, remaining, "Selection accepted");

        if !reached_goal && remaining > 0 {
            return Ok(SelectionOutcome::Extended { remaining });
        }

        let draft = draft.clone();
        let valid = PathChecker::new(level).validate_path(&draft, agent);
        debug_assert!(valid, "selection accepted but path failed validation");
        if !valid {
            self.pop(level, agent)?;
            return Ok(SelectionOutcome::Rejected(RejectReason::NotAGoal));
        }

        level.agent_mut(agent)?.completed = true;
        level.claim_goal_at(cell, agent);
        tracing::info!(%agent, segments = draft.len() - 1, "Path completed");
        self.committed.insert(agent.clone(), draft);
        Ok(SelectionOutcome::Completed)
    }

    /// Remove the most recent cell of `agent`'s draft.
    ///
    /// Undoing the final cell of a completed path reopens it and releases
    /// any goal it claimed.
    pub fn undo(&mut self, level: &mut LevelContext, agent: &AgentId) -> Result<SelectionOutcome> {
        level.require_agent(agent)?;
        if self.draft(agent).len() <= 1 {
            return Ok(SelectionOutcome::Rejected(RejectReason::NothingToUndo));
        }
        self.pop(level, agent)?;
        Ok(SelectionOutcome::Undone)
    }

    fn pop(&mut self, level: &mut LevelContext, agent: &AgentId) -> Result<()> {
        if let Some(draft) = self.drafts.get_mut(agent) {
            if let Some(cell) = draft.pop() {
                tracing::debug!(%agent, %cell, "Selection undone");
            }
        }
        if self.committed.remove(agent).is_some() {
            level.release_claims(agent);
        }
        let state = level.agent_mut(agent)?;
        state.remaining_budget = (state.remaining_budget + 1).min(state.move_budget);
        state.completed = false;
        Ok(())
    }

    /// Discard every draft and committed path.
    pub fn clear(&mut self) {
        self.drafts.clear();
        self.committed.clear();
    }
}
