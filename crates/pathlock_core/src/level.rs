//! Level data files and the loaded level context.
//!
//! [`LevelData`] is the serde shape of a level file. [`LevelContext`] is what
//! a validated level turns into: the grid, the agents with their runtime
//! state, and the goals with their assignments. There is no global "current
//! level"; whoever runs a level owns its context.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentColor, AgentId};
use crate::error::{GameError, LevelValidationError, Result};
use crate::goals::{Goal, GoalType};
use crate::grid::{CellType, Direction, GridCell, GridMap};
use crate::math::{fixed_decimal, Fixed, Vec2Fixed};

/// A level as written on disk.
///
/// # Example RON
///
/// ```ron
/// LevelData(
///     name: "crossing",
///     grid: (width: 5, height: 5, cell_size: 1.0),
///     all_walkable: true,
///     agents: [
///         (id: "red", start: (0, 0), move_budget: 2),
///         (id: "blue", start: (2, 2), move_budget: 2, goal: Some(0)),
///     ],
///     goals: [
///         (cell: (2, 0), goal_type: Shared),
///     ],
///     move_speed: 1.0,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelData {
    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Grid dimensions and placement.
    pub grid: GridData,

    /// Cells that carry a walkable tile.
    #[serde(default)]
    pub tiles: Vec<GridCell>,

    /// Treat every in-bounds cell as walkable, ignoring `tiles`.
    #[serde(default)]
    pub all_walkable: bool,

    /// Agents in play order.
    pub agents: Vec<AgentData>,

    /// Goal cells.
    pub goals: Vec<GoalData>,

    /// Agent speed in world units per second.
    #[serde(with = "fixed_decimal", default = "default_move_speed")]
    pub move_speed: Fixed,
}

/// Grid section of a level file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridData {
    /// Width in cells.
    pub width: i32,
    /// Height in cells.
    pub height: i32,
    /// Size of a cell in world units.
    #[serde(with = "fixed_decimal", default = "default_cell_size")]
    pub cell_size: Fixed,
    /// World x of the grid's lower-left corner.
    #[serde(with = "fixed_decimal", default)]
    pub origin_x: Fixed,
    /// World y of the grid's lower-left corner.
    #[serde(with = "fixed_decimal", default)]
    pub origin_y: Fixed,
}

/// Agent entry in a level file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentData {
    /// Unique id.
    pub id: String,
    /// Start cell.
    pub start: GridCell,
    /// Maximum path segments.
    pub move_budget: u32,
    /// Presentation color.
    #[serde(default)]
    pub color: AgentColor,
    /// Index of the one goal this agent is meant for. Without it the agent
    /// may use every `Shared` and `Single` goal.
    #[serde(default)]
    pub goal: Option<usize>,
}

/// Goal entry in a level file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalData {
    /// Goal cell.
    pub cell: GridCell,
    /// Usage rule.
    pub goal_type: GoalType,
    /// Agents assigned directly, in addition to per-agent `goal` indices.
    #[serde(default)]
    pub agents: Vec<String>,
}

/// Largest world coordinate a level may reach on either axis. Two points
/// inside `±MAX_WORLD_EXTENT` are at most 30,000 units apart per axis, so
/// their squared distance fits in [`Fixed`].
pub const MAX_WORLD_EXTENT: i32 = 15_000;

fn default_move_speed() -> Fixed {
    Fixed::from_num(2)
}

fn default_cell_size() -> Fixed {
    Fixed::ONE
}

impl LevelData {
    /// Parse a level from a RON string.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| GameError::DataParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    /// Read and parse a level file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        ron::from_str(&content).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Check every level invariant and return all failures.
    ///
    /// Checks that depend on the grid (walkability, reachability) are
    /// skipped when the grid itself is malformed.
    #[must_use]
    pub fn validate(&self) -> Vec<LevelValidationError> {
        let mut errors = Vec::new();

        if !(2..=4).contains(&self.agents.len()) {
            errors.push(LevelValidationError::AgentCount(self.agents.len()));
        }
        if self.goals.is_empty() {
            errors.push(LevelValidationError::NoGoals);
        }
        if self.grid.width <= 0 || self.grid.height <= 0 {
            errors.push(LevelValidationError::EmptyGrid {
                width: self.grid.width,
                height: self.grid.height,
            });
        }
        if self.grid.cell_size <= Fixed::ZERO {
            errors.push(LevelValidationError::NonPositiveCellSize);
        }
        if self.move_speed <= Fixed::ZERO {
            errors.push(LevelValidationError::NonPositiveMoveSpeed);
        }
        if self.world_too_large() {
            errors.push(LevelValidationError::WorldTooLarge {
                width: self.grid.width,
                height: self.grid.height,
                cell_size: self.grid.cell_size,
            });
        }

        let mut seen_ids = HashSet::new();
        let mut starts: BTreeMap<GridCell, &str> = BTreeMap::new();
        for agent in &self.agents {
            if !seen_ids.insert(agent.id.as_str()) {
                errors.push(LevelValidationError::DuplicateAgentId(agent.id.clone()));
            }
            if let Some(first) = starts.insert(agent.start, &agent.id) {
                errors.push(LevelValidationError::SharedStartCell {
                    first: first.to_string(),
                    second: agent.id.clone(),
                    cell: agent.start,
                });
            }
            if agent.move_budget == 0 {
                errors.push(LevelValidationError::ZeroMoveBudget(agent.id.clone()));
            }
            if let Some(index) = agent.goal {
                if index >= self.goals.len() {
                    errors.push(LevelValidationError::GoalIndexOutOfRange {
                        agent: agent.id.clone(),
                        index,
                        goal_count: self.goals.len(),
                    });
                }
            }
        }

        for (index, goal) in self.goals.iter().enumerate() {
            for agent in &goal.agents {
                if !seen_ids.contains(agent.as_str()) {
                    errors.push(LevelValidationError::UnknownAssignedAgent {
                        index,
                        agent: agent.clone(),
                    });
                }
            }
        }

        let Some(grid) = self.build_grid() else {
            return errors;
        };

        for agent in &self.agents {
            if !grid.is_walkable(agent.start) {
                errors.push(LevelValidationError::StartNotWalkable {
                    agent: agent.id.clone(),
                    cell: agent.start,
                });
            }
        }
        for (index, goal) in self.goals.iter().enumerate() {
            if !grid.is_walkable(goal.cell) {
                errors.push(LevelValidationError::GoalNotWalkable {
                    index,
                    cell: goal.cell,
                });
            }
        }

        let goals = self.build_goals();
        for agent in &self.agents {
            let id = AgentId::new(agent.id.as_str());
            let eligible: Vec<&Goal> = goals.iter().filter(|g| g.is_eligible(&id)).collect();
            if eligible.is_empty() {
                errors.push(LevelValidationError::NoUsableGoal(agent.id.clone()));
                continue;
            }
            if !grid.is_walkable(agent.start) {
                continue;
            }
            let reachable = flood_fill(&grid, agent.start);
            if !eligible.iter().any(|g| reachable.contains(&g.cell)) {
                errors.push(LevelValidationError::UnreachableGoal(agent.id.clone()));
            }
        }

        errors
    }

    /// True if some world coordinate of the grid lies outside
    /// `±MAX_WORLD_EXTENT`, where squared distances stop fitting `Fixed`.
    fn world_too_large(&self) -> bool {
        let limit = Fixed::from_num(MAX_WORLD_EXTENT);
        let outside = |value: Fixed| value < -limit || value > limit;
        let axis = |origin: Fixed, cells: i32| {
            let span = Fixed::checked_from_num(cells.max(0))
                .and_then(|n| n.checked_mul(self.grid.cell_size.max(Fixed::ZERO)));
            match span.and_then(|span| origin.checked_add(span)) {
                Some(end) => outside(origin) || outside(end),
                None => true,
            }
        };
        axis(self.grid.origin_x, self.grid.width) || axis(self.grid.origin_y, self.grid.height)
    }

    /// Build the grid, or `None` if its dimensions are unusable.
    fn build_grid(&self) -> Option<GridMap> {
        if self.grid.width <= 0
            || self.grid.height <= 0
            || self.grid.cell_size <= Fixed::ZERO
            || self.world_too_large()
        {
            return None;
        }
        let mut grid = GridMap::new(
            self.grid.width as u32,
            self.grid.height as u32,
            self.grid.cell_size,
            Vec2Fixed::new(self.grid.origin_x, self.grid.origin_y),
        );
        if self.all_walkable {
            for y in 0..self.grid.height {
                for x in 0..self.grid.width {
                    grid.set_cell(GridCell::new(x, y), CellType::Walkable);
                }
            }
        } else {
            for &tile in &self.tiles {
                if !grid.set_cell(tile, CellType::Walkable) {
                    tracing::warn!(cell = %tile, "Ignoring tile outside the grid");
                }
            }
        }
        Some(grid)
    }

    /// Goals with their assignments resolved.
    ///
    /// An agent with an explicit goal index is assigned to that goal only.
    /// Any other agent is assigned to every `Shared` and `Single` goal.
    fn build_goals(&self) -> Vec<Goal> {
        let mut goals: Vec<Goal> = self
            .goals
            .iter()
            .enumerate()
            .map(|(index, data)| {
                let mut goal = Goal::new(index, data.cell, data.goal_type);
                goal.assigned = data.agents.iter().map(|id| AgentId::new(id.as_str())).collect();
                goal
            })
            .collect();

        for agent in &self.agents {
            let id = AgentId::new(agent.id.as_str());
            match agent.goal {
                Some(index) => {
                    if let Some(goal) = goals.get_mut(index) {
                        goal.assigned.insert(id);
                    }
                }
                None => {
                    for goal in goals
                        .iter_mut()
                        .filter(|g| matches!(g.goal_type, GoalType::Shared | GoalType::Single))
                    {
                        goal.assigned.insert(id.clone());
                    }
                }
            }
        }
        goals
    }
}

/// Cells reachable from `start` by axis-aligned moves over walkable tiles.
fn flood_fill(grid: &GridMap, start: GridCell) -> BTreeSet<GridCell> {
    let mut visited = BTreeSet::new();
    let mut queue = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);

    while let Some(cell) = queue.pop_front() {
        for direction in Direction::ALL {
            let next = cell.offset(direction, 1);
            if grid.is_walkable(next) && visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
    visited
}

/// A validated level and the runtime state of its agents and goals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelContext {
    name: String,
    grid: GridMap,
    agents: Vec<Agent>,
    goals: Vec<Goal>,
    move_speed: Fixed,
}

impl LevelContext {
    /// Validate level data and build a context from it.
    ///
    /// Refuses the level with [`GameError::InvalidLevel`] listing every
    /// failed invariant.
    pub fn load(data: &LevelData) -> Result<Self> {
        let errors = data.validate();
        if !errors.is_empty() {
            tracing::warn!(level = %data.name, errors = errors.len(), "Level failed validation");
            return Err(GameError::InvalidLevel(errors));
        }

        let grid = data
            .build_grid()
            .ok_or_else(|| GameError::InvalidState("grid rejected after validation".into()))?;
        let agents = data
            .agents
            .iter()
            .map(|a| Agent::new(AgentId::new(a.id.as_str()), a.start, a.move_budget, a.color))
            .collect();

        let context = Self {
            name: data.name.clone(),
            grid,
            agents,
            goals: data.build_goals(),
            move_speed: data.move_speed,
        };
        tracing::info!(
            level = %context.name,
            agents = context.agents.len(),
            goals = context.goals.len(),
            "Level loaded"
        );
        Ok(context)
    }

    /// Parse, validate and load a level from a RON string.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        Self::load(&LevelData::from_ron_str(source)?)
    }

    /// Read, validate and load a level file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::load(&LevelData::from_file(path)?)
    }

    /// Level name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The grid mapper.
    #[must_use]
    pub fn grid(&self) -> &GridMap {
        &self.grid
    }

    /// Agent speed in world units per second.
    #[must_use]
    pub fn move_speed(&self) -> Fixed {
        self.move_speed
    }

    /// All agents in level order.
    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Agent ids in level order.
    pub fn agent_ids(&self) -> impl Iterator<Item = &AgentId> {
        self.agents.iter().map(|a| &a.id)
    }

    pub(crate) fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    /// Look up an agent.
    #[must_use]
    pub fn agent(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| &a.id == id)
    }

    /// Look up an agent, failing with [`GameError::UnknownAgent`].
    pub fn require_agent(&self, id: &AgentId) -> Result<&Agent> {
        self.agent(id)
            .ok_or_else(|| GameError::UnknownAgent(id.to_string()))
    }

    /// Mutable agent lookup, failing with [`GameError::UnknownAgent`].
    pub fn agent_mut(&mut self, id: &AgentId) -> Result<&mut Agent> {
        self.agents
            .iter_mut()
            .find(|a| &a.id == id)
            .ok_or_else(|| GameError::UnknownAgent(id.to_string()))
    }

    /// All goals in level order.
    #[must_use]
    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    /// Goals sitting on `cell`.
    pub fn goals_at(&self, cell: GridCell) -> impl Iterator<Item = &Goal> {
        self.goals.iter().filter(move |g| g.cell == cell)
    }

    /// Agent id to the indices of every goal the agent is eligible for.
    #[must_use]
    pub fn assignments(&self) -> BTreeMap<AgentId, Vec<usize>> {
        self.agents
            .iter()
            .map(|agent| {
                let indices = self
                    .goals
                    .iter()
                    .filter(|g| g.is_eligible(&agent.id))
                    .map(|g| g.index)
                    .collect();
                (agent.id.clone(), indices)
            })
            .collect()
    }

    /// Claim the goal on `cell` for `agent`, if it is an individual goal
    /// the agent may use.
    pub fn claim_goal_at(&mut self, cell: GridCell, agent: &AgentId) {
        if let Some(goal) = self
            .goals
            .iter_mut()
            .find(|g| g.cell == cell && g.can_use(agent))
        {
            goal.claim(agent);
        }
    }

    /// Release every goal claimed by `agent`.
    pub fn release_claims(&mut self, agent: &AgentId) {
        for goal in &mut self.goals {
            goal.release(agent);
        }
    }

    /// Restore every agent and goal to its freshly loaded state.
    pub fn reset(&mut self) {
        for agent in &mut self.agents {
            agent.reset();
        }
        for goal in &mut self.goals {
            goal.claimed_by = None;
        }
    }
}
