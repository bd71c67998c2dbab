//! Test fixtures and helpers.
//!
//! Pre-built levels and a builder for consistent testing.

use fixed::types::I32F32;
use pathlock_core::prelude::*;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Shorthand for a grid cell.
#[must_use]
pub fn cell(x: i32, y: i32) -> GridCell {
    GridCell::new(x, y)
}

/// Builder for [`LevelData`].
///
/// Starts from an open grid with unit cells and speed 1.
///
/// ```ignore
/// let level = LevelBuilder::open(5, 5)
///     .agent("a", (0, 0), 2)
///     .agent("b", (2, 2), 2)
///     .goal((2, 0), GoalType::Single)
///     .load();
/// ```
#[derive(Debug, Clone)]
pub struct LevelBuilder {
    data: LevelData,
}

impl LevelBuilder {
    /// Level where every cell is walkable.
    #[must_use]
    pub fn open(width: i32, height: i32) -> Self {
        Self {
            data: LevelData {
                name: "fixture".to_string(),
                grid: GridData {
                    width,
                    height,
                    cell_size: fixed(1),
                    origin_x: fixed(0),
                    origin_y: fixed(0),
                },
                tiles: Vec::new(),
                all_walkable: true,
                agents: Vec::new(),
                goals: Vec::new(),
                move_speed: fixed(1),
            },
        }
    }

    /// Level name.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.data.name = name.to_string();
        self
    }

    /// Cell size in world units.
    #[must_use]
    pub fn cell_size(mut self, size: I32F32) -> Self {
        self.data.grid.cell_size = size;
        self
    }

    /// Agent speed.
    #[must_use]
    pub fn speed(mut self, speed: I32F32) -> Self {
        self.data.move_speed = speed;
        self
    }

    /// Remove the tiles at `holes`, switching to an explicit tile list.
    #[must_use]
    pub fn holes(mut self, holes: &[(i32, i32)]) -> Self {
        let (width, height) = (self.data.grid.width, self.data.grid.height);
        self.data.all_walkable = false;
        self.data.tiles = (0..height)
            .flat_map(|y| (0..width).map(move |x| cell(x, y)))
            .filter(|c| !holes.contains(&(c.x, c.y)))
            .collect();
        self
    }

    /// Add an agent that may use every shared and single goal.
    #[must_use]
    pub fn agent(mut self, id: &str, start: (i32, i32), budget: u32) -> Self {
        self.data.agents.push(AgentData {
            id: id.to_string(),
            start: start.into(),
            move_budget: budget,
            color: AgentColor::default(),
            goal: None,
        });
        self
    }

    /// Add an agent bound to the goal at `goal` index.
    #[must_use]
    pub fn agent_for(mut self, id: &str, start: (i32, i32), budget: u32, goal: usize) -> Self {
        self = self.agent(id, start, budget);
        if let Some(agent) = self.data.agents.last_mut() {
            agent.goal = Some(goal);
        }
        self
    }

    /// Add a goal.
    #[must_use]
    pub fn goal(mut self, at: (i32, i32), goal_type: GoalType) -> Self {
        self.data.goals.push(GoalData {
            cell: at.into(),
            goal_type,
            agents: Vec::new(),
        });
        self
    }

    /// The level data as built.
    #[must_use]
    pub fn build(self) -> LevelData {
        self.data
    }

    /// The level data as pretty RON.
    ///
    /// # Panics
    ///
    /// Panics if serialization fails.
    #[must_use]
    pub fn to_ron(&self) -> String {
        ron::ser::to_string_pretty(&self.data, ron::ser::PrettyConfig::default())
            .expect("level data serializes")
    }

    /// Validate and load the level.
    ///
    /// # Panics
    ///
    /// Panics if the level fails validation.
    #[must_use]
    pub fn load(self) -> LevelContext {
        LevelContext::load(&self.data).expect("fixture level is valid")
    }
}

/// Two agents whose paths cross at (2, 1) after two seconds.
///
/// `a` starts at (0, 1) bound to (4, 1); `b` starts at (2, 3) bound to (2, 0).
#[must_use]
pub fn crossing_level() -> LevelContext {
    LevelBuilder::open(5, 5)
        .name("crossing")
        .agent_for("a", (0, 1), 2, 0)
        .agent_for("b", (2, 3), 2, 1)
        .goal((4, 1), GoalType::Individual)
        .goal((2, 0), GoalType::Individual)
        .load()
}

/// Two agents converging on one shared goal at (2, 0).
#[must_use]
pub fn convergence_level() -> LevelContext {
    LevelBuilder::open(5, 5)
        .name("convergence")
        .agent("a", (0, 0), 2)
        .agent("b", (2, 2), 2)
        .goal((2, 0), GoalType::Single)
        .load()
}

/// Select `cells` for `agent` in order, returning the final outcome.
///
/// # Panics
///
/// Panics on a contract error (unknown agent, wrong phase).
pub fn select_all<O: GameObserver>(
    orch: &mut MoveOrchestrator<O>,
    agent: &str,
    cells: &[(i32, i32)],
) -> SelectionOutcome {
    let id = AgentId::new(agent);
    let mut outcome = SelectionOutcome::Rejected(RejectReason::NothingToUndo);
    for &(x, y) in cells {
        outcome = orch.select_cell(&id, cell(x, y)).expect("selection accepted by contract");
    }
    outcome
}

/// Tick at 60 Hz until the attempt ends or `max_seconds` pass.
///
/// Returns the number of ticks run.
pub fn run_to_end<O: GameObserver>(orch: &mut MoveOrchestrator<O>, max_seconds: u32) -> u64 {
    let dt = fixed(1) / fixed(60);
    let mut ticks = 0;
    while ticks < u64::from(max_seconds) * 60 && !orch.phase().is_terminal() {
        orch.tick(dt);
        ticks += 1;
    }
    ticks
}
