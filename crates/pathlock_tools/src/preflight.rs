//! Pre-flight collision prediction for hand-written paths.
//!
//! Lets a level author try candidate solutions without playing them:
//! each path is checked for legality, simulated, and fed through the
//! batch predictor.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use pathlock_core::agent::AgentId;
use pathlock_core::collision::{predict_all, CollisionEvent};
use pathlock_core::error::{GameError, Result};
use pathlock_core::grid::GridCell;
use pathlock_core::legality::PathChecker;
use pathlock_core::level::LevelContext;
use pathlock_core::math::Fixed;
use pathlock_core::timeline::{total_move_time, MotionSettings};

/// A path given on the command line as `agent:x,y/x,y/...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathArg {
    /// Agent the path belongs to.
    pub agent: AgentId,
    /// Cells in order, starting at the agent's start cell.
    pub cells: Vec<GridCell>,
}

impl FromStr for PathArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (agent, cells) = s
            .split_once(':')
            .ok_or_else(|| format!("expected `agent:x,y/x,y`, got `{s}`"))?;
        if agent.is_empty() {
            return Err(format!("missing agent id in `{s}`"));
        }
        let cells = cells
            .split('/')
            .map(|pair| {
                let (x, y) = pair
                    .split_once(',')
                    .ok_or_else(|| format!("bad cell `{pair}`"))?;
                let x = x.trim().parse::<i32>().map_err(|e| format!("bad x in `{pair}`: {e}"))?;
                let y = y.trim().parse::<i32>().map_err(|e| format!("bad y in `{pair}`: {e}"))?;
                Ok(GridCell::new(x, y))
            })
            .collect::<std::result::Result<Vec<_>, String>>()?;
        Ok(Self {
            agent: AgentId::new(agent),
            cells,
        })
    }
}

/// Result of a pre-flight run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightReport {
    /// Level name.
    pub level: String,
    /// Travel time per agent.
    pub durations: BTreeMap<AgentId, Fixed>,
    /// Agents whose paths break a movement rule.
    pub illegal: Vec<AgentId>,
    /// Agents the level has but no path was given for.
    pub missing: Vec<AgentId>,
    /// Every predicted collision, first per pair, in time order.
    pub collisions: Vec<CollisionEvent>,
}

impl PreflightReport {
    /// Whether the given paths would clear the level.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.illegal.is_empty() && self.missing.is_empty() && self.collisions.is_empty()
    }
}

impl fmt::Display for PreflightReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Level: {}", self.level)?;
        for (agent, duration) in &self.durations {
            let flag = if self.illegal.contains(agent) { "  (illegal)" } else { "" };
            writeln!(f, "  {agent}: {:.2}s{flag}", duration.to_num::<f64>())?;
        }
        for agent in &self.missing {
            writeln!(f, "  {agent}: no path")?;
        }
        if self.collisions.is_empty() {
            write!(f, "No collision predicted")
        } else {
            for event in &self.collisions {
                writeln!(f, "  t={:.2}s  {event}", event.time.to_num::<f64>())?;
            }
            write!(f, "{} collision(s) predicted", self.collisions.len())
        }
    }
}

/// Check and predict `paths` on `level`.
///
/// # Errors
///
/// Returns [`GameError::UnknownAgent`] if a path names an agent the level
/// does not have, and propagates invalid motion settings.
pub fn preflight(level: &LevelContext, paths: &[PathArg], settings: &MotionSettings) -> Result<PreflightReport> {
    settings.validate()?;
    let checker = PathChecker::new(level);

    let mut durations = BTreeMap::new();
    let mut illegal = Vec::new();
    for path in paths {
        level.require_agent(&path.agent)?;
        if !checker.validate_path(&path.cells, &path.agent) {
            tracing::warn!(agent = %path.agent, "Path breaks a movement rule");
            illegal.push(path.agent.clone());
        }
        durations.insert(
            path.agent.clone(),
            total_move_time(level.grid(), &path.cells, settings),
        );
    }

    let missing = level
        .agent_ids()
        .filter(|id| !durations.contains_key(*id))
        .cloned()
        .collect();

    let pairs: Vec<(AgentId, Vec<GridCell>)> = paths
        .iter()
        .map(|p| (p.agent.clone(), p.cells.clone()))
        .collect();
    let collisions = predict_all(level, &pairs, settings);
    tracing::info!(collisions = collisions.len(), "Pre-flight prediction finished");

    Ok(PreflightReport {
        level: level.name().to_string(),
        durations,
        illegal,
        missing,
        collisions,
    })
}

/// Motion settings with the level's own speed.
#[must_use]
pub fn level_settings(level: &LevelContext) -> MotionSettings {
    MotionSettings::default().with_speed(level.move_speed())
}

/// Reject a path list that names one agent twice.
///
/// # Errors
///
/// Returns [`GameError::InvalidState`] naming the repeated agent.
pub fn check_unique_agents(paths: &[PathArg]) -> Result<()> {
    let mut seen = std::collections::BTreeSet::new();
    for path in paths {
        if !seen.insert(&path.agent) {
            return Err(GameError::InvalidState(format!(
                "more than one path given for agent {}",
                path.agent
            )));
        }
    }
    Ok(())
}
