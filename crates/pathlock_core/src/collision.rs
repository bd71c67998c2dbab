//! Collision prediction over agent timelines, batch and live.
//!
//! Batch prediction samples every committed path ahead of time and is the
//! ground truth. The live monitor applies the same distance rule and goal
//! exclusion to positions reported during playback.

use std::collections::BTreeSet;

use crate::agent::AgentId;
use crate::grid::GridCell;
use crate::level::LevelContext;
use crate::math::{Fixed, Vec2Fixed};
use crate::timeline::{interpolated_position_at, simulate, MotionSettings, Timeline};

/// Informational label for how close two agents got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollisionKind {
    /// Effectively on top of each other.
    SameTile,
    /// Within the collision threshold.
    CloseProximity,
}

/// Two or more agents coming too close while moving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionEvent {
    /// Seconds since motion started.
    pub time: Fixed,
    /// Grid cell nearest to the contact point.
    pub cell: GridCell,
    /// Midpoint between the agents.
    pub point: Vec2Fixed,
    /// Involved agents, sorted.
    pub agents: Vec<AgentId>,
    /// Distance between the agents.
    pub distance: Fixed,
    /// Proximity label.
    pub kind: CollisionKind,
}

impl std::fmt::Display for CollisionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.agents.iter().map(AgentId::as_str).collect();
        write!(f, "Agents {} collided at {}", names.join(", "), self.cell)
    }
}

/// Unordered pair of agent ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentPair(AgentId, AgentId);

impl AgentPair {
    /// Normalize `a` and `b` into a pair.
    #[must_use]
    pub fn new(a: &AgentId, b: &AgentId) -> Self {
        if a <= b {
            Self(a.clone(), b.clone())
        } else {
            Self(b.clone(), a.clone())
        }
    }
}

/// Agent state read at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSnapshot {
    /// Agent id.
    pub agent: AgentId,
    /// World position.
    pub position: Vec2Fixed,
    /// Whether the agent is still travelling.
    pub moving: bool,
}

/// Turn a close pair into an event, or `None` if they are far enough
/// apart or meeting on a goal both may use.
fn detect_pair(
    level: &LevelContext,
    settings: &MotionSettings,
    time: Fixed,
    a: (&AgentId, Vec2Fixed),
    b: (&AgentId, Vec2Fixed),
) -> Option<CollisionEvent> {
    let cell_size = level.grid().cell_size();
    let distance = a.1.distance(b.1);
    if distance >= settings.collision_threshold * cell_size {
        return None;
    }
    let point = a.1.midpoint(b.1);
    let cell = level.grid().to_grid(point);
    if is_shared_goal(level, cell, &[a.0, b.0]) {
        return None;
    }
    let kind = if distance < settings.same_tile_threshold * cell_size {
        CollisionKind::SameTile
    } else {
        CollisionKind::CloseProximity
    };
    let mut agents = vec![a.0.clone(), b.0.clone()];
    agents.sort();
    Some(CollisionEvent {
        time,
        cell,
        point,
        agents,
        distance,
        kind,
    })
}

/// True if `cell` holds a goal every agent in `agents` may use.
fn is_shared_goal(level: &LevelContext, cell: GridCell, agents: &[&AgentId]) -> bool {
    level
        .goals_at(cell)
        .any(|goal| agents.iter().all(|agent| goal.can_use(agent)))
}

/// Simulate every path, sorted by agent id.
fn timelines(
    level: &LevelContext,
    paths: &[(AgentId, Vec<GridCell>)],
    settings: &MotionSettings,
) -> Vec<(AgentId, Timeline)> {
    let mut timelines: Vec<(AgentId, Timeline)> = paths
        .iter()
        .map(|(id, path)| (id.clone(), simulate(level.grid(), path, settings)))
        .collect();
    timelines.sort_by(|a, b| a.0.cmp(&b.0));
    timelines
}

/// Shared sample times: every native sample time plus a coarse grid up to
/// the longest duration.
fn sample_times(timelines: &[(AgentId, Timeline)], coarse_interval: Fixed) -> BTreeSet<Fixed> {
    let mut times: BTreeSet<Fixed> = timelines
        .iter()
        .flat_map(|(_, t)| t.samples().iter().map(|s| s.time))
        .collect();
    let longest = timelines
        .iter()
        .map(|(_, t)| t.duration())
        .max()
        .unwrap_or(Fixed::ZERO);
    if coarse_interval > Fixed::ZERO {
        let mut t = Fixed::ZERO;
        while t <= longest {
            times.insert(t);
            t += coarse_interval;
        }
    }
    times
}

/// Every first collision per agent pair, in time order.
///
/// Only pairs where both agents are still moving are checked.
#[must_use]
pub fn predict_all(
    level: &LevelContext,
    paths: &[(AgentId, Vec<GridCell>)],
    settings: &MotionSettings,
) -> Vec<CollisionEvent> {
    let timelines = timelines(level, paths, settings);
    let mut seen = BTreeSet::new();
    let mut events = Vec::new();

    for time in sample_times(&timelines, settings.coarse_interval) {
        let moving: Vec<(&AgentId, Vec2Fixed)> = timelines
            .iter()
            .filter(|(_, timeline)| timeline.is_moving_at(time))
            .filter_map(|(id, timeline)| interpolated_position_at(timeline, time).map(|p| (id, p)))
            .collect();

        for (i, a) in moving.iter().enumerate() {
            for b in &moving[i + 1..] {
                let pair = AgentPair::new(a.0, b.0);
                if seen.contains(&pair) {
                    continue;
                }
                if let Some(event) = detect_pair(level, settings, time, *a, *b) {
                    seen.insert(pair);
                    events.push(event);
                }
            }
        }
    }

    events.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.agents.cmp(&b.agents)));
    events
}

/// Earliest collision between any two agents, if any.
#[must_use]
pub fn predict(
    level: &LevelContext,
    paths: &[(AgentId, Vec<GridCell>)],
    settings: &MotionSettings,
) -> Option<CollisionEvent> {
    let event = predict_all(level, paths, settings).into_iter().next();
    if let Some(ref event) = event {
        tracing::debug!(time = %event.time, cell = %event.cell, "Predicted collision: {event}");
    }
    event
}

/// Collision checks during playback.
///
/// Each unordered pair is reported at most once per attempt.
#[derive(Debug, Clone, Default)]
pub struct LiveCollisionMonitor {
    reported: BTreeSet<AgentPair>,
}

impl LiveCollisionMonitor {
    /// Create a monitor with no reported pairs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check every pair of moving agents and return the first new collision.
    pub fn poll(
        &mut self,
        level: &LevelContext,
        settings: &MotionSettings,
        time: Fixed,
        snapshots: &[AgentSnapshot],
    ) -> Option<CollisionEvent> {
        let mut moving: Vec<&AgentSnapshot> = snapshots.iter().filter(|s| s.moving).collect();
        moving.sort_by(|a, b| a.agent.cmp(&b.agent));

        for (i, a) in moving.iter().enumerate() {
            for b in &moving[i + 1..] {
                let pair = AgentPair::new(&a.agent, &b.agent);
                if self.reported.contains(&pair) {
                    continue;
                }
                let found = detect_pair(
                    level,
                    settings,
                    time,
                    (&a.agent, a.position),
                    (&b.agent, b.position),
                );
                if let Some(event) = found {
                    self.reported.insert(pair);
                    return Some(event);
                }
            }
        }
        None
    }

    /// Accept an externally detected proximity between `a` and `b` at
    /// `point`.
    ///
    /// Applies the same goal exclusion and pair deduplication as
    /// [`Self::poll`]; the distance check is left to the reporter.
    pub fn report(
        &mut self,
        level: &LevelContext,
        time: Fixed,
        a: &AgentId,
        b: &AgentId,
        point: Vec2Fixed,
    ) -> Option<CollisionEvent> {
        if a == b {
            return None;
        }
        let cell = level.grid().to_grid(point);
        if is_shared_goal(level, cell, &[a, b]) {
            return None;
        }
        if !self.reported.insert(AgentPair::new(a, b)) {
            return None;
        }
        let mut agents = vec![a.clone(), b.clone()];
        agents.sort();
        Some(CollisionEvent {
            time,
            cell,
            point,
            agents,
            distance: Fixed::ZERO,
            kind: CollisionKind::SameTile,
        })
    }

    /// Whether `a` and `b` were already reported this attempt.
    #[must_use]
    pub fn has_reported(&self, a: &AgentId, b: &AgentId) -> bool {
        self.reported.contains(&AgentPair::new(a, b))
    }

    /// Forget every reported pair.
    pub fn clear(&mut self) {
        self.reported.clear();
    }
}
