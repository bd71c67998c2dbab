//! The move orchestrator: path collection, simultaneous motion, and the
//! abort/complete outcome of an attempt.
//!
//! # Phases
//!
//! ```text
//! SelectingPaths -> AllPathsReady -> Moving -> Aborted
//!                                          \-> Completed
//! ```
//!
//! Terminal phases only leave through [`MoveOrchestrator::restart_level`].
//! The orchestrator is the single writer of phase and agent state. A
//! collision acts only while the phase is `Moving`, and the phase flips to
//! `Aborted` before anything else happens, so simultaneous reports collapse
//! into one abort.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::agent::AgentId;
use crate::collision::{predict, AgentSnapshot, CollisionEvent, LiveCollisionMonitor};
use crate::error::{GameError, Result};
use crate::grid::GridCell;
use crate::legality::{PathChecker, RejectReason};
use crate::level::LevelContext;
use crate::math::{Fixed, Vec2Fixed};
use crate::selection::{PathBook, SelectionOutcome};
use crate::timeline::{interpolated_position_at, simulate, MotionSettings, Timeline};

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Players are drawing paths.
    SelectingPaths,
    /// Every agent has a committed path; motion has not started.
    AllPathsReady,
    /// Agents are travelling.
    Moving,
    /// Two agents collided.
    Aborted,
    /// Every agent arrived.
    Completed,
}

impl Phase {
    /// True for `Aborted` and `Completed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Aborted | Self::Completed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Rendering state of one agent for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentFrame {
    /// Agent id.
    pub agent: AgentId,
    /// World position.
    pub position: Vec2Fixed,
    /// Last cell the agent stood on or passed.
    pub cell: GridCell,
    /// Whether the agent is travelling.
    pub moving: bool,
}

/// What happened during one [`MoveOrchestrator::tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Positions at the end of the tick.
    pub frames: Vec<AgentFrame>,
    /// Motion started this tick.
    pub started: bool,
    /// Waypoints reached this tick.
    pub arrivals: Vec<(AgentId, GridCell)>,
    /// The collision that aborted the attempt this tick.
    pub collision: Option<CollisionEvent>,
    /// Every agent arrived this tick.
    pub completed: bool,
}

/// Receiver for everything the presentation and level lifecycle layers
/// care about. Every method defaults to doing nothing.
pub trait GameObserver {
    /// Agent positions after a tick.
    fn on_frame(&mut self, _frames: &[AgentFrame]) {}

    /// A selection was refused.
    fn on_invalid_selection(&mut self, _agent: &AgentId, _cell: GridCell, _reason: RejectReason) {}

    /// The attempt was aborted by a collision.
    fn on_abort(&mut self, _event: &CollisionEvent) {}

    /// Every agent arrived without colliding.
    fn on_complete(&mut self) {}

    /// Level lifecycle: the level was solved.
    fn on_level_cleared(&mut self) {}

    /// Level lifecycle: the attempt failed.
    fn on_game_over(&mut self, _message: &str) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl GameObserver for NullObserver {}

/// Playback state of one agent.
#[derive(Debug, Clone)]
struct AgentMotion {
    path: Vec<GridCell>,
    timeline: Timeline,
    next_waypoint: usize,
    position: Vec2Fixed,
    moving: bool,
}

/// Runs a level from path selection through motion to its outcome.
#[derive(Debug)]
pub struct MoveOrchestrator<O: GameObserver = NullObserver> {
    level: LevelContext,
    settings: MotionSettings,
    observer: O,
    book: PathBook,
    phase: Phase,
    /// Seconds since motion started.
    clock: Fixed,
    /// Seconds spent in `AllPathsReady`.
    ready_time: Fixed,
    motions: BTreeMap<AgentId, AgentMotion>,
    monitor: LiveCollisionMonitor,
    prediction: Option<CollisionEvent>,
    abort_event: Option<CollisionEvent>,
    attempt: u32,
}

impl MoveOrchestrator<NullObserver> {
    /// Create an orchestrator with default motion settings and no observer.
    #[must_use]
    pub fn new(level: LevelContext) -> Self {
        let settings = MotionSettings::default().with_speed(level.move_speed());
        Self::build(level, settings, NullObserver)
    }
}

impl<O: GameObserver> MoveOrchestrator<O> {
    /// Create an orchestrator reporting to `observer`.
    ///
    /// The speed in `settings` is replaced by the level's move speed.
    pub fn with_observer(level: LevelContext, settings: MotionSettings, observer: O) -> Result<Self> {
        let settings = settings.with_speed(level.move_speed());
        settings.validate()?;
        Ok(Self::build(level, settings, observer))
    }

    fn build(level: LevelContext, settings: MotionSettings, observer: O) -> Self {
        Self {
            level,
            settings,
            observer,
            book: PathBook::new(),
            phase: Phase::SelectingPaths,
            clock: Fixed::ZERO,
            ready_time: Fixed::ZERO,
            motions: BTreeMap::new(),
            monitor: LiveCollisionMonitor::new(),
            prediction: None,
            abort_event: None,
            attempt: 1,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The level being played.
    #[must_use]
    pub fn level(&self) -> &LevelContext {
        &self.level
    }

    /// Motion settings in use.
    #[must_use]
    pub fn settings(&self) -> &MotionSettings {
        &self.settings
    }

    /// The observer.
    #[must_use]
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Mutable access to the observer.
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Draft and committed paths.
    #[must_use]
    pub fn paths(&self) -> &PathBook {
        &self.book
    }

    /// Seconds since motion started.
    #[must_use]
    pub fn clock(&self) -> Fixed {
        self.clock
    }

    /// Attempt counter, starting at 1 and bumped by every restart.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Batch prediction made when every path became ready.
    #[must_use]
    pub fn predicted_collision(&self) -> Option<&CollisionEvent> {
        self.prediction.as_ref()
    }

    /// The collision that aborted this attempt.
    #[must_use]
    pub fn abort_event(&self) -> Option<&CollisionEvent> {
        self.abort_event.as_ref()
    }

    fn require_phase(&self, expected: Phase, action: &'static str) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(GameError::PhaseViolation {
                action,
                phase: self.phase.to_string(),
            })
        }
    }

    /// Cells `agent` may legally select next.
    pub fn legal_next_selections(&self, agent: &AgentId) -> Result<Vec<GridCell>> {
        self.level.require_agent(agent)?;
        let checker = PathChecker::new(&self.level);
        Ok(checker.legal_next_selections(self.book.draft(agent), agent))
    }

    /// Apply a player's selection for `agent`.
    ///
    /// Illegal cells come back as [`SelectionOutcome::Rejected`]; only an
    /// unknown agent or the wrong phase is an error.
    pub fn select_cell(&mut self, agent: &AgentId, cell: GridCell) -> Result<SelectionOutcome> {
        self.require_phase(Phase::SelectingPaths, "select a cell")?;
        let outcome = self.book.select(&mut self.level, agent, cell)?;
        match outcome {
            SelectionOutcome::Rejected(reason) => {
                tracing::warn!(%agent, %cell, %reason, "Invalid selection");
                self.observer.on_invalid_selection(agent, cell, reason);
            }
            SelectionOutcome::Completed if self.book.all_committed(&self.level) => {
                self.enter_ready();
            }
            _ => {}
        }
        Ok(outcome)
    }

    /// Remove the most recent selection of `agent`.
    pub fn undo_last_selection(&mut self, agent: &AgentId) -> Result<SelectionOutcome> {
        self.require_phase(Phase::SelectingPaths, "undo a selection")?;
        self.book.undo(&mut self.level, agent)
    }

    fn committed_paths(&self) -> Vec<(AgentId, Vec<GridCell>)> {
        self.book
            .committed_paths()
            .iter()
            .map(|(id, path)| (id.clone(), path.clone()))
            .collect()
    }

    fn enter_ready(&mut self) {
        self.phase = Phase::AllPathsReady;
        self.ready_time = Fixed::ZERO;
        self.prediction = predict(&self.level, &self.committed_paths(), &self.settings);
        match &self.prediction {
            Some(event) => tracing::info!(time = %event.time, "All paths ready; predicted: {event}"),
            None => tracing::info!("All paths ready; no collision predicted"),
        }
    }

    /// Start moving every agent.
    pub fn start_motion(&mut self) -> Result<()> {
        self.require_phase(Phase::AllPathsReady, "start motion")?;
        self.begin_motion();
        Ok(())
    }

    fn begin_motion(&mut self) {
        #[cfg(feature = "debug-validation")]
        self.check_committed_paths();

        self.motions = self
            .book
            .committed_paths()
            .iter()
            .map(|(id, path)| {
                let timeline = simulate(self.level.grid(), path, &self.settings);
                let motion = AgentMotion {
                    position: self.level.grid().to_world(path[0]),
                    moving: !timeline.is_empty(),
                    path: path.clone(),
                    timeline,
                    next_waypoint: 0,
                };
                (id.clone(), motion)
            })
            .collect();
        self.clock = Fixed::ZERO;
        self.monitor.clear();
        self.phase = Phase::Moving;
        tracing::info!(attempt = self.attempt, agents = self.motions.len(), "Motion started");
    }

    #[cfg(feature = "debug-validation")]
    fn check_committed_paths(&self) {
        let checker = PathChecker::new(&self.level);
        for (id, path) in self.book.committed_paths() {
            let valid = checker.validate_path(path, id);
            if !valid {
                tracing::error!(agent = %id, "Committed path no longer validates");
            }
            debug_assert!(valid, "committed path for {id} failed validation");
        }
    }

    /// Advance the game by `dt` seconds.
    ///
    /// In `AllPathsReady` this counts down the start delay. In `Moving` the
    /// interval is split into substeps short enough that two agents closing
    /// at full speed cannot skip past each other between polls.
    pub fn tick(&mut self, dt: Fixed) -> TickEvents {
        let mut events = TickEvents::default();
        match self.phase {
            Phase::AllPathsReady => {
                if let Some(delay) = self.settings.start_delay {
                    self.ready_time += dt.max(Fixed::ZERO);
                    if self.ready_time >= delay.0 {
                        self.begin_motion();
                        events.started = true;
                    }
                }
            }
            Phase::Moving if dt > Fixed::ZERO => self.advance(dt, &mut events),
            _ => {}
        }
        events.frames = self.frames();
        self.observer.on_frame(&events.frames);
        events
    }

    /// Longest interval between two collision polls.
    ///
    /// Two agents closing head-on at peak speed cover at most half the
    /// collision threshold in this time.
    fn max_poll_step(&self) -> Fixed {
        let threshold = self.settings.collision_threshold * self.level.grid().cell_size();
        let peak_speed = self.settings.speed * self.settings.easing.peak_slope();
        let closing_speed = peak_speed * Fixed::from_num(2);
        let step = threshold
            .checked_div(Fixed::from_num(2) * closing_speed)
            .unwrap_or(Fixed::DELTA);
        step.max(Fixed::DELTA)
    }

    /// Advance in polls no longer than [`Self::max_poll_step`] until `dt`
    /// is used up or the attempt ends. Long ticks cost more polls, never
    /// coarser ones.
    fn advance(&mut self, dt: Fixed, events: &mut TickEvents) {
        let max_step = self.max_poll_step();
        let mut remaining = dt;

        while remaining > Fixed::ZERO {
            let step_dt = remaining.min(max_step);
            remaining -= step_dt;
            self.clock += step_dt;
            self.advance_motions(events);

            let snapshots: Vec<AgentSnapshot> = self
                .motions
                .iter()
                .map(|(id, m)| AgentSnapshot {
                    agent: id.clone(),
                    position: m.position,
                    moving: m.moving,
                })
                .collect();
            if let Some(event) = self.monitor.poll(&self.level, &self.settings, self.clock, &snapshots) {
                if self.abort(event.clone()) {
                    events.collision = Some(event);
                }
                return;
            }

            if self.motions.values().all(|m| !m.moving) {
                self.complete();
                events.completed = true;
                return;
            }
        }
    }

    fn advance_motions(&mut self, events: &mut TickEvents) {
        let clock = self.clock;
        for (id, motion) in &mut self.motions {
            if !motion.moving {
                continue;
            }
            if let Some(position) = interpolated_position_at(&motion.timeline, clock) {
                motion.position = position;
            }
            let arrivals = motion.timeline.arrivals();
            while motion.next_waypoint < arrivals.len() && arrivals[motion.next_waypoint] <= clock {
                motion.next_waypoint += 1;
                let cell = motion.path[motion.next_waypoint];
                events.arrivals.push((id.clone(), cell));
                tracing::debug!(agent = %id, %cell, "Waypoint reached");
            }
            motion.moving = motion.timeline.is_moving_at(clock);
            if !motion.moving {
                if let Some(end) = motion.timeline.final_position() {
                    motion.position = end;
                }
            }
        }

        for agent in self.level.agents_mut() {
            if let Some(motion) = self.motions.get(&agent.id) {
                agent.current_cell = motion.path[motion.next_waypoint];
            }
        }
    }

    /// Abort the attempt. Returns `false` if not currently `Moving`.
    fn abort(&mut self, event: CollisionEvent) -> bool {
        if self.phase != Phase::Moving {
            return false;
        }
        self.phase = Phase::Aborted;
        for motion in self.motions.values_mut() {
            motion.moving = false;
        }
        tracing::warn!(time = %event.time, cell = %event.cell, "Attempt aborted: {event}");
        let message = event.to_string();
        self.observer.on_abort(&event);
        self.observer.on_game_over(&message);
        self.abort_event = Some(event);
        true
    }

    fn complete(&mut self) {
        if self.phase != Phase::Moving {
            return;
        }
        self.phase = Phase::Completed;
        tracing::info!(attempt = self.attempt, time = %self.clock, "All agents arrived");
        self.observer.on_complete();
        self.observer.on_level_cleared();
    }

    /// Report a proximity between `a` and `b` detected outside the
    /// orchestrator's own polling.
    ///
    /// Ignored unless the phase is `Moving` and both agents are still
    /// travelling. Returns the event if it aborted the attempt.
    pub fn report_proximity(&mut self, a: &AgentId, b: &AgentId, point: Vec2Fixed) -> Result<Option<CollisionEvent>> {
        self.level.require_agent(a)?;
        self.level.require_agent(b)?;
        if self.phase != Phase::Moving {
            return Ok(None);
        }
        let moving = |id: &AgentId| self.motions.get(id).is_some_and(|m| m.moving);
        if !moving(a) || !moving(b) {
            return Ok(None);
        }
        let Some(event) = self.monitor.report(&self.level, self.clock, a, b, point) else {
            return Ok(None);
        };
        Ok(self.abort(event.clone()).then_some(event))
    }

    /// Start a fresh attempt: agents back on their start cells with full
    /// budgets, paths and goal claims discarded.
    pub fn restart_level(&mut self) {
        self.level.reset();
        self.book.clear();
        self.motions.clear();
        self.monitor.clear();
        self.clock = Fixed::ZERO;
        self.ready_time = Fixed::ZERO;
        self.prediction = None;
        self.abort_event = None;
        self.phase = Phase::SelectingPaths;
        self.attempt += 1;
        tracing::info!(attempt = self.attempt, level = %self.level.name(), "Level restarted");
    }

    /// Current frame of every agent, in level order.
    #[must_use]
    pub fn frames(&self) -> Vec<AgentFrame> {
        self.level
            .agents()
            .iter()
            .map(|agent| match self.motions.get(&agent.id) {
                Some(motion) => AgentFrame {
                    agent: agent.id.clone(),
                    position: motion.position,
                    cell: agent.current_cell,
                    moving: motion.moving,
                },
                None => AgentFrame {
                    agent: agent.id.clone(),
                    position: self.level.grid().to_world(agent.current_cell),
                    cell: agent.current_cell,
                    moving: false,
                },
            })
            .collect()
    }

    /// Hash of phase, clock and agent state.
    ///
    /// Two orchestrators fed the same level and inputs hash identically.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.phase.hash(&mut hasher);
        self.clock.to_bits().hash(&mut hasher);
        self.attempt.hash(&mut hasher);

        for agent in self.level.agents() {
            agent.id.hash(&mut hasher);
            agent.current_cell.hash(&mut hasher);
            agent.remaining_budget.hash(&mut hasher);
            agent.completed.hash(&mut hasher);
            self.book.draft(&agent.id).hash(&mut hasher);
            if let Some(motion) = self.motions.get(&agent.id) {
                motion.position.x.to_bits().hash(&mut hasher);
                motion.position.y.to_bits().hash(&mut hasher);
                motion.moving.hash(&mut hasher);
            }
        }

        if let Some(event) = &self.abort_event {
            event.time.to_bits().hash(&mut hasher);
            event.agents.hash(&mut hasher);
        }
        hasher.finish()
    }
}
