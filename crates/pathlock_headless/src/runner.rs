//! Headless session runner.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use pathlock_core::agent::AgentId;
use pathlock_core::collision::CollisionEvent;
use pathlock_core::error::{GameError, Result as GameResult};
use pathlock_core::grid::GridCell;
use pathlock_core::legality::RejectReason;
use pathlock_core::level::LevelContext;
use pathlock_core::math::Fixed;
use pathlock_core::orchestrator::{GameObserver, MoveOrchestrator, Phase};
use pathlock_core::timeline::MotionSettings;
use serde::{Deserialize, Serialize};

use crate::protocol::{to_f64, AgentState, CollisionOutput, Command, Response};
use crate::scenario::{Expectation, Outcome, Scenario, ScenarioError};

/// Observer that queues orchestrator callbacks for the protocol.
#[derive(Debug, Default)]
pub struct EventLog {
    pending: Vec<Observed>,
    rejected: u32,
}

#[derive(Debug, Clone)]
enum Observed {
    Abort(CollisionEvent),
    Cleared,
    GameOver(String),
}

impl EventLog {
    /// Selections refused so far.
    #[must_use]
    pub fn rejected(&self) -> u32 {
        self.rejected
    }

    fn drain(&mut self) -> Vec<Observed> {
        std::mem::take(&mut self.pending)
    }
}

impl GameObserver for EventLog {
    fn on_invalid_selection(&mut self, agent: &AgentId, cell: GridCell, reason: RejectReason) {
        tracing::debug!(%agent, %cell, %reason, "Selection refused");
        self.rejected += 1;
    }

    fn on_abort(&mut self, event: &CollisionEvent) {
        self.pending.push(Observed::Abort(event.clone()));
    }

    fn on_level_cleared(&mut self) {
        self.pending.push(Observed::Cleared);
    }

    fn on_game_over(&mut self, message: &str) {
        self.pending.push(Observed::GameOver(message.to_string()));
    }
}

/// Headless runner configuration.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Output state after every tick (vs only on query).
    pub auto_state_output: bool,
    /// Level file to load on startup.
    pub level_path: Option<PathBuf>,
    /// Ticks per second when a `tick` command gives no `dt`.
    pub tick_rate: u32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            auto_state_output: false,
            level_path: None,
            tick_rate: 60,
        }
    }
}

type Session = MoveOrchestrator<EventLog>;

/// Headless runner for controller-driven play.
pub struct HeadlessRunner {
    config: HeadlessConfig,
    session: Option<Session>,
    ticks: u64,
}

impl HeadlessRunner {
    /// Create a new headless runner with default config.
    pub fn new() -> Self {
        Self::with_config(HeadlessConfig::default())
    }

    /// Create a runner with custom configuration.
    pub fn with_config(config: HeadlessConfig) -> Self {
        Self {
            config,
            session: None,
            ticks: 0,
        }
    }

    /// The active session, if a level is loaded.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Ticks processed since the runner started.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Start a fresh session on `level`.
    pub fn load_level(&mut self, level: LevelContext) -> GameResult<Response> {
        let name = level.name().to_string();
        let agents = level.agent_ids().map(ToString::to_string).collect();
        self.session = Some(MoveOrchestrator::with_observer(level, MotionSettings::default(), EventLog::default())?);
        tracing::info!(level = %name, "Level loaded");
        Ok(Response::LevelLoaded { name, agents })
    }

    fn tick_dt(&self, dt: Option<f64>) -> Fixed {
        dt.and_then(Fixed::checked_from_num)
            .unwrap_or_else(|| Fixed::ONE / Fixed::from_num(self.config.tick_rate.max(1)))
    }

    /// Apply one command and return every response it produced.
    pub fn handle(&mut self, cmd: Command) -> Vec<Response> {
        let name = cmd.name();
        match self.try_handle(cmd) {
            Ok(responses) => responses,
            Err(e) => {
                tracing::warn!(cmd = name, "Command failed: {e}");
                vec![Response::error(e.to_string(), Some(name))]
            }
        }
    }

    fn try_handle(&mut self, cmd: Command) -> GameResult<Vec<Response>> {
        if let Command::LoadLevel { path } = &cmd {
            let level = LevelContext::from_file(Path::new(path))?;
            return Ok(vec![self.load_level(level)?]);
        }
        if matches!(cmd, Command::Quit) {
            return Ok(vec![Response::Bye]);
        }

        let auto_state = self.config.auto_state_output;
        let dt = match &cmd {
            Command::Tick { dt, .. } => self.tick_dt(*dt),
            _ => Fixed::ZERO,
        };
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| GameError::InvalidState("no level loaded".to_string()))?;

        let mut responses = Vec::new();
        match cmd {
            Command::Select { agent, x, y } => {
                let id = AgentId::new(agent.as_str());
                let cell = GridCell::new(x, y);
                let before = session.phase();
                let outcome = session.select_cell(&id, cell)?;
                responses.push(Response::selection(&agent, cell, outcome, remaining(session, &id)?));
                if before == Phase::SelectingPaths && session.phase() == Phase::AllPathsReady {
                    responses.push(Response::PathsReady {
                        predicted: session.predicted_collision().map(CollisionOutput::from),
                    });
                }
            }
            Command::Undo { agent } => {
                let id = AgentId::new(agent.as_str());
                let start = session.level().require_agent(&id)?.start;
                let cell = session.paths().draft(&id).last().copied().unwrap_or(start);
                let outcome = session.undo_last_selection(&id)?;
                responses.push(Response::selection(&agent, cell, outcome, remaining(session, &id)?));
            }
            Command::Legal { agent } => {
                let cells = session.legal_next_selections(&AgentId::new(agent.as_str()))?;
                responses.push(Response::Legal {
                    agent,
                    cells: cells.into_iter().map(Into::into).collect(),
                });
            }
            Command::Start => {
                session.start_motion()?;
                responses.push(Response::Started {
                    clock: to_f64(session.clock()),
                });
            }
            Command::Tick { count, .. } => {
                for _ in 0..count {
                    let events = session.tick(dt);
                    self.ticks += 1;
                    if events.started {
                        responses.push(Response::Started {
                            clock: to_f64(session.clock()),
                        });
                    }
                    responses.extend(translate(session));
                    if auto_state {
                        responses.push(state(session));
                    }
                    if session.phase().is_terminal() {
                        break;
                    }
                }
                responses.push(Response::ack("tick"));
            }
            Command::Query => responses.push(state(session)),
            Command::Predict => responses.push(Response::Prediction {
                predicted: session.predicted_collision().map(CollisionOutput::from),
            }),
            Command::Restart => {
                session.restart_level();
                responses.push(Response::Restarted {
                    attempt: session.attempt(),
                });
            }
            Command::Hash => responses.push(Response::StateHash {
                hash: session.state_hash(),
            }),
            Command::LoadLevel { .. } | Command::Quit => {}
        }
        Ok(responses)
    }

    /// Run the session loop over `input` and `output`.
    ///
    /// Writes a ready line, then one batch of responses per command line,
    /// until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(mut self, input: R, mut output: W) -> io::Result<()> {
        if let Some(path) = self.config.level_path.clone() {
            let loaded = LevelContext::from_file(&path).and_then(|level| self.load_level(level));
            if let Err(e) = loaded {
                tracing::error!("Failed to load {}: {e}", path.display());
                output.write_all(Response::error(e.to_string(), Some("load_level")).to_json_line().as_bytes())?;
            }
        }
        let level = self.session.as_ref().map(|s| s.level().name().to_string());
        output.write_all(Response::ready(level.as_deref()).to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let responses = match Command::from_json(line) {
                Ok(cmd) => self.handle(cmd),
                Err(e) => vec![Response::error(format!("Parse error: {e}"), None)],
            };
            let quit = responses.iter().any(|r| matches!(r, Response::Bye));
            for response in &responses {
                output.write_all(response.to_json_line().as_bytes())?;
            }
            output.flush()?;
            if quit {
                break;
            }
        }
        tracing::info!(ticks = self.ticks, "Session ended");
        Ok(())
    }

    /// Run the session loop on stdin and stdout.
    pub fn run_stdio(self) -> io::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run(stdin.lock(), stdout.lock())
    }
}

impl Default for HeadlessRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn remaining(session: &Session, agent: &AgentId) -> GameResult<u32> {
    Ok(session.level().require_agent(agent)?.remaining_budget)
}

fn state(session: &Session) -> Response {
    let frames = session.frames();
    let agents = frames
        .iter()
        .filter_map(|frame| {
            let agent = session.level().agent(&frame.agent)?;
            Some(AgentState::from_frame(
                frame,
                agent.completed,
                agent.remaining_budget,
                session.paths().draft(&frame.agent),
            ))
        })
        .collect();
    Response::State {
        phase: session.phase().to_string(),
        attempt: session.attempt(),
        clock: to_f64(session.clock()),
        agents,
        hash: session.state_hash(),
    }
}

/// Turn queued observer callbacks into responses.
fn translate(session: &mut Session) -> Vec<Response> {
    let clock = to_f64(session.clock());
    session
        .observer_mut()
        .drain()
        .into_iter()
        .map(|observed| match observed {
            Observed::Abort(event) => Response::Collision(CollisionOutput::from(&event)),
            Observed::Cleared => Response::LevelCleared { clock },
            Observed::GameOver(message) => Response::GameOver { message, clock },
        })
        .collect()
}

// ============================================================================
// Scenarios
// ============================================================================

/// Result of playing a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    /// Scenario name.
    pub scenario: String,
    /// How the attempt ended.
    pub outcome: Outcome,
    /// Batch prediction taken when every path was committed.
    pub predicted: Option<CollisionOutput>,
    /// Collision that aborted the attempt.
    pub collision: Option<CollisionOutput>,
    /// Seconds of motion played.
    pub clock: f64,
    /// Ticks played, including the start delay.
    pub ticks: u64,
    /// Selections the level refused.
    pub rejected_selections: u32,
    /// Final state hash.
    pub hash: u64,
}

impl ScenarioOutcome {
    /// Whether this result satisfies `expect`.
    #[must_use]
    pub fn meets(&self, expect: &Expectation) -> bool {
        if self.outcome != expect.outcome {
            return false;
        }
        match (expect.collision_cell, &self.collision) {
            (Some(cell), Some(hit)) => (hit.x, hit.y) == (cell.x, cell.y),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

/// Play `scenario` to the end.
///
/// Level files resolve against `base_dir` when given.
pub fn run_scenario(scenario: &Scenario, base_dir: Option<&Path>) -> Result<ScenarioOutcome, ScenarioError> {
    let level = scenario.load_level(base_dir)?;
    let mut session = MoveOrchestrator::with_observer(level, MotionSettings::default(), EventLog::default())?;

    for selections in &scenario.selections {
        let id = AgentId::new(selections.agent.as_str());
        for &cell in &selections.cells {
            session.select_cell(&id, cell)?;
        }
    }

    let predicted = session.predicted_collision().map(CollisionOutput::from);
    let tick_rate = scenario.tick_rate.max(1);
    let dt = Fixed::ONE / Fixed::from_num(tick_rate);
    let max_ticks = u64::from(scenario.max_seconds) * u64::from(tick_rate);
    let mut ticks = 0;

    if session.phase() == Phase::AllPathsReady {
        while ticks < max_ticks && !session.phase().is_terminal() {
            session.tick(dt);
            ticks += 1;
        }
    }

    let outcome = match session.phase() {
        Phase::Completed => Outcome::Cleared,
        Phase::Aborted => Outcome::Collided,
        Phase::SelectingPaths => Outcome::Incomplete,
        Phase::AllPathsReady | Phase::Moving => Outcome::TimedOut,
    };
    tracing::info!(scenario = %scenario.name, ?outcome, ticks, "Scenario finished");

    Ok(ScenarioOutcome {
        scenario: scenario.name.clone(),
        outcome,
        predicted,
        collision: session.abort_event().map(CollisionOutput::from),
        clock: to_f64(session.clock()),
        ticks,
        rejected_selections: session.observer().rejected(),
        hash: session.state_hash(),
    })
}

/// Play `scenario` `runs` times and collect the final hashes.
pub fn verify_scenario(scenario: &Scenario, base_dir: Option<&Path>, runs: u32) -> Result<Vec<u64>, ScenarioError> {
    (0..runs)
        .map(|_| run_scenario(scenario, base_dir).map(|o| o.hash))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathlock_test_utils::fixtures::{convergence_level, crossing_level};

    fn runner_with(level: LevelContext) -> HeadlessRunner {
        let mut runner = HeadlessRunner::new();
        runner.load_level(level).unwrap();
        runner
    }

    fn select(agent: &str, x: i32, y: i32) -> Command {
        Command::Select {
            agent: agent.into(),
            x,
            y,
        }
    }

    #[test]
    fn test_commands_need_a_level() {
        let mut runner = HeadlessRunner::new();
        let responses = runner.handle(Command::Query);
        assert!(matches!(&responses[..], [Response::Error { cmd: Some(c), .. }] if c == "query"));
    }

    #[test]
    fn test_last_selection_reports_prediction() {
        let mut runner = runner_with(crossing_level());
        assert_eq!(runner.handle(select("a", 4, 1)).len(), 1);

        let responses = runner.handle(select("b", 2, 0));

        assert_eq!(responses.len(), 2);
        match &responses[1] {
            Response::PathsReady { predicted: Some(p) } => assert_eq!((p.x, p.y), (2, 1)),
            other => panic!("expected paths_ready, got {other:?}"),
        }
    }

    #[test]
    fn test_rejected_selection_is_not_an_error() {
        let mut runner = runner_with(crossing_level());
        let responses = runner.handle(select("a", 3, 1));
        match &responses[..] {
            [Response::Selection { outcome, reason, .. }] => {
                assert_eq!(outcome, "rejected");
                assert!(reason.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(runner.session().unwrap().observer().rejected(), 1);
    }

    #[test]
    fn test_tick_runs_until_game_over() {
        let mut runner = runner_with(crossing_level());
        runner.handle(select("a", 4, 1));
        runner.handle(select("b", 2, 0));

        let responses = runner.handle(Command::Tick { count: 600, dt: None });

        assert!(matches!(responses[0], Response::Started { .. }));
        assert!(responses.iter().any(|r| matches!(r, Response::Collision(c) if (c.x, c.y) == (2, 1))));
        assert!(responses.iter().any(
            |r| matches!(r, Response::GameOver { message, .. } if message == "Agents a, b collided at (2, 1)")
        ));
        assert!(matches!(responses.last(), Some(Response::Ack { .. })));
        assert!(runner.ticks() < 600);
    }

    #[test]
    fn test_undo_and_restart() {
        let mut runner = runner_with(crossing_level());
        runner.handle(select("a", 4, 1));

        let undo = runner.handle(Command::Undo { agent: "a".into() });
        assert!(matches!(&undo[..], [Response::Selection { outcome, x: 4, y: 1, remaining: 2, .. }] if outcome == "undone"));

        runner.handle(Command::Restart);
        assert_eq!(runner.session().unwrap().attempt(), 2);
    }

    #[test]
    fn test_phase_violation_reported_as_error() {
        let mut runner = runner_with(crossing_level());
        let responses = runner.handle(Command::Start);
        assert!(matches!(&responses[..], [Response::Error { message, .. }] if message.contains("Cannot start motion")));
    }

    #[test]
    fn test_run_loop_over_json_lines() {
        let input = [
            r#"{"cmd":"select","agent":"a","x":2,"y":0}"#,
            "not json",
            r#"{"cmd":"select","agent":"b","x":2,"y":0}"#,
            r#"{"cmd":"start"}"#,
            r#"{"cmd":"tick","count":300}"#,
            r#"{"cmd":"quit"}"#,
            r#"{"cmd":"query"}"#,
        ]
        .join("\n");
        let mut runner = HeadlessRunner::new();
        runner.load_level(convergence_level()).unwrap();
        let mut output = Vec::new();

        runner.run(input.as_bytes(), &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].contains(r#""type":"ready""#));
        assert!(lines[0].contains(r#""level":"convergence""#));
        assert!(text.contains("Parse error"));
        assert!(text.contains(r#""type":"level_cleared""#));
        assert!(lines.last().unwrap().contains(r#""type":"bye""#));
        assert!(!text.contains(r#""type":"state""#));
    }

    #[test]
    fn test_scenario_outcome_matches_expectation() {
        let scenario = Scenario::from_ron_str(
            r#"(
                name: "crossing",
                level: Inline((
                    grid: (width: 5, height: 5),
                    all_walkable: true,
                    agents: [
                        (id: "a", start: (0, 1), move_budget: 2, goal: Some(0)),
                        (id: "b", start: (2, 3), move_budget: 2, goal: Some(1)),
                    ],
                    goals: [
                        (cell: (4, 1), goal_type: Individual),
                        (cell: (2, 0), goal_type: Individual),
                    ],
                    move_speed: 1.0,
                )),
                selections: [
                    (agent: "a", cells: [(4, 1)]),
                    (agent: "b", cells: [(2, 0)]),
                ],
            )"#,
        )
        .unwrap();

        let outcome = run_scenario(&scenario, None).unwrap();

        assert_eq!(outcome.outcome, Outcome::Collided);
        assert_eq!(outcome.predicted.as_ref().map(|p| (p.x, p.y)), Some((2, 1)));
        assert!(outcome.meets(&Expectation {
            outcome: Outcome::Collided,
            collision_cell: Some(GridCell::new(2, 1)),
        }));
        assert!(!outcome.meets(&Expectation {
            outcome: Outcome::Cleared,
            collision_cell: None,
        }));

        let hashes = verify_scenario(&scenario, None, 3).unwrap();
        assert!(hashes.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_scenario_without_full_paths_is_incomplete() {
        let scenario = Scenario::from_ron_str(
            r#"(
                name: "half",
                level: Inline((
                    grid: (width: 5, height: 5),
                    all_walkable: true,
                    agents: [
                        (id: "a", start: (0, 0), move_budget: 2),
                        (id: "b", start: (2, 2), move_budget: 2),
                    ],
                    goals: [(cell: (2, 0), goal_type: Single)],
                )),
                selections: [(agent: "a", cells: [(2, 0)])],
            )"#,
        )
        .unwrap();

        let outcome = run_scenario(&scenario, None).unwrap();

        assert_eq!(outcome.outcome, Outcome::Incomplete);
        assert_eq!(outcome.ticks, 0);
    }
}
