//! End-to-end puzzle scenarios driven through the public API.

use pathlock_core::prelude::*;
use pathlock_test_utils::fixtures::{
    cell, convergence_level, crossing_level, fixed, run_to_end, select_all, LevelBuilder,
};

#[derive(Debug, Default)]
struct Recorder {
    invalid: Vec<(AgentId, GridCell, RejectReason)>,
    aborts: Vec<CollisionEvent>,
    completions: u32,
    cleared: u32,
    game_over: Vec<String>,
}

impl GameObserver for Recorder {
    fn on_invalid_selection(&mut self, agent: &AgentId, cell: GridCell, reason: RejectReason) {
        self.invalid.push((agent.clone(), cell, reason));
    }

    fn on_abort(&mut self, event: &CollisionEvent) {
        self.aborts.push(event.clone());
    }

    fn on_complete(&mut self) {
        self.completions += 1;
    }

    fn on_level_cleared(&mut self) {
        self.cleared += 1;
    }

    fn on_game_over(&mut self, message: &str) {
        self.game_over.push(message.to_string());
    }
}

fn recording(level: LevelContext) -> MoveOrchestrator<Recorder> {
    MoveOrchestrator::with_observer(level, MotionSettings::default(), Recorder::default())
        .expect("default settings are valid")
}

/// Red at (0,0) budget 2 with a Single goal at (2,0); blue at (4,4) budget 3.
fn early_goal_level() -> LevelContext {
    LevelBuilder::open(5, 5)
        .agent("red", (0, 0), 2)
        .agent("blue", (4, 4), 3)
        .goal((2, 0), GoalType::Single)
        .load()
}

/// A at (0,0) bound to an Individual goal at (2,0); B at (2,2) bound to (4,4).
fn individual_goal_level() -> LevelContext {
    LevelBuilder::open(5, 5)
        .speed(fixed(2))
        .agent_for("a", (0, 0), 2, 0)
        .agent_for("b", (2, 2), 2, 1)
        .goal((2, 0), GoalType::Individual)
        .goal((4, 4), GoalType::Individual)
        .load()
}

fn converging_paths() -> Vec<(AgentId, Vec<GridCell>)> {
    vec![
        (AgentId::new("a"), vec![cell(0, 0), cell(2, 0)]),
        (AgentId::new("b"), vec![cell(2, 2), cell(2, 0)]),
    ]
}

#[test]
fn test_goal_reached_on_first_move_completes_path() {
    let mut orch = MoveOrchestrator::new(early_goal_level());
    let red = AgentId::new("red");

    let outcome = orch.select_cell(&red, cell(2, 0)).unwrap();

    assert_eq!(outcome, SelectionOutcome::Completed);
    let agent = orch.level().agent(&red).unwrap();
    assert!(agent.completed);
    assert_eq!(agent.remaining_budget, 1);
    assert_eq!(orch.paths().committed(&red), Some(&[cell(0, 0), cell(2, 0)][..]));
    assert_eq!(orch.phase(), Phase::SelectingPaths);
}

#[test]
fn test_remaining_two_rejects_cell_without_goal_in_sight() {
    let mut orch = recording(early_goal_level());
    let red = AgentId::new("red");

    let outcome = orch.select_cell(&red, cell(0, 3)).unwrap();

    assert_eq!(outcome, SelectionOutcome::Rejected(RejectReason::NoGoalInSight));
    assert_eq!(
        orch.observer().invalid,
        vec![(red.clone(), cell(0, 3), RejectReason::NoGoalInSight)]
    );
    assert_eq!(orch.paths().draft(&red), &[cell(0, 0)][..]);
    assert_eq!(orch.legal_next_selections(&red).unwrap(), vec![cell(1, 0), cell(2, 0)]);
}

#[test]
fn test_two_segment_path_through_goal_row() {
    let mut orch = MoveOrchestrator::new(early_goal_level());
    let red = AgentId::new("red");

    assert_eq!(
        orch.select_cell(&red, cell(1, 0)).unwrap(),
        SelectionOutcome::Extended { remaining: 1 }
    );
    assert_eq!(orch.legal_next_selections(&red).unwrap(), vec![cell(2, 0)]);
    assert_eq!(
        orch.select_cell(&red, cell(1, 3)).unwrap(),
        SelectionOutcome::Rejected(RejectReason::NotAGoal)
    );
    assert_eq!(orch.select_cell(&red, cell(2, 0)).unwrap(), SelectionOutcome::Completed);
}

#[test]
fn test_converging_paths_collide_at_individual_goal() {
    let level = individual_goal_level();
    let settings = MotionSettings::default().with_speed(level.move_speed());

    let event = predict(&level, &converging_paths(), &settings).expect("collision predicted");

    assert_eq!(event.cell, cell(2, 0));
    assert_eq!(event.agents, vec![AgentId::new("a"), AgentId::new("b")]);
    assert!(event.distance < settings.collision_threshold);
    assert_eq!(event.to_string(), "Agents a, b collided at (2, 0)");
}

#[test]
fn test_converging_paths_on_shared_goal_do_not_collide() {
    let level = LevelBuilder::open(5, 5)
        .speed(fixed(2))
        .agent("a", (0, 0), 2)
        .agent("b", (2, 2), 2)
        .goal((2, 0), GoalType::Shared)
        .load();
    let settings = MotionSettings::default().with_speed(level.move_speed());

    assert_eq!(predict(&level, &converging_paths(), &settings), None);
}

#[test]
fn test_shared_goal_attempt_completes() {
    let mut orch = recording(convergence_level());
    select_all(&mut orch, "a", &[(2, 0)]);
    select_all(&mut orch, "b", &[(2, 0)]);
    assert_eq!(orch.phase(), Phase::AllPathsReady);
    assert_eq!(orch.predicted_collision(), None);

    run_to_end(&mut orch, 10);

    assert_eq!(orch.phase(), Phase::Completed);
    assert_eq!(orch.observer().completions, 1);
    assert_eq!(orch.observer().cleared, 1);
    assert!(orch.observer().aborts.is_empty());
    for frame in orch.frames() {
        assert_eq!(frame.cell, cell(2, 0));
        assert!(!frame.moving);
    }
}

#[test]
fn test_crossing_attempt_ends_in_game_over() {
    let mut orch = recording(crossing_level());
    select_all(&mut orch, "a", &[(4, 1)]);
    select_all(&mut orch, "b", &[(2, 0)]);
    let predicted = orch.predicted_collision().cloned().expect("crossing predicted");

    run_to_end(&mut orch, 10);

    assert_eq!(orch.phase(), Phase::Aborted);
    let recorder = orch.observer();
    assert_eq!(recorder.aborts.len(), 1);
    assert_eq!(recorder.aborts[0].cell, predicted.cell);
    assert_eq!(recorder.game_over, vec!["Agents a, b collided at (2, 1)".to_string()]);
    assert_eq!(recorder.completions, 0);

    // Frozen: further ticks change nothing.
    let hash = orch.state_hash();
    orch.tick(fixed(1));
    assert_eq!(orch.state_hash(), hash);
}

#[test]
fn test_restart_after_abort_restores_level() {
    let mut orch = recording(crossing_level());
    select_all(&mut orch, "a", &[(4, 1)]);
    select_all(&mut orch, "b", &[(2, 0)]);
    run_to_end(&mut orch, 10);
    assert_eq!(orch.phase(), Phase::Aborted);

    orch.restart_level();

    assert_eq!(orch.phase(), Phase::SelectingPaths);
    assert_eq!(orch.attempt(), 2);
    assert_eq!(orch.abort_event(), None);
    for agent in orch.level().agents() {
        assert_eq!(agent.current_cell, agent.start);
        assert_eq!(agent.remaining_budget, agent.move_budget);
        assert!(!agent.completed);
        assert!(orch.paths().draft(&agent.id).is_empty());
    }
    assert!(orch.level().goals().iter().all(|g| g.claimed_by.is_none()));

    // Same paths again reach the same outcome.
    select_all(&mut orch, "a", &[(4, 1)]);
    select_all(&mut orch, "b", &[(2, 0)]);
    run_to_end(&mut orch, 10);
    assert_eq!(orch.observer().aborts.len(), 2);
    assert_eq!(orch.observer().aborts[0], orch.observer().aborts[1]);
}

#[test]
fn test_contract_violations_are_errors() {
    let mut orch = MoveOrchestrator::new(crossing_level());

    assert!(matches!(orch.start_motion(), Err(GameError::PhaseViolation { .. })));
    assert!(matches!(
        orch.select_cell(&AgentId::new("ghost"), cell(1, 1)),
        Err(GameError::UnknownAgent(_))
    ));

    select_all(&mut orch, "a", &[(4, 1)]);
    select_all(&mut orch, "b", &[(2, 0)]);
    let err = orch.select_cell(&AgentId::new("a"), cell(3, 1)).unwrap_err();
    assert_eq!(err.to_string(), "Cannot select a cell while AllPathsReady");

    orch.start_motion().unwrap();
    assert_eq!(orch.phase(), Phase::Moving);
    assert!(orch.start_motion().is_err());
    assert!(orch.undo_last_selection(&AgentId::new("a")).is_err());
}

#[test]
fn test_individual_goal_is_exclusive_until_undo() {
    let mut data = LevelBuilder::open(5, 5)
        .agent("a", (0, 0), 1)
        .agent("b", (4, 0), 1)
        .agent("c", (2, 4), 1)
        .goal((2, 0), GoalType::Individual)
        .goal((2, 2), GoalType::Shared)
        .build();
    data.goals[0].agents = vec!["a".into(), "b".into()];
    let mut orch = MoveOrchestrator::new(LevelContext::load(&data).unwrap());
    let (a, b) = (AgentId::new("a"), AgentId::new("b"));

    assert_eq!(orch.select_cell(&a, cell(2, 0)).unwrap(), SelectionOutcome::Completed);
    assert_eq!(
        orch.select_cell(&b, cell(2, 0)).unwrap(),
        SelectionOutcome::Rejected(RejectReason::NotAGoal)
    );

    assert_eq!(orch.undo_last_selection(&a).unwrap(), SelectionOutcome::Undone);
    assert_eq!(orch.select_cell(&b, cell(2, 0)).unwrap(), SelectionOutcome::Completed);
}

#[test]
fn test_level_validation_names_each_failure() {
    let one_agent = LevelBuilder::open(3, 3)
        .agent("a", (0, 0), 1)
        .goal((2, 0), GoalType::Single)
        .build();
    let no_goals = LevelBuilder::open(3, 3)
        .agent("a", (0, 0), 1)
        .agent("b", (2, 2), 1)
        .build();
    let shared_start = LevelBuilder::open(3, 3)
        .agent("a", (1, 1), 1)
        .agent("b", (1, 1), 1)
        .goal((2, 0), GoalType::Single)
        .build();

    assert!(one_agent.validate().contains(&LevelValidationError::AgentCount(1)));
    assert!(no_goals.validate().contains(&LevelValidationError::NoGoals));
    assert!(shared_start
        .validate()
        .contains(&LevelValidationError::SharedStartCell {
            first: "a".into(),
            second: "b".into(),
            cell: cell(1, 1),
        }));

    for data in [one_agent, no_goals, shared_start] {
        match LevelContext::load(&data) {
            Err(GameError::InvalidLevel(errors)) => assert!(!errors.is_empty()),
            other => panic!("expected InvalidLevel, got {other:?}"),
        }
    }
}

#[test]
fn test_world_too_wide_for_distances_is_rejected() {
    // 60 cells of 1000 units: corner-to-corner distances overflow I32F32.
    let huge = LevelBuilder::open(60, 3)
        .cell_size(fixed(1000))
        .agent("a", (0, 0), 2)
        .agent("b", (59, 2), 2)
        .goal((0, 2), GoalType::Single)
        .goal((59, 0), GoalType::Single)
        .build();
    assert!(matches!(
        huge.validate()[..],
        [LevelValidationError::WorldTooLarge { width: 60, height: 3, .. }]
    ));
    assert!(matches!(LevelContext::load(&huge), Err(GameError::InvalidLevel(_))));

    // The same layout at a sane scale predicts without trouble.
    let level = LevelBuilder::open(60, 3)
        .cell_size(fixed(100))
        .agent("a", (0, 0), 2)
        .agent("b", (59, 2), 2)
        .goal((0, 2), GoalType::Single)
        .goal((59, 0), GoalType::Single)
        .load();
    let paths = vec![
        (AgentId::new("a"), vec![cell(0, 0), cell(0, 2)]),
        (AgentId::new("b"), vec![cell(59, 2), cell(59, 0)]),
    ];
    assert_eq!(predict(&level, &paths, &MotionSettings::default()), None);
}

#[test]
fn test_unreachable_goal_is_rejected() {
    // A wall of holes along x = 2 cuts the left side off from the goal.
    let data = LevelBuilder::open(5, 3)
        .holes(&[(2, 0), (2, 1), (2, 2)])
        .agent("a", (0, 0), 3)
        .agent("b", (4, 2), 3)
        .goal((4, 0), GoalType::Shared)
        .build();

    assert_eq!(
        data.validate(),
        vec![LevelValidationError::UnreachableGoal("a".into())]
    );
}

#[test]
fn test_level_round_trips_through_ron() {
    let builder = LevelBuilder::open(5, 5)
        .name("round trip")
        .speed(fixed(3))
        .agent("a", (0, 0), 2)
        .agent_for("b", (4, 4), 2, 1)
        .goal((2, 0), GoalType::Single)
        .goal((4, 0), GoalType::Individual);
    let text = builder.to_ron();

    let level = LevelContext::from_ron_str(&text).expect("serialized level loads");

    assert_eq!(level.name(), "round trip");
    assert_eq!(level.move_speed(), fixed(3));
    assert_eq!(level.assignments()[&AgentId::new("b")], vec![1]);
}

#[test]
fn test_level_file_errors_carry_path() {
    let err = LevelData::from_file(std::path::Path::new("does/not/exist.ron")).unwrap_err();
    match err {
        GameError::DataParseError { path, .. } => assert!(path.contains("exist.ron")),
        other => panic!("expected DataParseError, got {other:?}"),
    }
}
