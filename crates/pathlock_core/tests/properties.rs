//! Property-based tests for the timeline, predictor and legality checker.

use pathlock_core::prelude::*;
use pathlock_test_utils::determinism::strategies::{arb_axis_path, arb_cell, arb_speed, arb_time};
use pathlock_test_utils::fixtures::{cell, fixed, fixed_f, LevelBuilder};
use proptest::prelude::*;

fn settings(speed: Fixed) -> MotionSettings {
    MotionSettings::default().with_speed(speed)
}

/// Does `path` satisfy the full-path rules, checked cell by cell?
fn path_is_valid(level: &LevelContext, agent: &AgentId, path: &[GridCell]) -> bool {
    let state = level.agent(agent).unwrap();
    if path.len() < 2 || path[0] != state.start || path.len() - 1 > state.move_budget as usize {
        return false;
    }
    let blocked = |c: GridCell| {
        !level.grid().is_walkable(c)
            || level
                .agents()
                .iter()
                .any(|other| other.id != *agent && other.current_cell == c)
    };
    for pair in path.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        if from == to || (from.x != to.x && from.y != to.y) {
            return false;
        }
        let (dx, dy) = ((to.x - from.x).signum(), (to.y - from.y).signum());
        let mut c = from;
        while c != to {
            c = cell(c.x + dx, c.y + dy);
            if blocked(c) {
                return false;
            }
        }
    }
    let last = path[path.len() - 1];
    level.goals_at(last).any(|g| g.can_use(agent))
}

/// Two-segment path from `start` to `goal`: along the row, then the column.
fn l_path(start: GridCell, goal: GridCell) -> Vec<GridCell> {
    if start.x == goal.x || start.y == goal.y {
        vec![start, goal]
    } else {
        vec![start, cell(goal.x, start.y), goal]
    }
}

/// Closest the two agents get during their first approach: the first
/// stretch of time, while both move, that they are within `margin` of the
/// collision threshold. `None` if they never get that close.
///
/// Sampled far more finely than either the predictor or live polling.
fn first_approach(
    grid: &GridMap,
    settings: &MotionSettings,
    a: &[GridCell],
    b: &[GridCell],
    margin: Fixed,
) -> Option<Fixed> {
    let ta = simulate(grid, a, settings);
    let tb = simulate(grid, b, settings);
    let end = ta.duration().min(tb.duration());
    let near = settings.collision_threshold + margin;
    let step = settings.collision_threshold / fixed(64);
    let mut closest: Option<Fixed> = None;
    let mut t = Fixed::ZERO;
    while t < end {
        let pa = interpolated_position_at(&ta, t).unwrap();
        let pb = interpolated_position_at(&tb, t).unwrap();
        let d = pa.distance(pb);
        if d < near {
            closest = Some(closest.map_or(d, |c| c.min(d)));
        } else if closest.is_some() {
            break;
        }
        t += step;
    }
    closest
}

fn holed_level() -> LevelContext {
    LevelBuilder::open(6, 6)
        .holes(&[(2, 2), (3, 2), (4, 4)])
        .agent("a", (0, 0), 3)
        .agent("b", (5, 0), 2)
        .goal((0, 5), GoalType::Shared)
        .goal((3, 0), GoalType::Single)
        .load()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_simulate_is_deterministic(path in arb_axis_path(8, 6, 5), speed in arb_speed()) {
        let grid = GridMap::open(8, 6);
        let first = simulate(&grid, &path, &settings(speed));
        let second = simulate(&grid, &path, &settings(speed));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_waypoints_are_hit_exactly(path in arb_axis_path(8, 6, 5), speed in arb_speed()) {
        let grid = GridMap::open(8, 6);
        let timeline = simulate(&grid, &path, &settings(speed));
        prop_assume!(path.len() >= 2);

        prop_assert_eq!(timeline.arrivals().len(), path.len() - 1);
        for (i, &arrival) in timeline.arrivals().iter().enumerate() {
            let waypoint = grid.to_world(path[i + 1]);
            let index = timeline.samples().iter().position(|s| s.time == arrival).unwrap();
            prop_assert_eq!(timeline.samples()[index].position, waypoint);
            if i + 2 < path.len() {
                // Dwell at interior waypoints.
                prop_assert_eq!(timeline.samples()[index + 1].position, waypoint);
            }
        }
        prop_assert_eq!(timeline.final_position(), Some(grid.to_world(path[path.len() - 1])));
    }

    #[test]
    fn prop_arrived_agents_stay_put(path in arb_axis_path(8, 6, 4), t in arb_time()) {
        let grid = GridMap::open(8, 6);
        let timeline = simulate(&grid, &path, &settings(fixed(4)));
        prop_assume!(!timeline.is_empty());
        let end = grid.to_world(path[path.len() - 1]);
        let later = timeline.duration() + t;

        prop_assert!(!timeline.is_moving_at(later));
        prop_assert_eq!(position_at_time(&timeline, later), Some(end));
        prop_assert_eq!(interpolated_position_at(&timeline, later), Some(end));
    }

    #[test]
    fn prop_prediction_ignores_path_order(
        first in arb_axis_path(6, 6, 3),
        second in arb_axis_path(6, 6, 3),
        speed in arb_speed(),
    ) {
        let level = LevelBuilder::open(6, 6)
            .agent("a", (0, 0), 3)
            .agent("b", (5, 5), 3)
            .goal((3, 3), GoalType::Single)
            .load();
        let (a, b) = (AgentId::new("a"), AgentId::new("b"));
        let forward = vec![(a.clone(), first.clone()), (b.clone(), second.clone())];
        let backward = vec![(b, second), (a, first)];

        let one = predict_all(&level, &forward, &settings(speed));
        let two = predict_all(&level, &backward, &settings(speed));
        prop_assert_eq!(&one, &two);
        for event in &one {
            prop_assert!(event.agents.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn prop_validate_path_matches_rules(tail in arb_axis_path(6, 6, 3), from_start in any::<bool>()) {
        let level = holed_level();
        let checker = PathChecker::new(&level);
        let a = AgentId::new("a");
        let path: Vec<GridCell> = if from_start && tail[0].shares_axis_with(cell(0, 0)) {
            std::iter::once(cell(0, 0)).chain(tail.into_iter().filter(|&c| c != cell(0, 0))).collect()
        } else {
            tail
        };

        prop_assert_eq!(checker.validate_path(&path, &a), path_is_valid(&level, &a, &path));
    }

    #[test]
    fn prop_last_move_offers_only_visible_goals(
        goals in prop::collection::vec(arb_cell(6, 6), 1..4),
    ) {
        let mut builder = LevelBuilder::open(6, 6).agent("a", (2, 2), 1).agent("b", (5, 2), 1);
        for &goal in &goals {
            builder = builder.goal((goal.x, goal.y), GoalType::Shared);
        }
        let level = builder.load();
        let checker = PathChecker::new(&level);
        let a = AgentId::new("a");

        // First usable goal along each ray, stopping at agents and edges.
        let mut expected = Vec::new();
        for direction in Direction::ALL {
            let mut c = cell(2, 2);
            loop {
                c = c.offset(direction, 1);
                if !level.grid().in_bounds(c) || c == cell(5, 2) {
                    break;
                }
                if goals.contains(&c) {
                    expected.push(c);
                    break;
                }
            }
        }

        prop_assert_eq!(checker.legal_next_selections(&[cell(2, 2)], &a), expected);
    }

    #[test]
    fn prop_no_collision_converging_on_single_goal(
        near in 1i32..5,
        far in 1i32..5,
        side in prop::sample::select(vec![Direction::Up, Direction::Down, Direction::Right]),
        speed in arb_speed(),
    ) {
        let goal = cell(5, 5);
        let a_start = goal.offset(Direction::Left, near);
        let b_start = goal.offset(side, far);
        let level = LevelBuilder::open(11, 11)
            .agent("a", (a_start.x, a_start.y), 1)
            .agent("b", (b_start.x, b_start.y), 1)
            .goal((goal.x, goal.y), GoalType::Single)
            .load();
        let paths = vec![
            (AgentId::new("a"), vec![a_start, goal]),
            (AgentId::new("b"), vec![b_start, goal]),
        ];

        prop_assert_eq!(predict_all(&level, &paths, &settings(speed)), Vec::new());
    }

    #[test]
    fn prop_live_playback_agrees_with_prediction(
        a_start in arb_cell(6, 6),
        a_goal in arb_cell(6, 6),
        b_start in arb_cell(6, 6),
        b_goal in arb_cell(6, 6),
        dt in prop::sample::select(vec![fixed(1) / fixed(60), fixed_f(0.25), fixed(300)]),
    ) {
        let cells = [a_start, a_goal, b_start, b_goal];
        prop_assume!(cells.iter().enumerate().all(|(i, c)| !cells[..i].contains(c)));

        let level = LevelBuilder::open(6, 6)
            .agent_for("a", (a_start.x, a_start.y), 2, 0)
            .agent_for("b", (b_start.x, b_start.y), 2, 1)
            .goal((a_goal.x, a_goal.y), GoalType::Individual)
            .goal((b_goal.x, b_goal.y), GoalType::Individual)
            .load();
        let settings = MotionSettings::default().with_start_delay(None);
        let mut orch = MoveOrchestrator::with_observer(level, settings, NullObserver).unwrap();

        let a_path = l_path(a_start, a_goal);
        let b_path = l_path(b_start, b_goal);
        for (id, path) in [("a", &a_path), ("b", &b_path)] {
            for &next in &path[1..] {
                let outcome = orch.select_cell(&AgentId::new(id), next).unwrap();
                prop_assume!(!matches!(outcome, SelectionOutcome::Rejected(_)));
            }
        }
        prop_assert_eq!(orch.phase(), Phase::AllPathsReady);

        // Near misses right at the threshold may fall either way between
        // sample grids; only clear hits and clear misses must agree.
        let approach = first_approach(orch.level().grid(), orch.settings(), &a_path, &b_path, fixed_f(0.03));
        prop_assume!(approach.map_or(true, |closest| closest < fixed_f(0.05)));

        let predicted = orch.predicted_collision().cloned();
        orch.start_motion().unwrap();
        for _ in 0..10_000 {
            orch.tick(dt);
            if orch.phase().is_terminal() {
                break;
            }
        }

        prop_assert!(orch.phase().is_terminal());
        prop_assert_eq!(orch.phase() == Phase::Aborted, predicted.is_some());
        if let (Some(predicted), Some(live)) = (predicted, orch.abort_event()) {
            prop_assert_eq!(&live.agents, &predicted.agents);
            // Detection times differ by under one sample, so the midpoint
            // can drift at most into a neighbouring cell.
            prop_assert!((live.cell.x - predicted.cell.x).abs() <= 1);
            prop_assert!((live.cell.y - predicted.cell.y).abs() <= 1);
        }
    }
}

#[test]
fn test_total_move_time_counts_dwell() {
    let grid = GridMap::open(5, 5);
    let path = [cell(0, 0), cell(3, 0), cell(3, 3)];
    let s = settings(fixed(2));

    assert_eq!(total_move_time(&grid, &path, &s), fixed(3) + s.dwell);
    assert!(simulate(&grid, &path, &s).duration() >= fixed(3));
}
