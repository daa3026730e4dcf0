use flock_runtime::pathfind::path_length;
use flock_runtime::prelude::*;

fn walled_world() -> WorldSnapshot {
    let agents = vec![
        AgentState::new(AgentId(0), Vec2::new(10.0, 20.0), 1.0, 6.0),
        AgentState::new(AgentId(1), Vec2::new(25.0, 35.0), 1.0, 6.0),
    ];
    WorldSnapshot::new(
        agents,
        vec![Shape::rect(Vec2::new(25.0, 20.0), 2.0, 20.0)],
        Goal::new(Vec2::new(40.0, 20.0), 2.0),
        Bounds::new(50.0, 40.0),
    )
}

// The wall rises from the bottom edge, so every route crosses its top.
fn dead_end_world() -> WorldSnapshot {
    let agents = vec![
        AgentState::new(AgentId(0), Vec2::new(10.0, 20.0), 1.0, 6.0),
        AgentState::new(AgentId(1), Vec2::new(10.0, 8.0), 1.0, 6.0),
    ];
    WorldSnapshot::new(
        agents,
        vec![Shape::rect(Vec2::new(25.0, 14.0), 2.0, 28.0)],
        Goal::new(Vec2::new(40.0, 20.0), 2.0),
        Bounds::new(50.0, 40.0),
    )
}

fn pathfinder(world: &WorldSnapshot) -> Pathfinder {
    let mut p = Pathfinder::new(PathfinderConfig::default()).unwrap();
    p.initialize(world);
    p
}

#[test]
fn line_of_sight_gives_two_point_path() {
    let world = walled_world();
    let mut p = pathfinder(&world);
    let from = Vec2::new(25.0, 35.0);
    assert_eq!(p.calculate_path(from), vec![from, world.goal.position]);
    assert_eq!(p.stats().direct, 1);
}

#[test]
fn blocked_path_goes_around_wall() {
    let world = walled_world();
    let wall = &world.obstacles[0];
    let mut p = pathfinder(&world);
    let from = Vec2::new(10.0, 20.0);
    let path = p.calculate_path(from);

    assert!(path.len() > 2);
    assert_eq!(path[0], from);
    assert_eq!(*path.last().unwrap(), world.goal.position);
    for pair in path.windows(2) {
        assert!(!wall.intersects_segment(pair[0], pair[1]));
    }
    assert!(path_length(&path) > from.distance_to(world.goal.position));
}

#[test]
fn repeated_queries_agree() {
    let world = walled_world();
    let mut p = pathfinder(&world);
    let from = Vec2::new(10.0, 20.0);
    let first = p.calculate_path(from);
    let second = p.calculate_path(from);
    assert_eq!(first, second);
    assert!(p.memo_len() > 0);
}

#[test]
fn new_start_splices_remembered_route() {
    let world = dead_end_world();
    let wall = &world.obstacles[0];
    let mut p = pathfinder(&world);
    let first = p.calculate_path(Vec2::new(10.0, 20.0));
    assert!(first.len() > 2);
    assert_eq!(p.stats().memo_splices, 0);

    let starts = [
        (first[0] + first[1]) / 2.0,
        Vec2::new(10.0, 8.0),
        Vec2::new(5.0, 30.0),
        Vec2::new(18.0, 15.0),
    ];
    for from in starts {
        let path = p.calculate_path(from);
        let cold = pathfinder(&world).calculate_path(from);
        assert!(!cold.is_empty());
        assert_eq!(path[0], from);
        assert_eq!(*path.last().unwrap(), world.goal.position);
        assert!((path_length(&path) - path_length(&cold)).abs() < 1e-9);
        for pair in path.windows(2) {
            assert!(!wall.intersects_segment(pair[0], pair[1]));
        }
    }
    assert!(p.stats().memo_splices > 0);
    assert_eq!(p.stats().direct, 0);
    assert_eq!(p.stats().failures, 0);
}

#[test]
fn flock_token_holders_avoid_wall() {
    let world = walled_world();
    let mut rng = <rand_chacha::ChaCha8Rng as rand::SeedableRng>::seed_from_u64(6);
    let genome = Genome::random(&GeneRanges::default(), &mut rng);
    let mut flock = Flock::new(
        ForceConfig::default(),
        TokenConfig {
            budget: 2,
            carryover_override: None,
        },
        PathfinderConfig::default(),
        1,
    )
    .unwrap();
    flock.start_generation(&world, genome).unwrap();
    let outcome = flock.tick(&world).unwrap();

    assert_eq!(outcome.tokens.granted(), 2);
    for path in outcome.paths.iter().flatten() {
        assert!(!path.is_empty());
        for pair in path.windows(2) {
            assert!(!world.obstacles[0].intersects_segment(pair[0], pair[1]));
        }
    }
}
