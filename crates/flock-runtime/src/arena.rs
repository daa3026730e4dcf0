//! Arena — the reference world a flock trains in.
//!
//! A rectangular arena with a goal disc and rectangular walls. Maps are
//! generated from a seed on demand, so a map id always produces the same
//! layout and only the current one is held. Agents are integrated with
//! `velocity += force / mass · dt`, bounce off the arena edge, stop once
//! they touch the goal, and have collisions counted on the tick contact
//! begins.

use crate::trainer::TrainingWorld;
use flock_core::error::{FlockError, Result};
use flock_core::geometry::Shape;
use flock_core::stats::{AgentStats, GenerationStats};
use flock_core::types::{AgentId, Bounds, Goal, LayoutId, MapId, Tick, Vec2};
use flock_core::world::{AgentState, LayoutSource, WorldSnapshot};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::f64::consts::PI;
use tracing::{debug, warn};

/// Arena generation and integration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub width: f64,
    pub height: f64,
    pub agent_count: usize,
    pub min_size: f64,
    pub max_size: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub obstacle_count: usize,
    pub min_obstacle_width: f64,
    pub max_obstacle_width: f64,
    /// Wall height is `area / width`.
    pub min_obstacle_area: f64,
    pub max_obstacle_area: f64,
    pub goal_radius: f64,
    /// Seconds per tick.
    pub dt: f64,
    /// Bounding circles are scaled by this much when placing objects.
    pub placement_scale: f64,
    pub placement_attempts: usize,
    pub seed: u64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 80.0,
            height: 60.0,
            agent_count: 50,
            min_size: 0.8,
            max_size: 1.1,
            min_speed: 7.0,
            max_speed: 9.0,
            obstacle_count: 10,
            min_obstacle_width: 2.0,
            max_obstacle_width: 10.0,
            min_obstacle_area: 8.0,
            max_obstacle_area: 12.0,
            goal_radius: 2.0,
            dt: 1.0 / 60.0,
            placement_scale: 2.0,
            placement_attempts: 1000,
            seed: 0,
        }
    }
}

impl ArenaConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.width > 0.0 && self.height > 0.0) {
            return Err(FlockError::invalid_value(
                "arena.width/height",
                format!("{}x{}", self.width, self.height),
                "arena must have positive size",
            ));
        }
        if self.agent_count == 0 {
            return Err(FlockError::no_agents());
        }
        let pairs = [
            ("arena.size", self.min_size, self.max_size),
            ("arena.speed", self.min_speed, self.max_speed),
            ("arena.obstacle_width", self.min_obstacle_width, self.max_obstacle_width),
            ("arena.obstacle_area", self.min_obstacle_area, self.max_obstacle_area),
        ];
        for (field, min, max) in pairs {
            if !(min > 0.0 && min <= max) {
                return Err(FlockError::invalid_value(
                    field,
                    format!("{min}..{max}"),
                    "range must be positive and ordered",
                ));
            }
        }
        if !(self.dt > 0.0) {
            return Err(FlockError::invalid_value("arena.dt", self.dt, "must be positive"));
        }
        if !(self.goal_radius > 0.0) {
            return Err(FlockError::invalid_value(
                "arena.goal_radius",
                self.goal_radius,
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Initial state of one agent on a map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spawn {
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: f64,
    pub max_speed: f64,
}

/// Everything a map id determines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapLayout {
    pub obstacles: Vec<Shape>,
    pub goal: Goal,
    pub spawns: Vec<Spawn>,
}

impl MapLayout {
    /// Generate the layout for `map`.
    ///
    /// Goal, walls and agents are placed in that order at random spots
    /// whose enlarged bounding circles overlap nothing placed before.
    pub fn generate(config: &ArenaConfig, map: MapId) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        rng.set_stream(u64::from(map.0));
        let mut placer = Placer::new(config);

        let goal_position = placer
            .place(config.goal_radius, &mut rng)
            .unwrap_or(Vec2::new(config.width / 2.0, config.height / 2.0));
        let goal = Goal::new(goal_position, config.goal_radius);

        let mut obstacles = Vec::with_capacity(config.obstacle_count);
        for _ in 0..config.obstacle_count {
            let width = rng.random_range(config.min_obstacle_width..=config.max_obstacle_width);
            let area = rng.random_range(config.min_obstacle_area..=config.max_obstacle_area);
            let height = area / width;
            let rotation = rng.random_range(0.0..PI);
            let reach = Vec2::new(width, height).length() / 2.0;
            match placer.place(reach, &mut rng) {
                Some(center) => {
                    obstacles.push(Shape::rotated_rect(center, width, height, rotation))
                }
                None => warn!(map = map.0, "No room for wall, skipping"),
            }
        }

        let mut spawns = Vec::with_capacity(config.agent_count);
        for _ in 0..config.agent_count {
            let size = rng.random_range(config.min_size..=config.max_size);
            let max_speed = rng.random_range(config.min_speed..=config.max_speed);
            let heading = rng.random_range(0.0..2.0 * PI);
            let position = placer.place(size / 2.0, &mut rng).unwrap_or_else(|| {
                warn!(map = map.0, "No free spot for agent, overlapping");
                placer.any_spot(size / 2.0, &mut rng)
            });
            spawns.push(Spawn {
                position,
                velocity: Vec2::new(1.0, 0.0).rotated(heading) * max_speed,
                size,
                max_speed,
            });
        }

        Self {
            obstacles,
            goal,
            spawns,
        }
    }
}

// Rejection sampling over bounding circles.
struct Placer<'a> {
    config: &'a ArenaConfig,
    placed: Vec<(Vec2, f64)>,
}

impl<'a> Placer<'a> {
    fn new(config: &'a ArenaConfig) -> Self {
        Self {
            config,
            placed: Vec::new(),
        }
    }

    fn any_spot<R: Rng + ?Sized>(&self, radius: f64, rng: &mut R) -> Vec2 {
        let rx = radius.min(self.config.width / 2.0);
        let ry = radius.min(self.config.height / 2.0);
        Vec2::new(
            rng.random_range(rx..=self.config.width - rx),
            rng.random_range(ry..=self.config.height - ry),
        )
    }

    fn place<R: Rng + ?Sized>(&mut self, radius: f64, rng: &mut R) -> Option<Vec2> {
        let reach = radius * self.config.placement_scale;
        for _ in 0..self.config.placement_attempts {
            let p = self.any_spot(radius, rng);
            if self
                .placed
                .iter()
                .all(|(q, r)| p.distance_to(*q) >= reach + r)
            {
                self.placed.push((p, reach));
                return Some(p);
            }
        }
        None
    }
}

/// Seeded arena that regenerates maps by id.
pub struct Arena {
    config: ArenaConfig,
    bounds: Bounds,
    map: MapId,
    layout: MapLayout,
    /// Hand-made layout standing in for map 0.
    custom: Option<MapLayout>,
    agents: Vec<AgentState>,
    records: Vec<AgentStats>,
    bird_contacts: HashSet<(usize, usize)>,
    wall_contacts: HashSet<(usize, usize)>,
    tick: Tick,
}

impl Arena {
    /// Arena on map 0.
    pub fn new(config: ArenaConfig) -> Result<Self> {
        config.validate()?;
        let layout = MapLayout::generate(&config, MapId(0));
        Ok(Self::with_layout(config, layout, None))
    }

    /// Arena on a hand-made layout, registered as map 0.
    ///
    /// The config is validated as in [`Arena::new`], and every spawn needs a
    /// positive size and speed.
    pub fn from_layout(config: ArenaConfig, layout: MapLayout) -> Result<Self> {
        config.validate()?;
        if layout.spawns.is_empty() {
            return Err(FlockError::no_agents());
        }
        for spawn in &layout.spawns {
            if !(spawn.size > 0.0 && spawn.size.is_finite()) {
                return Err(FlockError::invalid_value("spawn.size", spawn.size, "must be positive"));
            }
            if !(spawn.max_speed > 0.0 && spawn.max_speed.is_finite()) {
                return Err(FlockError::invalid_value(
                    "spawn.max_speed",
                    spawn.max_speed,
                    "must be positive",
                ));
            }
        }
        let custom = Some(layout.clone());
        Ok(Self::with_layout(config, layout, custom))
    }

    fn with_layout(config: ArenaConfig, layout: MapLayout, custom: Option<MapLayout>) -> Self {
        let bounds = Bounds::new(config.width, config.height);
        let mut arena = Self {
            config,
            bounds,
            map: MapId(0),
            layout,
            custom,
            agents: Vec::new(),
            records: Vec::new(),
            bird_contacts: HashSet::new(),
            wall_contacts: HashSet::new(),
            tick: 0,
        };
        arena.reset();
        arena
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn current_map(&self) -> MapId {
        self.map
    }

    pub fn layout(&self) -> &MapLayout {
        &self.layout
    }

    pub fn agents(&self) -> &[AgentState] {
        &self.agents
    }

    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    fn integrate(&mut self, forces: &[Vec2]) {
        let dt = self.config.dt;
        let bounds = self.bounds;
        for (i, agent) in self.agents.iter_mut().enumerate() {
            if !agent.moving {
                continue;
            }
            let force = forces.get(i).copied().unwrap_or(Vec2::ZERO);
            agent.velocity =
                (agent.velocity + force / agent.mass() * dt).clamp_length(agent.max_speed);
            let step = agent.velocity * dt;
            agent.position += step;
            self.records[i].distance_travelled += step.length();

            let r = agent.radius();
            if agent.position.x < r {
                agent.position.x = r;
                agent.velocity.x = agent.velocity.x.abs();
            } else if agent.position.x > bounds.width - r {
                agent.position.x = bounds.width - r;
                agent.velocity.x = -agent.velocity.x.abs();
            }
            if agent.position.y < r {
                agent.position.y = r;
                agent.velocity.y = agent.velocity.y.abs();
            } else if agent.position.y > bounds.height - r {
                agent.position.y = bounds.height - r;
                agent.velocity.y = -agent.velocity.y.abs();
            }
        }
    }

    fn capture(&mut self) {
        let goal = self.layout.goal;
        for (agent, record) in self.agents.iter_mut().zip(self.records.iter_mut()) {
            let reach = goal.radius + agent.radius();
            if agent.moving && agent.position.distance_to(goal.position) <= reach {
                agent.moving = false;
                agent.velocity = Vec2::ZERO;
                record.reached_goal = true;
                record.finished_at = Some(self.tick);
            }
        }
    }

    fn resolve_walls(&mut self) {
        let obstacles = &self.layout.obstacles;
        let mut touching = HashSet::new();
        for (i, agent) in self.agents.iter_mut().enumerate() {
            if !agent.moving {
                continue;
            }
            let r = agent.radius();
            for (k, wall) in obstacles.iter().enumerate() {
                if !wall.overlaps_circle(agent.position, r) {
                    continue;
                }
                touching.insert((i, k));
                let closest = wall.closest_point(agent.position);
                let out = if closest == agent.position {
                    let away = (agent.position - wall.center()).normalized();
                    let away = if away.is_zero() { Vec2::new(1.0, 0.0) } else { away };
                    wall.center() + away * (wall.bounding_radius() + r)
                } else {
                    closest + (agent.position - closest).normalized() * r
                };
                agent.position = out;
            }
        }
        for &(i, _) in touching.difference(&self.wall_contacts) {
            self.records[i].wall_collisions += 1;
        }
        self.wall_contacts = touching;
    }

    fn resolve_birds(&mut self) {
        let mut touching = HashSet::new();
        let n = self.agents.len();
        for i in 0..n {
            for j in i + 1..n {
                let (a, b) = (&self.agents[i], &self.agents[j]);
                if !a.moving || !b.moving {
                    continue;
                }
                let reach = a.radius() + b.radius();
                let delta = b.position - a.position;
                let dist = delta.length();
                if dist >= reach {
                    continue;
                }
                touching.insert((i, j));
                let dir = if dist > 0.0 {
                    delta / dist
                } else {
                    Vec2::new(1.0, 0.0)
                };
                let push = dir * ((reach - dist) / 2.0);
                self.agents[i].position -= push;
                self.agents[j].position += push;
            }
        }
        for &(i, j) in touching.difference(&self.bird_contacts) {
            self.records[i].bird_collisions += 1;
            self.records[j].bird_collisions += 1;
        }
        self.bird_contacts = touching;
    }
}

impl LayoutSource for Arena {
    fn change_layout(&mut self, map: MapId) {
        if map != self.map {
            self.layout = match (&self.custom, map) {
                (Some(custom), MapId(0)) => custom.clone(),
                _ => {
                    let layout = MapLayout::generate(&self.config, map);
                    debug!(map = map.0, walls = layout.obstacles.len(), "Generated map");
                    layout
                }
            };
            self.map = map;
        }
        self.reset();
    }
}

impl TrainingWorld for Arena {
    fn reset(&mut self) {
        let spawns = &self.layout.spawns;
        self.agents = spawns
            .iter()
            .enumerate()
            .map(|(i, s)| {
                AgentState::new(AgentId(i), s.position, s.size, s.max_speed)
                    .with_velocity(s.velocity)
            })
            .collect();
        self.records = (0..spawns.len())
            .map(|i| AgentStats {
                id: Some(AgentId(i)),
                ..AgentStats::default()
            })
            .collect();
        self.bird_contacts.clear();
        self.wall_contacts.clear();
        self.tick = 0;
    }

    fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::new(
            self.agents.clone(),
            self.layout.obstacles.clone(),
            self.layout.goal,
            self.bounds,
        )
        .with_layout(LayoutId(u64::from(self.map.0)))
    }

    fn apply_forces(&mut self, forces: &[Vec2]) {
        self.tick += 1;
        self.integrate(forces);
        self.resolve_walls();
        self.resolve_birds();
        self.capture();
    }

    fn is_finished(&self) -> bool {
        self.agents.iter().all(|a| !a.moving)
    }

    fn generation_stats(&self) -> GenerationStats {
        GenerationStats::from_agents(self.records.clone(), self.tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(x: f64, y: f64) -> Spawn {
        Spawn {
            position: Vec2::new(x, y),
            velocity: Vec2::ZERO,
            size: 1.0,
            max_speed: 5.0,
        }
    }

    fn layout(spawns: Vec<Spawn>, obstacles: Vec<Shape>) -> MapLayout {
        MapLayout {
            obstacles,
            goal: Goal::new(Vec2::new(70.0, 50.0), 2.0),
            spawns,
        }
    }

    fn arena_with(spawns: Vec<Spawn>) -> Arena {
        Arena::from_layout(ArenaConfig::default(), layout(spawns, vec![])).unwrap()
    }

    #[test]
    fn maps_are_reproducible_by_id() {
        let config = ArenaConfig {
            seed: 7,
            ..ArenaConfig::default()
        };
        let a = MapLayout::generate(&config, MapId(3));
        let b = MapLayout::generate(&config, MapId(3));
        let c = MapLayout::generate(&config, MapId(4));
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut arena = Arena::new(config).unwrap();
        let first = arena.snapshot();
        arena.change_layout(MapId(1));
        assert_eq!(arena.snapshot().layout, LayoutId(1));
        let second = arena.snapshot();
        arena.change_layout(MapId(2));
        arena.change_layout(MapId(1));
        assert_eq!(arena.snapshot(), second);
        arena.change_layout(MapId(0));
        assert_eq!(arena.snapshot(), first);
    }

    #[test]
    fn hand_made_layout_survives_map_changes() {
        let original = layout(vec![spawn(10.0, 10.0), spawn(20.0, 10.0)], vec![]);
        let mut arena = Arena::from_layout(ArenaConfig::default(), original.clone()).unwrap();
        arena.change_layout(MapId(5));
        assert_eq!(arena.layout(), &MapLayout::generate(&ArenaConfig::default(), MapId(5)));
        assert_eq!(arena.agents().len(), 50);

        arena.change_layout(MapId(0));
        assert_eq!(arena.layout(), &original);
        assert_eq!(arena.agents().len(), 2);
    }

    #[test]
    fn hand_made_layout_is_validated() {
        let config = ArenaConfig {
            dt: 0.0,
            ..ArenaConfig::default()
        };
        let err = Arena::from_layout(config, layout(vec![spawn(10.0, 10.0)], vec![])).err();
        assert!(matches!(err, Some(FlockError::Config(_))));

        let still = Spawn {
            size: 0.0,
            ..spawn(10.0, 10.0)
        };
        let err = Arena::from_layout(ArenaConfig::default(), layout(vec![still], vec![])).err();
        assert!(matches!(err, Some(FlockError::Config(_))));

        let err = Arena::from_layout(ArenaConfig::default(), layout(vec![], vec![])).err();
        assert_eq!(err, Some(FlockError::no_agents()));
    }

    #[test]
    fn generated_map_respects_counts_and_bounds() {
        let config = ArenaConfig::default();
        let layout = MapLayout::generate(&config, MapId(0));
        assert_eq!(layout.spawns.len(), 50);
        assert!(layout.obstacles.len() <= 10);
        for s in &layout.spawns {
            assert!((0.8..=1.1).contains(&s.size));
            assert!((s.velocity.length() - s.max_speed).abs() < 1e-9);
            assert!(Bounds::new(80.0, 60.0).contains(s.position));
        }
    }

    #[test]
    fn force_is_divided_by_mass() {
        let mut arena = arena_with(vec![spawn(10.0, 10.0)]);
        arena.apply_forces(&[Vec2::new(60.0, 0.0)]);
        // size 1 → mass 1; dt 1/60 → Δv = 1
        let a = &arena.agents()[0];
        assert!((a.velocity.x - 1.0).abs() < 1e-12);
        assert!((a.position.x - (10.0 + 1.0 / 60.0)).abs() < 1e-12);
    }

    #[test]
    fn speed_clamped_and_edges_bounce() {
        let mut arena = arena_with(vec![spawn(0.6, 10.0)]);
        for _ in 0..30 {
            arena.apply_forces(&[Vec2::new(-1000.0, 0.0)]);
            let a = &arena.agents()[0];
            assert!(a.velocity.length() <= a.max_speed + 1e-9);
            assert!(a.position.x >= a.radius());
        }
    }

    #[test]
    fn goal_capture_stops_agent() {
        let mut arena = arena_with(vec![spawn(67.6, 50.0)]);
        arena.apply_forces(&[Vec2::ZERO]);
        assert!(arena.is_finished());
        let stats = arena.generation_stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.per_agent[0].finished_at, Some(1));
    }

    #[test]
    fn collisions_counted_once_per_contact() {
        let wall = Shape::rect(Vec2::new(20.0, 10.0), 2.0, 2.0);
        let mut arena = Arena::from_layout(
            ArenaConfig::default(),
            layout(vec![spawn(10.0, 10.0), spawn(10.5, 10.0), spawn(18.6, 10.0)], vec![wall]),
        )
        .unwrap();
        arena.apply_forces(&[Vec2::ZERO; 3]);
        let stats = arena.generation_stats();
        assert_eq!(stats.bird_collisions, 1);
        assert_eq!(stats.wall_collisions, 1);

        // Contacts were resolved; staying apart adds nothing.
        arena.apply_forces(&[Vec2::ZERO; 3]);
        let stats = arena.generation_stats();
        assert_eq!(stats.bird_collisions, 1);
        assert_eq!(stats.wall_collisions, 1);
    }
}
