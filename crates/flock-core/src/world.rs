//! The per-tick view of the world and the distance queries built over it.
//!
//! Everything here is read-only from the point of view of the decision
//! components. The world owner produces a `WorldSnapshot` each tick, a
//! `DistanceCache` is built from it once, and the scheduler and force
//! engine both read that cache by shared reference.

use crate::geometry::Shape;
use crate::types::{AgentId, Bounds, Goal, LayoutId, MapId, Vec2};
use serde::{Deserialize, Serialize};

/// Kinematic state of one agent as seen by the decision components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub id: AgentId,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Diameter of the agent's body.
    pub size: f64,
    pub max_speed: f64,
    /// False once the agent has reached the goal.
    pub moving: bool,
}

impl AgentState {
    pub fn new(id: AgentId, position: Vec2, size: f64, max_speed: f64) -> Self {
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            size,
            max_speed,
            moving: true,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn mass(&self) -> f64 {
        self.size * self.size
    }

    pub fn radius(&self) -> f64 {
        self.size / 2.0
    }
}

/// Read-only snapshot of the arena for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Indexed by `AgentId`.
    pub agents: Vec<AgentState>,
    pub obstacles: Vec<Shape>,
    pub goal: Goal,
    pub bounds: Bounds,
    pub layout: LayoutId,
}

impl WorldSnapshot {
    pub fn new(agents: Vec<AgentState>, obstacles: Vec<Shape>, goal: Goal, bounds: Bounds) -> Self {
        Self {
            agents,
            obstacles,
            goal,
            bounds,
            layout: LayoutId::default(),
        }
    }

    pub fn with_layout(mut self, layout: LayoutId) -> Self {
        self.layout = layout;
        self
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn moving_count(&self) -> usize {
        self.agents.iter().filter(|a| a.moving).count()
    }

    /// Largest agent diameter, or 0 for an empty flock.
    pub fn max_agent_size(&self) -> f64 {
        self.agents.iter().map(|a| a.size).fold(0.0, f64::max)
    }
}

/// Minimum separation between an agent and another body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Separation {
    /// Unit vector from the agent toward the other body.
    pub direction: Vec2,
    /// Surface-to-surface gap, never negative.
    pub distance: f64,
}

/// Source of pairwise and agent-to-obstacle separations.
///
/// The reference implementation is [`ShapeDistance`]; a physics engine
/// can supply its own.
pub trait DistanceOracle {
    fn agent_separation(&self, me: &AgentState, other: &AgentState) -> Separation;

    fn obstacle_separation(&self, me: &AgentState, obstacle: &Shape) -> Separation;
}

/// Distances computed from agent discs and obstacle shapes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeDistance;

impl DistanceOracle for ShapeDistance {
    fn agent_separation(&self, me: &AgentState, other: &AgentState) -> Separation {
        let delta = other.position - me.position;
        let centers = delta.length();
        let direction = if centers == 0.0 {
            // Coincident: split along x by index so the pair pushes apart.
            if me.id < other.id {
                Vec2::new(1.0, 0.0)
            } else {
                Vec2::new(-1.0, 0.0)
            }
        } else {
            delta / centers
        };
        Separation {
            direction,
            distance: (centers - me.radius() - other.radius()).max(0.0),
        }
    }

    fn obstacle_separation(&self, me: &AgentState, obstacle: &Shape) -> Separation {
        let closest = obstacle.closest_point(me.position);
        let delta = closest - me.position;
        let gap = delta.length();
        if gap == 0.0 {
            let inward = (obstacle.center() - me.position).normalized();
            let direction = if inward.is_zero() {
                Vec2::new(1.0, 0.0)
            } else {
                inward
            };
            return Separation {
                direction,
                distance: 0.0,
            };
        }
        Separation {
            direction: delta / gap,
            distance: (gap - me.radius()).max(0.0),
        }
    }
}

/// Per-tick table of separations, built once and shared by reference.
#[derive(Debug, Clone, Default)]
pub struct DistanceCache {
    agents: usize,
    obstacles: usize,
    pairs: Vec<Separation>,
    walls: Vec<Separation>,
}

impl DistanceCache {
    pub fn build(world: &WorldSnapshot, oracle: &dyn DistanceOracle) -> Self {
        let n = world.agents.len();
        let m = world.obstacles.len();
        let zero = Separation {
            direction: Vec2::ZERO,
            distance: 0.0,
        };

        let mut pairs = vec![zero; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let sep = oracle.agent_separation(&world.agents[i], &world.agents[j]);
                pairs[i * n + j] = sep;
                pairs[j * n + i] = Separation {
                    direction: -sep.direction,
                    distance: sep.distance,
                };
            }
        }

        let mut walls = Vec::with_capacity(n * m);
        for agent in &world.agents {
            for obstacle in &world.obstacles {
                walls.push(oracle.obstacle_separation(agent, obstacle));
            }
        }

        Self {
            agents: n,
            obstacles: m,
            pairs,
            walls,
        }
    }

    /// Separation from agent `i` to agent `j`. The diagonal is zero.
    pub fn between(&self, i: usize, j: usize) -> Separation {
        self.pairs[i * self.agents + j]
    }

    /// Separation from agent `i` to obstacle `k`.
    pub fn to_obstacle(&self, i: usize, k: usize) -> Separation {
        self.walls[i * self.obstacles + k]
    }

    pub fn agent_count(&self) -> usize {
        self.agents
    }

    pub fn obstacle_count(&self) -> usize {
        self.obstacles
    }
}

/// Callback seam for requesting a different obstacle/goal layout.
pub trait LayoutSource {
    /// Switch to the layout identified by `map`. The next snapshot carries
    /// a new `LayoutId`.
    fn change_layout(&mut self, map: MapId);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: usize, x: f64, y: f64) -> AgentState {
        AgentState::new(AgentId(id), Vec2::new(x, y), 1.0, 5.0)
    }

    #[test]
    fn pair_separation_is_surface_gap() {
        let world = WorldSnapshot::new(
            vec![agent(0, 0.0, 0.0), agent(1, 3.0, 0.0)],
            vec![],
            Goal::new(Vec2::new(50.0, 50.0), 1.0),
            Bounds::new(100.0, 100.0),
        );
        let cache = DistanceCache::build(&world, &ShapeDistance);
        let ab = cache.between(0, 1);
        let ba = cache.between(1, 0);
        assert!((ab.distance - 2.0).abs() < 1e-12);
        assert_eq!(ab.direction, Vec2::new(1.0, 0.0));
        assert_eq!(ba.direction, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn coincident_agents_get_opposite_directions() {
        let a = agent(0, 5.0, 5.0);
        let b = agent(1, 5.0, 5.0);
        let ab = ShapeDistance.agent_separation(&a, &b);
        let ba = ShapeDistance.agent_separation(&b, &a);
        assert_eq!(ab.distance, 0.0);
        assert_eq!(ab.direction, -ba.direction);
        assert!((ab.direction.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn agent_inside_obstacle_has_zero_distance() {
        let wall = Shape::rect(Vec2::new(10.0, 10.0), 4.0, 4.0);
        let sep = ShapeDistance.obstacle_separation(&agent(0, 11.0, 10.0), &wall);
        assert_eq!(sep.distance, 0.0);
        assert_eq!(sep.direction, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn obstacle_rows_follow_agent_order() {
        let world = WorldSnapshot::new(
            vec![agent(0, 0.0, 0.0), agent(1, 20.0, 0.0)],
            vec![Shape::circle(Vec2::new(5.0, 0.0), 1.0), Shape::circle(Vec2::new(25.0, 0.0), 1.0)],
            Goal::new(Vec2::new(50.0, 50.0), 1.0),
            Bounds::new(100.0, 100.0),
        );
        let cache = DistanceCache::build(&world, &ShapeDistance);
        assert!((cache.to_obstacle(0, 0).distance - 3.5).abs() < 1e-12);
        assert!((cache.to_obstacle(1, 1).distance - 3.5).abs() < 1e-12);
        assert!((cache.to_obstacle(1, 0).distance - 13.5).abs() < 1e-12);
    }
}
