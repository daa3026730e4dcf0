//! Force decision engine — per-tick steering for every agent.
//!
//! Each moving agent sums weighted sub-forces, one per force rule, each
//! an inverse power of distance capped at an asymptote:
//!
//! ```text
//! f = min(constant / dist^exponent, asymptote)     (dist == 0 → asymptote)
//! ```
//!
//! Static forces (cohesion, obstacle, goal, boundary) are computed first.
//! Their magnitudes feed the optional adaptive repulsion, which is added
//! together with alignment. The resultant is turned into a steering
//! command of the agent's max speed.

use crate::genome::{Chromosome, Genome};
use flock_core::types::Vec2;
use flock_core::world::{AgentState, DistanceCache, WorldSnapshot};
use serde::{Deserialize, Serialize};

/// Default force cap.
pub const DEFAULT_ASYMPTOTE: f64 = 1_000_000.0;

/// Dot product of heading and aim at or below which the agent turns
/// straight onto its aim.
const REVERSE_DOT: f64 = -0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceConfig {
    /// Cap on any single inverse-law magnitude.
    pub asymptote: f64,
    /// Scale each repulsion push by `2·m_j / (m_i + m_j)`, where `m` is the
    /// static force magnitude of each agent.
    pub adaptive_repulsion: bool,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            asymptote: DEFAULT_ASYMPTOTE,
            adaptive_repulsion: false,
        }
    }
}

/// Inverse-law magnitude for a rule at `dist`.
pub fn inverse_law(dist: f64, chromosome: &Chromosome, asymptote: f64) -> f64 {
    if dist <= 0.0 {
        return asymptote;
    }
    let f = chromosome.constant / dist.powf(chromosome.exponent);
    if f.is_nan() {
        asymptote
    } else {
        f.min(asymptote)
    }
}

/// Force of magnitude `inverse_law(dist)` along `direction`.
pub fn calc_force(direction: Vec2, dist: f64, chromosome: &Chromosome, asymptote: f64) -> Vec2 {
    direction * inverse_law(dist, chromosome, asymptote)
}

/// Turn a desired force into a steering command.
///
/// The agent's heading and the force direction are averaged, and that
/// average is mirrored about the force axis. This removes the velocity
/// component across the aim while keeping the component along it. When
/// the aim points mostly backwards, or the agent is at rest, the command
/// is the aim itself. A zero force gives a zero command.
pub fn steer(agent: &AgentState, force: Vec2) -> Vec2 {
    if force.is_zero() || !force.is_finite() {
        return Vec2::ZERO;
    }
    let vel = agent.velocity.normalized();
    let aim = force.normalized();

    let direction = if vel.dot(aim) > REVERSE_DOT && !vel.is_zero() {
        let ave = ((vel + aim) / 2.0).normalized();
        (-ave).reflect(aim).normalized()
    } else {
        aim
    };
    direction * agent.max_speed
}

/// Stateless force composer.
#[derive(Debug, Clone, Default)]
pub struct ForceEngine {
    config: ForceConfig,
}

impl ForceEngine {
    pub fn new(config: ForceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForceConfig {
        &self.config
    }

    /// One steering command per agent, each no longer than that agent's
    /// max speed.
    ///
    /// `paths[i]` is `Some` for agents holding a pathfinding token. An
    /// empty path, or a missing entry, means direct goal seeking.
    pub fn make_decisions(
        &self,
        world: &WorldSnapshot,
        cache: &DistanceCache,
        genome: &Genome,
        paths: &[Option<Vec<Vec2>>],
    ) -> Vec<Vec2> {
        let n = world.agents.len();

        let statics: Vec<Vec2> = (0..n)
            .map(|i| {
                if !world.agents[i].moving {
                    return Vec2::ZERO;
                }
                let path = paths.get(i).and_then(|p| p.as_deref());
                self.cohesion(world, cache, genome, i)
                    + self.obstacle(world, cache, genome, i)
                    + self.goal(world, genome, i, path)
                    + self.boundary(world, genome, i)
            })
            .collect();
        let magnitudes: Vec<f64> = statics.iter().map(Vec2::length).collect();

        (0..n)
            .map(|i| {
                let me = &world.agents[i];
                if !me.moving {
                    return Vec2::ZERO;
                }
                let dynamic = self.repulsion(world, cache, genome, i, &magnitudes)
                    + self.alignment(world, cache, genome, i);
                steer(me, statics[i] + dynamic)
            })
            .collect()
    }

    fn neighbours<'a>(
        &self,
        world: &'a WorldSnapshot,
        cache: &'a DistanceCache,
        i: usize,
        cutoff: f64,
    ) -> impl Iterator<Item = (usize, &'a AgentState)> + 'a {
        world
            .agents
            .iter()
            .enumerate()
            .filter(move |(j, other)| {
                *j != i && other.moving && cache.between(i, *j).distance <= cutoff
            })
    }

    /// Pull toward the centroid of nearby moving agents.
    fn cohesion(
        &self,
        world: &WorldSnapshot,
        cache: &DistanceCache,
        genome: &Genome,
        i: usize,
    ) -> Vec2 {
        let chromosome = &genome.cohesion;
        let mut sum = Vec2::ZERO;
        let mut count = 0usize;
        for (_, other) in self.neighbours(world, cache, i, chromosome.distance) {
            sum += other.position;
            count += 1;
        }
        if count == 0 {
            return Vec2::ZERO;
        }
        let delta = sum / count as f64 - world.agents[i].position;
        if delta.is_zero() {
            return Vec2::ZERO;
        }
        calc_force(delta.normalized(), delta.length(), chromosome, self.config.asymptote)
    }

    /// Turn toward the headings of nearby agents.
    fn alignment(
        &self,
        world: &WorldSnapshot,
        cache: &DistanceCache,
        genome: &Genome,
        i: usize,
    ) -> Vec2 {
        let chromosome = &genome.alignment;
        let asymptote = self.config.asymptote;
        let force: Vec2 = self
            .neighbours(world, cache, i, chromosome.distance)
            .map(|(j, other)| {
                other.velocity.normalized()
                    * inverse_law(cache.between(i, j).distance, chromosome, asymptote)
            })
            .sum();
        force.clamp_length(asymptote)
    }

    /// Push away from nearby agents.
    fn repulsion(
        &self,
        world: &WorldSnapshot,
        cache: &DistanceCache,
        genome: &Genome,
        i: usize,
        magnitudes: &[f64],
    ) -> Vec2 {
        let chromosome = &genome.repulsion;
        let asymptote = self.config.asymptote;
        let force: Vec2 = self
            .neighbours(world, cache, i, chromosome.distance)
            .map(|(j, _)| {
                let sep = cache.between(i, j);
                let factor = if self.config.adaptive_repulsion {
                    adaptive_factor(magnitudes[i], magnitudes[j])
                } else {
                    1.0
                };
                calc_force(-sep.direction, sep.distance, chromosome, asymptote) * factor
            })
            .sum();
        force.clamp_length(asymptote)
    }

    /// Push away from nearby obstacles along the nearest-point vector.
    fn obstacle(
        &self,
        world: &WorldSnapshot,
        cache: &DistanceCache,
        genome: &Genome,
        i: usize,
    ) -> Vec2 {
        let chromosome = &genome.obstacle;
        let asymptote = self.config.asymptote;
        let force: Vec2 = (0..world.obstacles.len())
            .map(|k| cache.to_obstacle(i, k))
            .filter(|sep| sep.distance <= chromosome.distance)
            .map(|sep| calc_force(-sep.direction, sep.distance, chromosome, asymptote))
            .sum();
        force.clamp_length(asymptote)
    }

    /// Keep the agent inside the arena.
    fn boundary(&self, world: &WorldSnapshot, genome: &Genome, i: usize) -> Vec2 {
        let chromosome = &genome.boundary;
        let asymptote = self.config.asymptote;
        let pos = world.agents[i].position;
        let bounds = world.bounds;

        let axis = |low: f64, high: f64| -> f64 {
            let mut f = 0.0;
            if low <= chromosome.distance {
                f += inverse_law(low.max(0.0), chromosome, asymptote);
            }
            if high <= chromosome.distance {
                f -= inverse_law(high.max(0.0), chromosome, asymptote);
            }
            f.clamp(-asymptote, asymptote)
        };

        Vec2::new(
            axis(pos.x, bounds.width - pos.x),
            axis(pos.y, bounds.height - pos.y),
        )
        .clamp_length(asymptote)
    }

    /// Goal seeking: path following for token holders with a path,
    /// a direct pull otherwise.
    fn goal(
        &self,
        world: &WorldSnapshot,
        genome: &Genome,
        i: usize,
        path: Option<&[Vec2]>,
    ) -> Vec2 {
        let pos = world.agents[i].position;
        let asymptote = self.config.asymptote;

        if let Some(path) = path.filter(|p| !p.is_empty()) {
            let follow = &genome.pathfind;
            return path
                .iter()
                .take(follow.step_count())
                .enumerate()
                .map(|(step, waypoint)| {
                    let dir = (*waypoint - pos).normalized();
                    calc_force(dir, (step + 1) as f64, &follow.base, asymptote)
                })
                .sum();
        }

        let delta = world.goal.position - pos;
        let dist = delta.length();
        if dist > genome.reward.distance {
            return Vec2::ZERO;
        }
        calc_force(delta.normalized(), dist, &genome.reward, asymptote)
    }
}

/// Repulsion scale for a neighbour with static force magnitude `theirs`.
/// Equal magnitudes (including both zero) give 1.
pub fn adaptive_factor(mine: f64, theirs: f64) -> f64 {
    let total = mine + theirs;
    if total <= 0.0 {
        1.0
    } else {
        2.0 * theirs / total
    }
}
