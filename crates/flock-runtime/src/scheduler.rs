//! Token scheduler — rations pathfinding across the flock.
//!
//! Pathfinding is expensive, so only `budget` agents per tick get a token
//! to consult it. Priority goes to:
//!
//! 1. agents that held a token last tick (kept with the carry-over
//!    probability),
//! 2. agents with no leader in view, in shuffled order,
//! 3. anyone else still moving, in shuffled order.
//!
//! Everyone without a token steers straight at the goal.

use flock_agents::genome::Genome;
use flock_core::world::{AgentState, DistanceCache, WorldSnapshot};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Maximum number of tokens granted per tick.
    pub budget: usize,
    /// Replaces the genome's carry-over probability when set.
    pub carryover_override: Option<f64>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            budget: 5,
            carryover_override: None,
        }
    }
}

/// Which agents held a token on the previous tick.
#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    held: Vec<bool>,
}

impl TokenLedger {
    pub fn new(agents: usize) -> Self {
        Self {
            held: vec![false; agents],
        }
    }

    /// Forget every token; called at generation start.
    pub fn reset(&mut self, agents: usize) {
        self.held.clear();
        self.held.resize(agents, false);
    }

    pub fn held(&self, agent: usize) -> bool {
        self.held.get(agent).copied().unwrap_or(false)
    }

    fn record(&mut self, assignment: &TokenAssignment) {
        self.held.clone_from(&assignment.tokens);
    }
}

/// Per-tick token flags, indexed by agent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TokenAssignment {
    pub tokens: Vec<bool>,
}

impl TokenAssignment {
    pub fn has_token(&self, agent: usize) -> bool {
        self.tokens.get(agent).copied().unwrap_or(false)
    }

    pub fn granted(&self) -> usize {
        self.tokens.iter().filter(|t| **t).count()
    }

    pub fn holders(&self) -> impl Iterator<Item = usize> + '_ {
        self.tokens
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.then_some(i))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenScheduler {
    config: TokenConfig,
}

impl TokenScheduler {
    pub fn new(config: TokenConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Hand out this tick's tokens and record them in the ledger.
    pub fn allocate<R: Rng + ?Sized>(
        &self,
        world: &WorldSnapshot,
        cache: &DistanceCache,
        genome: &Genome,
        ledger: &mut TokenLedger,
        rng: &mut R,
    ) -> TokenAssignment {
        let n = world.agents.len();
        let mut tokens = vec![false; n];
        let mut budget = self.config.budget;
        let carryover = self
            .config
            .carryover_override
            .unwrap_or(genome.pathfind.carryover);

        for (i, agent) in world.agents.iter().enumerate() {
            if budget == 0 {
                break;
            }
            if !agent.moving || !ledger.held(i) {
                continue;
            }
            if rng.random::<f64>() > carryover {
                continue;
            }
            tokens[i] = true;
            budget -= 1;
        }

        if budget > 0 {
            let mut order: Vec<usize> = (0..n).collect();
            order.shuffle(rng);
            for i in order {
                if budget == 0 {
                    break;
                }
                if tokens[i] || !world.agents[i].moving || has_leader(world, cache, genome, i) {
                    continue;
                }
                tokens[i] = true;
                budget -= 1;
            }
        }

        if budget > 0 {
            let mut order: Vec<usize> = (0..n).collect();
            order.shuffle(rng);
            for i in order {
                if budget == 0 {
                    break;
                }
                if tokens[i] || !world.agents[i].moving {
                    continue;
                }
                tokens[i] = true;
                budget -= 1;
            }
        }

        let assignment = TokenAssignment { tokens };
        ledger.record(&assignment);
        assignment
    }
}

/// Whether a moving neighbour within the path-following cutoff sits inside
/// the agent's view cone.
pub fn has_leader(world: &WorldSnapshot, cache: &DistanceCache, genome: &Genome, i: usize) -> bool {
    let me = &world.agents[i];
    let follow = &genome.pathfind;
    world.agents.iter().enumerate().any(|(j, other)| {
        j != i
            && other.moving
            && cache.between(i, j).distance <= follow.base.distance
            && in_view(me, other, follow.view)
    })
}

/// Whether `other` lies within `half_angle` degrees of `me`'s heading.
pub fn in_view(me: &AgentState, other: &AgentState, half_angle: f64) -> bool {
    let heading = me.velocity.angle().to_degrees();
    let bearing = (other.position - me.position).angle().to_degrees();
    let diff = (heading - bearing).abs() % 360.0;
    diff < half_angle || 360.0 - diff < half_angle
}

#[cfg(test)]
mod tests {
    use super::*;
    use flock_agents::genome::{Chromosome, PathChromosome};
    use flock_core::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn genome(carryover: f64, leader_distance: f64, view: f64) -> Genome {
        let c = Chromosome::new(1.0, 1.0, 1.0);
        Genome {
            alignment: c,
            cohesion: c,
            repulsion: c,
            obstacle: c,
            boundary: c,
            reward: c,
            pathfind: PathChromosome::new(
                Chromosome::new(1.0, 1.0, leader_distance),
                2.0,
                carryover,
                view,
            ),
        }
    }

    fn line_world(n: usize) -> WorldSnapshot {
        let agents = (0..n)
            .map(|i| {
                AgentState::new(AgentId(i), Vec2::new(10.0 + 3.0 * i as f64, 10.0), 1.0, 5.0)
                    .with_velocity(Vec2::new(1.0, 0.0))
            })
            .collect();
        WorldSnapshot::new(
            agents,
            vec![],
            Goal::new(Vec2::new(90.0, 10.0), 2.0),
            Bounds::new(100.0, 50.0),
        )
    }

    #[test]
    fn in_view_wraps_around() {
        let me = AgentState::new(AgentId(0), Vec2::ZERO, 1.0, 1.0)
            .with_velocity(Vec2::new(1.0, -0.01));
        let ahead = AgentState::new(AgentId(1), Vec2::new(5.0, 0.1), 1.0, 1.0);
        let behind = AgentState::new(AgentId(2), Vec2::new(-5.0, 0.0), 1.0, 1.0);
        assert!(in_view(&me, &ahead, 10.0));
        assert!(!in_view(&me, &behind, 10.0));
    }

    #[test]
    fn leaderless_agent_gets_the_only_token() {
        // Everyone heads +x; only the front agent sees nobody ahead.
        let world = line_world(5);
        let cache = DistanceCache::build(&world, &ShapeDistance);
        let g = genome(0.0, 5.0, 30.0);
        let scheduler = TokenScheduler::new(TokenConfig {
            budget: 1,
            carryover_override: None,
        });
        let mut ledger = TokenLedger::new(5);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tokens = scheduler.allocate(&world, &cache, &g, &mut ledger, &mut rng);
        assert_eq!(tokens.holders().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn carryover_keeps_token() {
        let world = line_world(5);
        let cache = DistanceCache::build(&world, &ShapeDistance);
        let scheduler = TokenScheduler::new(TokenConfig {
            budget: 1,
            carryover_override: Some(1.0),
        });
        let mut ledger = TokenLedger::new(5);
        ledger.held[1] = true;
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let g = genome(0.0, 5.0, 30.0);
        let tokens = scheduler.allocate(&world, &cache, &g, &mut ledger, &mut rng);
        assert!(tokens.has_token(1));
        assert!(ledger.held(1));
        assert_eq!(tokens.granted(), 1);
    }

    #[test]
    fn budget_respected_and_resting_agents_skipped() {
        let mut world = line_world(8);
        world.agents[2].moving = false;
        world.agents[5].moving = false;
        let cache = DistanceCache::build(&world, &ShapeDistance);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let g = genome(0.7, 5.0, 45.0);
        for budget in 0..10 {
            let scheduler = TokenScheduler::new(TokenConfig {
                budget,
                carryover_override: None,
            });
            let mut ledger = TokenLedger::new(8);
            for _ in 0..5 {
                let tokens = scheduler.allocate(&world, &cache, &g, &mut ledger, &mut rng);
                assert!(tokens.granted() <= budget);
                assert_eq!(tokens.granted(), budget.min(6));
                assert!(!tokens.has_token(2) && !tokens.has_token(5));
            }
        }
    }
}
