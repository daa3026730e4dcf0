//! Flock — the per-tick coordinator.
//!
//! Each tick:
//! 1. The distance cache is rebuilt from the snapshot
//! 2. The scheduler hands out pathfinding tokens
//! 3. Token holders query the pathfinder
//! 4. The force engine composes one steering command per agent
//!
//! The graph is rebuilt whenever the snapshot's layout differs from the
//! one it was built for. Applying the commands is the world owner's job.

use crate::pathfind::{Pathfinder, PathfinderConfig};
use crate::scheduler::{TokenAssignment, TokenConfig, TokenLedger, TokenScheduler};
use flock_agents::evolution::EvolutionReport;
use flock_agents::forces::{ForceConfig, ForceEngine};
use flock_agents::genome::Genome;
use flock_core::error::{FlockError, Result};
use flock_core::types::{LayoutId, MapId, Tick, Vec2};
use flock_core::world::{DistanceCache, DistanceOracle, ShapeDistance, WorldSnapshot};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::debug;

/// Event emitted while training a flock.
#[derive(Debug, Clone, Serialize)]
pub enum FlockEvent {
    /// A generation began with the given genome slot.
    GenerationStarted {
        generation: u64,
        round: u64,
        slot: usize,
        layout: LayoutId,
    },
    /// A generation ended and was scored.
    GenerationFinished {
        generation: u64,
        ticks: Tick,
        completed: u32,
        bird_collisions: u32,
        wall_collisions: u32,
        fitness: f64,
    },
    /// The population evolved.
    Evolved(EvolutionReport),
    /// The world was asked for a different map.
    LayoutChanged { map: MapId },
}

/// Everything decided on one tick.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Steering command per agent.
    pub forces: Vec<Vec2>,
    pub tokens: TokenAssignment,
    /// Waypoints for token holders, from the agent's position to the goal.
    /// Empty when the search failed.
    pub paths: Vec<Option<Vec<Vec2>>>,
}

pub struct Flock {
    engine: ForceEngine,
    scheduler: TokenScheduler,
    pathfinder: Pathfinder,
    oracle: Box<dyn DistanceOracle>,
    ledger: TokenLedger,
    rng: ChaCha8Rng,
    genome: Option<Genome>,
    tick: Tick,
}

impl Flock {
    pub fn new(
        forces: ForceConfig,
        tokens: TokenConfig,
        pathfinder: PathfinderConfig,
        seed: u64,
    ) -> Result<Self> {
        Ok(Self {
            engine: ForceEngine::new(forces),
            scheduler: TokenScheduler::new(tokens),
            pathfinder: Pathfinder::new(pathfinder)?,
            oracle: Box::new(ShapeDistance),
            ledger: TokenLedger::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            genome: None,
            tick: 0,
        })
    }

    /// Replace the distance oracle used to build each tick's cache.
    pub fn with_oracle(mut self, oracle: Box<dyn DistanceOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Begin a generation: fix the genome, forget carried tokens and make
    /// sure the graph matches the world's layout.
    pub fn start_generation(&mut self, world: &WorldSnapshot, genome: Genome) -> Result<()> {
        if world.agents.is_empty() {
            return Err(FlockError::no_agents());
        }
        self.sync_layout(world);
        self.ledger.reset(world.agents.len());
        self.genome = Some(genome);
        self.tick = 0;
        Ok(())
    }

    pub fn tick(&mut self, world: &WorldSnapshot) -> Result<TickOutcome> {
        let genome = self.genome.ok_or_else(FlockError::no_generation)?;
        self.sync_layout(world);

        let cache = DistanceCache::build(world, self.oracle.as_ref());
        let tokens = self
            .scheduler
            .allocate(world, &cache, &genome, &mut self.ledger, &mut self.rng);

        let mut paths: Vec<Option<Vec<Vec2>>> = vec![None; world.agents.len()];
        for i in tokens.holders() {
            paths[i] = Some(self.pathfinder.calculate_path(world.agents[i].position));
        }

        // The engine follows waypoints ahead of the agent, so the start
        // point is dropped.
        let ahead: Vec<Option<Vec<Vec2>>> = paths
            .iter()
            .map(|p| p.as_ref().map(|p| p.iter().skip(1).copied().collect()))
            .collect();
        let forces = self.engine.make_decisions(world, &cache, &genome, &ahead);

        self.tick += 1;
        Ok(TickOutcome {
            forces,
            tokens,
            paths,
        })
    }

    fn sync_layout(&mut self, world: &WorldSnapshot) {
        if self.pathfinder.layout() != Some(world.layout) {
            debug!(layout = world.layout.0, "Layout changed, rebuilding graph");
            self.pathfinder.initialize(world);
        }
    }

    pub fn genome(&self) -> Option<&Genome> {
        self.genome.as_ref()
    }

    /// Ticks since the current generation started.
    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    pub fn pathfinder(&self) -> &Pathfinder {
        &self.pathfinder
    }

    pub fn scheduler(&self) -> &TokenScheduler {
        &self.scheduler
    }

    pub fn engine(&self) -> &ForceEngine {
        &self.engine
    }
}
