//! # Flock
//!
//! Flocking agents whose steering is a weighted sum of inverse-power forces,
//! with the weights evolved by a genetic algorithm.
//!
//! ## Quick Start
//!
//! ```rust
//! use flock::prelude::*;
//!
//! let world = WorldSnapshot::new(
//!     vec![
//!         AgentState::new(AgentId(0), Vec2::new(10.0, 10.0), 1.0, 8.0),
//!         AgentState::new(AgentId(1), Vec2::new(12.0, 14.0), 1.0, 8.0),
//!     ],
//!     vec![Shape::rect(Vec2::new(20.0, 10.0), 2.0, 8.0)],
//!     Goal::new(Vec2::new(35.0, 10.0), 2.0),
//!     Bounds::new(40.0, 30.0),
//! );
//!
//! let genome = Genome {
//!     alignment: Chromosome::new(1.0, 1.0, 5.0),
//!     cohesion: Chromosome::new(1.0, 1.0, 5.0),
//!     repulsion: Chromosome::new(5.0, 2.0, 2.0),
//!     obstacle: Chromosome::new(20.0, 2.0, 3.0),
//!     boundary: Chromosome::new(5.0, 2.0, 2.0),
//!     reward: Chromosome::new(50.0, 0.0, 40.0),
//!     pathfind: PathChromosome::new(Chromosome::new(50.0, 0.0, 5.0), 3.0, 0.5, 60.0),
//! };
//!
//! let mut flock = Flock::new(
//!     ForceConfig::default(),
//!     TokenConfig::default(),
//!     PathfinderConfig::default(),
//!     7,
//! )?;
//! flock.start_generation(&world, genome)?;
//! let outcome = flock.tick(&world)?;
//!
//! assert_eq!(outcome.forces.len(), 2);
//! for (force, agent) in outcome.forces.iter().zip(&world.agents) {
//!     assert!(force.length() <= agent.max_speed + 1e-9);
//! }
//! # Ok::<(), FlockError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`flock_core`] - Geometry, world snapshots, distance caches, statistics, errors
//! - [`flock_agents`] - Genomes, evolution engine, fitness, force composition
//! - [`flock_runtime`] - Tick coordinator, token scheduler, pathfinder, arena, trainer
//!
//! ## Each Tick
//!
//! | Step | Component | Output |
//! |------|-----------|--------|
//! | 1 | `DistanceCache` | agent-agent and agent-obstacle separations |
//! | 2 | `TokenScheduler` | which agents may pathfind |
//! | 3 | `Pathfinder` | waypoints for token holders |
//! | 4 | `ForceEngine` | one steering command per agent |
//!
//! ## Training
//!
//! A [`Trainer`](flock_runtime::trainer::Trainer) runs generations against
//! any [`TrainingWorld`](flock_runtime::trainer::TrainingWorld), scores each
//! with [`FitnessWeights`](flock_agents::fitness::FitnessWeights) and feeds
//! the score to a genome source: a live
//! [`EvolutionEngine`](flock_agents::evolution::EvolutionEngine) or a
//! trained [`FixedGenome`](flock_agents::source::FixedGenome).

pub use flock_agents;
pub use flock_core;
pub use flock_runtime;

pub mod prelude {
    //! Everything needed to set up and train a flock.

    pub use flock_runtime::prelude::*;
}
