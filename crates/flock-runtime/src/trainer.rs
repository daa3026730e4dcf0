//! Trainer — runs generations end to end.
//!
//! One generation: reset the world, fix the genome, tick until every agent
//! has stopped or the tick limit is hit, score the outcome and report it to
//! the genome source. A source that asks for a new map gets one before the
//! next generation starts.

use crate::flock::{Flock, FlockEvent};
use flock_agents::evolution::EvolutionReport;
use flock_agents::fitness::FitnessWeights;
use flock_agents::source::GenomeSource;
use flock_core::error::Result;
use flock_core::stats::GenerationStats;
use flock_core::types::{LayoutId, Tick, Vec2};
use flock_core::world::{LayoutSource, WorldSnapshot};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Unique identifier for a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// A world the trainer can drive.
pub trait TrainingWorld: LayoutSource {
    /// Put every agent back at its spawn for the current map.
    fn reset(&mut self);

    fn snapshot(&self) -> WorldSnapshot;

    /// Advance one tick with one force per agent.
    fn apply_forces(&mut self, forces: &[Vec2]);

    /// True once no agent is moving.
    fn is_finished(&self) -> bool;

    fn generation_stats(&self) -> GenerationStats;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Tick limit per generation (30 s at 60 ticks per second).
    pub max_ticks: Tick,
    pub record_events: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_ticks: 1800,
            record_events: true,
        }
    }
}

/// Outcome of one generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRecord {
    pub generation: u64,
    pub round: u64,
    pub slot: usize,
    pub layout: LayoutId,
    pub ticks: Tick,
    pub completed: u32,
    pub bird_collisions: u32,
    pub wall_collisions: u32,
    pub completion_rate: f64,
    pub fitness: f64,
}

pub struct Trainer<W: TrainingWorld, S: GenomeSource> {
    id: RunId,
    config: TrainerConfig,
    world: W,
    source: S,
    flock: Flock,
    weights: FitnessWeights,
    generation: u64,
    history: Vec<GenerationRecord>,
    reports: Vec<EvolutionReport>,
    events: Vec<(u64, FlockEvent)>,
}

impl<W: TrainingWorld, S: GenomeSource> Trainer<W, S> {
    pub fn new(
        config: TrainerConfig,
        world: W,
        source: S,
        flock: Flock,
        weights: FitnessWeights,
    ) -> Self {
        Self {
            id: RunId::new(),
            config,
            world,
            source,
            flock,
            weights,
            generation: 0,
            history: Vec::new(),
            reports: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Run one generation and score it.
    pub fn run_generation(&mut self) -> Result<GenerationRecord> {
        let evaluation = self.source.next_evaluation()?;
        let generation = self.generation;

        self.world.reset();
        let start = self.world.snapshot();
        self.flock.start_generation(&start, evaluation.genome)?;
        self.emit(FlockEvent::GenerationStarted {
            generation,
            round: evaluation.round,
            slot: evaluation.slot,
            layout: start.layout,
        });

        let mut ticks = 0;
        while ticks < self.config.max_ticks && !self.world.is_finished() {
            let snapshot = self.world.snapshot();
            let outcome = self.flock.tick(&snapshot)?;
            self.world.apply_forces(&outcome.forces);
            ticks += 1;
        }

        let stats = self.world.generation_stats();
        let fitness = self.weights.score(&stats);
        let record = GenerationRecord {
            generation,
            round: evaluation.round,
            slot: evaluation.slot,
            layout: start.layout,
            ticks,
            completed: stats.completed,
            bird_collisions: stats.bird_collisions,
            wall_collisions: stats.wall_collisions,
            completion_rate: stats.completion_rate(),
            fitness,
        };
        info!(
            run = %self.id,
            generation,
            slot = evaluation.slot,
            ticks,
            completed = stats.completed,
            fitness,
            "Generation finished"
        );
        self.emit(FlockEvent::GenerationFinished {
            generation,
            ticks,
            completed: stats.completed,
            bird_collisions: stats.bird_collisions,
            wall_collisions: stats.wall_collisions,
            fitness,
        });

        let outcome = self.source.submit(&evaluation, fitness)?;
        if let Some(report) = outcome.report() {
            self.reports.push(report.clone());
            self.emit(FlockEvent::Evolved(report.clone()));
        }
        if let Some(map) = outcome.map_change() {
            info!(run = %self.id, map = map.0, "Changing map");
            self.world.change_layout(map);
            self.emit(FlockEvent::LayoutChanged { map });
        }

        self.history.push(record.clone());
        self.generation += 1;
        Ok(record)
    }

    /// Run `generations` generations back to back.
    pub fn run(&mut self, generations: u64) -> Result<Vec<GenerationRecord>> {
        (0..generations).map(|_| self.run_generation()).collect()
    }

    fn emit(&mut self, event: FlockEvent) {
        if self.config.record_events {
            self.events.push((self.generation, event));
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn history(&self) -> &[GenerationRecord] {
        &self.history
    }

    pub fn reports(&self) -> &[EvolutionReport] {
        &self.reports
    }

    /// Recorded events tagged with their generation.
    pub fn events(&self) -> &[(u64, FlockEvent)] {
        &self.events
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn flock(&self) -> &Flock {
        &self.flock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Arena, ArenaConfig};
    use crate::pathfind::PathfinderConfig;
    use crate::scheduler::TokenConfig;
    use flock_agents::evolution::{EvolutionConfig, EvolutionEngine};
    use flock_agents::forces::ForceConfig;
    use flock_agents::genome::GeneRanges;
    use flock_agents::source::FixedGenome;
    use flock_core::types::MapId;

    fn small_arena() -> Arena {
        Arena::new(ArenaConfig {
            agent_count: 6,
            obstacle_count: 2,
            seed: 5,
            ..ArenaConfig::default()
        })
        .unwrap()
    }

    fn flock() -> Flock {
        Flock::new(
            ForceConfig::default(),
            TokenConfig::default(),
            PathfinderConfig { grid_step: 2.0, ..PathfinderConfig::default() },
            3,
        )
        .unwrap()
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn engine_round_evolves() {
        let engine = EvolutionEngine::new(
            EvolutionConfig {
                population_size: 2,
                ..EvolutionConfig::default()
            },
            GeneRanges::default(),
            8,
        )
        .unwrap();
        let config = TrainerConfig {
            max_ticks: 60,
            record_events: true,
        };
        let weights = FitnessWeights::default();
        let mut trainer = Trainer::new(config, small_arena(), engine, flock(), weights);
        let records = trainer.run(2).unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.ticks <= 60 && r.fitness >= 1.0));
        assert_eq!(trainer.reports().len(), 1);
        assert_eq!(trainer.source().round(), 1);
        assert!(trainer
            .events()
            .iter()
            .any(|(_, e)| matches!(e, FlockEvent::Evolved(_))));
    }

    #[test]
    fn trials_share_maps_across_genomes() {
        let engine = EvolutionEngine::new(
            EvolutionConfig {
                population_size: 2,
                trials_per_genome: 2,
                ..EvolutionConfig::default()
            },
            GeneRanges::default(),
            11,
        )
        .unwrap();
        let config = TrainerConfig {
            max_ticks: 20,
            record_events: true,
        };
        let weights = FitnessWeights::default();
        let mut trainer = Trainer::new(config, small_arena(), engine, flock(), weights);
        let records = trainer.run(4).unwrap();

        let runs: Vec<_> = records.iter().map(|r| (r.slot, r.layout)).collect();
        assert_eq!(
            runs,
            vec![(0, LayoutId(0)), (0, LayoutId(1)), (1, LayoutId(0)), (1, LayoutId(1))]
        );
        assert_eq!(trainer.reports().len(), 1);
        assert_eq!(trainer.world().current_map(), MapId(0));
    }

    #[test]
    fn fixed_genome_walks_maps() {
        let mut rng = <rand_chacha::ChaCha8Rng as rand::SeedableRng>::seed_from_u64(2);
        let genome = flock_agents::genome::Genome::random(&GeneRanges::default(), &mut rng);
        let config = TrainerConfig {
            max_ticks: 30,
            record_events: false,
        };
        let mut trainer = Trainer::new(
            config,
            small_arena(),
            FixedGenome::new(genome),
            flock(),
            FitnessWeights::default(),
        );
        let records = trainer.run(3).unwrap();
        let layouts: Vec<_> = records.iter().map(|r| r.layout).collect();
        assert_eq!(layouts, vec![LayoutId(0), LayoutId(1), LayoutId(2)]);
        assert_eq!(trainer.world().current_map(), MapId(3));
        assert!(trainer.events().is_empty());
    }
}
