//! Genome sources for the trainer.
//!
//! A trainer does not care whether genomes come from a live evolution
//! engine or from a genome that was already trained. Both hand out
//! evaluations and accept fitness scores through [`GenomeSource`].

use crate::evolution::{EvolutionEngine, Evaluation, ScoreOutcome};
use crate::genome::Genome;
use flock_core::error::{EvolutionError, Result};
use flock_core::types::MapId;

/// Supplies genomes and consumes their fitness.
pub trait GenomeSource {
    /// The genome to run the next generation with.
    fn next_evaluation(&mut self) -> Result<Evaluation>;

    /// Report the fitness of a finished generation.
    ///
    /// The outcome may ask the caller to switch maps before the next
    /// generation.
    fn submit(&mut self, evaluation: &Evaluation, fitness: f64) -> Result<ScoreOutcome>;
}

impl GenomeSource for EvolutionEngine {
    fn next_evaluation(&mut self) -> Result<Evaluation> {
        self.next()
    }

    fn submit(&mut self, evaluation: &Evaluation, fitness: f64) -> Result<ScoreOutcome> {
        self.score(evaluation, fitness)
    }
}

/// A trained genome evaluated on a rotating sequence of maps.
///
/// Every scored trial moves on to the next map id, so repeated runs
/// benchmark one genome across many layouts.
pub struct FixedGenome {
    genome: Genome,
    map: u32,
    trials: u64,
    scores: Vec<f64>,
}

impl FixedGenome {
    pub fn new(genome: Genome) -> Self {
        Self {
            genome,
            map: 0,
            trials: 0,
            scores: Vec::new(),
        }
    }

    /// Start on `map` instead of map 0.
    pub fn starting_at(mut self, map: MapId) -> Self {
        self.map = map.0;
        self
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Map the current trial runs on.
    pub fn current_map(&self) -> MapId {
        MapId(self.map)
    }

    /// Fitness of every scored trial, in order.
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn average(&self) -> Option<f64> {
        if self.scores.is_empty() {
            None
        } else {
            Some(self.scores.iter().sum::<f64>() / self.scores.len() as f64)
        }
    }
}

impl GenomeSource for FixedGenome {
    fn next_evaluation(&mut self) -> Result<Evaluation> {
        Ok(Evaluation {
            round: self.trials,
            slot: 0,
            trial: 0,
            genome: self.genome,
        })
    }

    fn submit(&mut self, evaluation: &Evaluation, fitness: f64) -> Result<ScoreOutcome> {
        if evaluation.round != self.trials {
            return Err(EvolutionError::StaleEvaluation {
                evaluation_round: evaluation.round,
                current_round: self.trials,
            }
            .into());
        }
        self.scores.push(fitness);
        self.trials += 1;
        self.map += 1;
        Ok(ScoreOutcome::NextMap(MapId(self.map)))
    }
}
