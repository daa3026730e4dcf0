//! Genetic evolution of flock genomes.
//!
//! The engine owns a fixed-size population. It hands out one
//! [`Evaluation`] per genome and trial, collects a fitness score for each,
//! and once the whole round is scored it breeds the next population:
//! roulette-wheel selection over floored scores, per-field uniform
//! crossover, and uniform mutation scaled by an annealed global rate.
//!
//! With several trials per genome, trial `k` of a round runs on the same
//! map for every genome, and scoring asks for the map of the trial that
//! comes next. If the population average stops improving for several
//! rounds the engine moves on to a fresh set of maps, so the flock does
//! not overfit one layout.

use crate::genome::{GeneRanges, Genome};
use flock_core::error::{EvolutionError, FlockError, Result};
use flock_core::types::MapId;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Tunables for the evolution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Number of genomes per round.
    pub population_size: usize,
    /// Trials (maps) each genome is evaluated on per round.
    pub trials_per_genome: usize,
    /// Initial global mutation rate, in (0, 1].
    pub mutation_rate: f64,
    /// Floor for the annealed mutation rate.
    pub min_mutation_rate: f64,
    /// Multiplier applied to the rate when the population converges.
    pub anneal_factor: f64,
    /// Best/average ratio below which the population counts as converged.
    pub convergence_ratio: f64,
    /// The average must exceed this fraction of the best average so far
    /// to count as progress.
    pub cutoff_fraction: f64,
    /// Rounds without progress before a map change is requested.
    pub strikes: u32,
    /// Add the population average back to every floored score before
    /// selection.
    pub average_smoothing: bool,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 30,
            trials_per_genome: 1,
            mutation_rate: 1.0,
            min_mutation_rate: 0.05,
            anneal_factor: 0.9,
            convergence_ratio: 1.1,
            cutoff_fraction: 1.0,
            strikes: 3,
            average_smoothing: true,
        }
    }
}

impl EvolutionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(FlockError::empty_population());
        }
        if self.trials_per_genome == 0 {
            return Err(FlockError::invalid_value(
                "evolution.trials_per_genome",
                0,
                "each genome needs at least one trial",
            ));
        }
        if !(self.mutation_rate > 0.0 && self.mutation_rate <= 1.0) {
            return Err(FlockError::out_of_range(
                "evolution.mutation_rate",
                0.0,
                1.0,
                self.mutation_rate,
            ));
        }
        if !(self.min_mutation_rate > 0.0 && self.min_mutation_rate <= self.mutation_rate) {
            return Err(FlockError::out_of_range(
                "evolution.min_mutation_rate",
                0.0,
                self.mutation_rate,
                self.min_mutation_rate,
            ));
        }
        if !(self.anneal_factor > 0.0 && self.anneal_factor <= 1.0) {
            return Err(FlockError::out_of_range(
                "evolution.anneal_factor",
                0.0,
                1.0,
                self.anneal_factor,
            ));
        }
        if !self.convergence_ratio.is_finite() || !self.cutoff_fraction.is_finite() {
            return Err(FlockError::invalid_value(
                "evolution",
                format!("{} / {}", self.convergence_ratio, self.cutoff_fraction),
                "convergence_ratio and cutoff_fraction must be finite",
            ));
        }
        Ok(())
    }
}

/// Handle for one pending fitness evaluation.
///
/// Handles are scoped to a round: once the round evolves, scoring an old
/// handle fails with [`EvolutionError::StaleEvaluation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub round: u64,
    /// Index of the genome in the population.
    pub slot: usize,
    /// Trial number for this genome within the round.
    pub trial: usize,
    pub genome: Genome,
}

/// Summary of one evolve step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionReport {
    /// The round that was just completed.
    pub round: u64,
    /// Mean floored score of the completed round.
    pub average: f64,
    /// Best floored score of the completed round.
    pub best: f64,
    /// Genome that earned `best`.
    pub best_genome: Genome,
    /// Mutation rate used to breed the next round.
    pub mutation_rate: f64,
    /// Map the next round starts on, when it differs from the one the
    /// last trial ran on: after stagnation, or when a multi-trial round
    /// returns to its first trial's map.
    pub map_change: Option<MapId>,
}

/// Result of recording one score.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    /// The round still has unscored evaluations.
    Pending,
    /// The round completed and a new population was bred.
    Evolved(EvolutionReport),
    /// The source wants the next trial to run on a different map.
    NextMap(MapId),
}

impl ScoreOutcome {
    pub fn map_change(&self) -> Option<MapId> {
        match self {
            ScoreOutcome::Pending => None,
            ScoreOutcome::Evolved(report) => report.map_change,
            ScoreOutcome::NextMap(map) => Some(*map),
        }
    }

    pub fn report(&self) -> Option<&EvolutionReport> {
        match self {
            ScoreOutcome::Evolved(report) => Some(report),
            _ => None,
        }
    }
}

/// Population-based genome evolution.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    ranges: GeneRanges,
    rng: ChaCha8Rng,
    population: Vec<Genome>,
    /// One entry per (slot, trial), slot-major.
    scores: Vec<Option<f64>>,
    cursor: usize,
    round: u64,
    mutation_rate: f64,
    max_average: f64,
    strikes: u32,
    map_block: u32,
}

impl EvolutionEngine {
    /// Build an engine with a randomly initialized population.
    pub fn new(config: EvolutionConfig, ranges: GeneRanges, seed: u64) -> Result<Self> {
        config.validate()?;
        ranges.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let population = (0..config.population_size)
            .map(|_| Genome::random(&ranges, &mut rng))
            .collect();
        Self::with_population(config, ranges, population, rng)
    }

    /// Build an engine around an existing population.
    pub fn from_population(
        config: EvolutionConfig,
        ranges: GeneRanges,
        population: Vec<Genome>,
        seed: u64,
    ) -> Result<Self> {
        if population.is_empty() {
            return Err(EvolutionError::EmptyPopulation.into());
        }
        let config = EvolutionConfig {
            population_size: population.len(),
            ..config
        };
        config.validate()?;
        ranges.validate()?;
        Self::with_population(config, ranges, population, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_population(
        config: EvolutionConfig,
        ranges: GeneRanges,
        population: Vec<Genome>,
        rng: ChaCha8Rng,
    ) -> Result<Self> {
        let mutation_rate = config.mutation_rate;
        let slots = population.len() * config.trials_per_genome;
        Ok(Self {
            config,
            ranges,
            rng,
            population,
            scores: vec![None; slots],
            cursor: 0,
            round: 0,
            mutation_rate,
            max_average: 0.0,
            strikes: 0,
            map_block: 0,
        })
    }

    /// The next evaluation of the current round, in population order.
    pub fn next(&mut self) -> Result<Evaluation> {
        while self.cursor < self.scores.len() && self.scores[self.cursor].is_some() {
            self.cursor += 1;
        }
        if self.cursor >= self.scores.len() {
            return Err(EvolutionError::RoundExhausted.into());
        }
        let evaluation = self.evaluation_at(self.cursor);
        self.cursor += 1;
        Ok(evaluation)
    }

    /// Every unscored evaluation of the current round.
    pub fn pending(&self) -> Vec<Evaluation> {
        self.scores
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| self.evaluation_at(i))
            .collect()
    }

    /// Record the fitness of an evaluation. Scoring the last outstanding
    /// evaluation of a round breeds the next population.
    pub fn score(&mut self, evaluation: &Evaluation, fitness: f64) -> Result<ScoreOutcome> {
        if evaluation.round != self.round {
            return Err(EvolutionError::StaleEvaluation {
                evaluation_round: evaluation.round,
                current_round: self.round,
            }
            .into());
        }
        let trials = self.config.trials_per_genome;
        if evaluation.slot >= self.population.len() || evaluation.trial >= trials {
            return Err(FlockError::invalid_value(
                "evaluation",
                format!("slot {} trial {}", evaluation.slot, evaluation.trial),
                "not part of this population",
            ));
        }
        let index = evaluation.slot * trials + evaluation.trial;
        if self.scores[index].is_some() {
            return Err(EvolutionError::AlreadyScored {
                round: self.round,
                slot: evaluation.slot,
            }
            .into());
        }
        self.scores[index] = Some(fitness);
        debug!(
            round = self.round,
            slot = evaluation.slot,
            trial = evaluation.trial,
            fitness,
            "Scored evaluation"
        );

        if self.scores.iter().all(Option::is_some) {
            return Ok(ScoreOutcome::Evolved(self.evolve()));
        }
        match self.upcoming_trial() {
            Some(trial) if trial != evaluation.trial => {
                Ok(ScoreOutcome::NextMap(self.trial_map(trial)))
            }
            _ => Ok(ScoreOutcome::Pending),
        }
    }

    /// Map that trial `trial` of the current round runs on.
    ///
    /// Maps come in blocks of `trials_per_genome`; stagnation moves the
    /// engine on to the next block.
    pub fn trial_map(&self, trial: usize) -> MapId {
        let trials = self.config.trials_per_genome as u32;
        MapId(self.map_block * trials + trial as u32)
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn mutation_rate(&self) -> f64 {
        self.mutation_rate
    }

    pub fn population(&self) -> &[Genome] {
        &self.population
    }

    pub fn ranges(&self) -> &GeneRanges {
        &self.ranges
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Mean pairwise parameter-space distance of the population.
    pub fn diversity(&self) -> f64 {
        population_diversity(&self.population, &self.ranges)
    }

    // Trial of the evaluation `next` would hand out.
    fn upcoming_trial(&self) -> Option<usize> {
        self.scores[self.cursor..]
            .iter()
            .position(Option::is_none)
            .map(|i| (self.cursor + i) % self.config.trials_per_genome)
    }

    fn evaluation_at(&self, index: usize) -> Evaluation {
        let trials = self.config.trials_per_genome;
        let slot = index / trials;
        Evaluation {
            round: self.round,
            slot,
            trial: index % trials,
            genome: self.population[slot],
        }
    }

    fn evolve(&mut self) -> EvolutionReport {
        let trials = self.config.trials_per_genome;
        let floored: Vec<f64> = self
            .scores
            .chunks(trials)
            .map(|chunk| {
                let mean = chunk.iter().map(|s| s.unwrap_or(0.0)).sum::<f64>() / trials as f64;
                mean.max(1.0)
            })
            .collect();

        let average = floored.iter().sum::<f64>() / floored.len() as f64;
        let (best_slot, best) = floored
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::MIN), |acc, (i, s)| if s > acc.1 { (i, s) } else { acc });
        let best_genome = self.population[best_slot];

        let weights: Vec<f64> = if self.config.average_smoothing {
            floored.iter().map(|s| s + average).collect()
        } else {
            floored.clone()
        };

        let mut next = Vec::with_capacity(self.population.len());
        for _ in 0..self.population.len() {
            let p1 = select_parent(&weights, &mut self.rng);
            let p2 = select_parent(&weights, &mut self.rng);
            next.push(crossover(
                &self.population[p1],
                &self.population[p2],
                self.mutation_rate,
                &self.ranges,
                &mut self.rng,
            ));
        }
        self.population = next;

        let mutation_rate = self.mutation_rate;
        if best / average < self.config.convergence_ratio {
            self.mutation_rate =
                (self.mutation_rate * self.config.anneal_factor).max(self.config.min_mutation_rate);
        }

        let stagnated = self.track_stagnation(average);
        let map_change = if stagnated || trials > 1 {
            Some(self.trial_map(0))
        } else {
            None
        };
        let report = EvolutionReport {
            round: self.round,
            average,
            best,
            best_genome,
            mutation_rate,
            map_change,
        };

        info!(
            round = report.round,
            average = report.average,
            best = report.best,
            mutation_rate = self.mutation_rate,
            "Population evolved"
        );
        if stagnated {
            let map = self.trial_map(0);
            info!(round = report.round, %map, "Average fitness stagnated, requesting new map");
        }

        self.round += 1;
        self.scores = vec![None; self.population.len() * trials];
        self.cursor = 0;
        report
    }

    fn track_stagnation(&mut self, average: f64) -> bool {
        if average > self.config.cutoff_fraction * self.max_average {
            self.strikes = 0;
        } else {
            self.strikes += 1;
        }
        self.max_average = self.max_average.max(average);

        if self.strikes >= self.config.strikes {
            self.strikes = 0;
            self.max_average = 0.0;
            self.map_block += 1;
            true
        } else {
            false
        }
    }
}

/// Roulette-wheel selection: index `i` is drawn with probability
/// `weights[i] / sum(weights)`.
///
/// Weights must be positive; the engine floors scores at 1 before calling.
pub fn select_parent<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> usize {
    let sum: f64 = weights.iter().sum();
    let mut s = rng.random::<f64>() * sum;
    for (i, w) in weights.iter().enumerate() {
        if s < *w {
            return i;
        }
        s -= w;
    }
    // Rounding can leave a sliver past the last weight.
    weights.len().saturating_sub(1)
}

/// Uniform crossover plus mutation.
///
/// Every field comes from one parent by a fair coin flip, then gets a delta
/// drawn uniformly from `[-range, range] × mutation_rate`, where `range` is
/// the field's mutation range. Results are not clamped to the initial
/// ranges.
pub fn crossover<R: Rng + ?Sized>(
    a: &Genome,
    b: &Genome,
    mutation_rate: f64,
    ranges: &GeneRanges,
    rng: &mut R,
) -> Genome {
    a.combine(b, |kind, x, y| {
        let inherited = if rng.random_bool(0.5) { x } else { y };
        let range = ranges.mutation_range(kind);
        let delta = if range > 0.0 {
            rng.random_range(-range..=range) * mutation_rate
        } else {
            0.0
        };
        inherited + delta
    })
}

/// Mean pairwise distance of a population, 0 for fewer than two genomes.
pub fn population_diversity(population: &[Genome], ranges: &GeneRanges) -> f64 {
    let n = population.len();
    if n < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            total += population[i].distance(&population[j], ranges);
        }
    }
    total / (n * (n - 1) / 2) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(population_size: usize) -> EvolutionConfig {
        EvolutionConfig {
            population_size,
            ..EvolutionConfig::default()
        }
    }

    fn run_round(engine: &mut EvolutionEngine, fitness: impl Fn(usize) -> f64) -> ScoreOutcome {
        let mut last = ScoreOutcome::Pending;
        for evaluation in engine.pending() {
            last = engine.score(&evaluation, fitness(evaluation.slot)).unwrap();
        }
        last
    }

    #[test]
    fn empty_population_is_fatal() {
        let err = EvolutionEngine::new(small_config(0), GeneRanges::default(), 1).err();
        assert_eq!(err, Some(FlockError::empty_population()));
    }

    #[test]
    fn empty_seed_population_rejected() {
        let ranges = GeneRanges::default();
        let err = EvolutionEngine::from_population(small_config(4), ranges, vec![], 1).err();
        assert_eq!(err, Some(FlockError::Evolution(EvolutionError::EmptyPopulation)));

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let seeded = vec![Genome::random(&ranges, &mut rng); 3];
        let engine = EvolutionEngine::from_population(small_config(10), ranges, seeded, 1).unwrap();
        assert_eq!(engine.config().population_size, 3);
    }

    #[test]
    fn next_walks_population_then_exhausts() {
        let mut engine = EvolutionEngine::new(small_config(3), GeneRanges::default(), 1).unwrap();
        let slots: Vec<usize> = (0..3).map(|_| engine.next().unwrap().slot).collect();
        assert_eq!(slots, vec![0, 1, 2]);
        assert!(matches!(
            engine.next(),
            Err(FlockError::Evolution(EvolutionError::RoundExhausted))
        ));
    }

    #[test]
    fn last_score_evolves() {
        let mut engine = EvolutionEngine::new(small_config(4), GeneRanges::default(), 2).unwrap();
        let evaluations: Vec<_> = (0..4).map(|_| engine.next().unwrap()).collect();
        for e in &evaluations[..3] {
            assert_eq!(engine.score(e, 10.0).unwrap(), ScoreOutcome::Pending);
        }
        let outcome = engine.score(&evaluations[3], 10.0).unwrap();
        let report = outcome.report().expect("round should evolve");
        assert_eq!(report.round, 0);
        assert_eq!(engine.round(), 1);
        assert_eq!(engine.population().len(), 4);
    }

    #[test]
    fn stale_and_duplicate_scores_rejected() {
        let mut engine = EvolutionEngine::new(small_config(2), GeneRanges::default(), 3).unwrap();
        let first = engine.next().unwrap();
        engine.score(&first, 5.0).unwrap();
        assert!(matches!(
            engine.score(&first, 5.0),
            Err(FlockError::Evolution(EvolutionError::AlreadyScored { round: 0, slot: 0 }))
        ));

        let second = engine.next().unwrap();
        engine.score(&second, 5.0).unwrap();
        assert!(matches!(
            engine.score(&first, 5.0),
            Err(FlockError::Evolution(EvolutionError::StaleEvaluation { .. }))
        ));
    }

    #[test]
    fn trial_scores_are_averaged() {
        let config = EvolutionConfig {
            population_size: 2,
            trials_per_genome: 2,
            average_smoothing: false,
            ..EvolutionConfig::default()
        };
        let mut engine = EvolutionEngine::new(config, GeneRanges::default(), 4).unwrap();
        let pending = engine.pending();
        assert_eq!(pending.len(), 4);
        assert_eq!((pending[1].slot, pending[1].trial), (0, 1));

        let scores = [100.0, 300.0, 0.0, -50.0];
        let mut outcome = ScoreOutcome::Pending;
        for (e, s) in pending.iter().zip(scores) {
            outcome = engine.score(e, s).unwrap();
        }
        let report = outcome.report().unwrap();
        // Slot 0 averages 200, slot 1 averages -25 and is floored to 1.
        assert!((report.best - 200.0).abs() < 1e-12);
        assert!((report.average - 100.5).abs() < 1e-12);
    }

    #[test]
    fn each_trial_runs_on_its_own_map() {
        let config = EvolutionConfig {
            population_size: 2,
            trials_per_genome: 3,
            ..EvolutionConfig::default()
        };
        let mut engine = EvolutionEngine::new(config, GeneRanges::default(), 9).unwrap();
        let mut maps = Vec::new();
        for _ in 0..5 {
            let e = engine.next().unwrap();
            maps.push(engine.score(&e, 10.0).unwrap().map_change());
        }
        // Trial k of every genome lands on map k.
        let expected = [1, 2, 0, 1, 2].map(|m| Some(MapId(m)));
        assert_eq!(maps, expected);

        // The last trial closes the round and goes back to the first map.
        let e = engine.next().unwrap();
        let outcome = engine.score(&e, 10.0).unwrap();
        assert!(outcome.report().is_some());
        assert_eq!(outcome.map_change(), Some(MapId(0)));
        assert_eq!(engine.trial_map(2), MapId(2));
    }

    #[test]
    fn stagnation_moves_trials_to_fresh_maps() {
        let config = EvolutionConfig {
            population_size: 2,
            trials_per_genome: 2,
            strikes: 1,
            ..EvolutionConfig::default()
        };
        let mut engine = EvolutionEngine::new(config, GeneRanges::default(), 10).unwrap();
        assert_eq!(run_round(&mut engine, |_| 100.0).map_change(), Some(MapId(0)));
        // No improvement: the next round uses maps 2 and 3.
        assert_eq!(run_round(&mut engine, |_| 50.0).map_change(), Some(MapId(2)));
        assert_eq!(engine.trial_map(1), MapId(3));

        let first = engine.next().unwrap();
        assert_eq!(
            engine.score(&first, 10.0).unwrap(),
            ScoreOutcome::NextMap(MapId(3))
        );
    }

    #[test]
    fn converged_population_anneals_rate() {
        let config = EvolutionConfig {
            population_size: 5,
            anneal_factor: 0.5,
            min_mutation_rate: 0.3,
            ..EvolutionConfig::default()
        };
        let mut engine = EvolutionEngine::new(config, GeneRanges::default(), 5).unwrap();
        // Identical scores: best / average = 1 < convergence ratio.
        run_round(&mut engine, |_| 50.0);
        assert!((engine.mutation_rate() - 0.5).abs() < 1e-12);
        run_round(&mut engine, |_| 50.0);
        assert!((engine.mutation_rate() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn spread_population_keeps_rate() {
        let mut engine = EvolutionEngine::new(small_config(4), GeneRanges::default(), 6).unwrap();
        run_round(&mut engine, |slot| if slot == 0 { 1000.0 } else { 1.0 });
        assert_eq!(engine.mutation_rate(), 1.0);
    }

    #[test]
    fn stagnation_requests_map_change() {
        let config = EvolutionConfig {
            population_size: 3,
            strikes: 2,
            ..EvolutionConfig::default()
        };
        let mut engine = EvolutionEngine::new(config, GeneRanges::default(), 7).unwrap();
        // Round 0 sets the record; rounds 1 and 2 fail to beat it.
        assert_eq!(run_round(&mut engine, |_| 100.0).map_change(), None);
        assert_eq!(run_round(&mut engine, |_| 100.0).map_change(), None);
        assert_eq!(run_round(&mut engine, |_| 90.0).map_change(), Some(MapId(1)));
        // Counters reset: the next round is a fresh record.
        assert_eq!(run_round(&mut engine, |_| 10.0).map_change(), None);
    }

    #[test]
    fn same_seed_same_population() {
        let a = EvolutionEngine::new(small_config(6), GeneRanges::default(), 42).unwrap();
        let b = EvolutionEngine::new(small_config(6), GeneRanges::default(), 42).unwrap();
        assert_eq!(a.population(), b.population());
        assert!(a.diversity() > 0.0);
    }
}
