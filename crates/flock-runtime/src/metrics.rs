//! Training metrics.
//!
//! Summarises a trainer's history: how scores moved per round, how often
//! the flock reached the goal, and how varied the population still is.

use crate::flock::FlockEvent;
use crate::trainer::{GenerationRecord, Trainer, TrainingWorld};
use flock_agents::source::GenomeSource;
use flock_core::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;

/// Score summary for one round of the population.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundSummary {
    pub round: u64,
    pub generations: usize,
    pub average_fitness: f64,
    pub best_fitness: f64,
    pub average_completion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingMetrics {
    pub run: String,
    pub generations: u64,
    pub rounds: Vec<RoundSummary>,
    pub best_fitness: f64,
    /// Mean fraction of agents reaching the goal over all generations.
    pub completion_rate: f64,
    pub total_bird_collisions: u64,
    pub total_wall_collisions: u64,
    pub evolutions: usize,
    pub map_changes: usize,
    /// Mean normalized pairwise genome distance, if known.
    pub diversity: Option<f64>,
}

impl TrainingMetrics {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Compute metrics for a trainer. `diversity` comes from the genome
/// source when it has a population.
pub fn compute<W: TrainingWorld, S: GenomeSource>(
    trainer: &Trainer<W, S>,
    diversity: Option<f64>,
) -> TrainingMetrics {
    let history = trainer.history();
    let mut map_changes = 0;
    let mut evolutions = 0;
    for (_, event) in trainer.events() {
        match event {
            FlockEvent::Evolved(_) => evolutions += 1,
            FlockEvent::LayoutChanged { .. } => map_changes += 1,
            _ => {}
        }
    }

    TrainingMetrics {
        run: trainer.id().to_string(),
        generations: trainer.generation(),
        rounds: summarize_rounds(history),
        best_fitness: history.iter().map(|r| r.fitness).fold(0.0, f64::max),
        completion_rate: mean(history.iter().map(|r| r.completion_rate)),
        total_bird_collisions: history.iter().map(|r| u64::from(r.bird_collisions)).sum(),
        total_wall_collisions: history.iter().map(|r| u64::from(r.wall_collisions)).sum(),
        evolutions,
        map_changes,
        diversity,
    }
}

fn summarize_rounds(history: &[GenerationRecord]) -> Vec<RoundSummary> {
    let mut by_round: BTreeMap<u64, Vec<&GenerationRecord>> = BTreeMap::new();
    for record in history {
        by_round.entry(record.round).or_default().push(record);
    }
    by_round
        .into_iter()
        .map(|(round, records)| RoundSummary {
            round,
            generations: records.len(),
            average_fitness: mean(records.iter().map(|r| r.fitness)),
            best_fitness: records.iter().map(|r| r.fitness).fold(0.0, f64::max),
            average_completion: mean(records.iter().map(|r| r.completion_rate)),
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Print a human-readable report.
pub fn print_report(metrics: &TrainingMetrics) {
    println!("── Training Report ─────────────────────────────────");
    println!("  Run:                         {}", metrics.run);
    println!("  Generations:                 {}", metrics.generations);
    println!("  Best fitness:                {:.1}", metrics.best_fitness);
    println!("  Completion rate:             {:.1}%", metrics.completion_rate * 100.0);
    println!("  Bird / wall collisions:      {} / {}",
        metrics.total_bird_collisions,
        metrics.total_wall_collisions);
    println!("  Evolutions / map changes:    {} / {}",
        metrics.evolutions,
        metrics.map_changes);
    if let Some(d) = metrics.diversity {
        println!("  Population diversity:        {:.3}", d);
    }
    println!();
    println!("  Round   Gens   Avg fitness   Best fitness   Completion");
    for r in &metrics.rounds {
        println!("  {:>5}   {:>4}   {:>11.1}   {:>12.1}   {:>9.1}%",
            r.round,
            r.generations,
            r.average_fitness,
            r.best_fitness,
            r.average_completion * 100.0);
    }
    println!("────────────────────────────────────────────────────");
}
