//! Flock Training Demo
//!
//! 1. Evolve a population of genomes on the seeded arena
//! 2. Print per-round scores and the training report
//! 3. Benchmark the best genome on maps it has never seen
//!
//! Usage: `flock-training-demo [rounds] [config.toml]`

use anyhow::{Context, Result};
use flock::flock_runtime::metrics;
use flock::prelude::*;
use std::path::Path;
use tracing::info;

const BENCHMARK_MAPS: u64 = 5;
const FIRST_UNSEEN_MAP: u32 = 10_000;

fn demo_config() -> FlockConfig {
    let mut config = FlockConfig::default();
    config.arena.agent_count = 20;
    config.evolution.population_size = 8;
    config.trainer.max_ticks = 900;
    config
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let rounds: u64 = match args.next() {
        Some(s) => s.parse().context("rounds must be a number")?,
        None => 3,
    };
    let config = match args.next() {
        Some(path) => FlockConfig::load(Path::new(&path))
            .with_context(|| format!("loading {path}"))?,
        None => demo_config(),
    };

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║  Flock Training: Evolved Force-Field Steering        ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    // --- Training ---
    let population = config.evolution.population_size as u64;
    let mut trainer = Trainer::new(
        config.trainer.clone(),
        config.build_arena()?,
        config.build_engine()?,
        config.build_flock()?,
        config.fitness.clone(),
    );
    info!(run = %trainer.id(), rounds, population, "Training");

    for round in 0..rounds {
        let records = trainer.run(population)?;
        let best = records.iter().map(|r| r.fitness).fold(0.0, f64::max);
        let completed: u32 = records.iter().map(|r| r.completed).sum();
        println!(
            "  round {:>3}: best {:>8.1}  completed {:>4}/{}",
            round,
            best,
            completed,
            records.len() * config.arena.agent_count
        );
    }

    let diversity = trainer.source().diversity();
    let report = metrics::compute(&trainer, Some(diversity));
    println!();
    metrics::print_report(&report);

    let Some(best) = trainer.reports().last().map(|r| r.best_genome) else {
        println!("No round completed; nothing to benchmark.");
        return Ok(());
    };
    println!();
    println!("Best genome:");
    println!("{}", best.to_json()?);

    // --- Benchmark on unseen maps ---
    println!();
    println!("── Benchmark: {} unseen maps ─────────────────────────", BENCHMARK_MAPS);
    let mut arena = config.build_arena()?;
    arena.change_layout(MapId(FIRST_UNSEEN_MAP));
    let mut bench = Trainer::new(
        config.trainer.clone(),
        arena,
        FixedGenome::new(best).starting_at(MapId(FIRST_UNSEEN_MAP)),
        config.build_flock()?,
        config.fitness.clone(),
    );
    for record in bench.run(BENCHMARK_MAPS)? {
        println!(
            "  layout {:>6}: completed {:>3}  bird {:>3}  wall {:>3}  fitness {:>8.1}",
            record.layout.0,
            record.completed,
            record.bird_collisions,
            record.wall_collisions,
            record.fitness
        );
    }
    if let Some(avg) = bench.source().average() {
        println!("  average fitness: {:.1}", avg);
    }

    let summary = metrics::compute(&bench, None);
    println!();
    println!("{}", summary.to_json()?);
    Ok(())
}
