//! # Flock Agents
//!
//! Decision-making for flock agents.
//!
//! - **Genome** — one chromosome of inverse-law parameters per force rule
//! - **Evolution** — roulette selection, uniform crossover, annealed
//!   mutation and stagnation-triggered map changes
//! - **Sources** — `GenomeSource` over a live engine or a fixed, trained genome
//! - **Fitness** — generation statistics to a single score
//! - **Forces** — per-tick force composition and steering

pub mod evolution;
pub mod fitness;
pub mod forces;
pub mod genome;
pub mod prelude;
pub mod source;
