//! # Flock Runtime
//!
//! Tick coordination, pathfinding and training.
//!
//! - **Flock** — per-tick coordinator: distance cache, tokens, paths, forces
//! - **Scheduler** — rations pathfinding tokens across the flock
//! - **Pathfind** — visibility graph over obstacle boundaries with memoized A*
//! - **Arena** — seeded reference world with reproducible maps
//! - **Trainer** — generation loop against any `TrainingWorld`
//! - **Metrics** and **Config** — session summaries and TOML configuration

pub mod arena;
pub mod config;
pub mod flock;
pub mod metrics;
pub mod pathfind;
pub mod prelude;
pub mod scheduler;
pub mod trainer;
