//! # Flock Core
//!
//! Shared types for the flock simulation.
//!
//! The core crate knows nothing about genomes or pathfinding. It defines
//! the read-only view of the world that every other component consumes:
//!
//! - **Geometry** — `Vec2` and obstacle `Shape`s with closest-point,
//!   overlap and segment queries
//! - **World** — agents, the goal, arena bounds and the per-tick
//!   `WorldSnapshot`
//! - **Distances** — the `DistanceOracle` seam and the per-tick
//!   `DistanceCache` built from it
//! - **Stats** — generation-end statistics consumed by fitness scoring
//!
//! ## Quick Start
//!
//! ```rust
//! use flock_core::prelude::*;
//!
//! let agents = vec![
//!     AgentState::new(AgentId(0), Vec2::new(10.0, 10.0), 1.0, 8.0),
//!     AgentState::new(AgentId(1), Vec2::new(12.0, 10.0), 1.0, 8.0),
//! ];
//! let world = WorldSnapshot::new(
//!     agents,
//!     vec![Shape::circle(Vec2::new(20.0, 20.0), 2.0)],
//!     Goal::new(Vec2::new(40.0, 30.0), 2.0),
//!     Bounds::new(80.0, 60.0),
//! );
//!
//! let cache = DistanceCache::build(&world, &ShapeDistance);
//! assert!((cache.between(0, 1).distance - 1.0).abs() < 1e-9);
//! ```

pub mod error;
pub mod geometry;
pub mod prelude;
pub mod stats;
pub mod types;
pub mod world;
