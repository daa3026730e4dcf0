//! Flock Core Prelude — convenient imports for common usage.
//!
//! ```rust
//! use flock_core::prelude::*;
//! ```

// Re-export commonly used types
pub use crate::types::{AgentId, Bounds, Goal, LayoutId, MapId, Tick, Vec2};

pub use crate::geometry::Shape;

pub use crate::world::{
    AgentState, DistanceCache, DistanceOracle, LayoutSource, Separation, ShapeDistance,
    WorldSnapshot,
};

pub use crate::stats::{AgentStats, GenerationStats};

// Re-export error types
pub use crate::error::{ConfigError, EvolutionError, FlockError, Result};
