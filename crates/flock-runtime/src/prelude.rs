//! Flock Runtime Prelude — convenient imports for common usage.
//!
//! ```rust
//! use flock_runtime::prelude::*;
//! ```

pub use crate::arena::{Arena, ArenaConfig, MapLayout, Spawn};
pub use crate::config::FlockConfig;
pub use crate::flock::{Flock, FlockEvent, TickOutcome};
pub use crate::metrics::{RoundSummary, TrainingMetrics};
pub use crate::pathfind::{Pathfinder, PathfinderConfig, PathfinderStats};
pub use crate::scheduler::{TokenAssignment, TokenConfig, TokenLedger, TokenScheduler};
pub use crate::trainer::{GenerationRecord, RunId, Trainer, TrainerConfig, TrainingWorld};

// Re-export from agents (which re-exports core)
pub use flock_agents::prelude::*;
