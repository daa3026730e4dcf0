//! Flock Agents Prelude — convenient imports for common usage.
//!
//! ```rust
//! use flock_agents::prelude::*;
//! ```

pub use crate::genome::{
    Chromosome, ForceRule, GeneKind, GeneRange, GeneRanges, Genome, PathChromosome,
};
pub use crate::evolution::{
    EvolutionConfig, EvolutionEngine, EvolutionReport, Evaluation, ScoreOutcome,
};
pub use crate::source::{FixedGenome, GenomeSource};
pub use crate::fitness::FitnessWeights;
pub use crate::forces::{ForceConfig, ForceEngine};

// Re-export from core
pub use flock_core::prelude::*;
