//! Fitness scoring for a finished generation.
//!
//! Completions dominate the score; collisions only break ties between
//! flocks that complete equally well.

use flock_core::stats::GenerationStats;
use serde::{Deserialize, Serialize};

/// Weights of the fitness terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    /// Reward per agent that reached the goal.
    pub completed: f64,
    /// Penalty per bird-bird collision.
    pub bird_collision: f64,
    /// Penalty per bird-obstacle collision.
    pub wall_collision: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            completed: 1000.0,
            bird_collision: 2.0,
            wall_collision: 1.0,
        }
    }
}

impl FitnessWeights {
    /// Score a generation. Never below 1, so roulette selection always has
    /// a positive weight to work with.
    pub fn score(&self, stats: &GenerationStats) -> f64 {
        let raw = stats.completed as f64 * self.completed
            - stats.bird_collisions as f64 * self.bird_collision
            - stats.wall_collisions as f64 * self.wall_collision;
        raw.max(1.0)
    }
}
