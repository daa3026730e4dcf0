//! Generation-end statistics reported by the world owner.

use crate::types::{AgentId, Tick};
use serde::{Deserialize, Serialize};

/// Per-agent outcome of a generation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentStats {
    pub id: Option<AgentId>,
    pub reached_goal: bool,
    /// Tick on which the agent reached the goal.
    pub finished_at: Option<Tick>,
    pub bird_collisions: u32,
    pub wall_collisions: u32,
    pub distance_travelled: f64,
}

/// Aggregate outcome of one generation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    pub completed: u32,
    pub bird_collisions: u32,
    pub wall_collisions: u32,
    pub per_agent: Vec<AgentStats>,
    pub ticks: Tick,
}

impl GenerationStats {
    /// Build totals from per-agent records.
    ///
    /// A bird-bird contact is recorded on both agents, so the pair total is
    /// half the per-agent sum.
    pub fn from_agents(per_agent: Vec<AgentStats>, ticks: Tick) -> Self {
        let completed = per_agent.iter().filter(|a| a.reached_goal).count() as u32;
        let bird_collisions = per_agent.iter().map(|a| a.bird_collisions).sum::<u32>() / 2;
        let wall_collisions = per_agent.iter().map(|a| a.wall_collisions).sum();
        Self {
            completed,
            bird_collisions,
            wall_collisions,
            per_agent,
            ticks,
        }
    }

    /// Fraction of agents that reached the goal, 0 for an empty flock.
    pub fn completion_rate(&self) -> f64 {
        if self.per_agent.is_empty() {
            0.0
        } else {
            self.completed as f64 / self.per_agent.len() as f64
        }
    }
}
