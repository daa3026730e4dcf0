//! Configuration for a training session.
//!
//! Every section has defaults, so a TOML file only needs the keys it
//! changes:
//!
//! ```toml
//! [arena]
//! agent_count = 20
//!
//! [tokens]
//! budget = 3
//! ```

use crate::arena::{Arena, ArenaConfig};
use crate::flock::Flock;
use crate::pathfind::PathfinderConfig;
use crate::scheduler::TokenConfig;
use crate::trainer::TrainerConfig;
use flock_agents::evolution::{EvolutionConfig, EvolutionEngine};
use flock_agents::fitness::FitnessWeights;
use flock_agents::forces::ForceConfig;
use flock_agents::genome::GeneRanges;
use flock_core::error::{FlockError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlockConfig {
    #[serde(default)]
    pub arena: ArenaConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub forces: ForceConfig,
    #[serde(default)]
    pub pathfinder: PathfinderConfig,
    #[serde(default)]
    pub evolution: EvolutionConfig,
    #[serde(default)]
    pub genes: GeneRanges,
    #[serde(default)]
    pub fitness: FitnessWeights,
    #[serde(default)]
    pub trainer: TrainerConfig,
}

impl FlockConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: FlockConfig =
            toml::from_str(content).map_err(|e| FlockError::serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| FlockError::serialization(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.arena.validate()?;
        self.pathfinder.validate()?;
        self.evolution.validate()?;
        self.genes.validate()?;
        if !(self.forces.asymptote > 0.0) {
            return Err(FlockError::invalid_value(
                "forces.asymptote",
                self.forces.asymptote,
                "must be positive",
            ));
        }
        if let Some(p) = self.tokens.carryover_override {
            if !(0.0..=1.0).contains(&p) {
                return Err(FlockError::out_of_range("tokens.carryover_override", 0.0, 1.0, p));
            }
        }
        Ok(())
    }

    pub fn build_flock(&self) -> Result<Flock> {
        Flock::new(
            self.forces.clone(),
            self.tokens.clone(),
            self.pathfinder.clone(),
            self.arena.seed,
        )
    }

    pub fn build_engine(&self) -> Result<EvolutionEngine> {
        EvolutionEngine::new(self.evolution.clone(), self.genes, self.arena.seed)
    }

    pub fn build_arena(&self) -> Result<Arena> {
        Arena::new(self.arena.clone())
    }
}
