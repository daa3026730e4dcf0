//! Error types for flock operations.
//!
//! Setup problems (bad configuration, an empty population) are reported
//! through these types. Nothing in the per-tick path returns an error:
//! unreachable goals and degenerate geometry degrade to fallbacks instead.

use thiserror::Error;

/// Result type for flock operations.
pub type Result<T> = std::result::Result<T, FlockError>;

/// Errors that can occur during flock operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlockError {
    /// Configuration errors.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    /// Evolution engine errors.
    #[error("Evolution error: {0}")]
    Evolution(#[from] EvolutionError),
    /// I/O errors (wrapped).
    #[error("I/O error: {0}")]
    Io(String),
    /// Serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for FlockError {
    fn from(e: std::io::Error) -> Self {
        FlockError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for FlockError {
    fn from(e: serde_json::Error) -> Self {
        FlockError::Serialization(e.to_string())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid value for '{field}': {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    /// Value out of range.
    #[error("Value for '{field}' out of range: {value} (expected {min}-{max})")]
    OutOfRange {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },
    /// Population size of zero.
    #[error("Population must contain at least one genome")]
    EmptyPopulation,
    /// Generation with no agents.
    #[error("A generation needs at least one agent")]
    NoAgents,
    /// A tick was requested before any generation started.
    #[error("No generation in progress")]
    NoGeneration,
}

/// Evolution engine errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvolutionError {
    /// The engine was handed an empty population to evolve.
    #[error("Population is empty")]
    EmptyPopulation,
    /// The evaluation belongs to a round that has already evolved.
    #[error("Evaluation from round {evaluation_round} is stale (current round {current_round})")]
    StaleEvaluation {
        evaluation_round: u64,
        current_round: u64,
    },
    /// The slot already has a score for this trial.
    #[error("Slot {slot} in round {round} was already scored")]
    AlreadyScored { round: u64, slot: usize },
    /// Every evaluation of the round has been handed out; score them first.
    #[error("All evaluations of the current round are outstanding")]
    RoundExhausted,
}

// Convenience constructors

impl FlockError {
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        FlockError::Config(ConfigError::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        })
    }

    pub fn out_of_range(field: impl Into<String>, min: f64, max: f64, value: f64) -> Self {
        FlockError::Config(ConfigError::OutOfRange {
            field: field.into(),
            min,
            max,
            value,
        })
    }

    pub fn empty_population() -> Self {
        FlockError::Config(ConfigError::EmptyPopulation)
    }

    pub fn no_agents() -> Self {
        FlockError::Config(ConfigError::NoAgents)
    }

    pub fn no_generation() -> Self {
        FlockError::Config(ConfigError::NoGeneration)
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        FlockError::Serialization(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = FlockError::empty_population();
        assert_eq!(
            err.to_string(),
            "Config error: Population must contain at least one genome"
        );

        let err = FlockError::out_of_range("evolution.mutation_rate", 0.0, 1.0, 1.5);
        assert!(err.to_string().contains("evolution.mutation_rate"));
    }

    #[test]
    fn evolution_error_converts() {
        let err: FlockError = EvolutionError::AlreadyScored { round: 2, slot: 4 }.into();
        assert!(matches!(err, FlockError::Evolution(EvolutionError::AlreadyScored { .. })));
        assert_eq!(
            err.to_string(),
            "Evolution error: Slot 4 in round 2 was already scored"
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.toml");
        let err: FlockError = io.into();
        assert!(matches!(err, FlockError::Io(_)));
    }
}
