//! Genetic search settings.

use super::EnvSource;
use crate::domain::optimization::FitnessObjective;
use anyhow::Result;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerEnvConfig {
    pub generations: usize,
    pub population_size: usize,
    pub num_parents: usize,
    pub mutation_rate: f64,
    /// Per-evaluation timeout for dispatched commands.
    pub backtest_timeout_secs: u64,
    pub objective: FitnessObjective,
    /// Fixed RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for OptimizerEnvConfig {
    fn default() -> Self {
        Self {
            generations: 10,
            population_size: 20,
            num_parents: 5,
            mutation_rate: 0.1,
            backtest_timeout_secs: 120,
            objective: FitnessObjective::TotalReturn,
            rng_seed: None,
        }
    }
}

impl OptimizerEnvConfig {
    pub(crate) fn load(source: &impl EnvSource) -> Result<Self> {
        let defaults = Self::default();
        let mutation_rate: f64 = source.parse_or("GA_MUTATION_RATE", defaults.mutation_rate)?;
        if !(0.0..=1.0).contains(&mutation_rate) {
            anyhow::bail!("GA_MUTATION_RATE must be within [0, 1], got {}", mutation_rate);
        }

        Ok(Self {
            generations: source.parse_or("GA_GENERATIONS", defaults.generations)?,
            population_size: source.parse_or("GA_POPULATION", defaults.population_size)?,
            num_parents: source.parse_or("GA_PARENTS", defaults.num_parents)?,
            mutation_rate,
            backtest_timeout_secs: source
                .parse_or("BACKTEST_TIMEOUT_SECS", defaults.backtest_timeout_secs)?,
            objective: FitnessObjective::from_str(&source.string_or("FITNESS_OBJECTIVE", "total_return"))?,
            rng_seed: match source.get("GA_SEED") {
                Some(raw) if !raw.trim().is_empty() => Some(source.parse_or("GA_SEED", 0u64)?),
                _ => None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_rate_is_bounded() {
        let result = OptimizerEnvConfig::load(&|key: &str| {
            (key == "GA_MUTATION_RATE").then(|| "1.5".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_seed_is_optional() {
        let none = OptimizerEnvConfig::load(&|_: &str| None).unwrap();
        assert_eq!(none.rng_seed, None);
        let some =
            OptimizerEnvConfig::load(&|key: &str| (key == "GA_SEED").then(|| "7".to_string()))
                .unwrap();
        assert_eq!(some.rng_seed, Some(7));
    }
}
