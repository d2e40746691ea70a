//! Autonomous loop settings.

use super::EnvSource;
use crate::application::autonomous::AutonomousSettings;
use anyhow::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct AutonomousEnvConfig {
    pub benchmark: String,
    pub universe: String,
    pub baseline_strategy: String,
    pub population_size: usize,
    pub generations: usize,
    pub interval_hours: f64,
}

impl AutonomousEnvConfig {
    pub(crate) fn load(source: &impl EnvSource) -> Result<Self> {
        let defaults = AutonomousSettings::default();
        let interval_hours: f64 = source.parse_or("AUTONOMOUS_INTERVAL_HOURS", 24.0)?;
        if !(interval_hours.is_finite() && interval_hours > 0.0) {
            anyhow::bail!("AUTONOMOUS_INTERVAL_HOURS must be positive, got {}", interval_hours);
        }

        Ok(Self {
            benchmark: source
                .string_or("AUTONOMOUS_BENCHMARK", &defaults.benchmark)
                .to_uppercase(),
            universe: source.string_or("AUTONOMOUS_UNIVERSE", &defaults.universe),
            baseline_strategy: source
                .string_or("AUTONOMOUS_BASELINE_STRATEGY", &defaults.baseline_strategy),
            population_size: source.parse_or("AUTONOMOUS_POPULATION", defaults.population_size)?,
            generations: source.parse_or("AUTONOMOUS_GENERATIONS", defaults.generations)?,
            interval_hours,
        })
    }

    pub fn settings(&self) -> AutonomousSettings {
        AutonomousSettings {
            benchmark: self.benchmark.clone(),
            universe: self.universe.clone(),
            baseline_strategy: self.baseline_strategy.clone(),
            population_size: self.population_size,
            generations: self.generations,
        }
    }
}
