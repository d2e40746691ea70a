//! TOML run files for `optimize`, overriding the environment's GA settings per run.
//!
//! ```toml
//! strategy = "rsi_reversion"
//! ticker = "QQQ"
//! period = "2y"
//! generations = 15
//! population_size = 30
//!
//! [[seeds]]
//! rsi_period = 14
//! oversold = 30.0
//! overbought = 70.0
//! ```

use super::OptimizerEnvConfig;
use crate::domain::optimization::{BacktestWindow, Individual};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunFile {
    pub command: Option<String>,
    pub strategy: Option<String>,
    pub ticker: Option<String>,
    pub period: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub generations: Option<usize>,
    pub population_size: Option<usize>,
    pub num_parents: Option<usize>,
    pub mutation_rate: Option<f64>,
    #[serde(default)]
    pub seeds: Vec<Individual>,
}

impl RunFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read run file: {}", path.display()))?;
        Self::parse(&content).context(format!("Failed to parse run file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let run: RunFile = toml::from_str(content)?;
        if run.start.is_some() != run.end.is_some() {
            anyhow::bail!("Run file must set both 'start' and 'end' or neither");
        }
        Ok(run)
    }

    /// Explicit date range, if the file sets one.
    pub fn window(&self) -> Option<BacktestWindow> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(BacktestWindow::Range { start, end }),
            _ => self.period.clone().map(BacktestWindow::Period),
        }
    }

    /// GA settings with this file's overrides applied.
    pub fn apply(&self, base: &OptimizerEnvConfig) -> OptimizerEnvConfig {
        OptimizerEnvConfig {
            generations: self.generations.unwrap_or(base.generations),
            population_size: self.population_size.unwrap_or(base.population_size),
            num_parents: self.num_parents.unwrap_or(base.num_parents),
            mutation_rate: self.mutation_rate.unwrap_or(base.mutation_rate),
            ..base.clone()
        }
    }
}
