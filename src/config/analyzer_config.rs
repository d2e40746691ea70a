//! Background correlation analyzer settings.

use super::EnvSource;
use crate::application::monitoring::AnalyzerSettings;
use crate::domain::monitoring::AnalyzerState;
use crate::domain::monitoring::correlation::{DEFAULT_INTERVAL_HOURS, MAX_INTERVAL_HOURS};
use anyhow::Result;

/// Reference universe sampled when `ANALYZER_UNIVERSE` is unset.
pub const DEFAULT_UNIVERSE: &[&str] = &[
    "AAPL", "MSFT", "NVDA", "AMZN", "GOOGL", "META", "TSLA", "BRK-B", "JPM", "V", "UNH", "XOM",
    "JNJ", "PG", "MA", "HD", "CVX", "MRK", "ABBV", "PEP", "KO", "COST", "AVGO", "WMT", "BAC",
    "CRM", "ADBE", "NFLX", "AMD", "INTC",
];

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerEnvConfig {
    pub universe: Vec<String>,
    pub sample_size: usize,
    pub max_in_flight: usize,
    /// Interval written to a fresh state file.
    pub default_interval_hours: f64,
    /// How often `serve` re-checks the activation flag.
    pub poll_secs: u64,
}

impl AnalyzerEnvConfig {
    pub(crate) fn load(source: &impl EnvSource) -> Result<Self> {
        let defaults = AnalyzerSettings::default();
        let max_in_flight: usize = source.parse_or("ANALYZER_MAX_IN_FLIGHT", defaults.max_in_flight)?;
        if max_in_flight == 0 {
            anyhow::bail!("ANALYZER_MAX_IN_FLIGHT must be at least 1");
        }

        let default_interval_hours: f64 =
            source.parse_or("ANALYZER_DEFAULT_INTERVAL_HOURS", DEFAULT_INTERVAL_HOURS)?;
        if !AnalyzerState::is_valid_interval(default_interval_hours) {
            anyhow::bail!(
                "ANALYZER_DEFAULT_INTERVAL_HOURS must be between 0 and {}, got {}",
                MAX_INTERVAL_HOURS,
                default_interval_hours
            );
        }

        Ok(Self {
            universe: source.symbols_or("ANALYZER_UNIVERSE", DEFAULT_UNIVERSE),
            sample_size: source.parse_or("ANALYZER_SAMPLE_SIZE", defaults.sample_size)?,
            max_in_flight,
            default_interval_hours,
            poll_secs: source.parse_or("ANALYZER_POLL_SECS", 30u64)?,
        })
    }

    pub fn settings(&self) -> AnalyzerSettings {
        AnalyzerSettings {
            universe: self.universe.clone(),
            sample_size: self.sample_size,
            max_in_flight: self.max_in_flight,
            ..AnalyzerSettings::default()
        }
    }
}
