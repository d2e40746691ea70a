//! Configuration module for the tuner.
//!
//! Settings load from environment variables (optionally via a `.env` file), organized by
//! concern: storage, optimizer, autonomous loop and correlation analyzer.

mod analyzer_config;
mod autonomous_config;
mod optimizer_config;
mod run_file;
mod storage_config;

pub use analyzer_config::{AnalyzerEnvConfig, DEFAULT_UNIVERSE};
pub use autonomous_config::AutonomousEnvConfig;
pub use optimizer_config::OptimizerEnvConfig;
pub use run_file::RunFile;
pub use storage_config::StorageEnvConfig;

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

/// Where market data and backtests come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Deterministic synthetic prices, fully offline.
    Mock,
    /// Yahoo chart API.
    Live,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Mode::Mock),
            "live" => Ok(Mode::Live),
            _ => anyhow::bail!("Invalid MODE: {}. Must be 'mock' or 'live'", s),
        }
    }
}

/// Source of raw setting values; the process environment in production.
pub(crate) trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse::<T>()
                .context(format!("Failed to parse {}", key)),
            _ => Ok(default),
        }
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .and_then(|v| v.trim().parse::<bool>().ok())
            .unwrap_or(default)
    }

    /// Comma-separated list, upper-cased and de-blanked.
    fn symbols_or(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.get(key) {
            Some(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            _ => default.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl<F> EnvSource for F
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        self(key)
    }
}

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub storage: StorageEnvConfig,
    pub optimizer: OptimizerEnvConfig,
    pub autonomous: AutonomousEnvConfig,
    pub analyzer: AnalyzerEnvConfig,
    /// Remote backtest service; the local engine is used when unset.
    pub backtest_url: Option<String>,
    pub allow_external_plugins: bool,
    pub market_data_timeout_secs: u64,
}

impl Config {
    /// Load configuration from the environment, reading `.env` first when present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key: &str| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = Mode::from_str(&lookup.string_or("MODE", "mock"))?;
        let storage = StorageEnvConfig::load(&lookup);
        let optimizer =
            OptimizerEnvConfig::load(&lookup).context("Failed to load optimizer config")?;
        let autonomous =
            AutonomousEnvConfig::load(&lookup).context("Failed to load autonomous config")?;
        let analyzer =
            AnalyzerEnvConfig::load(&lookup).context("Failed to load analyzer config")?;

        Ok(Self {
            mode,
            storage,
            optimizer,
            autonomous,
            analyzer,
            backtest_url: lookup
                .get("BACKTEST_URL")
                .map(|u| u.trim().trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty()),
            allow_external_plugins: lookup.bool_or("ALLOW_EXTERNAL_PLUGINS", false),
            market_data_timeout_secs: lookup.parse_or("MARKET_DATA_TIMEOUT_SECS", 30u64)?,
        })
    }
}
