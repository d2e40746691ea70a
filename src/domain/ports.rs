use crate::domain::market::{Candle, LiveStrategyConfig};
use crate::domain::optimization::OptimizationStatus;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Map, Value};

/// Named arguments passed to a command.
pub type CommandArgs = Map<String, Value>;

/// A uniformly invokable named operation (backtest, analytics, remote calls).
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    async fn invoke(&self, args: &CommandArgs) -> Result<Value>;
}

#[async_trait]
pub trait MarketDataService: Send + Sync {
    /// Daily bars covering roughly the last `lookback_days` calendar days, oldest first.
    async fn daily_history(&self, symbol: &str, lookback_days: i64) -> Result<Vec<Candle>>;

    /// Daily bars between two dates (inclusive), oldest first.
    async fn daily_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Candle>>;
}

/// Consumer of live optimization status snapshots.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn publish(&self, status: &OptimizationStatus) -> Result<()>;
}

/// Consumer of the live strategy configuration produced by the autonomous loop.
#[async_trait]
pub trait LiveConfigSink: Send + Sync {
    async fn publish(&self, config: &LiveStrategyConfig) -> Result<()>;
}
