use super::{required_string_arg, window_arg};
use crate::application::plugins::{PluginRegistry, Signal};
use crate::domain::market::Candle;
use crate::domain::optimization::window::period_to_days;
use crate::domain::optimization::{BacktestWindow, Individual};
use crate::domain::ports::{Command, CommandArgs, MarketDataService};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use statrs::statistics::{Data, Distribution};
use std::sync::Arc;
use tracing::debug;

/// Calendar days of history fetched ahead of the window so long indicators are warm.
const WARMUP_DAYS: i64 = 400;
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Summary of a long-only simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub total_return_pct: f64,
    pub buy_hold_return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub trade_count: u64,
    pub bars: usize,
}

/// Simulates signals over `candles[start..]`, trading at the signal bar's close.
///
/// Bars before `start` only warm up the signal generator.
pub fn simulate(candles: &[Candle], signals: &[Signal], start: usize) -> BacktestReport {
    let start = start.min(candles.len().saturating_sub(1));
    let window = &candles[start..];

    let mut in_position = false;
    let mut equity = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut max_drawdown = 0.0_f64;
    let mut trade_count = 0u64;
    let mut daily_returns = Vec::with_capacity(window.len());

    for i in start..candles.len() {
        if i > start {
            let prev = candles[i - 1].close;
            let ret = if in_position && prev > 0.0 {
                candles[i].close / prev - 1.0
            } else {
                0.0
            };
            equity *= 1.0 + ret;
            daily_returns.push(ret);
            peak = peak.max(equity);
            max_drawdown = max_drawdown.min(equity / peak - 1.0);
        }

        match signals.get(i) {
            Some(Signal::Buy) if !in_position => {
                in_position = true;
                trade_count += 1;
            }
            Some(Signal::Sell) if in_position => in_position = false,
            _ => {}
        }
    }

    let buy_hold_return_pct = match (window.first(), window.last()) {
        (Some(first), Some(last)) if first.close > 0.0 => (last.close / first.close - 1.0) * 100.0,
        _ => 0.0,
    };

    BacktestReport {
        total_return_pct: (equity - 1.0) * 100.0,
        buy_hold_return_pct,
        sharpe_ratio: annualized_sharpe(daily_returns),
        max_drawdown_pct: max_drawdown * 100.0,
        trade_count,
        bars: window.len(),
    }
}

fn annualized_sharpe(daily_returns: Vec<f64>) -> f64 {
    if daily_returns.len() < 2 {
        return 0.0;
    }
    let data = Data::new(daily_returns);
    match (data.mean(), data.std_dev()) {
        (Some(mean), Some(std_dev)) if std_dev > 0.0 => {
            mean / std_dev * TRADING_DAYS_PER_YEAR.sqrt()
        }
        _ => 0.0,
    }
}

/// Fetches `window` plus warm-up history; returns the bars and the index where the window starts.
pub async fn fetch_with_warmup(
    market: &dyn MarketDataService,
    ticker: &str,
    window: &BacktestWindow,
) -> Result<(Vec<Candle>, usize)> {
    let (candles, window_start) = match window {
        BacktestWindow::Period(period) => {
            let days = period_to_days(period)
                .with_context(|| format!("Unsupported period '{}'", period))?;
            let candles = market.daily_history(ticker, days + WARMUP_DAYS).await?;
            let start_ts = (Utc::now() - Duration::days(days)).timestamp();
            (candles, start_ts)
        }
        BacktestWindow::Range { start, end } => {
            let candles = market
                .daily_range(ticker, *start - Duration::days(WARMUP_DAYS), *end)
                .await?;
            let start_ts = start
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp())
                .unwrap_or_default();
            (candles, start_ts)
        }
    };

    let start_index = candles
        .iter()
        .position(|c| c.timestamp >= window_start)
        .unwrap_or(candles.len());
    Ok((candles, start_index))
}

/// Parses `params` given either as an object or as a JSON-encoded string.
fn params_arg(args: &CommandArgs) -> Result<Individual> {
    match args.get("params") {
        None | Some(Value::Null) => Ok(Individual::new()),
        Some(Value::String(raw)) => {
            serde_json::from_str(raw).context("Argument 'params' is not a JSON object")
        }
        Some(value) => {
            serde_json::from_value(value.clone()).context("Argument 'params' is not an object")
        }
    }
}

/// Local `backtest` command: `{ticker, strategy, params, period | start/end}`.
pub struct LocalBacktestCommand {
    market: Arc<dyn MarketDataService>,
    plugins: Arc<PluginRegistry>,
}

impl LocalBacktestCommand {
    pub fn new(market: Arc<dyn MarketDataService>, plugins: Arc<PluginRegistry>) -> Self {
        Self { market, plugins }
    }
}

#[async_trait]
impl Command for LocalBacktestCommand {
    fn name(&self) -> &str {
        "backtest"
    }

    fn description(&self) -> &str {
        "Long-only backtest of a strategy plugin over daily bars"
    }

    async fn invoke(&self, args: &CommandArgs) -> Result<Value> {
        let ticker = required_string_arg(args, "ticker")?.to_uppercase();
        let strategy = required_string_arg(args, "strategy")?;
        let window = window_arg(args, "1y")?;
        let params = params_arg(args)?;

        let plugin = self.plugins.get(strategy)?;
        let (candles, start) = fetch_with_warmup(self.market.as_ref(), &ticker, &window).await?;
        if start + 2 > candles.len() {
            anyhow::bail!(
                "Not enough bars in window {} for {} ({} fetched)",
                window,
                ticker,
                candles.len()
            );
        }

        let signals = plugin.generate_signals(&candles, &params)?;
        let report = simulate(&candles, &signals, start);

        debug!(
            "Backtest: {} {} {} -> {:.2}% ({} trades)",
            strategy, ticker, window, report.total_return_pct, report.trade_count
        );

        let mut output = serde_json::to_value(&report)?;
        if let Some(map) = output.as_object_mut() {
            map.insert("status".to_string(), Value::from("success"));
            map.insert("ticker".to_string(), Value::from(ticker));
            map.insert("strategy".to_string(), Value::from(strategy));
            map.insert("window".to_string(), Value::from(window.to_string()));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::plugins::test_support::candles_from_closes;
    use crate::infrastructure::market_data::MockMarketDataService;
    use serde_json::json;

    #[test]
    fn test_simulate_round_trip_trade() {
        let candles = candles_from_closes(&[100.0, 100.0, 110.0, 121.0, 100.0]);
        let signals = vec![Signal::Hold, Signal::Buy, Signal::Hold, Signal::Sell, Signal::Hold];

        let report = simulate(&candles, &signals, 0);
        assert_eq!(report.trade_count, 1);
        assert!((report.total_return_pct - 21.0).abs() < 1e-9);
        assert!((report.buy_hold_return_pct - 0.0).abs() < 1e-9);
        assert_eq!(report.max_drawdown_pct, 0.0);
        assert!(report.sharpe_ratio > 0.0);
    }

    #[test]
    fn test_simulate_warmup_bars_do_not_count() {
        let candles = candles_from_closes(&[50.0, 100.0, 100.0, 90.0]);
        let signals = vec![Signal::Buy, Signal::Hold, Signal::Hold, Signal::Hold];

        // Buy happened during warm-up, so nothing is held in the window.
        let report = simulate(&candles, &signals, 1);
        assert_eq!(report.trade_count, 0);
        assert_eq!(report.total_return_pct, 0.0);
        assert!((report.buy_hold_return_pct + 10.0).abs() < 1e-9);
        assert_eq!(report.bars, 3);
    }

    #[tokio::test]
    async fn test_backtest_command_on_mock_data() {
        let command = LocalBacktestCommand::new(
            Arc::new(MockMarketDataService::new()),
            Arc::new(PluginRegistry::with_builtins(false)),
        );
        let args = json!({
            "ticker": "spy",
            "strategy": "ma_crossover",
            "period": "1y",
            "params": "{\"short_ma\": 10, \"long_ma\": 50}"
        });

        let output = command.invoke(args.as_object().unwrap()).await.unwrap();
        assert_eq!(output["status"], "success");
        assert_eq!(output["ticker"], "SPY");
        assert!(output["total_return_pct"].is_number());
        assert!(output["trade_count"].is_u64());
    }

    #[tokio::test]
    async fn test_unknown_strategy_is_an_error() {
        let command = LocalBacktestCommand::new(
            Arc::new(MockMarketDataService::new()),
            Arc::new(PluginRegistry::with_builtins(false)),
        );
        let args = json!({"ticker": "SPY", "strategy": "nope"});
        assert!(command.invoke(args.as_object().unwrap()).await.is_err());
    }
}
