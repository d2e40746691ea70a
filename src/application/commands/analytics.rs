use super::{required_string_arg, window_arg};
use crate::application::commands::backtest::fetch_with_warmup;
use crate::domain::market::candle::{closes, daily_returns};
use crate::domain::market::Candle;
use crate::domain::ports::{Command, CommandArgs, MarketDataService};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use statrs::statistics::{Data, Distribution};
use std::sync::Arc;
use ta::Next;
use ta::indicators::RelativeStrengthIndex;

/// Analytic command names paired with the output field holding their scalar.
pub const ANALYTIC_COMMANDS: &[(&str, &str)] = &[
    ("momentum", "momentum_pct"),
    ("volatility", "annualized_volatility_pct"),
    ("rsi", "rsi"),
    ("trend_strength", "adx"),
];

const DEFAULT_PERIOD: &str = "1y";

fn period_arg(args: &CommandArgs, name: &str, default: usize) -> usize {
    args.get(name)
        .and_then(Value::as_u64)
        .filter(|v| *v > 0)
        .map(|v| v as usize)
        .unwrap_or(default)
}

async fn load(market: &dyn MarketDataService, args: &CommandArgs) -> Result<(String, Vec<Candle>)> {
    let ticker = required_string_arg(args, "ticker")?.to_uppercase();
    let window = window_arg(args, DEFAULT_PERIOD)?;
    let (candles, _) = fetch_with_warmup(market, &ticker, &window).await?;
    if candles.is_empty() {
        anyhow::bail!("No price history for {}", ticker);
    }
    Ok((ticker, candles))
}

fn require(candles: &[Candle], needed: usize, ticker: &str) -> Result<()> {
    if candles.len() < needed {
        anyhow::bail!(
            "Need {} bars for {}, have {}",
            needed,
            ticker,
            candles.len()
        );
    }
    Ok(())
}

/// Percentage change over the last `lookback` bars (default 63, about a quarter).
pub fn momentum_pct(candles: &[Candle], lookback: usize) -> Option<f64> {
    if candles.len() <= lookback {
        return None;
    }
    let last = candles.last()?.close;
    let base = candles[candles.len() - 1 - lookback].close;
    (base > 0.0).then(|| (last / base - 1.0) * 100.0)
}

/// Annualized standard deviation of the last `window` daily returns, in percent.
pub fn annualized_volatility_pct(candles: &[Candle], window: usize) -> Option<f64> {
    let returns = daily_returns(&closes(candles));
    if returns.len() < window.max(2) {
        return None;
    }
    let recent = returns[returns.len() - window.max(2)..].to_vec();
    Data::new(recent)
        .std_dev()
        .map(|sd| sd * 252f64.sqrt() * 100.0)
}

pub fn latest_rsi(candles: &[Candle], period: usize) -> Option<f64> {
    let mut rsi = RelativeStrengthIndex::new(period).ok()?;
    candles.iter().map(|c| rsi.next(c.close)).last()
}

/// Average directional index with Wilder smoothing.
pub fn latest_adx(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < 2 * period + 1 {
        return None;
    }

    let n = period as f64;
    let mut tr_smooth = 0.0;
    let mut plus_smooth = 0.0;
    let mut minus_smooth = 0.0;
    let mut adx: Option<f64> = None;
    let mut dx_seed = Vec::with_capacity(period);

    for (count, pair) in candles.windows(2).enumerate() {
        let (prev, cur) = (&pair[0], &pair[1]);
        let tr = (cur.high - cur.low)
            .max((cur.high - prev.close).abs())
            .max((cur.low - prev.close).abs());
        let up_move = cur.high - prev.high;
        let down_move = prev.low - cur.low;
        let plus_dm = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
        let minus_dm = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };

        if count < period {
            tr_smooth += tr;
            plus_smooth += plus_dm;
            minus_smooth += minus_dm;
            if count + 1 < period {
                continue;
            }
        } else {
            tr_smooth = tr_smooth - tr_smooth / n + tr;
            plus_smooth = plus_smooth - plus_smooth / n + plus_dm;
            minus_smooth = minus_smooth - minus_smooth / n + minus_dm;
        }

        if tr_smooth <= 0.0 {
            continue;
        }
        let plus_di = 100.0 * plus_smooth / tr_smooth;
        let minus_di = 100.0 * minus_smooth / tr_smooth;
        let sum_di = plus_di + minus_di;
        let dx = if sum_di > 0.0 {
            100.0 * (plus_di - minus_di).abs() / sum_di
        } else {
            0.0
        };

        adx = match adx {
            Some(prev_adx) => Some((prev_adx * (n - 1.0) + dx) / n),
            None => {
                dx_seed.push(dx);
                (dx_seed.len() == period).then(|| dx_seed.iter().sum::<f64>() / n)
            }
        };
    }

    adx
}

pub struct MomentumCommand {
    market: Arc<dyn MarketDataService>,
}

impl MomentumCommand {
    pub fn new(market: Arc<dyn MarketDataService>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl Command for MomentumCommand {
    fn name(&self) -> &str {
        "momentum"
    }

    fn description(&self) -> &str {
        "Price change over a lookback, in percent"
    }

    async fn invoke(&self, args: &CommandArgs) -> Result<Value> {
        let (ticker, candles) = load(self.market.as_ref(), args).await?;
        let lookback = period_arg(args, "lookback", 63);
        require(&candles, lookback + 1, &ticker)?;
        let value = momentum_pct(&candles, lookback);
        Ok(json!({"status": "success", "ticker": ticker, "lookback": lookback, "momentum_pct": value}))
    }
}

pub struct VolatilityCommand {
    market: Arc<dyn MarketDataService>,
}

impl VolatilityCommand {
    pub fn new(market: Arc<dyn MarketDataService>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl Command for VolatilityCommand {
    fn name(&self) -> &str {
        "volatility"
    }

    fn description(&self) -> &str {
        "Annualized realized volatility, in percent"
    }

    async fn invoke(&self, args: &CommandArgs) -> Result<Value> {
        let (ticker, candles) = load(self.market.as_ref(), args).await?;
        let window = period_arg(args, "window", 21);
        require(&candles, window + 1, &ticker)?;
        let value = annualized_volatility_pct(&candles, window);
        Ok(json!({
            "status": "success",
            "ticker": ticker,
            "window": window,
            "annualized_volatility_pct": value
        }))
    }
}

pub struct RsiCommand {
    market: Arc<dyn MarketDataService>,
}

impl RsiCommand {
    pub fn new(market: Arc<dyn MarketDataService>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl Command for RsiCommand {
    fn name(&self) -> &str {
        "rsi"
    }

    fn description(&self) -> &str {
        "Latest relative strength index"
    }

    async fn invoke(&self, args: &CommandArgs) -> Result<Value> {
        let (ticker, candles) = load(self.market.as_ref(), args).await?;
        let period = period_arg(args, "rsi_period", 14);
        require(&candles, period + 1, &ticker)?;
        let value = latest_rsi(&candles, period);
        Ok(json!({"status": "success", "ticker": ticker, "rsi_period": period, "rsi": value}))
    }
}

pub struct TrendStrengthCommand {
    market: Arc<dyn MarketDataService>,
}

impl TrendStrengthCommand {
    pub fn new(market: Arc<dyn MarketDataService>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl Command for TrendStrengthCommand {
    fn name(&self) -> &str {
        "trend_strength"
    }

    fn description(&self) -> &str {
        "Average directional index (ADX)"
    }

    async fn invoke(&self, args: &CommandArgs) -> Result<Value> {
        let (ticker, candles) = load(self.market.as_ref(), args).await?;
        let period = period_arg(args, "adx_period", 14);
        require(&candles, 2 * period + 1, &ticker)?;
        let value = latest_adx(&candles, period);
        Ok(json!({"status": "success", "ticker": ticker, "adx_period": period, "adx": value}))
    }
}

/// All analytic commands backed by `market`.
pub fn builtin_analytics(market: Arc<dyn MarketDataService>) -> Vec<Arc<dyn Command>> {
    vec![
        Arc::new(MomentumCommand::new(market.clone())),
        Arc::new(VolatilityCommand::new(market.clone())),
        Arc::new(RsiCommand::new(market.clone())),
        Arc::new(TrendStrengthCommand::new(market)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::plugins::test_support::candles_from_closes;
    use crate::infrastructure::market_data::MockMarketDataService;

    #[test]
    fn test_momentum_pct() {
        let candles = candles_from_closes(&[100.0, 105.0, 110.0, 120.0]);
        assert!((momentum_pct(&candles, 3).unwrap() - 20.0).abs() < 1e-9);
        assert!(momentum_pct(&candles, 4).is_none());
    }

    #[test]
    fn test_flat_series_has_zero_volatility() {
        let candles = candles_from_closes(&[50.0; 30]);
        assert_eq!(annualized_volatility_pct(&candles, 21), Some(0.0));
    }

    #[test]
    fn test_adx_high_in_steady_trend() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + 2.0 * i as f64).collect();
        let candles = candles_from_closes(&closes);
        let adx = latest_adx(&candles, 14).unwrap();
        assert!(adx > 50.0, "adx was {}", adx);
        assert!(latest_adx(&candles[..20], 14).is_none());
    }

    #[tokio::test]
    async fn test_every_analytic_reports_its_field() {
        let market: Arc<dyn MarketDataService> = Arc::new(MockMarketDataService::new());
        let commands = builtin_analytics(market);
        let args = serde_json::json!({"ticker": "AAPL", "period": "6mo"});

        for command in commands {
            let output = command.invoke(args.as_object().unwrap()).await.unwrap();
            let (_, field) = ANALYTIC_COMMANDS
                .iter()
                .find(|(name, _)| *name == command.name())
                .unwrap();
            assert!(output[*field].is_number(), "{} missing {}", command.name(), field);
        }
    }
}
