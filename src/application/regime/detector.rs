use crate::domain::market::candle::closes;
use crate::domain::market::market_regime::{FAST_SMA_PERIOD, SLOW_SMA_PERIOD};
use crate::domain::market::{RegimeClassification, RegimeDetection};
use crate::domain::ports::MarketDataService;
use std::sync::Arc;
use ta::Next;
use ta::indicators::SimpleMovingAverage;
use tracing::{info, warn};

pub const VOLATILITY_INDEX_SYMBOL: &str = "^VIX";

/// Calendar days fetched for the trend SMAs; comfortably more than 200 sessions.
const PRICE_LOOKBACK_DAYS: i64 = 400;
const INDEX_LOOKBACK_DAYS: i64 = 14;

/// SMA over the full series; only the last `period` closes count once it is warm.
fn latest_sma(closes: &[f64], period: usize) -> Option<f64> {
    if closes.len() < period {
        return None;
    }
    let mut sma = SimpleMovingAverage::new(period).ok()?;
    closes.iter().map(|close| sma.next(*close)).last()
}

/// Trend × volatility classifier for a benchmark ticker.
pub struct MarketRegimeDetector {
    market: Arc<dyn MarketDataService>,
    volatility_symbol: String,
}

impl MarketRegimeDetector {
    pub fn new(market: Arc<dyn MarketDataService>) -> Self {
        Self {
            market,
            volatility_symbol: VOLATILITY_INDEX_SYMBOL.to_string(),
        }
    }

    /// Classifies the current regime of `ticker`.
    ///
    /// Missing or short history and provider errors yield `Unknown`; this never fails.
    pub async fn detect(&self, ticker: &str) -> RegimeDetection {
        let candles = match self.market.daily_history(ticker, PRICE_LOOKBACK_DAYS).await {
            Ok(candles) => candles,
            Err(e) => {
                warn!("RegimeDetector: price history for {} unavailable: {:#}", ticker, e);
                return RegimeDetection::unknown(format!("price history unavailable: {}", e));
            }
        };

        let closes = closes(&candles);
        if closes.len() < SLOW_SMA_PERIOD {
            return RegimeDetection::unknown(format!(
                "need {} daily closes for {}, got {}",
                SLOW_SMA_PERIOD,
                ticker,
                closes.len()
            ));
        }

        let vix_level = match self
            .market
            .daily_history(&self.volatility_symbol, INDEX_LOOKBACK_DAYS)
            .await
        {
            Ok(index) => match index.last() {
                Some(last) => last.close,
                None => {
                    return RegimeDetection::unknown(format!(
                        "no recent {} data",
                        self.volatility_symbol
                    ));
                }
            },
            Err(e) => {
                warn!(
                    "RegimeDetector: {} unavailable: {:#}",
                    self.volatility_symbol, e
                );
                return RegimeDetection::unknown(format!(
                    "{} unavailable: {}",
                    self.volatility_symbol, e
                ));
            }
        };

        let (Some(sma50), Some(sma200), Some(price)) = (
            latest_sma(&closes, FAST_SMA_PERIOD),
            latest_sma(&closes, SLOW_SMA_PERIOD),
            closes.last().copied(),
        ) else {
            return RegimeDetection::unknown("moving averages unavailable");
        };

        let classification = RegimeClassification::new(price, sma50, sma200, vix_level);
        info!(
            "RegimeDetector: {} is {} (price {:.2}, SMA50 {:.2}, SMA200 {:.2}, VIX {:.2})",
            ticker, classification.regime, price, sma50, sma200, vix_level
        );
        RegimeDetection::Classified(classification)
    }
}
