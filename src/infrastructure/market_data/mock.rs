use crate::domain::market::Candle;
use crate::domain::ports::MarketDataService;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

const VOLATILITY_INDEX: &str = "^VIX";

/// Deterministic synthetic daily bars for offline runs.
///
/// Each symbol gets its own seeded random walk anchored at a fixed epoch, so a given
/// (symbol, date) always maps to the same bar regardless of the requested window.
pub struct MockMarketDataService {
    epoch: NaiveDate,
    seed: u64,
}

impl MockMarketDataService {
    pub fn new() -> Self {
        Self::with_seed(42)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            epoch: NaiveDate::from_ymd_opt(2000, 1, 3).unwrap_or_default(),
            seed,
        }
    }

    fn symbol_seed(&self, symbol: &str) -> u64 {
        // FNV-1a
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in symbol.to_uppercase().bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        hash ^ self.seed
    }

    fn generate(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<Candle> {
        if end < start || end < self.epoch {
            return Vec::new();
        }

        let seed = self.symbol_seed(symbol);
        let mut rng = StdRng::seed_from_u64(seed);
        let is_index = symbol.eq_ignore_ascii_case(VOLATILITY_INDEX);

        // Per-symbol drift and volatility so analytics differ across tickers.
        let drift = rng.random_range(-0.0002..0.0008);
        let sigma = rng.random_range(0.008..0.025);

        let mut price = if is_index {
            18.0
        } else {
            rng.random_range(20.0..400.0)
        };

        let total_days = (end - self.epoch).num_days();
        let mut candles = Vec::new();
        for offset in 0..=total_days {
            let date = self.epoch + Duration::days(offset);
            let shock: f64 = rng.sample(StandardNormal);

            let close = if is_index {
                // Mean-reverting around 18
                (price + 0.08 * (18.0 - price) + shock * 1.2).clamp(9.0, 80.0)
            } else {
                (price * (1.0 + drift + sigma * shock)).max(1.0)
            };
            let spread = close * sigma * 0.5 * rng.random_range(0.2..1.0);
            let volume = rng.random_range(500_000.0..5_000_000.0);

            if date >= start {
                let open = price;
                candles.push(Candle {
                    symbol: symbol.to_string(),
                    timestamp: date
                        .and_hms_opt(21, 0, 0)
                        .map(|dt| dt.and_utc().timestamp())
                        .unwrap_or_default(),
                    open,
                    high: open.max(close) + spread,
                    low: (open.min(close) - spread).max(0.01),
                    close,
                    volume: if is_index { 0.0 } else { volume },
                });
            }
            price = close;
        }
        candles
    }
}

impl Default for MockMarketDataService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataService for MockMarketDataService {
    async fn daily_history(&self, symbol: &str, lookback_days: i64) -> Result<Vec<Candle>> {
        let end = Utc::now().date_naive();
        let start = end - Duration::days(lookback_days.max(1));
        Ok(self.generate(symbol, start, end))
    }

    async fn daily_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Candle>> {
        Ok(self.generate(symbol, start, end))
    }
}
