use super::{Signal, SignalGenerator, period_param, require_bars, ta_error};
use crate::domain::errors::PluginError;
use crate::domain::market::Candle;
use crate::domain::optimization::Individual;
use ta::Next;
use ta::indicators::SimpleMovingAverage;

const NAME: &str = "ma_crossover";

/// Dual SMA crossover.
///
/// Buys when the short SMA crosses above the long SMA and sells on the opposite cross.
pub struct MaCrossover;

impl SignalGenerator for MaCrossover {
    fn name(&self) -> &str {
        NAME
    }

    fn generate_signals(
        &self,
        candles: &[Candle],
        params: &Individual,
    ) -> Result<Vec<Signal>, PluginError> {
        let short_period = period_param(NAME, params, "short_ma", 20)?;
        let long_period = period_param(NAME, params, "long_ma", 50)?;
        let warmup = short_period.max(long_period);
        require_bars(candles, warmup + 1)?;

        let mut short = SimpleMovingAverage::new(short_period).map_err(|e| ta_error(NAME, "short_ma", e))?;
        let mut long = SimpleMovingAverage::new(long_period).map_err(|e| ta_error(NAME, "long_ma", e))?;

        let mut signals = Vec::with_capacity(candles.len());
        let mut was_above: Option<bool> = None;

        for (i, candle) in candles.iter().enumerate() {
            let fast = short.next(candle.close);
            let slow = long.next(candle.close);

            if i + 1 < warmup {
                signals.push(Signal::Hold);
                continue;
            }

            let above = fast > slow;
            let signal = match was_above {
                Some(false) if above => Signal::Buy,
                Some(true) if !above => Signal::Sell,
                _ => Signal::Hold,
            };
            was_above = Some(above);
            signals.push(signal);
        }

        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::plugins::test_support::candles_from_closes;
    use crate::domain::optimization::ParamValue;

    fn params(short: i64, long: i64) -> Individual {
        let mut p = Individual::new();
        p.insert("short_ma".to_string(), ParamValue::Int(short));
        p.insert("long_ma".to_string(), ParamValue::Int(long));
        p
    }

    #[test]
    fn test_golden_and_death_cross() {
        // Down, then up, then down again
        let mut closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        closes.extend((0..20).map(|i| 81.0 + 2.0 * i as f64));
        closes.extend((0..20).map(|i| 119.0 - 3.0 * i as f64));
        let candles = candles_from_closes(&closes);

        let signals = MaCrossover.generate_signals(&candles, &params(3, 10)).unwrap();
        assert_eq!(signals.len(), candles.len());

        let first_buy = signals.iter().position(|s| *s == Signal::Buy).unwrap();
        let first_sell = signals.iter().position(|s| *s == Signal::Sell).unwrap();
        assert!(first_buy > 20 && first_buy < 40);
        assert!(first_sell > first_buy);
    }

    #[test]
    fn test_insufficient_history() {
        let candles = candles_from_closes(&[1.0; 10]);
        let err = MaCrossover.generate_signals(&candles, &params(5, 50)).unwrap_err();
        assert!(matches!(err, PluginError::InsufficientData { needed: 51, .. }));
    }
}
