use super::{Signal, SignalGenerator, bool_param, period_param, require_bars};
use crate::domain::errors::PluginError;
use crate::domain::market::Candle;
use crate::domain::optimization::Individual;

const NAME: &str = "momentum_breakout";

/// Donchian-style breakout: enter above the prior `lookback` high, exit below the prior
/// `exit_lookback` low.
pub struct MomentumBreakout;

impl SignalGenerator for MomentumBreakout {
    fn name(&self) -> &str {
        NAME
    }

    fn generate_signals(
        &self,
        candles: &[Candle],
        params: &Individual,
    ) -> Result<Vec<Signal>, PluginError> {
        let lookback = period_param(NAME, params, "lookback", 20)?;
        let exit_lookback = period_param(NAME, params, "exit_lookback", 10)?;
        let confirm_close = bool_param(NAME, params, "confirm_close", true)?;
        require_bars(candles, lookback.max(exit_lookback) + 1)?;

        let mut signals = Vec::with_capacity(candles.len());
        for (i, candle) in candles.iter().enumerate() {
            if i < lookback || i < exit_lookback {
                signals.push(Signal::Hold);
                continue;
            }

            let prior_high = candles[i - lookback..i]
                .iter()
                .map(|c| c.high)
                .fold(f64::MIN, f64::max);
            let prior_low = candles[i - exit_lookback..i]
                .iter()
                .map(|c| c.low)
                .fold(f64::MAX, f64::min);

            let trigger = if confirm_close { candle.close } else { candle.high };
            let signal = if trigger > prior_high {
                Signal::Buy
            } else if candle.close < prior_low {
                Signal::Sell
            } else {
                Signal::Hold
            };
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

    #[test]
    fn test_breakout_then_breakdown() {
        let mut closes = vec![100.0; 25];
        closes.push(110.0);
        closes.extend(vec![110.0; 10]);
        closes.push(90.0);
        let candles = candles_from_closes(&closes);

        let mut params = Individual::new();
        params.insert("lookback".to_string(), ParamValue::Int(20));
        params.insert("exit_lookback".to_string(), ParamValue::Int(5));
        let signals = MomentumBreakout.generate_signals(&candles, &params).unwrap();

        assert_eq!(signals[25], Signal::Buy);
        assert_eq!(*signals.last().unwrap(), Signal::Sell);
    }
}
