use super::{Signal, SignalGenerator, float_param, period_param, require_bars, ta_error};
use crate::domain::errors::PluginError;
use crate::domain::market::Candle;
use crate::domain::optimization::Individual;
use ta::Next;
use ta::indicators::RelativeStrengthIndex;

const NAME: &str = "rsi_reversion";

/// Buys oversold RSI readings and sells overbought ones.
pub struct RsiReversion;

impl SignalGenerator for RsiReversion {
    fn name(&self) -> &str {
        NAME
    }

    fn generate_signals(
        &self,
        candles: &[Candle],
        params: &Individual,
    ) -> Result<Vec<Signal>, PluginError> {
        let period = period_param(NAME, params, "rsi_period", 14)?;
        let oversold = float_param(NAME, params, "oversold", 30.0)?;
        let overbought = float_param(NAME, params, "overbought", 70.0)?;
        if oversold >= overbought {
            return Err(PluginError::InvalidParameter {
                plugin: NAME.to_string(),
                parameter: "oversold".to_string(),
                reason: format!("must be below overbought ({})", overbought),
            });
        }
        require_bars(candles, period + 1)?;

        let mut rsi = RelativeStrengthIndex::new(period).map_err(|e| ta_error(NAME, "rsi_period", e))?;

        Ok(candles
            .iter()
            .enumerate()
            .map(|(i, candle)| {
                let value = rsi.next(candle.close);
                if i < period {
                    Signal::Hold
                } else if value < oversold {
                    Signal::Buy
                } else if value > overbought {
                    Signal::Sell
                } else {
                    Signal::Hold
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::plugins::test_support::candles_from_closes;
    use crate::domain::optimization::ParamValue;

    #[test]
    fn test_selloff_triggers_buy_and_rally_triggers_sell() {
        let mut closes: Vec<f64> = (0..30).map(|i| 100.0 - 1.5 * i as f64).collect();
        closes.extend((0..30).map(|i| 56.0 + 2.0 * i as f64));
        let candles = candles_from_closes(&closes);

        let mut params = Individual::new();
        params.insert("rsi_period".to_string(), ParamValue::Int(14));
        let signals = RsiReversion.generate_signals(&candles, &params).unwrap();

        assert!(signals[..30].contains(&Signal::Buy));
        assert!(signals[30..].contains(&Signal::Sell));
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let candles = candles_from_closes(&[100.0; 40]);
        let mut params = Individual::new();
        params.insert("oversold".to_string(), ParamValue::Float(80.0));
        params.insert("overbought".to_string(), ParamValue::Float(60.0));
        assert!(RsiReversion.generate_signals(&candles, &params).is_err());
    }
}
