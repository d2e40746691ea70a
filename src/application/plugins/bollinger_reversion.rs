use super::{Signal, SignalGenerator, float_param, period_param, require_bars, ta_error};
use crate::domain::errors::PluginError;
use crate::domain::market::Candle;
use crate::domain::optimization::Individual;
use ta::Next;
use ta::indicators::BollingerBands;

const NAME: &str = "bollinger_reversion";

/// Buys closes below the lower band and exits once price recovers to the middle band.
pub struct BollingerReversion;

impl SignalGenerator for BollingerReversion {
    fn name(&self) -> &str {
        NAME
    }

    fn generate_signals(
        &self,
        candles: &[Candle],
        params: &Individual,
    ) -> Result<Vec<Signal>, PluginError> {
        let period = period_param(NAME, params, "period", 20)?;
        let num_std = float_param(NAME, params, "num_std", 2.0)?;
        require_bars(candles, period + 1)?;

        let mut bands = BollingerBands::new(period, num_std).map_err(|e| ta_error(NAME, "period", e))?;

        Ok(candles
            .iter()
            .enumerate()
            .map(|(i, candle)| {
                let band = bands.next(candle.close);
                if i + 1 < period {
                    Signal::Hold
                } else if candle.close < band.lower {
                    Signal::Buy
                } else if candle.close > band.average {
                    Signal::Sell
                } else {
                    Signal::Hold
                }
            })
            .collect())
    }
}
