//! Strategy signal plugins.
//!
//! A plugin exposes a single capability: turn a daily bar series plus a parameter set
//! into one [`Signal`] per bar. Plugins are registered explicitly with a [`Provenance`];
//! nothing is loaded at runtime.

mod bollinger_reversion;
mod ma_crossover;
mod momentum_breakout;
mod rsi_reversion;

pub use bollinger_reversion::BollingerReversion;
pub use ma_crossover::MaCrossover;
pub use momentum_breakout::MomentumBreakout;
pub use rsi_reversion::RsiReversion;

use crate::domain::errors::PluginError;
use crate::domain::market::Candle;
use crate::domain::optimization::{Individual, ParamValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Compiled into this binary
    BuiltIn,
    /// Supplied by an embedding application
    External,
}

pub trait SignalGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// One signal per input bar, aligned by index.
    fn generate_signals(
        &self,
        candles: &[Candle],
        params: &Individual,
    ) -> Result<Vec<Signal>, PluginError>;
}

struct RegisteredPlugin {
    generator: Arc<dyn SignalGenerator>,
    provenance: Provenance,
}

/// Named signal generators with explicit trust.
pub struct PluginRegistry {
    plugins: BTreeMap<String, RegisteredPlugin>,
    allow_external: bool,
}

impl PluginRegistry {
    pub fn new(allow_external: bool) -> Self {
        Self {
            plugins: BTreeMap::new(),
            allow_external,
        }
    }

    /// Registry holding the four built-in strategies.
    pub fn with_builtins(allow_external: bool) -> Self {
        let mut registry = Self::new(allow_external);
        registry.register(Arc::new(MaCrossover), Provenance::BuiltIn);
        registry.register(Arc::new(RsiReversion), Provenance::BuiltIn);
        registry.register(Arc::new(MomentumBreakout), Provenance::BuiltIn);
        registry.register(Arc::new(BollingerReversion), Provenance::BuiltIn);
        registry
    }

    pub fn register(&mut self, generator: Arc<dyn SignalGenerator>, provenance: Provenance) {
        let name = generator.name().to_string();
        if provenance == Provenance::External && !self.allow_external {
            warn!(
                "PluginRegistry: external plugin {} registered but external plugins are disabled",
                name
            );
        } else {
            info!("PluginRegistry: registered {} ({:?})", name, provenance);
        }
        self.plugins.insert(
            name,
            RegisteredPlugin {
                generator,
                provenance,
            },
        );
    }

    /// Resolves a plugin, refusing external ones unless explicitly allowed.
    pub fn get(&self, name: &str) -> Result<Arc<dyn SignalGenerator>, PluginError> {
        let plugin = self
            .plugins
            .get(name)
            .ok_or_else(|| PluginError::UnknownPlugin {
                name: name.to_string(),
            })?;

        if plugin.provenance == Provenance::External && !self.allow_external {
            return Err(PluginError::UntrustedPlugin {
                name: name.to_string(),
            });
        }
        Ok(plugin.generator.clone())
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }
}

/// Reads a positive integer parameter, falling back to `default` when absent.
pub(crate) fn period_param(
    plugin: &str,
    params: &Individual,
    name: &str,
    default: usize,
) -> Result<usize, PluginError> {
    let Some(value) = params.get(name) else {
        return Ok(default);
    };
    match value.as_i64() {
        Some(v) if v > 0 => Ok(v as usize),
        _ => Err(PluginError::InvalidParameter {
            plugin: plugin.to_string(),
            parameter: name.to_string(),
            reason: format!("expected a positive integer, got {}", value),
        }),
    }
}

pub(crate) fn float_param(
    plugin: &str,
    params: &Individual,
    name: &str,
    default: f64,
) -> Result<f64, PluginError> {
    let Some(value) = params.get(name) else {
        return Ok(default);
    };
    value.as_f64().ok_or_else(|| PluginError::InvalidParameter {
        plugin: plugin.to_string(),
        parameter: name.to_string(),
        reason: format!("expected a number, got {}", value),
    })
}

pub(crate) fn bool_param(
    plugin: &str,
    params: &Individual,
    name: &str,
    default: bool,
) -> Result<bool, PluginError> {
    match params.get(name) {
        None => Ok(default),
        Some(ParamValue::Bool(b)) => Ok(*b),
        Some(other) => Err(PluginError::InvalidParameter {
            plugin: plugin.to_string(),
            parameter: name.to_string(),
            reason: format!("expected a boolean, got {}", other),
        }),
    }
}

pub(crate) fn require_bars(candles: &[Candle], needed: usize) -> Result<(), PluginError> {
    if candles.len() < needed {
        return Err(PluginError::InsufficientData {
            needed,
            available: candles.len(),
        });
    }
    Ok(())
}

pub(crate) fn ta_error(plugin: &str, parameter: &str, err: ta::errors::TaError) -> PluginError {
    PluginError::InvalidParameter {
        plugin: plugin.to_string(),
        parameter: parameter.to_string(),
        reason: format!("{:?}", err),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::market::Candle;

    pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| Candle {
                symbol: "TEST".to_string(),
                timestamp: i as i64 * 86_400,
                open: *c,
                high: c * 1.01,
                low: c * 0.99,
                close: *c,
                volume: 1_000.0,
            })
            .collect()
    }
}
