use crate::domain::optimization::Individual;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current best-known live configuration. Overwritten wholesale each autonomous cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStrategyConfig {
    pub timestamp: DateTime<Utc>,
    pub regime_detected: String,
    pub strategy_name: String,
    pub active_parameters: Individual,
    pub expected_return_6mo: f64,
    pub status: String,
}

impl LiveStrategyConfig {
    pub fn active(
        regime_detected: String,
        strategy_name: String,
        active_parameters: Individual,
        expected_return_6mo: f64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            regime_detected,
            strategy_name,
            active_parameters,
            expected_return_6mo,
            status: "active".to_string(),
        }
    }
}
