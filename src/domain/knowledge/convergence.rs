use crate::domain::optimization::Individual;
use serde::{Deserialize, Serialize};

/// Persisted best outcome of a historical parameter sweep for one
/// universe / market condition / strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceResult {
    #[serde(default)]
    pub id: Option<i64>,
    pub universe: String,
    pub market_condition: String,
    pub strategy_name: String,
    pub best_params: Individual,
    pub best_sharpe: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub trade_count: i64,
    pub buy_hold_return: f64,
}
