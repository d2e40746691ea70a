use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Fitness assigned to any individual whose backtest failed, errored or timed out.
///
/// Far outside any realistic return so it can never be mistaken for a real result.
pub const PENALTY_FITNESS: f64 = -999.0;

/// Side metrics reported by a successful backtest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub sharpe_ratio: Option<f64>,
    pub trade_count: Option<u64>,
    pub buy_hold_return: Option<f64>,
}

/// Which backtest figure drives selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessObjective {
    /// Raw total return percentage of the backtest window.
    #[default]
    TotalReturn,
    /// Sharpe ratio; responses without one are penalized.
    Sharpe,
}

impl FromStr for FitnessObjective {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "total_return" | "return" => Ok(FitnessObjective::TotalReturn),
            "sharpe" | "sharpe_ratio" => Ok(FitnessObjective::Sharpe),
            _ => anyhow::bail!(
                "Invalid FITNESS_OBJECTIVE: {}. Must be 'total_return' or 'sharpe'",
                s
            ),
        }
    }
}

impl fmt::Display for FitnessObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitnessObjective::TotalReturn => write!(f, "total_return"),
            FitnessObjective::Sharpe => write!(f, "sharpe"),
        }
    }
}

/// Outcome of evaluating one individual. Lives only for the duration of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessRecord {
    pub fitness: f64,
    /// `None` for penalized evaluations.
    pub metrics: Option<BacktestMetrics>,
}

impl FitnessRecord {
    pub fn penalty() -> Self {
        Self {
            fitness: PENALTY_FITNESS,
            metrics: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.metrics.is_some()
    }

    /// Maps a backtest response onto a record.
    ///
    /// Only `{"status": "success", "total_return_pct": <number>, ...}` yields a real
    /// fitness; everything else is the penalty record.
    pub fn from_response(response: &Value, objective: FitnessObjective) -> Self {
        if response.get("status").and_then(Value::as_str) != Some("success") {
            return Self::penalty();
        }

        let Some(total_return) = response.get("total_return_pct").and_then(Value::as_f64) else {
            return Self::penalty();
        };

        let metrics = BacktestMetrics {
            sharpe_ratio: response.get("sharpe_ratio").and_then(Value::as_f64),
            trade_count: response.get("trade_count").and_then(Value::as_u64),
            buy_hold_return: response.get("buy_hold_return_pct").and_then(Value::as_f64),
        };

        let fitness = match objective {
            FitnessObjective::TotalReturn => total_return,
            FitnessObjective::Sharpe => match metrics.sharpe_ratio {
                Some(sharpe) => sharpe,
                None => return Self::penalty(),
            },
        };

        Self {
            fitness,
            metrics: Some(metrics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_response_maps_verbatim() {
        let response = json!({
            "status": "success",
            "total_return_pct": 12.5,
            "sharpe_ratio": 1.1,
            "trade_count": 7,
            "buy_hold_return_pct": 8.0
        });
        let record = FitnessRecord::from_response(&response, FitnessObjective::TotalReturn);
        assert_eq!(record.fitness, 12.5);
        assert_eq!(
            record.metrics,
            Some(BacktestMetrics {
                sharpe_ratio: Some(1.1),
                trade_count: Some(7),
                buy_hold_return: Some(8.0),
            })
        );
    }

    #[test]
    fn test_error_response_is_penalized() {
        let record =
            FitnessRecord::from_response(&json!({"status": "error"}), FitnessObjective::TotalReturn);
        assert_eq!(record.fitness, -999.0);
        assert!(record.metrics.is_none());
    }

    #[test]
    fn test_success_without_return_is_penalized() {
        let record = FitnessRecord::from_response(
            &json!({"status": "success", "sharpe_ratio": 2.0}),
            FitnessObjective::TotalReturn,
        );
        assert_eq!(record, FitnessRecord::penalty());
    }

    #[test]
    fn test_sharpe_objective() {
        let response = json!({"status": "success", "total_return_pct": 3.0, "sharpe_ratio": 0.4});
        let record = FitnessRecord::from_response(&response, FitnessObjective::Sharpe);
        assert_eq!(record.fitness, 0.4);

        let response = json!({"status": "success", "total_return_pct": 3.0});
        let record = FitnessRecord::from_response(&response, FitnessObjective::Sharpe);
        assert_eq!(record.fitness, PENALTY_FITNESS);
    }
}
