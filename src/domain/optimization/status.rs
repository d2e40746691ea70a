use super::parameters::Individual;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Live optimization status, continuously overwritten for an external status consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationStatus {
    pub run_id: String,
    pub command: String,
    pub strategy: String,
    pub ticker: String,
    pub best_params: Option<Individual>,
    pub best_return: Option<f64>,
    pub buy_hold_return: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub trade_count: Option<u64>,
    pub generation: usize,
    pub total_generations: usize,
    pub status: RunStatus,
    /// Set on the snapshot written at the moment a new best was found.
    #[serde(default)]
    pub new_best: bool,
    pub previous_best_return: Option<f64>,
    pub updated_at: DateTime<Utc>,
}
