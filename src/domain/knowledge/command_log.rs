use crate::domain::optimization::BacktestMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum length of the stored output summary.
pub const OUTPUT_SUMMARY_LIMIT: usize = 500;

/// Immutable record of one command invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub parameters: Value,
    pub context_snapshot: Value,
    pub output_summary: String,
    pub success: bool,
    pub duration_ms: u64,
    pub backtest_metrics: Option<LoggedBacktestMetrics>,
}

/// Backtest figures pulled out of a command output for later querying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedBacktestMetrics {
    pub total_return_pct: f64,
    #[serde(flatten)]
    pub metrics: BacktestMetrics,
}

impl LoggedBacktestMetrics {
    /// Extracts metrics when the output looks like a successful backtest.
    pub fn from_output(output: &Value) -> Option<Self> {
        let total_return_pct = output.get("total_return_pct")?.as_f64()?;
        Some(Self {
            total_return_pct,
            metrics: BacktestMetrics {
                sharpe_ratio: output.get("sharpe_ratio").and_then(Value::as_f64),
                trade_count: output.get("trade_count").and_then(Value::as_u64),
                buy_hold_return: output.get("buy_hold_return_pct").and_then(Value::as_f64),
            },
        })
    }
}

impl CommandLogEntry {
    pub fn new(
        command: &str,
        parameters: Value,
        context_snapshot: Value,
        output: &Value,
        success: bool,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            command: command.to_string(),
            parameters,
            context_snapshot,
            output_summary: summarize(output),
            success,
            duration_ms,
            backtest_metrics: LoggedBacktestMetrics::from_output(output),
        }
    }
}

/// Compact single-line rendering of an output, truncated on a char boundary.
pub fn summarize(output: &Value) -> String {
    let text = match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() <= OUTPUT_SUMMARY_LIMIT {
        return text;
    }
    let mut truncated: String = text.chars().take(OUTPUT_SUMMARY_LIMIT).collect();
    truncated.push('…');
    truncated
}

/// Aggregate statistics for one command name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandStats {
    pub command: String,
    pub invocations: u64,
    pub successes: u64,
    pub mean_duration_ms: f64,
}

impl CommandStats {
    pub fn success_rate(&self) -> f64 {
        if self.invocations == 0 {
            0.0
        } else {
            self.successes as f64 / self.invocations as f64
        }
    }
}
