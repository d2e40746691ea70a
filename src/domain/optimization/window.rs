use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Historical window a backtest is run over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BacktestWindow {
    /// Trailing lookback such as `"1y"` or `"6mo"`.
    Period(String),
    Range { start: NaiveDate, end: NaiveDate },
}

impl BacktestWindow {
    /// Label used in memory keys: the period itself, or `"{start}_{end}"`.
    pub fn memory_label(&self) -> String {
        match self {
            BacktestWindow::Period(p) => p.clone(),
            BacktestWindow::Range { start, end } => format!("{}_{}", start, end),
        }
    }

    /// Writes `period` or `start`/`end` into a command argument map.
    pub fn write_args(&self, args: &mut Map<String, Value>) {
        match self {
            BacktestWindow::Period(p) => {
                args.insert("period".to_string(), Value::String(p.clone()));
            }
            BacktestWindow::Range { start, end } => {
                args.insert("start".to_string(), Value::String(start.to_string()));
                args.insert("end".to_string(), Value::String(end.to_string()));
            }
        }
    }
}

impl fmt::Display for BacktestWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BacktestWindow::Period(p) => write!(f, "{}", p),
            BacktestWindow::Range { start, end } => write!(f, "{} → {}", start, end),
        }
    }
}

/// Parses a lookback label (`"6mo"`, `"1y"`, `"90d"`, `"2w"`, `"max"`) into days.
pub fn period_to_days(period: &str) -> Option<i64> {
    let period = period.trim().to_lowercase();
    if period == "max" {
        return Some(365 * 20);
    }
    if period == "ytd" {
        return Some(365);
    }
    let split = period.find(|c: char| !c.is_ascii_digit())?;
    let (amount, unit) = period.split_at(split);
    let amount: i64 = amount.parse().ok()?;
    let days = match unit {
        "d" => amount,
        "w" | "wk" => amount * 7,
        "mo" | "m" => amount * 30,
        "y" => amount * 365,
        _ => return None,
    };
    Some(days)
}
