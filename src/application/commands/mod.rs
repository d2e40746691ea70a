//! Built-in local commands.
//!
//! `backtest` runs a long-only simulation of a signal plugin; the analytic commands each
//! reduce a ticker's recent history to a single figure.

pub mod analytics;
pub mod backtest;

pub use analytics::{
    ANALYTIC_COMMANDS, MomentumCommand, RsiCommand, TrendStrengthCommand, VolatilityCommand,
    builtin_analytics,
};
pub use backtest::LocalBacktestCommand;

use crate::domain::optimization::BacktestWindow;
use crate::domain::optimization::window::period_to_days;
use crate::domain::ports::CommandArgs;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;

pub(crate) fn string_arg<'a>(args: &'a CommandArgs, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str).filter(|s| !s.is_empty())
}

pub(crate) fn required_string_arg<'a>(args: &'a CommandArgs, name: &str) -> Result<&'a str> {
    string_arg(args, name).with_context(|| format!("Missing required argument '{}'", name))
}

/// Reads `start`/`end` when both are present, otherwise `period` (or `default_period`).
pub(crate) fn window_arg(args: &CommandArgs, default_period: &str) -> Result<BacktestWindow> {
    if let (Some(start), Some(end)) = (string_arg(args, "start"), string_arg(args, "end")) {
        let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
            .with_context(|| format!("Invalid start date '{}'", start))?;
        let end = NaiveDate::parse_from_str(end, "%Y-%m-%d")
            .with_context(|| format!("Invalid end date '{}'", end))?;
        if end < start {
            anyhow::bail!("End date {} is before start date {}", end, start);
        }
        return Ok(BacktestWindow::Range { start, end });
    }

    let period = string_arg(args, "period").unwrap_or(default_period);
    if period_to_days(period).is_none() {
        anyhow::bail!("Unsupported period '{}'", period);
    }
    Ok(BacktestWindow::Period(period.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> CommandArgs {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_window_arg_variants() {
        assert_eq!(
            window_arg(&args(json!({})), "1y").unwrap(),
            BacktestWindow::Period("1y".to_string())
        );
        assert_eq!(
            window_arg(&args(json!({"period": "6mo"})), "1y").unwrap(),
            BacktestWindow::Period("6mo".to_string())
        );
        let range = window_arg(
            &args(json!({"start": "2022-01-03", "end": "2022-12-30", "period": "1y"})),
            "1y",
        )
        .unwrap();
        assert!(matches!(range, BacktestWindow::Range { .. }));

        assert!(window_arg(&args(json!({"period": "forever"})), "1y").is_err());
        assert!(window_arg(&args(json!({"start": "2022-12-30", "end": "2022-01-03"})), "1y").is_err());
    }
}
