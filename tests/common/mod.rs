#![allow(dead_code)]

use adaptive_tuner::domain::market::Candle;
use adaptive_tuner::domain::ports::{Command, CommandArgs, MarketDataService};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn temp_dir(label: &str) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "adaptive_tuner_it_{}_{}_{}",
        label,
        std::process::id(),
        n
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn cleanup(dir: PathBuf) {
    let _ = std::fs::remove_dir_all(dir);
}

type Responder = dyn Fn(&CommandArgs) -> Result<Value> + Send + Sync;

/// Command whose output is computed by a closure; records every argument set it sees.
pub struct ScriptedCommand {
    name: String,
    respond: Box<Responder>,
    pub calls: Arc<Mutex<Vec<CommandArgs>>>,
}

impl ScriptedCommand {
    pub fn new<F>(name: &str, respond: F) -> Self
    where
        F: Fn(&CommandArgs) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            respond: Box::new(respond),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Command for ScriptedCommand {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, args: &CommandArgs) -> Result<Value> {
        self.calls.lock().unwrap().push(args.clone());
        (self.respond)(args)
    }
}

/// Decodes the JSON-string `params` argument the evaluator sends.
pub fn params_of(args: &CommandArgs) -> serde_json::Map<String, Value> {
    let raw = args["params"].as_str().unwrap();
    serde_json::from_str(raw).unwrap()
}

/// Price series ending in a steady uptrend, with a fixed volatility-index level.
pub struct TrendingMarket {
    pub bars: usize,
    pub vix: f64,
}

fn bars(symbol: &str, closes: impl Iterator<Item = f64>) -> Vec<Candle> {
    closes
        .enumerate()
        .map(|(i, close)| Candle {
            symbol: symbol.to_string(),
            timestamp: 1_600_000_000 + i as i64 * 86_400,
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 1_000_000.0,
        })
        .collect()
}

#[async_trait]
impl MarketDataService for TrendingMarket {
    async fn daily_history(&self, symbol: &str, _lookback_days: i64) -> Result<Vec<Candle>> {
        if symbol == "^VIX" {
            return Ok(bars(symbol, std::iter::repeat_n(self.vix, 5)));
        }
        Ok(bars(symbol, (0..self.bars).map(|i| 100.0 + i as f64 * 0.5)))
    }

    async fn daily_range(&self, symbol: &str, _: NaiveDate, _: NaiveDate) -> Result<Vec<Candle>> {
        self.daily_history(symbol, 0).await
    }
}
