mod common;

use adaptive_tuner::application::dispatch::{CommandDispatcher, CommandRegistry};
use adaptive_tuner::application::monitoring::{
    AnalyzerHandle, AnalyzerSettings, CorrelationAnalyzer,
};
use adaptive_tuner::domain::monitoring::AnalyzerState;
use adaptive_tuner::domain::ports::{Command, CommandArgs};
use adaptive_tuner::infrastructure::artifact_store::{AnalyzerStateFile, CorrelationReportFile};
use anyhow::Result;
use async_trait::async_trait;
use common::{ScriptedCommand, cleanup, temp_dir};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

const UNIVERSE: &[&str] = &["T1", "T2", "T3", "T4", "T5", "T6", "T7", "T8"];

fn ticker_number(args: &CommandArgs) -> f64 {
    args["ticker"].as_str().unwrap()[1..].parse().unwrap()
}

/// momentum and volatility move together, rsi moves against them, adx is unrelated.
fn analytics(registry: &mut CommandRegistry, failing_rsi_above: Option<f64>) {
    registry.register(Arc::new(ScriptedCommand::new("momentum", |args| {
        Ok(json!({"status": "success", "momentum_pct": ticker_number(args)}))
    })));
    registry.register(Arc::new(ScriptedCommand::new("volatility", |args| {
        Ok(json!({"status": "success", "annualized_volatility_pct": 2.0 * ticker_number(args) + 1.0}))
    })));
    registry.register(Arc::new(ScriptedCommand::new("rsi", move |args| {
        let x = ticker_number(args);
        if failing_rsi_above.is_some_and(|limit| x > limit) {
            anyhow::bail!("no data for rsi");
        }
        Ok(json!({"status": "success", "rsi": 100.0 - 3.0 * x}))
    })));
    registry.register(Arc::new(ScriptedCommand::new("trend_strength", |args| {
        let x = ticker_number(args);
        let adx = [20.0, 35.0, 20.0, 35.0, 20.0, 35.0, 20.0, 35.0][x as usize - 1];
        Ok(json!({"status": "success", "adx": adx}))
    })));
}

fn analyzer(dir: &Path, registry: CommandRegistry, max_in_flight: usize) -> CorrelationAnalyzer {
    CorrelationAnalyzer::new(
        Arc::new(CommandDispatcher::new(registry, Duration::from_secs(5), None)),
        AnalyzerStateFile::new(dir.join("analyzer_state.json")),
        CorrelationReportFile::new(dir.join("correlation_report.json")),
        AnalyzerSettings {
            universe: UNIVERSE.iter().map(|s| s.to_string()).collect(),
            sample_size: 20,
            max_in_flight,
            ..AnalyzerSettings::default()
        },
    )
}

#[tokio::test]
async fn test_cycle_reports_strong_pairs() {
    let dir = temp_dir("analyzer_cycle");
    let mut registry = CommandRegistry::new();
    analytics(&mut registry, None);
    let analyzer = analyzer(&dir, registry, 5);

    let report = analyzer.run_cycle().await.unwrap();
    assert_eq!(report.tickers.len(), UNIVERSE.len());
    assert_eq!(
        report.commands,
        vec!["momentum", "volatility", "rsi", "trend_strength"]
    );

    let pair = |a: &str, b: &str| {
        report
            .strong_pairs
            .iter()
            .find(|p| p.a == a && p.b == b)
            .map(|p| p.r)
    };
    assert!((pair("momentum", "volatility").unwrap() - 1.0).abs() < 1e-9);
    assert!((pair("momentum", "rsi").unwrap() + 1.0).abs() < 1e-9);
    assert!(pair("momentum", "trend_strength").is_none());
    assert!(report.strong_pairs.iter().all(|p| p.r.abs() > 0.5));

    let persisted = CorrelationReportFile::new(dir.join("correlation_report.json"))
        .read()
        .await
        .unwrap();
    assert_eq!(persisted, report);
    let state = AnalyzerStateFile::new(dir.join("analyzer_state.json")).load().await;
    assert!(state.last_cycle_at.is_some());
    cleanup(dir);
}

#[tokio::test]
async fn test_too_few_complete_rows_skips_report() {
    let dir = temp_dir("analyzer_sparse");
    let mut registry = CommandRegistry::new();
    analytics(&mut registry, Some(4.0));
    let analyzer = analyzer(&dir, registry, 5);

    assert!(analyzer.run_cycle().await.is_none());
    assert!(
        CorrelationReportFile::new(dir.join("correlation_report.json"))
            .read()
            .await
            .is_none()
    );
    cleanup(dir);
}

struct Gauge {
    name: &'static str,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl Command for Gauge {
    fn name(&self) -> &str {
        self.name
    }

    async fn invoke(&self, _args: &CommandArgs) -> Result<Value> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(json!({}))
    }
}

#[tokio::test]
async fn test_fan_out_respects_in_flight_limit() {
    let dir = temp_dir("analyzer_limit");
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut registry = CommandRegistry::new();
    for name in ["momentum", "volatility", "rsi", "trend_strength"] {
        registry.register(Arc::new(Gauge {
            name,
            in_flight: in_flight.clone(),
            peak: peak.clone(),
        }));
    }

    let analyzer = analyzer(&dir, registry, 2);
    assert!(analyzer.run_cycle().await.is_none());
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    cleanup(dir);
}

#[tokio::test]
async fn test_background_task_cycles_until_stopped() {
    let dir = temp_dir("analyzer_task");
    let state_file = AnalyzerStateFile::new(dir.join("analyzer_state.json"));
    state_file
        .save(&AnalyzerState {
            active: true,
            interval_hours: 0.00005,
            last_cycle_at: None,
        })
        .await
        .unwrap();

    let mut registry = CommandRegistry::new();
    analytics(&mut registry, None);
    let mut handle = AnalyzerHandle::new(Arc::new(analyzer(&dir, registry, 5)));
    handle.reconcile(&state_file).await;
    assert!(handle.is_running());

    let report_file = CorrelationReportFile::new(dir.join("correlation_report.json"));
    let mut produced = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if report_file.read().await.is_some() {
            produced = true;
            break;
        }
    }
    assert!(produced, "no report within 5s");

    assert!(handle.stop());
    assert!(!handle.is_running());
    cleanup(dir);
}

/// Analytic that parks on a gate nobody opens; counts entries and torn-down calls.
struct Parked {
    name: &'static str,
    gate: Arc<Notify>,
    entered: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Command for Parked {
    fn name(&self) -> &str {
        self.name
    }

    async fn invoke(&self, _args: &CommandArgs) -> Result<Value> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let _counter = DropCounter(self.dropped.clone());
        self.gate.notified().await;
        Ok(json!({}))
    }
}

#[tokio::test]
async fn test_stop_mid_fan_out_tears_down_in_flight_calls() {
    let dir = temp_dir("analyzer_mid_fan_out");
    let state_file = AnalyzerStateFile::new(dir.join("analyzer_state.json"));
    state_file
        .save(&AnalyzerState {
            active: true,
            interval_hours: 0.00001,
            last_cycle_at: None,
        })
        .await
        .unwrap();

    let gate = Arc::new(Notify::new());
    let entered = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut registry = CommandRegistry::new();
    for name in ["momentum", "volatility", "rsi", "trend_strength"] {
        registry.register(Arc::new(Parked {
            name,
            gate: gate.clone(),
            entered: entered.clone(),
            dropped: dropped.clone(),
        }));
    }

    let mut handle = AnalyzerHandle::new(Arc::new(analyzer(&dir, registry, 2)));
    assert!(handle.start());

    for _ in 0..100 {
        if entered.load(Ordering::SeqCst) == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(entered.load(Ordering::SeqCst), 2, "permits never filled");

    assert!(handle.stop());
    assert!(!handle.is_running());
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(dropped.load(Ordering::SeqCst), 2);
    assert_eq!(entered.load(Ordering::SeqCst), 2);
    assert!(
        CorrelationReportFile::new(dir.join("correlation_report.json"))
            .read()
            .await
            .is_none()
    );
    assert!(state_file.load().await.last_cycle_at.is_none());
    cleanup(dir);
}
