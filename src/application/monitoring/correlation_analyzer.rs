use crate::application::commands::ANALYTIC_COMMANDS;
use crate::application::dispatch::CommandDispatcher;
use crate::domain::monitoring::CorrelationReport;
use crate::domain::monitoring::correlation::DEFAULT_INTERVAL_HOURS;
use crate::domain::ports::CommandArgs;
use crate::infrastructure::artifact_store::{AnalyzerStateFile, CorrelationReportFile};
use chrono::Utc;
use futures::future::join_all;
use rand::seq::IndexedRandom;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerSettings {
    pub universe: Vec<String>,
    pub sample_size: usize,
    pub max_in_flight: usize,
    /// Lookback handed to every analytic command.
    pub period: String,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            universe: Vec::new(),
            sample_size: 20,
            max_in_flight: 5,
            period: "6mo".to_string(),
        }
    }
}

/// Scalar an analytic command reports, located by its per-command field rule.
pub fn extract_scalar(command: &str, output: &Value) -> Option<f64> {
    let (_, field) = ANALYTIC_COMMANDS.iter().find(|(name, _)| *name == command)?;
    output.get(*field).and_then(Value::as_f64).filter(|v| v.is_finite())
}

/// Periodically samples analytic signals across a universe and correlates them.
pub struct CorrelationAnalyzer {
    dispatcher: Arc<CommandDispatcher>,
    state_file: AnalyzerStateFile,
    report_file: CorrelationReportFile,
    settings: AnalyzerSettings,
}

impl CorrelationAnalyzer {
    pub fn new(
        dispatcher: Arc<CommandDispatcher>,
        state_file: AnalyzerStateFile,
        report_file: CorrelationReportFile,
        settings: AnalyzerSettings,
    ) -> Self {
        Self {
            dispatcher,
            state_file,
            report_file,
            settings,
        }
    }

    fn sample_tickers(&self) -> Vec<String> {
        let mut rng = rand::rng();
        self.settings
            .universe
            .choose_multiple(&mut rng, self.settings.sample_size)
            .cloned()
            .collect()
    }

    /// Runs every analytic command for every ticker, at most `max_in_flight` at once.
    async fn collect(&self, tickers: &[String]) -> BTreeMap<String, BTreeMap<String, f64>> {
        let permits = Arc::new(Semaphore::new(self.settings.max_in_flight.max(1)));

        let jobs: Vec<_> = tickers
            .iter()
            .flat_map(|ticker| {
                ANALYTIC_COMMANDS
                    .iter()
                    .map(move |(command, _)| (ticker.clone(), *command))
            })
            .map(|(ticker, command)| {
                let permits = permits.clone();
                let dispatcher = self.dispatcher.clone();
                let period = self.settings.period.clone();
                async move {
                    let _permit = permits.acquire_owned().await.ok()?;
                    let mut args = CommandArgs::new();
                    args.insert("ticker".to_string(), Value::from(ticker.clone()));
                    args.insert("period".to_string(), Value::from(period));
                    let context = json!({ "source": "correlation_analyzer" });
                    match dispatcher.dispatch(command, args, context).await {
                        Ok(output) => {
                            let value = extract_scalar(command, &output);
                            if value.is_none() {
                                debug!("Analyzer: {} gave no scalar for {}", command, ticker);
                            }
                            value.map(|v| (ticker, command, v))
                        }
                        Err(e) => {
                            debug!("Analyzer: {} failed for {}: {}", command, ticker, e);
                            None
                        }
                    }
                }
            })
            .collect();

        let mut table: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        for (ticker, command, value) in join_all(jobs).await.into_iter().flatten() {
            table
                .entry(ticker)
                .or_default()
                .insert(command.to_string(), value);
        }
        table
    }

    /// One sampling pass. Returns the report when enough tickers produced complete rows.
    pub async fn run_cycle(&self) -> Option<CorrelationReport> {
        let tickers = self.sample_tickers();
        if tickers.is_empty() {
            warn!("Analyzer: reference universe is empty, nothing to sample");
            return None;
        }
        info!("Analyzer: sampling {} tickers", tickers.len());

        let table = self.collect(&tickers).await;
        let commands: Vec<String> = ANALYTIC_COMMANDS
            .iter()
            .map(|(name, _)| name.to_string())
            .collect();

        let report = CorrelationReport::from_table(&commands, &table);
        match &report {
            Some(report) => {
                for pair in &report.strong_pairs {
                    info!(
                        "Analyzer: strong correlation {} ~ {} (r = {:.3})",
                        pair.a, pair.b, pair.r
                    );
                }
                info!(
                    "Analyzer: {} complete rows, {} strong pairs",
                    report.tickers.len(),
                    report.strong_pairs.len()
                );
                if let Err(e) = self.report_file.write(report).await {
                    warn!("Analyzer: failed to persist correlation report: {:#}", e);
                }
            }
            None => warn!(
                "Analyzer: only {} tickers returned data, skipping correlation",
                table.len()
            ),
        }

        if let Err(e) = self
            .state_file
            .update(|state| state.last_cycle_at = Some(Utc::now()))
            .await
        {
            warn!("Analyzer: failed to record cycle time: {:#}", e);
        }
        report
    }

    /// Sleep-then-sample forever, re-reading the interval before every sleep.
    pub async fn run(self: Arc<Self>) {
        loop {
            let hours = self.state_file.load().await.effective_interval_hours();
            debug!("Analyzer: next cycle in {:.2}h", hours);
            let pause = Duration::try_from_secs_f64(hours * 3600.0)
                .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_INTERVAL_HOURS * 3600.0));
            tokio::time::sleep(pause).await;
            self.run_cycle().await;
        }
    }
}

/// Owns the analyzer task. Stopping aborts it wherever it is suspended.
pub struct AnalyzerHandle {
    analyzer: Arc<CorrelationAnalyzer>,
    task: Option<JoinHandle<()>>,
}

impl AnalyzerHandle {
    pub fn new(analyzer: Arc<CorrelationAnalyzer>) -> Self {
        Self {
            analyzer,
            task: None,
        }
    }

    /// Spawns the task unless it is already running. Returns whether it was started.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        info!("Analyzer: starting background task");
        self.task = Some(tokio::spawn(self.analyzer.clone().run()));
        true
    }

    /// Aborts the task. Returns whether one was running.
    pub fn stop(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                info!("Analyzer: background task stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Aligns the task with the persisted activation flag.
    pub async fn reconcile(&mut self, state_file: &AnalyzerStateFile) {
        let active = state_file.load().await.active;
        if active && !self.is_running() {
            self.start();
        } else if !active && self.is_running() {
            self.stop();
        }
    }
}

impl Drop for AnalyzerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
