//! Process-wide wiring, built once at startup and handed to every entry point.

use crate::application::autonomous::AutonomousLoop;
use crate::application::commands::{LocalBacktestCommand, builtin_analytics};
use crate::application::dispatch::{CommandDispatcher, CommandRegistry};
use crate::application::knowledge_base::KnowledgeBase;
use crate::application::monitoring::{AnalyzerHandle, CorrelationAnalyzer};
use crate::application::optimization::OptimizationOrchestrator;
use crate::application::plugins::PluginRegistry;
use crate::application::regime::{MarketRegimeDetector, RegimeStrategyMapper};
use crate::config::{Config, Mode};
use crate::domain::ports::MarketDataService;
use crate::infrastructure::artifact_store::{
    AnalyzerStateFile, CorrelationReportFile, JsonLiveConfigFile, JsonStatusFile,
};
use crate::infrastructure::market_data::{MockMarketDataService, YahooMarketDataService};
use crate::infrastructure::memory_store::MemoryStore;
use crate::infrastructure::parameter_registry::ParameterRegistry;
use crate::infrastructure::persistence::Database;
use crate::infrastructure::persistence::repositories::{
    SqliteCommandLogRepository, SqliteConvergenceRepository,
};
use crate::infrastructure::remote_command::HttpCommand;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

pub struct AppContext {
    pub config: Config,
    pub market: Arc<dyn MarketDataService>,
    pub knowledge_base: KnowledgeBase,
    pub registry: Arc<ParameterRegistry>,
    pub memory: Arc<MemoryStore>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub status_file: Arc<JsonStatusFile>,
    pub live_config_file: Arc<JsonLiveConfigFile>,
    pub analyzer_state: AnalyzerStateFile,
    pub correlation_report: CorrelationReportFile,
    analyzer: Mutex<AnalyzerHandle>,
}

impl AppContext {
    pub async fn build(config: Config) -> Result<Self> {
        info!(
            "AppContext: building (mode {:?}, data dir {})",
            config.mode,
            config.storage.data_dir.display()
        );

        let market_timeout = Duration::from_secs(config.market_data_timeout_secs);
        let market: Arc<dyn MarketDataService> = match config.mode {
            Mode::Mock => Arc::new(MockMarketDataService::new()),
            Mode::Live => Arc::new(YahooMarketDataService::new(market_timeout)),
        };

        let database = Database::new(&config.storage.database_url)
            .await
            .context("Failed to open knowledge base")?;
        let knowledge_base = KnowledgeBase::new(
            Arc::new(SqliteCommandLogRepository::new(database.pool.clone())),
            Arc::new(SqliteConvergenceRepository::new(database.pool.clone())),
        );

        let registry = Arc::new(ParameterRegistry::load(config.storage.registry_path()).await?);
        let memory = Arc::new(MemoryStore::new(config.storage.memory_path()));

        let plugins = Arc::new(PluginRegistry::with_builtins(config.allow_external_plugins));
        let mut commands = CommandRegistry::new();
        match &config.backtest_url {
            Some(url) => {
                let timeout = Duration::from_secs(config.optimizer.backtest_timeout_secs);
                let remote = HttpCommand::new("backtest", url, timeout);
                info!("AppContext: backtests go to {}", remote.endpoint());
                commands.register(Arc::new(remote));
            }
            None => {
                commands.register(Arc::new(LocalBacktestCommand::new(market.clone(), plugins)));
            }
        }
        for command in builtin_analytics(market.clone()) {
            commands.register(command);
        }

        let dispatcher = Arc::new(CommandDispatcher::new(
            commands,
            Duration::from_secs(config.optimizer.backtest_timeout_secs),
            Some(knowledge_base.clone()),
        ));

        let analyzer_state = AnalyzerStateFile::new(config.storage.analyzer_state_path());
        let correlation_report = CorrelationReportFile::new(config.storage.correlation_report_path());
        let analyzer = CorrelationAnalyzer::new(
            dispatcher.clone(),
            analyzer_state.clone(),
            correlation_report.clone(),
            config.analyzer.settings(),
        );

        Ok(Self {
            status_file: Arc::new(JsonStatusFile::new(config.storage.status_path())),
            live_config_file: Arc::new(JsonLiveConfigFile::new(config.storage.live_config_path())),
            market,
            knowledge_base,
            registry,
            memory,
            dispatcher,
            analyzer_state,
            correlation_report,
            analyzer: Mutex::new(AnalyzerHandle::new(Arc::new(analyzer))),
            config,
        })
    }

    /// Orchestrator using the configured objective, seed and status file.
    pub fn orchestrator(&self) -> OptimizationOrchestrator {
        OptimizationOrchestrator::new(
            self.registry.clone(),
            self.dispatcher.clone(),
            self.memory.clone(),
        )
        .with_status_sink(self.status_file.clone())
        .with_objective(self.config.optimizer.objective)
        .with_rng_seed(self.config.optimizer.rng_seed)
    }

    pub fn regime_detector(&self) -> MarketRegimeDetector {
        MarketRegimeDetector::new(self.market.clone())
    }

    pub fn autonomous_loop(&self) -> AutonomousLoop {
        AutonomousLoop::new(
            self.regime_detector(),
            RegimeStrategyMapper::new(self.knowledge_base.clone()),
            Arc::new(self.orchestrator()),
            self.live_config_file.clone(),
            self.config.autonomous.settings(),
        )
    }

    /// Starts or stops the analyzer to match the persisted activation flag.
    pub async fn reconcile_analyzer(&self) {
        self.analyzer.lock().await.reconcile(&self.analyzer_state).await;
    }

    pub async fn analyzer_running(&self) -> bool {
        self.analyzer.lock().await.is_running()
    }

    /// Stops background work. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.analyzer.lock().await.stop();
        info!("AppContext: shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::artifact_store::test_support::{cleanup, temp_dir};
    use std::collections::HashMap;

    fn config(dir: &std::path::Path, extra: &[(&str, &str)]) -> Config {
        let mut vars: HashMap<String, String> = HashMap::new();
        vars.insert("MODE".to_string(), "mock".to_string());
        vars.insert("DATA_DIR".to_string(), dir.display().to_string());
        vars.insert("DATABASE_URL".to_string(), "sqlite::memory:".to_string());
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        Config::from_lookup(move |key: &str| vars.get(key).cloned()).unwrap()
    }

    #[tokio::test]
    async fn test_build_registers_local_backtest_and_analytics() {
        let dir = temp_dir("context_local");
        let ctx = AppContext::build(config(&dir, &[])).await.unwrap();

        let names = ctx.dispatcher.command_names().await;
        for expected in ["backtest", "momentum", "volatility", "rsi", "trend_strength"] {
            assert!(names.contains(&expected.to_string()), "missing {}", expected);
        }
        assert!(!ctx.analyzer_running().await);
        ctx.shutdown().await;
        cleanup(dir);
    }

    #[tokio::test]
    async fn test_build_with_remote_backtest_keeps_one_backtest() {
        let dir = temp_dir("context_remote");
        let ctx = AppContext::build(config(&dir, &[("BACKTEST_URL", "http://127.0.0.1:9")]))
            .await
            .unwrap();

        let names = ctx.dispatcher.command_names().await;
        assert_eq!(names.iter().filter(|n| *n == "backtest").count(), 1);
        cleanup(dir);
    }
}
