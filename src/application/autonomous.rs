//! Self-driving cycle: classify the market, pick the historically best strategy for that
//! regime, re-tune it on recent data and publish the result as the live configuration.

use crate::application::optimization::{OptimizationOrchestrator, OptimizationRequest};
use crate::application::regime::{MarketRegimeDetector, RegimeStrategyMapper};
use crate::domain::market::LiveStrategyConfig;
use crate::domain::optimization::BacktestWindow;
use crate::domain::ports::LiveConfigSink;
use chrono::{Duration, Months, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AutonomousSettings {
    /// Ticker whose regime drives the cycle; also the optimization target.
    pub benchmark: String,
    /// Universe label used when querying historical results.
    pub universe: String,
    pub baseline_strategy: String,
    pub population_size: usize,
    pub generations: usize,
}

impl Default for AutonomousSettings {
    fn default() -> Self {
        Self {
            benchmark: "SPY".to_string(),
            universe: "SP500".to_string(),
            baseline_strategy: "ma_crossover".to_string(),
            population_size: 10,
            generations: 5,
        }
    }
}

/// Memory label shared by every autonomous run, whatever the window's dates.
pub const AUTONOMOUS_MEMORY_LABEL: &str = "6mo";

/// Trailing six-month range ending on `today`.
pub fn trailing_six_months(today: NaiveDate) -> BacktestWindow {
    let start = today
        .checked_sub_months(Months::new(6))
        .unwrap_or(today - Duration::days(182));
    BacktestWindow::Range { start, end: today }
}

pub struct AutonomousLoop {
    detector: MarketRegimeDetector,
    mapper: RegimeStrategyMapper,
    orchestrator: Arc<OptimizationOrchestrator>,
    live_sink: Arc<dyn LiveConfigSink>,
    settings: AutonomousSettings,
}

impl AutonomousLoop {
    pub fn new(
        detector: MarketRegimeDetector,
        mapper: RegimeStrategyMapper,
        orchestrator: Arc<OptimizationOrchestrator>,
        live_sink: Arc<dyn LiveConfigSink>,
        settings: AutonomousSettings,
    ) -> Self {
        Self {
            detector,
            mapper,
            orchestrator,
            live_sink,
            settings,
        }
    }

    /// One cycle. Returns the published configuration, or `None` when nothing was published.
    pub async fn run_cycle(&self) -> Option<LiveStrategyConfig> {
        self.run_cycle_on(Utc::now().date_naive()).await
    }

    /// One cycle over the six months ending on `today`.
    pub async fn run_cycle_on(&self, today: NaiveDate) -> Option<LiveStrategyConfig> {
        let window = trailing_six_months(today);
        let regime = self.detector.detect(&self.settings.benchmark).await;
        info!(
            "Autonomous: {} regime is {} (window {})",
            self.settings.benchmark,
            regime.tag(),
            window
        );

        let mut request = match self.mapper.find_winner(&regime, &self.settings.universe).await {
            Some(winner) => {
                info!(
                    "Autonomous: re-tuning {} from {} ({:.2}% historically)",
                    winner.strategy, winner.source_condition, winner.historical_return
                );
                let mut request =
                    OptimizationRequest::backtest(&winner.strategy, &self.settings.benchmark, window);
                request.seeds.push(winner.params);
                request
            }
            None => {
                info!(
                    "Autonomous: no historical winner, falling back to {}",
                    self.settings.baseline_strategy
                );
                OptimizationRequest::backtest(
                    &self.settings.baseline_strategy,
                    &self.settings.benchmark,
                    window,
                )
            }
        };
        request.memory_label = Some(AUTONOMOUS_MEMORY_LABEL.to_string());
        request.population_size = self.settings.population_size;
        request.generations = self.settings.generations;
        request.num_parents = request.num_parents.min(self.settings.population_size.max(1));

        let strategy = request.strategy.clone();
        let outcome = self.orchestrator.run(request).await;
        let Some(params) = outcome.best_params else {
            warn!("Autonomous: optimization of {} found nothing, live config unchanged", strategy);
            return None;
        };

        let config = LiveStrategyConfig::active(
            regime.tag().to_string(),
            strategy,
            params,
            outcome.best_fitness,
        );
        match self.live_sink.publish(&config).await {
            Ok(()) => {
                info!(
                    "Autonomous: live strategy now {} {:?} (expected {:.2}%)",
                    config.strategy_name, config.active_parameters, config.expected_return_6mo
                );
                Some(config)
            }
            Err(e) => {
                error!("Autonomous: failed to publish live config: {:#}", e);
                None
            }
        }
    }

    /// Runs a cycle every `interval` until the future is dropped or its task aborted.
    pub async fn run_periodic(&self, interval: std::time::Duration) {
        info!("Autonomous: periodic mode, interval {:?}", interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_window_spans_six_months() {
        let today = NaiveDate::from_ymd_opt(2024, 8, 31).unwrap();
        assert_eq!(
            trailing_six_months(today),
            BacktestWindow::Range {
                start: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
                end: today,
            }
        );
    }
}
