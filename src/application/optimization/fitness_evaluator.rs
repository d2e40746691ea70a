use crate::application::dispatch::CommandDispatcher;
use crate::domain::optimization::{
    BacktestWindow, FitnessObjective, FitnessRecord, Individual, canonical_key,
};
use crate::domain::ports::CommandArgs;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// What every individual of a run is evaluated against.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationTarget {
    pub command: String,
    pub strategy: String,
    pub ticker: String,
    pub window: BacktestWindow,
}

/// Scores individuals by dispatching backtests, caching every outcome for the run.
///
/// The cache is keyed by the canonical form of the parameters and holds penalties too, so a
/// failed individual is never retried within a run.
pub struct FitnessEvaluator {
    dispatcher: Arc<CommandDispatcher>,
    target: EvaluationTarget,
    objective: FitnessObjective,
    cache: HashMap<String, FitnessRecord>,
    dispatched: usize,
}

impl FitnessEvaluator {
    pub fn new(
        dispatcher: Arc<CommandDispatcher>,
        target: EvaluationTarget,
        objective: FitnessObjective,
    ) -> Self {
        Self {
            dispatcher,
            target,
            objective,
            cache: HashMap::new(),
            dispatched: 0,
        }
    }

    fn backtest_args(&self, individual: &Individual) -> CommandArgs {
        let mut args = CommandArgs::new();
        args.insert("ticker".to_string(), Value::from(self.target.ticker.clone()));
        args.insert(
            "strategy".to_string(),
            Value::from(self.target.strategy.clone()),
        );
        self.target.window.write_args(&mut args);
        let params = serde_json::to_string(individual).unwrap_or_else(|_| "{}".to_string());
        args.insert("params".to_string(), Value::from(params));
        args
    }

    /// Fitness of one individual, from cache when already evaluated in this run.
    pub async fn evaluate(&mut self, individual: &Individual, context: &Value) -> FitnessRecord {
        let key = canonical_key(individual);
        if let Some(record) = self.cache.get(&key) {
            return record.clone();
        }

        self.dispatched += 1;
        let record = match self
            .dispatcher
            .dispatch(
                &self.target.command,
                self.backtest_args(individual),
                context.clone(),
            )
            .await
        {
            Ok(response) => {
                let record = FitnessRecord::from_response(&response, self.objective);
                if !record.is_success() {
                    debug!("FitnessEvaluator: {} returned non-success response", key);
                }
                record
            }
            Err(e) => {
                warn!("FitnessEvaluator: evaluation of {} failed: {}", key, e);
                FitnessRecord::penalty()
            }
        };

        self.cache.insert(key, record.clone());
        record
    }

    /// Evaluates a population strictly one at a time, yielding to the scheduler after each
    /// evaluation.
    pub async fn evaluate_all(
        &mut self,
        population: &[Individual],
        context: &Value,
    ) -> Vec<FitnessRecord> {
        let mut records = Vec::with_capacity(population.len());
        for individual in population {
            let cached = self.is_cached(individual);
            records.push(self.evaluate(individual, context).await);
            if !cached {
                tokio::task::yield_now().await;
            }
        }
        records
    }

    pub fn is_cached(&self, individual: &Individual) -> bool {
        self.cache.contains_key(&canonical_key(individual))
    }

    /// Number of dispatcher calls made so far.
    pub fn dispatch_count(&self) -> usize {
        self.dispatched
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatch::CommandRegistry;
    use crate::domain::optimization::{PENALTY_FITNESS, ParamValue};
    use crate::domain::ports::Command;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Scripted {
        calls: Arc<AtomicUsize>,
        response: Value,
        fail: bool,
    }

    #[async_trait]
    impl Command for Scripted {
        fn name(&self) -> &str {
            "backtest"
        }

        async fn invoke(&self, args: &CommandArgs) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(args.get("params").and_then(Value::as_str).is_some());
            if self.fail {
                anyhow::bail!("backtest service unavailable");
            }
            Ok(self.response.clone())
        }
    }

    fn evaluator(response: Value, fail: bool) -> (FitnessEvaluator, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = CommandRegistry::new();
        registry.register(Arc::new(Scripted {
            calls: calls.clone(),
            response,
            fail,
        }));
        let dispatcher = Arc::new(CommandDispatcher::new(registry, Duration::from_secs(5), None));
        let target = EvaluationTarget {
            command: "backtest".to_string(),
            strategy: "ma_crossover".to_string(),
            ticker: "SPY".to_string(),
            window: BacktestWindow::Period("1y".to_string()),
        };
        (
            FitnessEvaluator::new(dispatcher, target, FitnessObjective::TotalReturn),
            calls,
        )
    }

    fn params(short: i64) -> Individual {
        let mut p = Individual::new();
        p.insert("short_ma".to_string(), ParamValue::Int(short));
        p.insert("long_ma".to_string(), ParamValue::Int(100));
        p
    }

    #[tokio::test]
    async fn test_success_scenario_preserves_metrics() {
        let (mut eval, _) = evaluator(
            json!({"status": "success", "total_return_pct": 12.5, "sharpe_ratio": 1.2,
                   "trade_count": 9, "buy_hold_return_pct": 7.0}),
            false,
        );
        let record = eval.evaluate(&params(10), &Value::Null).await;
        assert_eq!(record.fitness, 12.5);
        let metrics = record.metrics.unwrap();
        assert_eq!(metrics.sharpe_ratio, Some(1.2));
        assert_eq!(metrics.trade_count, Some(9));
        assert_eq!(metrics.buy_hold_return, Some(7.0));
    }

    #[tokio::test]
    async fn test_error_scenario_is_penalized_and_cached() {
        let (mut eval, calls) = evaluator(Value::Null, true);
        let first = eval.evaluate(&params(10), &Value::Null).await;
        let second = eval.evaluate(&params(10), &Value::Null).await;

        assert_eq!(first.fitness, PENALTY_FITNESS);
        assert!(first.metrics.is_none());
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_individuals_dispatch_once() {
        let (mut eval, calls) = evaluator(
            json!({"status": "success", "total_return_pct": 1.0}),
            false,
        );
        let population = vec![params(10), params(11), params(10), params(11), params(10)];
        let records = eval.evaluate_all(&population, &Value::Null).await;

        assert_eq!(records.len(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(eval.dispatch_count(), 2);
        assert_eq!(eval.cache_len(), 2);
    }

    #[tokio::test]
    async fn test_non_success_status_is_penalized() {
        let (mut eval, _) = evaluator(json!({"status": "error", "message": "no data"}), false);
        let record = eval.evaluate(&params(10), &Value::Null).await;
        assert_eq!(record, FitnessRecord::penalty());
    }
}
