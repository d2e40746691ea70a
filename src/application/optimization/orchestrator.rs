//! Generational optimization loop.
//!
//! One run: resolve the parameter space, seed generation zero from memory, then evaluate,
//! rank, select, recombine and mutate for a fixed number of generations. The best result
//! only ever improves, and is written back to memory when the run finishes.

use super::fitness_evaluator::{EvaluationTarget, FitnessEvaluator};
use super::population::PopulationManager;
use crate::application::dispatch::CommandDispatcher;
use crate::domain::optimization::{
    BacktestMetrics, BacktestWindow, FitnessObjective, FitnessRecord, Individual,
    OptimizationStatus, PENALTY_FITNESS, RunStatus,
};
use crate::domain::ports::StatusSink;
use crate::infrastructure::memory_store::MemoryStore;
use crate::infrastructure::parameter_registry::ParameterRegistry;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationRequest {
    pub command: String,
    pub strategy: String,
    pub ticker: String,
    pub window: BacktestWindow,
    /// Extra seeds on top of those recalled from memory.
    pub seeds: Vec<Individual>,
    pub generations: usize,
    pub population_size: usize,
    pub num_parents: usize,
    pub mutation_rate: f64,
    /// Memory key suffix overriding the window's own label, for rolling windows whose
    /// dates change between runs.
    pub memory_label: Option<String>,
}

impl OptimizationRequest {
    /// Backtest request with the default GA settings (10 generations of 20, 5 parents, 10%).
    pub fn backtest(strategy: &str, ticker: &str, window: BacktestWindow) -> Self {
        Self {
            command: "backtest".to_string(),
            strategy: strategy.to_string(),
            ticker: ticker.to_uppercase(),
            window,
            seeds: Vec::new(),
            generations: 10,
            population_size: 20,
            num_parents: 5,
            mutation_rate: 0.1,
            memory_label: None,
        }
    }

    pub fn memory_label(&self) -> String {
        self.memory_label
            .clone()
            .unwrap_or_else(|| self.window.memory_label())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OptimizationOutcome {
    pub best_params: Option<Individual>,
    pub best_fitness: f64,
    pub best_metrics: Option<BacktestMetrics>,
    /// Running best after each generation.
    pub best_per_generation: Vec<f64>,
    pub evaluations: usize,
}

impl OptimizationOutcome {
    pub fn is_success(&self) -> bool {
        self.best_params.is_some()
    }
}

struct Best {
    params: Individual,
    fitness: f64,
    metrics: BacktestMetrics,
}

pub struct OptimizationOrchestrator {
    registry: Arc<ParameterRegistry>,
    dispatcher: Arc<CommandDispatcher>,
    memory: Arc<MemoryStore>,
    status_sink: Option<Arc<dyn StatusSink>>,
    objective: FitnessObjective,
    rng_seed: Option<u64>,
}

impl OptimizationOrchestrator {
    pub fn new(
        registry: Arc<ParameterRegistry>,
        dispatcher: Arc<CommandDispatcher>,
        memory: Arc<MemoryStore>,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            memory,
            status_sink: None,
            objective: FitnessObjective::default(),
            rng_seed: None,
        }
    }

    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status_sink = Some(sink);
        self
    }

    pub fn with_objective(mut self, objective: FitnessObjective) -> Self {
        self.objective = objective;
        self
    }

    /// Fixes the random stream for reproducible runs.
    pub fn with_rng_seed(mut self, seed: Option<u64>) -> Self {
        self.rng_seed = seed;
        self
    }

    /// Runs one optimization. Never fails: every error is logged and the best result found
    /// so far (possibly none) is returned.
    pub async fn run(&self, request: OptimizationRequest) -> OptimizationOutcome {
        let Some(space) = self
            .registry
            .get(&request.command, &request.strategy)
            .cloned()
        else {
            warn!(
                "Orchestrator: no parameter space for {}/{}, skipping run",
                request.command, request.strategy
            );
            return OptimizationOutcome::default();
        };

        let population_size = request.population_size.max(1);
        let generations = request.generations.max(1);
        let num_parents = request.num_parents.clamp(1, population_size);
        let run_id = uuid::Uuid::new_v4().to_string();
        let memory_label = request.memory_label();

        let remembered = self
            .memory
            .load_seeds(&request.strategy, &request.ticker, Some(&memory_label))
            .await;
        let previous_best_return = remembered.first().map(|s| s.fitness);
        let mut seeds: Vec<Individual> = remembered.into_iter().map(|s| s.params).collect();
        seeds.extend(request.seeds.iter().cloned());

        info!(
            "Orchestrator: run {} {} {} on {} ({} gens x {}, {} seeds)",
            run_id,
            request.strategy,
            request.ticker,
            request.window,
            generations,
            population_size,
            seeds.len()
        );

        let mut manager = PopulationManager::new(self.rng_seed);
        let mut population = manager.generate_initial(&space, population_size, &seeds);

        let mut evaluator = FitnessEvaluator::new(
            self.dispatcher.clone(),
            EvaluationTarget {
                command: request.command.clone(),
                strategy: request.strategy.clone(),
                ticker: request.ticker.clone(),
                window: request.window.clone(),
            },
            self.objective,
        );

        let mut best: Option<Best> = None;
        let mut best_per_generation = Vec::with_capacity(generations);

        for generation in 1..=generations {
            let context = json!({
                "run_id": run_id,
                "strategy": request.strategy,
                "ticker": request.ticker,
                "generation": generation,
            });
            let records = evaluator.evaluate_all(&population, &context).await;

            let mut ranked: Vec<(Individual, FitnessRecord)> =
                population.drain(..).zip(records).collect();
            ranked.sort_by(|a, b| b.1.fitness.total_cmp(&a.1.fitness));

            if let Some((params, record)) = ranked.iter().find(|(_, r)| r.is_success()) {
                let improved = best.as_ref().is_none_or(|b| record.fitness > b.fitness);
                if improved {
                    info!(
                        "Orchestrator: generation {} new best {:.2} {:?}",
                        generation, record.fitness, params
                    );
                    best = Some(Best {
                        params: params.clone(),
                        fitness: record.fitness,
                        metrics: record.metrics.clone().unwrap_or_default(),
                    });
                    let snapshot = self.snapshot(
                        &run_id,
                        &request,
                        best.as_ref(),
                        generation,
                        generations,
                        RunStatus::Running,
                        true,
                        previous_best_return,
                    );
                    self.publish(&snapshot).await;
                }
            }

            let snapshot = self.snapshot(
                &run_id,
                &request,
                best.as_ref(),
                generation,
                generations,
                RunStatus::Running,
                false,
                previous_best_return,
            );
            self.publish(&snapshot).await;

            let running_best = best.as_ref().map(|b| b.fitness);
            best_per_generation.push(running_best.unwrap_or(PENALTY_FITNESS));
            info!(
                "Orchestrator: generation {}/{} done, best {:?}, {} dispatched",
                generation,
                generations,
                running_best,
                evaluator.dispatch_count()
            );

            if generation < generations {
                let scored: Vec<(Individual, f64)> = ranked
                    .into_iter()
                    .map(|(ind, record)| (ind, record.fitness))
                    .collect();
                let parents = PopulationManager::select_parents(&scored, num_parents);
                let mut offspring = manager.crossover(&parents, population_size - parents.len());
                manager.mutate(&mut offspring, &space, request.mutation_rate);

                population = parents;
                population.extend(offspring);
            }
        }

        let final_snapshot = self.snapshot(
            &run_id,
            &request,
            best.as_ref(),
            generations,
            generations,
            RunStatus::Completed,
            false,
            previous_best_return,
        );
        self.publish(&final_snapshot).await;

        let evaluations = evaluator.dispatch_count();
        match best {
            Some(best) => {
                if let Err(e) = self
                    .memory
                    .save(
                        &request.strategy,
                        &request.ticker,
                        best.params.clone(),
                        best.fitness,
                        Some(&memory_label),
                    )
                    .await
                {
                    warn!("Orchestrator: failed to persist best to memory: {:#}", e);
                }
                info!(
                    "Orchestrator: run {} completed, best {:.2} (previous {:?})",
                    run_id, best.fitness, previous_best_return
                );
                OptimizationOutcome {
                    best_params: Some(best.params),
                    best_fitness: best.fitness,
                    best_metrics: Some(best.metrics),
                    best_per_generation,
                    evaluations,
                }
            }
            None => {
                warn!(
                    "Orchestrator: run {} produced no successful evaluation",
                    run_id
                );
                OptimizationOutcome {
                    best_per_generation,
                    evaluations,
                    ..OptimizationOutcome::default()
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn snapshot(
        &self,
        run_id: &str,
        request: &OptimizationRequest,
        best: Option<&Best>,
        generation: usize,
        total_generations: usize,
        status: RunStatus,
        new_best: bool,
        previous_best_return: Option<f64>,
    ) -> OptimizationStatus {
        OptimizationStatus {
            run_id: run_id.to_string(),
            command: request.command.clone(),
            strategy: request.strategy.clone(),
            ticker: request.ticker.clone(),
            best_params: best.map(|b| b.params.clone()),
            best_return: best.map(|b| b.fitness),
            buy_hold_return: best.and_then(|b| b.metrics.buy_hold_return),
            sharpe_ratio: best.and_then(|b| b.metrics.sharpe_ratio),
            trade_count: best.and_then(|b| b.metrics.trade_count),
            generation,
            total_generations,
            status,
            new_best,
            previous_best_return,
            updated_at: Utc::now(),
        }
    }

    async fn publish(&self, status: &OptimizationStatus) {
        if let Some(sink) = &self.status_sink
            && let Err(e) = sink.publish(status).await
        {
            warn!("Orchestrator: failed to publish status: {:#}", e);
        }
    }
}
