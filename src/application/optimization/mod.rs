pub mod fitness_evaluator;
pub mod orchestrator;
pub mod population;

pub use fitness_evaluator::{EvaluationTarget, FitnessEvaluator};
pub use orchestrator::{OptimizationOrchestrator, OptimizationOutcome, OptimizationRequest};
pub use population::PopulationManager;
