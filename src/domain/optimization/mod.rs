pub mod fitness;
pub mod memory_seed;
pub mod parameters;
pub mod status;
pub mod window;

pub use fitness::{BacktestMetrics, FitnessObjective, FitnessRecord, PENALTY_FITNESS};
pub use memory_seed::{MAX_SEEDS_PER_KEY, MemorySeed, memory_key};
pub use parameters::{Individual, ParamValue, ParameterDefinition, ParameterSpace, canonical_key};
pub use status::{OptimizationStatus, RunStatus};
pub use window::BacktestWindow;
