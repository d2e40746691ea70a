// Execution log and historical sweep results
pub mod command_log;
pub mod convergence;

pub use command_log::{CommandLogEntry, CommandStats, LoggedBacktestMetrics};
pub use convergence::ConvergenceResult;
