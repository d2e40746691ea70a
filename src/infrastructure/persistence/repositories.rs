mod command_log_repository;
mod convergence_repository;

pub use command_log_repository::SqliteCommandLogRepository;
pub use convergence_repository::SqliteConvergenceRepository;
