// Execution log and convergence history
pub mod knowledge;

// Market analysis domain
pub mod market;

// Analyzer state and correlation reports
pub mod monitoring;

// Optimization domain
pub mod optimization;

// Port interfaces
pub mod ports;

// Repository traits
pub mod repositories;

// Domain-specific error types
pub mod errors;
