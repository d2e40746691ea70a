//! Repository Pattern Abstractions
//!
//! Storage-facing traits of the knowledge base. The SQLite implementations live in
//! `infrastructure::persistence::repositories`.

use crate::domain::knowledge::{CommandLogEntry, CommandStats, ConvergenceResult};
use anyhow::Result;
use async_trait::async_trait;

/// Append-only log of command executions
#[async_trait]
pub trait CommandLogRepository: Send + Sync {
    /// Append an entry. Entries are never updated or deleted.
    async fn append(&self, entry: &CommandLogEntry) -> Result<()>;

    /// Most recent entries, newest first
    async fn recent(&self, limit: usize) -> Result<Vec<CommandLogEntry>>;

    /// Most recent entries for one command, newest first
    async fn by_command(&self, command: &str, limit: usize) -> Result<Vec<CommandLogEntry>>;

    /// Per-command invocation statistics
    async fn stats(&self) -> Result<Vec<CommandStats>>;

    async fn count(&self) -> Result<usize>;
}

/// Historical convergence-sweep results
#[async_trait]
pub trait ConvergenceRepository: Send + Sync {
    async fn save(&self, result: &ConvergenceResult) -> Result<i64>;

    /// Highest-return row with positive return among `conditions` for `universe`
    async fn best_for_conditions(
        &self,
        conditions: &[&str],
        universe: &str,
    ) -> Result<Option<ConvergenceResult>>;

    async fn count(&self) -> Result<usize>;
}
