//! Facade over the execution log and the convergence history.

use crate::domain::knowledge::{CommandLogEntry, CommandStats, ConvergenceResult};
use crate::domain::repositories::{CommandLogRepository, ConvergenceRepository};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct KnowledgeBase {
    command_log: Arc<dyn CommandLogRepository>,
    convergence: Arc<dyn ConvergenceRepository>,
}

/// Row counts of both stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnowledgeBaseStats {
    pub command_log_entries: usize,
    pub convergence_results: usize,
}

impl KnowledgeBase {
    pub fn new(
        command_log: Arc<dyn CommandLogRepository>,
        convergence: Arc<dyn ConvergenceRepository>,
    ) -> Self {
        Self {
            command_log,
            convergence,
        }
    }

    pub async fn log_execution(&self, entry: &CommandLogEntry) -> Result<()> {
        self.command_log.append(entry).await
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<CommandLogEntry>> {
        self.command_log.recent(limit).await
    }

    pub async fn by_command(&self, command: &str, limit: usize) -> Result<Vec<CommandLogEntry>> {
        self.command_log.by_command(command, limit).await
    }

    pub async fn command_stats(&self) -> Result<Vec<CommandStats>> {
        self.command_log.stats().await
    }

    /// Best profitable historical run among `conditions` for `universe`.
    pub async fn best_for_conditions(
        &self,
        conditions: &[&str],
        universe: &str,
    ) -> Result<Option<ConvergenceResult>> {
        self.convergence
            .best_for_conditions(conditions, universe)
            .await
    }

    /// Stores externally produced sweep results; returns how many were written.
    pub async fn import_convergence(&self, results: &[ConvergenceResult]) -> Result<usize> {
        for result in results {
            self.convergence.save(result).await?;
        }
        info!("KnowledgeBase: imported {} convergence results", results.len());
        Ok(results.len())
    }

    pub async fn stats(&self) -> Result<KnowledgeBaseStats> {
        Ok(KnowledgeBaseStats {
            command_log_entries: self.command_log.count().await?,
            convergence_results: self.convergence.count().await?,
        })
    }
}
