use crate::domain::knowledge::{CommandLogEntry, CommandStats, LoggedBacktestMetrics};
use crate::domain::optimization::BacktestMetrics;
use crate::domain::repositories::CommandLogRepository;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::{Row, SqlitePool};

pub struct SqliteCommandLogRepository {
    pool: SqlitePool,
}

impl SqliteCommandLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_rows(&self, rows: Vec<sqlx::sqlite::SqliteRow>) -> Result<Vec<CommandLogEntry>> {
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let timestamp_ms: i64 = row.try_get("timestamp")?;
            let parameters_json: String = row.try_get("parameters_json")?;
            let context_json: String = row.try_get("context_json")?;
            let total_return_pct: Option<f64> = row.try_get("total_return_pct")?;
            let trade_count: Option<i64> = row.try_get("trade_count")?;
            let duration_ms: i64 = row.try_get("duration_ms")?;

            let backtest_metrics = match total_return_pct {
                Some(total_return_pct) => Some(LoggedBacktestMetrics {
                    total_return_pct,
                    metrics: BacktestMetrics {
                        sharpe_ratio: row.try_get("sharpe_ratio")?,
                        trade_count: trade_count.map(|c| c.max(0) as u64),
                        buy_hold_return: row.try_get("buy_hold_return_pct")?,
                    },
                }),
                None => None,
            };

            entries.push(CommandLogEntry {
                id: row.try_get("id")?,
                timestamp: Utc
                    .timestamp_millis_opt(timestamp_ms)
                    .single()
                    .unwrap_or_default(),
                command: row.try_get("command")?,
                parameters: serde_json::from_str(&parameters_json).unwrap_or_default(),
                context_snapshot: serde_json::from_str(&context_json).unwrap_or_default(),
                output_summary: row.try_get("output_summary")?,
                success: row.try_get("success")?,
                duration_ms: duration_ms.max(0) as u64,
                backtest_metrics,
            });
        }
        Ok(entries)
    }
}

#[async_trait]
impl CommandLogRepository for SqliteCommandLogRepository {
    async fn append(&self, entry: &CommandLogEntry) -> Result<()> {
        let metrics = entry.backtest_metrics.as_ref();
        sqlx::query(
            r#"
            INSERT INTO command_log
            (id, timestamp, command, parameters_json, context_json, output_summary, success,
             duration_ms, total_return_pct, sharpe_ratio, trade_count, buy_hold_return_pct)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(entry.timestamp.timestamp_millis())
        .bind(&entry.command)
        .bind(entry.parameters.to_string())
        .bind(entry.context_snapshot.to_string())
        .bind(&entry.output_summary)
        .bind(entry.success)
        .bind(entry.duration_ms as i64)
        .bind(metrics.map(|m| m.total_return_pct))
        .bind(metrics.and_then(|m| m.metrics.sharpe_ratio))
        .bind(metrics.and_then(|m| m.metrics.trade_count).map(|c| c as i64))
        .bind(metrics.and_then(|m| m.metrics.buy_hold_return))
        .execute(&self.pool)
        .await
        .context("Failed to append command log entry")?;

        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<CommandLogEntry>> {
        let rows = sqlx::query("SELECT * FROM command_log ORDER BY timestamp DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        self.map_rows(rows)
    }

    async fn by_command(&self, command: &str, limit: usize) -> Result<Vec<CommandLogEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM command_log WHERE command = ? ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(command)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        self.map_rows(rows)
    }

    async fn stats(&self) -> Result<Vec<CommandStats>> {
        let rows = sqlx::query(
            r#"
            SELECT command,
                   COUNT(*) AS invocations,
                   SUM(CASE WHEN success THEN 1 ELSE 0 END) AS successes,
                   AVG(duration_ms) AS mean_duration_ms
            FROM command_log
            GROUP BY command
            ORDER BY invocations DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = Vec::with_capacity(rows.len());
        for row in rows {
            let invocations: i64 = row.try_get("invocations")?;
            let successes: i64 = row.try_get("successes")?;
            stats.push(CommandStats {
                command: row.try_get("command")?,
                invocations: invocations as u64,
                successes: successes as u64,
                mean_duration_ms: row.try_get("mean_duration_ms")?,
            });
        }
        Ok(stats)
    }

    async fn count(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM command_log")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::database::Database;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_and_query() {
        let db = Database::in_memory().await.unwrap();
        let repo = SqliteCommandLogRepository::new(db.pool.clone());

        let ok = CommandLogEntry::new(
            "backtest",
            json!({"ticker": "SPY"}),
            json!({"run": "a"}),
            &json!({"status": "success", "total_return_pct": 5.5, "sharpe_ratio": 0.9}),
            true,
            40,
        );
        let failed = CommandLogEntry::new(
            "backtest",
            json!({"ticker": "QQQ"}),
            json!({}),
            &json!("timeout"),
            false,
            1000,
        );
        let other = CommandLogEntry::new("rsi", json!({}), json!({}), &json!({"rsi": 61.0}), true, 4);

        repo.append(&ok).await.unwrap();
        repo.append(&failed).await.unwrap();
        repo.append(&other).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 3);

        let backtests = repo.by_command("backtest", 10).await.unwrap();
        assert_eq!(backtests.len(), 2);
        let stored = backtests.iter().find(|e| e.id == ok.id).unwrap();
        assert_eq!(stored.parameters, json!({"ticker": "SPY"}));
        let metrics = stored.backtest_metrics.as_ref().unwrap();
        assert_eq!(metrics.total_return_pct, 5.5);
        assert_eq!(metrics.metrics.sharpe_ratio, Some(0.9));

        let stats = repo.stats().await.unwrap();
        let backtest_stats = stats.iter().find(|s| s.command == "backtest").unwrap();
        assert_eq!(backtest_stats.invocations, 2);
        assert_eq!(backtest_stats.successes, 1);
        assert!((backtest_stats.success_rate() - 0.5).abs() < 1e-9);
    }
}
