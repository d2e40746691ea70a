use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Shared handle to the knowledge base database
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Ensure the directory exists if it's a file path
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let in_memory = db_url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
        }

        // Every pooled connection to `:memory:` would see its own empty database
        let max_connections = if in_memory { 1 } else { 5 };

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// In-memory database, used by tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        Self::new("sqlite::memory:").await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        // 1. Command Execution Log (append-only)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS command_log (
                id TEXT PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                command TEXT NOT NULL,
                parameters_json TEXT NOT NULL,
                context_json TEXT NOT NULL,
                output_summary TEXT NOT NULL,
                success BOOLEAN NOT NULL,
                duration_ms INTEGER NOT NULL,
                total_return_pct REAL,
                sharpe_ratio REAL,
                trade_count INTEGER,
                buy_hold_return_pct REAL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create command_log table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_command_log_command_time
            ON command_log (command, timestamp);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create command_log index")?;

        // 2. Convergence Results (historical sweep winners)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS convergence_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                universe TEXT NOT NULL,
                market_condition TEXT NOT NULL,
                strategy_name TEXT NOT NULL,
                best_params_json TEXT NOT NULL,
                best_sharpe REAL NOT NULL,
                total_return REAL NOT NULL,
                max_drawdown REAL NOT NULL,
                trade_count INTEGER NOT NULL,
                buy_hold_return REAL NOT NULL,
                created_at INTEGER DEFAULT (strftime('%s', 'now'))
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create convergence_results table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_convergence_condition_universe
            ON convergence_results (market_condition, universe, total_return);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create convergence index")?;

        info!("Database schema initialized.");
        Ok(())
    }
}
