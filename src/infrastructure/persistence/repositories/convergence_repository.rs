use crate::domain::knowledge::ConvergenceResult;
use crate::domain::repositories::ConvergenceRepository;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

pub struct SqliteConvergenceRepository {
    pool: SqlitePool,
}

impl SqliteConvergenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(&self, row: sqlx::sqlite::SqliteRow) -> Result<ConvergenceResult> {
        let params_json: String = row.try_get("best_params_json")?;
        Ok(ConvergenceResult {
            id: Some(row.try_get("id")?),
            universe: row.try_get("universe")?,
            market_condition: row.try_get("market_condition")?,
            strategy_name: row.try_get("strategy_name")?,
            best_params: serde_json::from_str(&params_json)
                .context("Failed to parse best_params_json")?,
            best_sharpe: row.try_get("best_sharpe")?,
            total_return: row.try_get("total_return")?,
            max_drawdown: row.try_get("max_drawdown")?,
            trade_count: row.try_get("trade_count")?,
            buy_hold_return: row.try_get("buy_hold_return")?,
        })
    }
}

#[async_trait]
impl ConvergenceRepository for SqliteConvergenceRepository {
    async fn save(&self, result: &ConvergenceResult) -> Result<i64> {
        let params_json =
            serde_json::to_string(&result.best_params).context("Failed to serialize params")?;

        let done = sqlx::query(
            r#"
            INSERT INTO convergence_results
            (universe, market_condition, strategy_name, best_params_json, best_sharpe,
             total_return, max_drawdown, trade_count, buy_hold_return)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&result.universe)
        .bind(&result.market_condition)
        .bind(&result.strategy_name)
        .bind(params_json)
        .bind(result.best_sharpe)
        .bind(result.total_return)
        .bind(result.max_drawdown)
        .bind(result.trade_count)
        .bind(result.buy_hold_return)
        .execute(&self.pool)
        .await
        .context("Failed to save convergence result")?;

        Ok(done.last_insert_rowid())
    }

    async fn best_for_conditions(
        &self,
        conditions: &[&str],
        universe: &str,
    ) -> Result<Option<ConvergenceResult>> {
        if conditions.is_empty() {
            return Ok(None);
        }

        let placeholders = vec!["?"; conditions.len()].join(", ");
        let sql = format!(
            "SELECT * FROM convergence_results \
             WHERE market_condition IN ({}) AND universe = ? AND total_return > 0 \
             ORDER BY total_return DESC LIMIT 1",
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for condition in conditions {
            query = query.bind(*condition);
        }
        let row = query.bind(universe).fetch_optional(&self.pool).await?;

        row.map(|r| self.map_row(r)).transpose()
    }

    async fn count(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM convergence_results")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::optimization::{Individual, ParamValue};
    use crate::infrastructure::persistence::database::Database;

    fn result(condition: &str, universe: &str, strategy: &str, ret: f64) -> ConvergenceResult {
        let mut params = Individual::new();
        params.insert("short_ma".to_string(), ParamValue::Int(12));
        ConvergenceResult {
            id: None,
            universe: universe.to_string(),
            market_condition: condition.to_string(),
            strategy_name: strategy.to_string(),
            best_params: params,
            best_sharpe: 1.0,
            total_return: ret,
            max_drawdown: -10.0,
            trade_count: 12,
            buy_hold_return: 4.0,
        }
    }

    #[tokio::test]
    async fn test_best_for_conditions_filters_and_orders() {
        let db = Database::in_memory().await.unwrap();
        let repo = SqliteConvergenceRepository::new(db.pool.clone());

        repo.save(&result("2022_Bear", "US_Large_Cap", "rsi_reversion", 14.0))
            .await
            .unwrap();
        repo.save(&result("COVID_Crash", "US_Large_Cap", "momentum_breakout", 31.0))
            .await
            .unwrap();
        // Wrong universe, higher return
        repo.save(&result("2022_Bear", "Crypto", "ma_crossover", 80.0))
            .await
            .unwrap();
        // Right condition, negative return
        repo.save(&result("2022_Bear", "US_Large_Cap", "ma_crossover", -3.0))
            .await
            .unwrap();

        let best = repo
            .best_for_conditions(&["2022_Bear", "COVID_Crash"], "US_Large_Cap")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(best.strategy_name, "momentum_breakout");
        assert_eq!(best.market_condition, "COVID_Crash");
        assert_eq!(best.best_params.get("short_ma"), Some(&ParamValue::Int(12)));

        let none = repo
            .best_for_conditions(&["2021_Bull"], "US_Large_Cap")
            .await
            .unwrap();
        assert!(none.is_none());
        assert_eq!(repo.count().await.unwrap(), 4);
    }
}
