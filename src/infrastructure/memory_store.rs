//! Persistent top-K memory of the best parameter sets per (strategy, ticker, period).
//!
//! Stored as `{key -> [{params, fitness, timestamp}, ...]}` in a single JSON document that is
//! rewritten atomically on every save.

use crate::domain::optimization::memory_seed::{MAX_SEEDS_PER_KEY, merge_seeds};
use crate::domain::optimization::{Individual, MemorySeed, memory_key};
use crate::infrastructure::artifact_store::{read_json, write_json_atomic};
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub type MemoryDocument = BTreeMap<String, Vec<MemorySeed>>;

/// Stored entries may come from older or hand-edited documents, so order is not trusted.
fn best_first(seeds: &[MemorySeed]) -> Vec<MemorySeed> {
    let mut seeds = seeds.to_vec();
    seeds.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
    seeds.truncate(MAX_SEEDS_PER_KEY);
    seeds
}

pub struct MemoryStore {
    file_path: PathBuf,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_document(&self) -> MemoryDocument {
        match read_json::<MemoryDocument>(&self.file_path).await {
            Ok(Some(doc)) => doc,
            Ok(None) => MemoryDocument::new(),
            Err(e) => {
                warn!(
                    "MemoryStore: {:?} is unreadable, treating as empty: {:#}",
                    self.file_path, e
                );
                MemoryDocument::new()
            }
        }
    }

    /// Seeds for the key, best first. A period-specific miss falls back to the
    /// period-less key.
    pub async fn load_seeds(
        &self,
        strategy: &str,
        ticker: &str,
        period: Option<&str>,
    ) -> Vec<MemorySeed> {
        let doc = self.read_document().await;

        let specific = memory_key(strategy, ticker, period);
        if let Some(seeds) = doc.get(&specific).filter(|s| !s.is_empty()) {
            return best_first(seeds);
        }

        if period.is_some() {
            let general = memory_key(strategy, ticker, None);
            if let Some(seeds) = doc.get(&general) {
                debug!("MemoryStore: {} missing, using {}", specific, general);
                return best_first(seeds);
            }
        }

        Vec::new()
    }

    /// Up to three remembered parameter sets for the key.
    pub async fn load(&self, strategy: &str, ticker: &str, period: Option<&str>) -> Vec<Individual> {
        self.load_seeds(strategy, ticker, period)
            .await
            .into_iter()
            .map(|s| s.params)
            .collect()
    }

    pub async fn save(
        &self,
        strategy: &str,
        ticker: &str,
        params: Individual,
        fitness: f64,
        period: Option<&str>,
    ) -> Result<()> {
        let key = memory_key(strategy, ticker, period);
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document().await;

        let existing = doc.remove(&key).unwrap_or_default();
        let merged = merge_seeds(existing, MemorySeed::new(params, fitness));
        let kept = merged.len();
        doc.insert(key.clone(), merged);

        write_json_atomic(&self.file_path, &doc).await?;
        info!(
            "MemoryStore: saved seed for {} (fitness {:.2}, {} kept)",
            key, fitness, kept
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::optimization::ParamValue;
    use crate::infrastructure::artifact_store::test_support::{cleanup, temp_dir};

    fn params(short: i64) -> Individual {
        let mut p = Individual::new();
        p.insert("short_ma".to_string(), ParamValue::Int(short));
        p.insert("long_ma".to_string(), ParamValue::Int(200));
        p
    }

    #[tokio::test]
    async fn test_top_three_kept_in_order() {
        let dir = temp_dir("memory_top3");
        let store = MemoryStore::new(dir.join("strategy_memory.json"));

        for (short, fitness) in [(10, 10.0), (8, 8.0), (6, 6.0)] {
            store
                .save("MA_Crossover", "spy", params(short), fitness, Some("1Y"))
                .await
                .unwrap();
        }
        store
            .save("ma_crossover", "SPY", params(9), 9.0, Some("1y"))
            .await
            .unwrap();

        let seeds = store.load_seeds("ma_crossover", "SPY", Some("1y")).await;
        let fitnesses: Vec<f64> = seeds.iter().map(|s| s.fitness).collect();
        assert_eq!(fitnesses, vec![10.0, 9.0, 8.0]);
        cleanup(dir);
    }

    #[tokio::test]
    async fn test_same_seed_saved_twice_is_one_entry() {
        let dir = temp_dir("memory_dedup");
        let store = MemoryStore::new(dir.join("strategy_memory.json"));

        store.save("ma_crossover", "SPY", params(12), 4.0, None).await.unwrap();
        store.save("ma_crossover", "SPY", params(12), 4.0, None).await.unwrap();

        assert_eq!(store.load("ma_crossover", "SPY", None).await.len(), 1);
        cleanup(dir);
    }

    #[tokio::test]
    async fn test_period_miss_falls_back_to_general_key() {
        let dir = temp_dir("memory_fallback");
        let store = MemoryStore::new(dir.join("strategy_memory.json"));

        store.save("ma_crossover", "SPY", params(20), 7.0, None).await.unwrap();

        let loaded = store.load("ma_crossover", "SPY", Some("6mo")).await;
        assert_eq!(loaded, vec![params(20)]);
        assert!(store.load("ma_crossover", "QQQ", Some("6mo")).await.is_empty());
        cleanup(dir);
    }

    #[tokio::test]
    async fn test_corrupt_store_is_empty_and_recreated() {
        let dir = temp_dir("memory_corrupt");
        let path = dir.join("strategy_memory.json");
        std::fs::write(&path, "[[[ definitely not a memory document").unwrap();
        let store = MemoryStore::new(&path);

        assert!(store.load("ma_crossover", "SPY", None).await.is_empty());
        store.save("ma_crossover", "SPY", params(15), 3.0, None).await.unwrap();
        assert_eq!(store.load("ma_crossover", "SPY", None).await.len(), 1);
        cleanup(dir);
    }

    #[tokio::test]
    async fn test_unsorted_document_loads_top_three() {
        let dir = temp_dir("memory_unsorted");
        let path = dir.join("strategy_memory.json");
        let entries: Vec<MemorySeed> = [1.0, 5.0, 3.0, 9.0, 7.0]
            .iter()
            .enumerate()
            .map(|(i, f)| MemorySeed::new(params(10 + i as i64), *f))
            .collect();
        let mut doc = MemoryDocument::new();
        doc.insert("ma_crossover_SPY".to_string(), entries);
        std::fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();

        let store = MemoryStore::new(&path);
        let seeds = store.load_seeds("ma_crossover", "SPY", None).await;
        let fitnesses: Vec<f64> = seeds.iter().map(|s| s.fitness).collect();
        assert_eq!(fitnesses, vec![9.0, 7.0, 5.0]);
        assert_eq!(seeds[0].params, params(13));
        cleanup(dir);
    }

    #[tokio::test]
    async fn test_concurrent_saves_are_not_lost() {
        let dir = temp_dir("memory_concurrent");
        let store = MemoryStore::new(dir.join("strategy_memory.json"));

        let saves = [(30, 3.0), (31, 2.0), (32, 1.0)]
            .map(|(short, fitness)| store.save("ma_crossover", "SPY", params(short), fitness, None));
        for result in futures::future::join_all(saves).await {
            result.unwrap();
        }

        let seeds = store.load_seeds("ma_crossover", "SPY", None).await;
        assert_eq!(seeds.len(), 3);
        cleanup(dir);
    }
}
