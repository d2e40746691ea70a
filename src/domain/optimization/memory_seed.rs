use super::parameters::Individual;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of seeds retained per memory key.
pub const MAX_SEEDS_PER_KEY: usize = 3;

/// A parameter set carried over from a prior run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySeed {
    pub params: Individual,
    pub fitness: f64,
    pub timestamp: DateTime<Utc>,
}

impl MemorySeed {
    pub fn new(params: Individual, fitness: f64) -> Self {
        Self {
            params,
            fitness,
            timestamp: Utc::now(),
        }
    }
}

/// Builds the memory key `"{strategy_lower}_{TICKER_UPPER}[_{period_lower}]"`.
pub fn memory_key(strategy: &str, ticker: &str, period: Option<&str>) -> String {
    let base = format!("{}_{}", strategy.to_lowercase(), ticker.to_uppercase());
    match period {
        Some(p) if !p.is_empty() => format!("{}_{}", base, p.to_lowercase()),
        _ => base,
    }
}

/// Merges `incoming` into `existing`, keeping at most [`MAX_SEEDS_PER_KEY`] distinct
/// parameter sets ordered by fitness descending.
///
/// Duplicates are detected on the serialized parameter set; the better-scoring copy wins.
pub fn merge_seeds(existing: Vec<MemorySeed>, incoming: MemorySeed) -> Vec<MemorySeed> {
    let mut merged: Vec<MemorySeed> = Vec::with_capacity(existing.len() + 1);

    for seed in existing.into_iter().chain(std::iter::once(incoming)) {
        let fingerprint = serde_json::to_string(&seed.params).unwrap_or_default();
        match merged
            .iter_mut()
            .find(|s| serde_json::to_string(&s.params).unwrap_or_default() == fingerprint)
        {
            Some(current) => {
                if seed.fitness > current.fitness {
                    *current = seed;
                }
            }
            None => merged.push(seed),
        }
    }

    merged.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
    merged.truncate(MAX_SEEDS_PER_KEY);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::optimization::parameters::ParamValue;

    fn params(short: i64) -> Individual {
        let mut p = Individual::new();
        p.insert("short_ma".to_string(), ParamValue::Int(short));
        p.insert("long_ma".to_string(), ParamValue::Int(100));
        p
    }

    #[test]
    fn test_memory_key_format() {
        assert_eq!(memory_key("MA_Crossover", "spy", None), "ma_crossover_SPY");
        assert_eq!(
            memory_key("MA_Crossover", "spy", Some("1Y")),
            "ma_crossover_SPY_1y"
        );
        assert_eq!(memory_key("rsi", "qqq", Some("")), "rsi_QQQ");
    }

    #[test]
    fn test_merge_evicts_weakest() {
        let existing = vec![
            MemorySeed::new(params(10), 10.0),
            MemorySeed::new(params(8), 8.0),
            MemorySeed::new(params(6), 6.0),
        ];
        let merged = merge_seeds(existing, MemorySeed::new(params(9), 9.0));
        let fitness: Vec<f64> = merged.iter().map(|s| s.fitness).collect();
        assert_eq!(fitness, vec![10.0, 9.0, 8.0]);
    }

    #[test]
    fn test_merge_deduplicates_parameter_sets() {
        let merged = merge_seeds(vec![], MemorySeed::new(params(10), 5.0));
        let merged = merge_seeds(merged, MemorySeed::new(params(10), 5.0));
        assert_eq!(merged.len(), 1);

        let merged = merge_seeds(merged, MemorySeed::new(params(10), 7.5));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].fitness, 7.5);
    }
}
