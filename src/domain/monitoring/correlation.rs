use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution};
use std::collections::BTreeMap;

pub const DEFAULT_INTERVAL_HOURS: f64 = 6.0;

/// Longest accepted analyzer interval (30 days).
pub const MAX_INTERVAL_HOURS: f64 = 720.0;

/// Absolute correlation above which a command pair is reported.
pub const STRONG_CORRELATION_THRESHOLD: f64 = 0.5;

/// Minimum tickers with a complete row before correlations are computed.
pub const MIN_COMPLETE_ROWS: usize = 5;

/// Externally tunable analyzer settings, re-read every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerState {
    #[serde(default)]
    pub active: bool,
    #[serde(default = "default_interval_hours")]
    pub interval_hours: f64,
    #[serde(default)]
    pub last_cycle_at: Option<DateTime<Utc>>,
}

fn default_interval_hours() -> f64 {
    DEFAULT_INTERVAL_HOURS
}

impl Default for AnalyzerState {
    fn default() -> Self {
        Self {
            active: false,
            interval_hours: DEFAULT_INTERVAL_HOURS,
            last_cycle_at: None,
        }
    }
}

impl AnalyzerState {
    /// Interval with non-positive or non-finite values replaced by the default, capped at
    /// [`MAX_INTERVAL_HOURS`].
    pub fn effective_interval_hours(&self) -> f64 {
        if self.interval_hours.is_finite() && self.interval_hours > 0.0 {
            self.interval_hours.min(MAX_INTERVAL_HOURS)
        } else {
            DEFAULT_INTERVAL_HOURS
        }
    }

    pub fn is_valid_interval(hours: f64) -> bool {
        hours.is_finite() && hours > 0.0 && hours <= MAX_INTERVAL_HOURS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrongPair {
    pub a: String,
    pub b: String,
    pub r: f64,
}

/// Latest analyzer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub generated_at: DateTime<Utc>,
    /// Tickers with a complete row, i.e. the ones the matrix was computed from.
    pub tickers: Vec<String>,
    pub commands: Vec<String>,
    /// `matrix[i][j]` correlates `commands[i]` with `commands[j]`.
    pub matrix: Vec<Vec<f64>>,
    pub strong_pairs: Vec<StrongPair>,
}

impl CorrelationReport {
    /// Builds a report from a ticker × command table.
    ///
    /// Returns `None` when fewer than [`MIN_COMPLETE_ROWS`] tickers have a value for every
    /// command.
    pub fn from_table(
        commands: &[String],
        table: &BTreeMap<String, BTreeMap<String, f64>>,
    ) -> Option<Self> {
        let complete: Vec<(&String, &BTreeMap<String, f64>)> = table
            .iter()
            .filter(|(_, row)| commands.iter().all(|c| row.contains_key(c)))
            .collect();

        if complete.len() < MIN_COMPLETE_ROWS || commands.len() < 2 {
            return None;
        }

        let columns: Vec<Vec<f64>> = commands
            .iter()
            .map(|c| complete.iter().map(|(_, row)| row[c]).collect())
            .collect();

        let n = commands.len();
        let mut matrix = vec![vec![0.0; n]; n];
        let mut strong_pairs = Vec::new();
        for i in 0..n {
            matrix[i][i] = 1.0;
            for j in (i + 1)..n {
                let r = pearson_correlation(&columns[i], &columns[j]);
                matrix[i][j] = r;
                matrix[j][i] = r;
                if r.abs() > STRONG_CORRELATION_THRESHOLD {
                    strong_pairs.push(StrongPair {
                        a: commands[i].clone(),
                        b: commands[j].clone(),
                        r,
                    });
                }
            }
        }

        Some(Self {
            generated_at: Utc::now(),
            tickers: complete.iter().map(|(t, _)| (*t).clone()).collect(),
            commands: commands.to_vec(),
            matrix,
            strong_pairs,
        })
    }
}

/// Pearson correlation over the common prefix of two series. Degenerate inputs yield 0.
pub fn pearson_correlation(v1: &[f64], v2: &[f64]) -> f64 {
    let len = v1.len().min(v2.len());
    if len < 2 {
        return 0.0;
    }

    let v1 = &v1[..len];
    let v2 = &v2[..len];

    let (Some(mean1), Some(mean2)) = (Data::new(v1.to_vec()).mean(), Data::new(v2.to_vec()).mean())
    else {
        return 0.0;
    };

    let mut numer = 0.0;
    let mut denom1 = 0.0;
    let mut denom2 = 0.0;

    for (a, b) in v1.iter().zip(v2) {
        let diff1 = a - mean1;
        let diff2 = b - mean2;
        numer += diff1 * diff2;
        denom1 += diff1 * diff1;
        denom2 += diff2 * diff2;
    }

    if denom1 == 0.0 || denom2 == 0.0 {
        return 0.0;
    }

    numer / (denom1.sqrt() * denom2.sqrt())
}
