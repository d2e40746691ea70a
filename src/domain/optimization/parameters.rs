//! Tunable parameter domains and the values drawn from them.
//!
//! A [`ParameterSpace`] is the declaration a (command, strategy) pair exposes to the
//! optimizer. Every value produced by sampling or perturbation goes through
//! [`ParameterDefinition::snap`], which keeps numeric values on the step grid that starts
//! at `min` and never leaves `[min, max]`.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Decimal places kept when rounding float parameters onto their step grid.
const FLOAT_PRECISION: i32 = 8;

/// A single parameter value.
///
/// Untagged so that registry and memory files stay plain JSON (`5`, `0.25`, `"ema"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) => Some(v.round() as i64),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// One candidate parameter assignment. Keys are kept sorted, which is also the
/// canonical form used for caching and deduplication.
pub type Individual = BTreeMap<String, ParamValue>;

/// Canonical string form of an individual: sorted `name=value` pairs.
pub fn canonical_key(individual: &Individual) -> String {
    individual
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Domain of a single tunable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterDefinition {
    Int { min: i64, max: i64, step: i64 },
    Float { min: f64, max: f64, step: f64 },
    Enum { values: Vec<ParamValue> },
}

impl ParameterDefinition {
    pub fn int(min: i64, max: i64, step: i64) -> Self {
        ParameterDefinition::Int { min, max, step }
    }

    pub fn float(min: f64, max: f64, step: f64) -> Self {
        ParameterDefinition::Float { min, max, step }
    }

    pub fn enumeration(values: Vec<ParamValue>) -> Self {
        ParameterDefinition::Enum { values }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, ParameterDefinition::Enum { .. })
    }

    /// Number of whole steps between `min` and the largest grid point not above `max`.
    fn max_step_index(&self) -> i64 {
        match self {
            ParameterDefinition::Int { min, max, step } => {
                if *step <= 0 || max < min {
                    0
                } else {
                    (max - min) / step
                }
            }
            ParameterDefinition::Float { min, max, step } => {
                if *step <= 0.0 || max < min {
                    0
                } else {
                    ((max - min) / step + 1e-9).floor() as i64
                }
            }
            ParameterDefinition::Enum { .. } => 0,
        }
    }

    fn grid_value(&self, index: i64) -> ParamValue {
        let index = index.clamp(0, self.max_step_index());
        match self {
            ParameterDefinition::Int { min, step, .. } => {
                ParamValue::Int(min + index * (*step).max(1))
            }
            ParameterDefinition::Float { min, step, .. } => {
                ParamValue::Float(round_to(min + index as f64 * step, FLOAT_PRECISION))
            }
            ParameterDefinition::Enum { .. } => ParamValue::Int(index),
        }
    }

    /// Moves a raw numeric value onto the nearest in-bounds grid point.
    ///
    /// Enum domains return the value unchanged.
    pub fn snap(&self, raw: f64) -> ParamValue {
        match self {
            ParameterDefinition::Int { min, step, .. } => {
                let index = ((raw - *min as f64) / (*step).max(1) as f64).round() as i64;
                self.grid_value(index)
            }
            ParameterDefinition::Float { min, step, .. } => {
                if *step <= 0.0 {
                    return ParamValue::Float(round_to(*min, FLOAT_PRECISION));
                }
                let index = ((raw - min) / step).round() as i64;
                self.grid_value(index)
            }
            ParameterDefinition::Enum { .. } => ParamValue::Float(raw),
        }
    }

    /// Draws a value uniformly from the declared domain.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamValue {
        match self {
            ParameterDefinition::Int { .. } => {
                let index = rng.random_range(0..=self.max_step_index());
                self.grid_value(index)
            }
            ParameterDefinition::Float { min, max, .. } => {
                let raw = if max > min {
                    rng.random_range(*min..=*max)
                } else {
                    *min
                };
                self.snap(raw)
            }
            ParameterDefinition::Enum { values } => values
                .choose(rng)
                .cloned()
                .unwrap_or(ParamValue::Text(String::new())),
        }
    }

    /// True when `value` is inside the domain and, for numeric domains, on the step grid.
    pub fn contains(&self, value: &ParamValue) -> bool {
        match self {
            ParameterDefinition::Int { min, max, step } => match value {
                ParamValue::Int(v) => v >= min && v <= max && (v - min) % (*step).max(1) == 0,
                _ => false,
            },
            ParameterDefinition::Float { min, max, step } => match value.as_f64() {
                Some(v) => {
                    if v < *min - 1e-9 || v > *max + 1e-9 {
                        return false;
                    }
                    if *step <= 0.0 {
                        return true;
                    }
                    let steps = (v - min) / step;
                    (steps - steps.round()).abs() < 1e-6
                }
                None => false,
            },
            ParameterDefinition::Enum { values } => values.contains(value),
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// The declared parameters for one (command, strategy) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSpace {
    definitions: BTreeMap<String, ParameterDefinition>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, definition: ParameterDefinition) -> Self {
        self.definitions.insert(name.to_string(), definition);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParameterDefinition> {
        self.definitions.get(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Parameter names in canonical (sorted) order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.definitions.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterDefinition)> {
        self.definitions.iter()
    }

    /// True when the individual declares exactly this space's parameter names.
    pub fn matches_keys(&self, individual: &Individual) -> bool {
        individual.len() == self.definitions.len()
            && self.definitions.keys().all(|k| individual.contains_key(k))
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Individual {
        self.definitions
            .iter()
            .map(|(name, def)| (name.clone(), def.sample(rng)))
            .collect()
    }
}
