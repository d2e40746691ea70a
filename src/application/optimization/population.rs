//! Population operators of the genetic search.
//!
//! Every numeric value produced here lies on its parameter's step grid inside `[min, max]`,
//! so the evaluator never sees an out-of-domain individual.

use crate::domain::optimization::{Individual, ParameterDefinition, ParameterSpace};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::{debug, warn};

/// Per-parameter probability of perturbing a seed during adaptive mutation.
const ADAPTIVE_PERTURB_PROBABILITY: f64 = 0.5;
/// Integer perturbations are drawn from `[-3, 3]` steps.
const ADAPTIVE_INT_STEPS: i64 = 3;
/// Float perturbations are `Normal(0, 2 * step)`.
const ADAPTIVE_FLOAT_SIGMA_STEPS: f64 = 2.0;

pub struct PopulationManager {
    rng: StdRng,
}

impl PopulationManager {
    /// Seeded for reproducible runs, or from OS entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }

    /// Builds generation zero.
    ///
    /// Seeds whose key set differs from the space are dropped. Accepted seeds take the first
    /// slots; half of the remaining slots are adaptive mutations of random seeds, the rest
    /// uniform samples.
    pub fn generate_initial(
        &mut self,
        space: &ParameterSpace,
        size: usize,
        seeds: &[Individual],
    ) -> Vec<Individual> {
        let accepted: Vec<&Individual> = seeds
            .iter()
            .filter(|seed| {
                let ok = space.matches_keys(seed);
                if !ok {
                    warn!(
                        "PopulationManager: rejecting seed with keys {:?}",
                        seed.keys().collect::<Vec<_>>()
                    );
                }
                ok
            })
            .collect();

        let mut population: Vec<Individual> =
            accepted.iter().take(size).map(|s| (*s).clone()).collect();

        let remaining = size - population.len();
        let adaptive = if accepted.is_empty() { 0 } else { remaining / 2 };

        for _ in 0..adaptive {
            if let Some(seed) = accepted.choose(&mut self.rng) {
                let child = self.adaptive_mutation(seed, space);
                population.push(child);
            }
        }
        while population.len() < size {
            population.push(space.sample(&mut self.rng));
        }

        debug!(
            "PopulationManager: initial population {} ({} seeds, {} adaptive)",
            population.len(),
            accepted.len().min(size),
            adaptive
        );
        population
    }

    /// Small perturbation of a seed around its current values.
    pub fn adaptive_mutation(&mut self, seed: &Individual, space: &ParameterSpace) -> Individual {
        let mut child = seed.clone();
        for (name, definition) in space.iter() {
            if !definition.is_numeric() || !self.rng.random_bool(ADAPTIVE_PERTURB_PROBABILITY) {
                continue;
            }
            let Some(current) = child.get(name).and_then(|v| v.as_f64()) else {
                continue;
            };

            let perturbed = match definition {
                ParameterDefinition::Int { step, .. } => {
                    let delta = self
                        .rng
                        .random_range(-ADAPTIVE_INT_STEPS..=ADAPTIVE_INT_STEPS);
                    current + (delta * (*step).max(1)) as f64
                }
                ParameterDefinition::Float { step, .. } => {
                    let sigma = ADAPTIVE_FLOAT_SIGMA_STEPS * step.abs();
                    match Normal::new(0.0, sigma) {
                        Ok(normal) => current + normal.sample(&mut self.rng),
                        Err(_) => current,
                    }
                }
                ParameterDefinition::Enum { .. } => continue,
            };

            child.insert(name.clone(), definition.snap(perturbed));
        }
        child
    }

    /// Truncation selection: the `k` fittest, fitness descending.
    pub fn select_parents(ranked: &[(Individual, f64)], k: usize) -> Vec<Individual> {
        let mut sorted: Vec<&(Individual, f64)> = ranked.iter().collect();
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
        sorted
            .into_iter()
            .take(k.min(ranked.len()))
            .map(|(ind, _)| ind.clone())
            .collect()
    }

    /// Single-point crossover over the canonical (sorted) key order.
    pub fn crossover(&mut self, parents: &[Individual], n: usize) -> Vec<Individual> {
        if parents.is_empty() {
            return Vec::new();
        }

        (0..n)
            .map(|_| {
                let (a, b) = self.pick_pair(parents.len());
                let (parent_a, parent_b) = (&parents[a], &parents[b]);

                let keys: Vec<&String> = parent_a.keys().collect();
                let cut = if keys.len() > 1 {
                    self.rng.random_range(1..keys.len())
                } else {
                    1
                };

                keys.iter()
                    .enumerate()
                    .filter_map(|(i, key)| {
                        let source = if i < cut { parent_a } else { parent_b };
                        source
                            .get(*key)
                            .or_else(|| parent_a.get(*key))
                            .map(|value| ((*key).clone(), value.clone()))
                    })
                    .collect()
            })
            .collect()
    }

    /// Two parent indices, distinct whenever at least two parents exist.
    fn pick_pair(&mut self, len: usize) -> (usize, usize) {
        if len < 2 {
            return (0, 0);
        }
        let a = self.rng.random_range(0..len);
        let mut b = self.rng.random_range(0..len - 1);
        if b >= a {
            b += 1;
        }
        (a, b)
    }

    /// Re-draws each parameter from its full domain with probability `rate`.
    pub fn mutate(&mut self, offspring: &mut [Individual], space: &ParameterSpace, rate: f64) {
        let rate = rate.clamp(0.0, 1.0);
        for individual in offspring.iter_mut() {
            for (name, definition) in space.iter() {
                if self.rng.random_bool(rate) {
                    individual.insert(name.clone(), definition.sample(&mut self.rng));
                }
            }
        }
    }
}
