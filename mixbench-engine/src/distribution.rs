//! Converts a target operation mix into a concrete assignment sequence.
//!
//! The four weights are normalized into probabilities and validated once. A
//! [`MixedDistribution`] then eagerly generates an [`AssignmentSequence`] of exactly the requested
//! length, so that the realized counts are fixed for a given seed before any worker starts.

use mixbench_types::OperationKind;
use rand::SeedableRng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sequence::AssignmentSequence;

/// Relative weights of the four operation kinds.
///
/// Weights are percentage-like but do not need to sum to 100.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Weights {
    /// Weight of `GET` operations.
    pub get: f64,
    /// Weight of `STAT` operations.
    pub stat: f64,
    /// Weight of `PUT` operations.
    pub put: f64,
    /// Weight of `DELETE` operations.
    pub delete: f64,
}

impl Weights {
    /// Returns the weight of the given kind.
    pub fn weight(&self, kind: OperationKind) -> f64 {
        match kind {
            OperationKind::Get => self.get,
            OperationKind::Stat => self.stat,
            OperationKind::Put => self.put,
            OperationKind::Delete => self.delete,
        }
    }

    /// Validates the weights and returns the normalized probabilities in canonical kind order.
    ///
    /// A mix may not delete objects faster than it creates them, otherwise the working set is
    /// guaranteed to run dry during the run.
    pub fn probabilities(&self) -> Result<[f64; 4], ConfigError> {
        for kind in OperationKind::ALL {
            let weight = self.weight(kind);
            if !weight.is_finite() {
                return Err(ConfigError::NonFiniteWeight { kind });
            }
            if weight < 0.0 {
                return Err(ConfigError::NegativeWeight { kind, weight });
            }
        }

        let sum: f64 = OperationKind::ALL.iter().map(|k| self.weight(*k)).sum();
        if sum <= 0.0 {
            return Err(ConfigError::ZeroWeights);
        }

        if self.delete > self.put {
            return Err(ConfigError::DeleteExceedsPut {
                put: self.put,
                delete: self.delete,
            });
        }

        Ok(OperationKind::ALL.map(|kind| self.weight(kind) / sum))
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            get: 45.0,
            stat: 30.0,
            put: 15.0,
            delete: 10.0,
        }
    }
}

/// How slots are filled from the probabilities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sampling {
    /// Every slot is drawn independently from a [`WeightedIndex`] over the probabilities.
    ///
    /// Realized frequencies converge to the probabilities as the slot count grows.
    #[default]
    Sampled,
    /// Per-kind quotas are computed with the largest-remainder method, then shuffled.
    ///
    /// Realized counts differ from `probability * total` by less than one slot. Remaining slots
    /// go to the kinds with the largest fractional parts, ties in canonical kind order.
    Exact,
}

/// A validated operation mix that generates assignment sequences.
#[derive(Clone, Debug)]
pub struct MixedDistribution {
    weights: Weights,
    sampling: Sampling,
    seed: u64,
}

impl MixedDistribution {
    /// Creates a distribution with a random seed.
    pub fn new(weights: Weights) -> Self {
        Self {
            weights,
            sampling: Sampling::default(),
            seed: rand::random(),
        }
    }

    /// Uses a fixed seed, making generated sequences reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Selects how slots are filled.
    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// The configured weights.
    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// The seed used for generation.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Checks that the distribution is schedulable without generating anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.probabilities().map(|_| ())
    }

    /// The normalized probabilities in canonical kind order.
    pub fn probabilities(&self) -> Result<[f64; 4], ConfigError> {
        self.weights.probabilities()
    }

    /// Generates a sequence of exactly `total` operation kinds.
    ///
    /// Generating twice with the same seed, weights and total yields identical sequences.
    pub fn generate(&self, total: usize) -> Result<AssignmentSequence, ConfigError> {
        let probabilities = self.weights.probabilities()?;
        if total == 0 {
            return Err(ConfigError::NoSlots);
        }

        let mut rng = SmallRng::seed_from_u64(self.seed);
        let ops = match self.sampling {
            Sampling::Sampled => sample_slots(&probabilities, total, &mut rng)?,
            Sampling::Exact => {
                let mut ops = Vec::with_capacity(total);
                for (kind, count) in OperationKind::ALL.into_iter().zip(quotas(&probabilities, total))
                {
                    ops.extend(std::iter::repeat_n(kind, count));
                }
                ops.shuffle(&mut rng);
                ops
            }
        };

        let sequence = AssignmentSequence::new(ops);
        tracing::debug!(
            seed = self.seed,
            sampling = ?self.sampling,
            counts = ?sequence.counts(),
            "generated assignment sequence"
        );

        Ok(sequence)
    }
}

/// Draws every slot independently from the weighted distribution.
fn sample_slots(
    probabilities: &[f64; 4],
    total: usize,
    rng: &mut SmallRng,
) -> Result<Vec<OperationKind>, ConfigError> {
    let chooser = WeightedIndex::new(probabilities).map_err(|_| ConfigError::ZeroWeights)?;

    Ok((0..total)
        .map(|_| OperationKind::ALL[chooser.sample(rng)])
        .collect())
}

/// Splits `total` slots according to `probabilities` using the largest-remainder method.
fn quotas(probabilities: &[f64; 4], total: usize) -> [usize; 4] {
    let exact = probabilities.map(|p| p * total as f64);
    let mut counts = exact.map(|q| q.floor() as usize);

    let assigned: usize = counts.iter().sum();
    let mut order = [0, 1, 2, 3];
    // Stable sort keeps the canonical kind order for equal remainders.
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra)
    });

    for &index in order.iter().take(total.saturating_sub(assigned)) {
        counts[index] += 1;
    }

    counts
}
