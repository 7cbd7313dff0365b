//! Binary symmetric noise channels.
//!
//! A channel takes a clean boolean input and emits a possibly flipped
//! output. Its noise rates are ordinary unit-interval variables in a
//! [`FactorGraph`], so EM can re-estimate them in place.
//!
//! - **Bsc**: flips with probability `rate`.
//! - **BscPair**: two independent layers; the output flips iff exactly one
//!   layer flips.

use rand::Rng;

use crate::dist::Space;
use crate::engine::errors::{check_probability, ModelError};
use crate::engine::factor::{BscFactor, BscPairFactor, Factor};
use crate::engine::factor_graph::FactorGraph;
use crate::engine::variable::{RandomVariable, VarId};

/// Likelihood of an observation through a single layer.
#[inline]
pub fn bsc_likelihood(rate: f64, agree: bool) -> f64 {
    if agree {
        1.0 - rate
    } else {
        rate
    }
}

/// Likelihood of an observation through two independent layers.
///
/// ```text
/// agree:    r1·r2 + (1−r1)·(1−r2)   (even number of flips)
/// disagree: (1−r1)·r2 + r1·(1−r2)   (odd number of flips)
/// ```
#[inline]
pub fn bsc_pair_likelihood(rate1: f64, rate2: f64, agree: bool) -> f64 {
    if agree {
        rate1 * rate2 + (1.0 - rate1) * (1.0 - rate2)
    } else {
        (1.0 - rate1) * rate2 + rate1 * (1.0 - rate2)
    }
}

/// A noisy boolean channel whose rates live in a factor graph.
pub trait Channel {
    /// Sends `input` through the channel and draws the output.
    fn sample<R: Rng + ?Sized>(
        &self,
        graph: &FactorGraph,
        input: bool,
        rng: &mut R,
    ) -> Result<bool, ModelError>;

    /// Sends each input through the channel independently.
    fn sample_n<R: Rng + ?Sized>(
        &self,
        graph: &FactorGraph,
        inputs: &[bool],
        rng: &mut R,
    ) -> Result<Vec<bool>, ModelError> {
        inputs
            .iter()
            .map(|input| self.sample(graph, *input, rng))
            .collect()
    }

    /// A factor scoring an observed `output` of the latent `input`.
    fn factor(&self, input: VarId, output: bool) -> Factor;

    /// One factor per observed output of the same input.
    fn factors(&self, input: VarId, outputs: &[bool]) -> Vec<Factor> {
        outputs.iter().map(|out| self.factor(input, *out)).collect()
    }
}

fn add_rate_variable(graph: &mut FactorGraph, rate: f64) -> Result<VarId, ModelError> {
    check_probability(rate)?;
    Ok(graph.add_variable(RandomVariable::continuous(
        Space::unit_interval(),
        rate,
    )))
}

/// A binary symmetric channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bsc {
    pub noise_rate: VarId,
}

impl Bsc {
    /// Allocates the noise-rate variable in `graph`.
    pub fn new(graph: &mut FactorGraph, noise_rate: f64) -> Result<Self, ModelError> {
        Ok(Self {
            noise_rate: add_rate_variable(graph, noise_rate)?,
        })
    }
}

impl Channel for Bsc {
    fn sample<R: Rng + ?Sized>(
        &self,
        graph: &FactorGraph,
        input: bool,
        rng: &mut R,
    ) -> Result<bool, ModelError> {
        let rate = graph.value(self.noise_rate)?;
        let flip = rng.gen::<f64>() < rate;
        Ok(input ^ flip)
    }

    fn factor(&self, input: VarId, output: bool) -> Factor {
        Factor::Bsc(BscFactor {
            input,
            output,
            noise_rate: self.noise_rate,
        })
    }
}

/// Two binary symmetric channels in series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BscPair {
    pub noise_rate1: VarId,
    pub noise_rate2: VarId,
}

impl BscPair {
    /// Allocates both noise-rate variables in `graph`.
    pub fn new(
        graph: &mut FactorGraph,
        noise_rate1: f64,
        noise_rate2: f64,
    ) -> Result<Self, ModelError> {
        check_probability(noise_rate2)?;
        Ok(Self {
            noise_rate1: add_rate_variable(graph, noise_rate1)?,
            noise_rate2: add_rate_variable(graph, noise_rate2)?,
        })
    }

    /// Pairs two existing rate variables, e.g. a shared per-question layer
    /// with a per-worker layer.
    pub fn from_rates(noise_rate1: VarId, noise_rate2: VarId) -> Self {
        Self {
            noise_rate1,
            noise_rate2,
        }
    }
}

impl Channel for BscPair {
    fn sample<R: Rng + ?Sized>(
        &self,
        graph: &FactorGraph,
        input: bool,
        rng: &mut R,
    ) -> Result<bool, ModelError> {
        let rate1 = graph.value(self.noise_rate1)?;
        let rate2 = graph.value(self.noise_rate2)?;
        let flip1 = rng.gen::<f64>() < rate1;
        let flip2 = rng.gen::<f64>() < rate2;
        Ok(input ^ (flip1 != flip2))
    }

    fn factor(&self, input: VarId, output: bool) -> Factor {
        Factor::BscPair(BscPairFactor {
            input,
            output,
            noise_rate1: self.noise_rate1,
            noise_rate2: self.noise_rate2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn pair_likelihoods_sum_to_one() {
        for (r1, r2) in [(0.0, 0.0), (0.1, 0.3), (0.5, 0.9), (1.0, 0.25)] {
            let total = bsc_pair_likelihood(r1, r2, true) + bsc_pair_likelihood(r1, r2, false);
            assert!((total - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn noiseless_bsc_copies_input() {
        let mut graph = FactorGraph::new();
        let ch = Bsc::new(&mut graph, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let inputs = [true, false, true, true];
        assert_eq!(ch.sample_n(&graph, &inputs, &mut rng).unwrap(), inputs);
    }

    #[test]
    fn certain_bsc_flips_input() {
        let mut graph = FactorGraph::new();
        let ch = Bsc::new(&mut graph, 1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(!ch.sample(&graph, true, &mut rng).unwrap());
        assert!(ch.sample(&graph, false, &mut rng).unwrap());
    }

    #[test]
    fn pair_with_two_certain_flips_copies_input() {
        let mut graph = FactorGraph::new();
        let ch = BscPair::new(&mut graph, 1.0, 1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(ch.sample(&graph, true, &mut rng).unwrap());
        let ch = BscPair::new(&mut graph, 1.0, 0.0).unwrap();
        assert!(!ch.sample(&graph, true, &mut rng).unwrap());
    }

    #[test]
    fn invalid_rate_is_rejected() {
        let mut graph = FactorGraph::new();
        assert!(matches!(
            Bsc::new(&mut graph, 1.5),
            Err(ModelError::InvalidProbability(_))
        ));
        assert!(BscPair::new(&mut graph, 0.5, -0.1).is_err());
        assert_eq!(graph.num_variables(), 0);
    }

    #[test]
    fn flip_frequency_tracks_rate() {
        let mut graph = FactorGraph::new();
        let ch = Bsc::new(&mut graph, 0.2).unwrap();
        let mut rng = StdRng::seed_from_u64(99);
        let outputs = ch.sample_n(&graph, &[true; 4000], &mut rng).unwrap();
        let flips = outputs.iter().filter(|o| !**o).count() as f64 / 4000.0;
        assert!((flips - 0.2).abs() < 0.03, "flip rate {}", flips);
    }

    #[test]
    fn factors_wire_input_to_rate() {
        let mut graph = FactorGraph::new();
        let item = graph.add_variable(RandomVariable::boolean(true));
        let ch = Bsc::new(&mut graph, 0.25).unwrap();
        for f in ch.factors(item, &[true, false]) {
            graph.add_factor(f).unwrap();
        }
        let expected = 0.75_f64.ln() + 0.25_f64.ln();
        assert!((graph.score() - expected).abs() < 1e-12);
    }
}
