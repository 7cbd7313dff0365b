//! The Bernoulli distribution over the boolean space.

use rand::Rng;

use crate::dist::discrete::DenseDiscrete;
use crate::dist::space::{Outcome, Space};
use crate::dist::Dist;
use crate::engine::errors::{check_param_count, check_probability, ModelError};

/// A Bernoulli distribution with `P(1) = bias`.
///
/// Backed by a [`DenseDiscrete`] mass so it also supports the mutable
/// weight operations through [`mass_mut`](Self::mass_mut).
#[derive(Debug, Clone, PartialEq)]
pub struct Bernoulli {
    mass: DenseDiscrete,
}

impl Bernoulli {
    /// Creates a Bernoulli distribution; `bias` must lie in `[0, 1]`.
    pub fn new(bias: f64) -> Result<Self, ModelError> {
        let mut dist = Self {
            mass: DenseDiscrete::new(Space::Boolean)?,
        };
        dist.set_bias(bias)?;
        Ok(dist)
    }

    /// Overwrites the bias.
    pub fn set_bias(&mut self, bias: f64) -> Result<(), ModelError> {
        check_probability(bias)?;
        self.mass.set_prob(Outcome(0), 1.0 - bias)?;
        self.mass.set_prob(Outcome(1), bias)?;
        self.mass.normalize()
    }

    /// The current bias `P(1)`. Reads the raw weight, so it is only
    /// meaningful while the mass is normalized.
    pub fn bias(&self) -> f64 {
        self.mass.weights()[1]
    }

    /// The underlying mass.
    pub fn mass(&self) -> &DenseDiscrete {
        &self.mass
    }

    /// Mutable access to the underlying mass (reset, set_weight, normalize).
    pub fn mass_mut(&mut self) -> &mut DenseDiscrete {
        &mut self.mass
    }

    /// The probability of an outcome.
    pub fn prob(&self, outcome: Outcome) -> Result<f64, ModelError> {
        self.mass.prob(outcome)
    }

    /// Draws one outcome.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Outcome, ModelError> {
        self.mass.sample(rng)
    }

    /// Draws `n` independent outcomes.
    pub fn sample_n<R: Rng + ?Sized>(
        &self,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<Outcome>, ModelError> {
        self.mass.sample_n(n, rng)
    }
}

impl Dist for Bernoulli {
    fn space(&self) -> Space {
        Space::Boolean
    }

    fn num_vars(&self) -> usize {
        1
    }

    fn num_params(&self) -> usize {
        1
    }

    fn params(&self) -> Vec<f64> {
        vec![self.bias()]
    }

    fn set_params(&mut self, vals: &[f64]) -> Result<(), ModelError> {
        check_param_count(vals, 1)?;
        self.set_bias(vals[0])
    }

    fn score(&self, vars: &[f64], params: &[f64]) -> f64 {
        let bias = params[0];
        if vars[0] == 0.0 {
            1.0 - bias
        } else {
            bias
        }
    }

    fn cdf(&self, x: f64) -> f64 {
        if x < 0.0 {
            0.0
        } else if x < 1.0 {
            1.0 - self.bias()
        } else {
            1.0
        }
    }

    fn mean(&self) -> f64 {
        self.bias()
    }

    fn mode(&self) -> Result<f64, ModelError> {
        let bias = self.bias();
        Ok(if 1.0 - bias > bias { 0.0 } else { 1.0 })
    }

    fn variance(&self) -> f64 {
        let bias = self.bias();
        bias * (1.0 - bias)
    }

    fn sample_value<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, ModelError> {
        Ok(Space::Boolean.value_of(self.sample(rng)?))
    }
}
