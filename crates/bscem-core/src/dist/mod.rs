//! Sample spaces, parametric distributions and sample statistics.
//!
//! Distributions form a closed set ([`Distribution`]) over the kinds the
//! truth models need. Each kind also implements [`Dist`] on its own so the
//! concrete types can be used directly.

pub mod bernoulli;
pub mod beta;
pub mod discrete;
pub mod normal;
pub mod space;
pub mod stats;

use rand::Rng;

use crate::engine::errors::ModelError;

pub use bernoulli::Bernoulli;
pub use beta::Beta;
pub use discrete::DenseDiscrete;
pub use normal::Normal;
pub use space::{Outcome, Space};

/// Capabilities shared by every parametric distribution.
pub trait Dist {
    /// The space the distribution is defined on.
    fn space(&self) -> Space;

    /// Number of random variables a score call expects.
    fn num_vars(&self) -> usize;

    /// Number of parameters a score call expects.
    fn num_params(&self) -> usize;

    /// Current parameter vector.
    fn params(&self) -> Vec<f64>;

    /// Overwrites the parameters in place. Rejects vectors of the wrong arity.
    fn set_params(&mut self, vals: &[f64]) -> Result<(), ModelError>;

    /// Density (or mass) of `vars` under `params`, independent of the
    /// distribution's own parameters. Callers guarantee the arities.
    fn score(&self, vars: &[f64], params: &[f64]) -> f64;

    fn cdf(&self, x: f64) -> f64;

    fn mean(&self) -> f64;

    fn mode(&self) -> Result<f64, ModelError>;

    fn variance(&self) -> f64;

    /// Draws one value.
    fn sample_value<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, ModelError>;

    /// Draws `n` independent values.
    fn sample_n<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<f64>, ModelError> {
        (0..n).map(|_| self.sample_value(rng)).collect()
    }

    /// Probability mass in `(from, to]`.
    fn prob_interval(&self, from: f64, to: f64) -> f64 {
        self.cdf(to) - self.cdf(from)
    }
}

/// The closed set of distribution kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    Bernoulli(Bernoulli),
    Beta(Beta),
    Normal(Normal),
}

impl Distribution {
    /// Whether draws are discrete outcomes.
    pub fn is_discrete(&self) -> bool {
        self.space().is_discrete()
    }

    /// Draws a discrete outcome. Continuous kinds are rejected.
    pub fn sample_outcome<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Outcome, ModelError> {
        match self {
            Distribution::Bernoulli(d) => d.sample(rng),
            other => Err(ModelError::InvalidParameters(format!(
                "cannot draw a discrete outcome from {:?}",
                other
            ))),
        }
    }
}

impl From<Bernoulli> for Distribution {
    fn from(d: Bernoulli) -> Self {
        Distribution::Bernoulli(d)
    }
}

impl From<Beta> for Distribution {
    fn from(d: Beta) -> Self {
        Distribution::Beta(d)
    }
}

impl From<Normal> for Distribution {
    fn from(d: Normal) -> Self {
        Distribution::Normal(d)
    }
}

macro_rules! dispatch {
    ($self:expr, $d:ident => $body:expr) => {
        match $self {
            Distribution::Bernoulli($d) => $body,
            Distribution::Beta($d) => $body,
            Distribution::Normal($d) => $body,
        }
    };
}

impl Dist for Distribution {
    fn space(&self) -> Space {
        dispatch!(self, d => d.space())
    }

    fn num_vars(&self) -> usize {
        dispatch!(self, d => d.num_vars())
    }

    fn num_params(&self) -> usize {
        dispatch!(self, d => d.num_params())
    }

    fn params(&self) -> Vec<f64> {
        dispatch!(self, d => d.params())
    }

    fn set_params(&mut self, vals: &[f64]) -> Result<(), ModelError> {
        dispatch!(self, d => d.set_params(vals))
    }

    fn score(&self, vars: &[f64], params: &[f64]) -> f64 {
        dispatch!(self, d => d.score(vars, params))
    }

    fn cdf(&self, x: f64) -> f64 {
        dispatch!(self, d => d.cdf(x))
    }

    fn mean(&self) -> f64 {
        dispatch!(self, d => d.mean())
    }

    fn mode(&self) -> Result<f64, ModelError> {
        dispatch!(self, d => d.mode())
    }

    fn variance(&self) -> f64 {
        dispatch!(self, d => d.variance())
    }

    fn sample_value<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, ModelError> {
        dispatch!(self, d => d.sample_value(rng))
    }
}
