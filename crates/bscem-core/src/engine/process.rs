//! Stochastic processes that generate sequences of random variables.
//!
//! A process draws fresh variables from its distribution and ties any
//! sequence of them back to its parameters through distribution-backed
//! factors. Parameters are graph variables, so a factor graph built from a
//! process sees every later parameter change.

use rand::Rng;

use crate::dist::{Bernoulli, Dist, Distribution, Space};
use crate::engine::errors::{check_probability, ModelError};
use crate::engine::factor::DistFactor;
use crate::engine::factor_graph::FactorGraph;
use crate::engine::variable::{RandomVariable, VarId};

/// A source of random variables with factors relating them to its
/// parameters.
pub trait StochasticProcess {
    /// Draws the next variable.
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<RandomVariable, ModelError>;

    /// Draws the next `n` variables.
    fn sample_n<R: Rng + ?Sized>(
        &self,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<RandomVariable>, ModelError> {
        (0..n).map(|_| self.sample(rng)).collect()
    }

    /// One factor per variable of `sequence`, each over `[var, params...]`.
    fn factors(&self, sequence: &[VarId]) -> Result<Vec<DistFactor>, ModelError>;

    /// Draws `n` variables into `graph` and wires their factors. Returns the
    /// new variable ids in draw order.
    fn add_samples<R: Rng + ?Sized>(
        &self,
        graph: &mut FactorGraph,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<VarId>, ModelError> {
        let ids: Vec<VarId> = self
            .sample_n(n, rng)?
            .into_iter()
            .map(|var| graph.add_variable(var))
            .collect();
        for factor in self.factors(&ids)? {
            graph.add_factor(factor)?;
        }
        Ok(ids)
    }
}

/// Independent draws from one distribution whose parameters are bound to
/// graph variables.
#[derive(Debug, Clone, PartialEq)]
pub struct IidProcess {
    dist: Distribution,
    params: Vec<VarId>,
}

impl IidProcess {
    /// `params` must supply exactly the distribution's parameters, in order.
    pub fn new(
        dist: impl Into<Distribution>,
        params: impl IntoIterator<Item = VarId>,
    ) -> Result<Self, ModelError> {
        let dist = dist.into();
        let params: Vec<VarId> = params.into_iter().collect();
        if params.len() != dist.num_params() {
            return Err(ModelError::ParamCount {
                expected: dist.num_params(),
                got: params.len(),
            });
        }
        Ok(Self { dist, params })
    }

    pub fn dist(&self) -> &Distribution {
        &self.dist
    }

    pub fn params(&self) -> &[VarId] {
        &self.params
    }
}

impl StochasticProcess for IidProcess {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<RandomVariable, ModelError> {
        let space = self.dist.space();
        if self.dist.is_discrete() {
            RandomVariable::discrete(space, self.dist.sample_outcome(rng)?)
        } else {
            Ok(RandomVariable::continuous(space, self.dist.sample_value(rng)?))
        }
    }

    fn factors(&self, sequence: &[VarId]) -> Result<Vec<DistFactor>, ModelError> {
        sequence
            .iter()
            .map(|var| {
                let adjacent = std::iter::once(*var).chain(self.params.iter().copied());
                DistFactor::new(self.dist.clone(), adjacent)
            })
            .collect()
    }
}

/// An endless sequence of boolean variables from one Bernoulli.
#[derive(Debug, Clone, PartialEq)]
pub struct BernoulliProcess {
    inner: IidProcess,
}

impl BernoulliProcess {
    /// Allocates the bias variable in `graph`; `bias` must lie in `[0, 1]`.
    pub fn new(graph: &mut FactorGraph, bias: f64) -> Result<Self, ModelError> {
        let dist = Bernoulli::new(bias)?;
        let bias_var = graph.add_variable(RandomVariable::continuous(Space::unit_interval(), bias));
        Ok(Self {
            inner: IidProcess::new(dist, [bias_var])?,
        })
    }

    /// The graph variable holding the bias.
    pub fn bias_var(&self) -> VarId {
        self.inner.params[0]
    }

    pub fn bias(&self) -> f64 {
        self.inner.dist.mean()
    }

    /// Moves both the bias variable and the sampling distribution, so
    /// existing factors and future draws agree.
    pub fn set_bias(&mut self, graph: &mut FactorGraph, bias: f64) -> Result<(), ModelError> {
        check_probability(bias)?;
        graph.set_value(self.bias_var(), bias)?;
        self.inner.dist.set_params(&[bias])
    }
}

impl StochasticProcess for BernoulliProcess {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<RandomVariable, ModelError> {
        self.inner.sample(rng)
    }

    fn factors(&self, sequence: &[VarId]) -> Result<Vec<DistFactor>, ModelError> {
        self.inner.factors(sequence)
    }
}
