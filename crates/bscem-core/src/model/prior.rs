//! Empirical-Bayes Beta prior over a set of noise rates.

use crate::dist::{Beta, Space};
use crate::engine::errors::ModelError;
use crate::engine::factor::{DistFactor, FactorId};
use crate::engine::factor_graph::FactorGraph;
use crate::engine::variable::{RandomVariable, VarId};

/// A shared Beta prior whose hyperparameters live in graph variables.
///
/// Each governed noise rate is tied to the hyperparameters by a
/// `Beta(rate | alpha, beta)` factor, so the graph score includes the prior
/// and reflects every refit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoisePrior {
    pub alpha: VarId,
    pub beta: VarId,
    /// Refit the hyperparameters by method of moments after each round.
    pub update: bool,
}

impl NoisePrior {
    /// Allocates the hyperparameter variables.
    pub fn new(
        graph: &mut FactorGraph,
        alpha: f64,
        beta: f64,
        update: bool,
    ) -> Result<Self, ModelError> {
        check_hyperparameters(alpha, beta)?;
        Ok(Self {
            alpha: graph.add_variable(RandomVariable::continuous(Space::positive_reals(), alpha)),
            beta: graph.add_variable(RandomVariable::continuous(Space::positive_reals(), beta)),
            update,
        })
    }

    /// The prior under the current hyperparameter values.
    pub fn current(&self, graph: &FactorGraph) -> Result<Beta, ModelError> {
        Ok(Beta::new(graph.value(self.alpha)?, graph.value(self.beta)?))
    }

    /// Overwrites the hyperparameters.
    pub fn set(&self, graph: &mut FactorGraph, alpha: f64, beta: f64) -> Result<(), ModelError> {
        check_hyperparameters(alpha, beta)?;
        graph.set_value(self.alpha, alpha)?;
        graph.set_value(self.beta, beta)
    }

    /// Wires a noise rate to the prior.
    pub fn attach(&self, graph: &mut FactorGraph, rate: VarId) -> Result<FactorId, ModelError> {
        let factor = DistFactor::new(Beta::new(1.0, 1.0), [rate, self.alpha, self.beta])?;
        graph.add_factor(factor)
    }

    /// Refits the hyperparameters to the current values of `rates`.
    ///
    /// Returns whether the prior changed. A refit that method of moments
    /// cannot answer (fewer than two rates, zero variance) leaves the prior
    /// as it was.
    pub fn refit(&self, graph: &mut FactorGraph, rates: &[VarId]) -> Result<bool, ModelError> {
        if !self.update {
            return Ok(false);
        }
        let values = rates
            .iter()
            .map(|id| graph.value(*id))
            .collect::<Result<Vec<_>, _>>()?;
        match Beta::maximize_by_mom(&values) {
            Ok(fit) => {
                graph.set_value(self.alpha, fit.alpha)?;
                graph.set_value(self.beta, fit.beta)?;
                Ok(true)
            }
            Err(ModelError::DegenerateMoments(_reason)) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Skipping noise prior refit over {} rate(s): {}",
                    rates.len(),
                    _reason
                );
                Ok(false)
            }
            Err(other) => Err(other),
        }
    }
}

fn check_hyperparameters(alpha: f64, beta: f64) -> Result<(), ModelError> {
    if alpha > 0.0 && beta > 0.0 && alpha.is_finite() && beta.is_finite() {
        Ok(())
    } else {
        Err(ModelError::InvalidParameters(format!(
            "Beta prior needs positive finite parameters, got alpha {} and beta {}",
            alpha, beta
        )))
    }
}
