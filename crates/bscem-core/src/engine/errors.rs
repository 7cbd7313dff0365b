//! Error types for bscem models and inference.

use thiserror::Error;

use crate::engine::factor::FactorId;
use crate::engine::variable::VarId;

/// Errors that can occur while building or training a model.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking changes.
///
/// Three families of failure are distinguished:
///
/// - **Configuration**: invalid probabilities, parameter vectors of the wrong
///   arity, factors whose variable tuple does not fit their distribution.
///   These abort model construction or training.
/// - **Numerical**: zero probability mass, undefined moment estimates. Inside
///   EM these are clamped rather than reported; they only surface from the
///   distribution primitives themselves.
/// - **Domain**: outcomes outside a space, variables or channels that were
///   never added. These indicate a wiring bug in the caller.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ModelError {
    /// A probability outside `[0, 1]` (or NaN).
    #[error("invalid probability {0}")]
    InvalidProbability(f64),

    /// A parameter vector of the wrong length was passed to `set_params`.
    #[error("expected {expected} parameter(s), got {got}")]
    ParamCount { expected: usize, got: usize },

    /// A distribution-backed factor whose adjacency does not match the
    /// distribution's variable and parameter counts.
    #[error(
        "factor expected {num_vars} variable(s) and {num_params} parameter(s), but has {num_adjacent} adjacent"
    )]
    FactorArity {
        num_vars: usize,
        num_params: usize,
        num_adjacent: usize,
    },

    /// Distribution parameters that make the requested quantity undefined.
    #[error("invalid distribution parameters: {0}")]
    InvalidParameters(String),

    /// Invalid configuration values (EM budget, Gibbs schedule, ...).
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Probability requested from a distribution that was not normalized.
    #[error("the distribution was not normalized properly")]
    NotNormalized,

    /// Normalization attempted with zero total mass.
    #[error("the distribution has zero total probability")]
    ZeroProbability,

    /// Method-of-moments estimate is undefined for the given samples.
    #[error("degenerate moments: {0}")]
    DegenerateMoments(String),

    /// Numerical stability error (NaN/Inf where a finite value is required).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// An outcome index outside the sample space.
    #[error("outcome {outcome} not in the sample space of size {size}")]
    OutcomeNotInDomain { outcome: u32, size: usize },

    /// A variable id that does not belong to the factor graph.
    #[error("random variable {0:?} not in factor graph")]
    UnknownVariable(VarId),

    /// A factor id that does not belong to the factor graph.
    #[error("factor {0:?} not in factor graph")]
    UnknownFactor(FactorId),

    /// An observation referenced a channel that was never added.
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    /// A discrete-only operation was applied to a continuous variable.
    #[error("random variable {0:?} is not discrete")]
    NotDiscrete(VarId),

    /// Both degree sequences of a requested random graph are empty.
    #[error("total node degree is zero")]
    ZeroDegree,

    /// Left and right degree sequences have different totals.
    #[error("total left degree {left} != total right degree {right}")]
    DegreeMismatch { left: usize, right: usize },

    /// The sequential graph sampler got stuck on every attempt.
    #[error("could not find a random graph of the given degree after {attempts} attempt(s)")]
    NoRandomGraph { attempts: usize },
}

/// Checks that `p` is a valid probability.
pub(crate) fn check_probability(p: f64) -> Result<f64, ModelError> {
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(ModelError::InvalidProbability(p))
    }
}

/// Checks that a parameter vector has the expected arity.
pub(crate) fn check_param_count(vals: &[f64], expected: usize) -> Result<(), ModelError> {
    if vals.len() == expected {
        Ok(())
    } else {
        Err(ModelError::ParamCount {
            expected,
            got: vals.len(),
        })
    }
}
