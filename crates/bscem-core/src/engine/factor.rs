//! Factors: scoring functions over fixed tuples of random variables.
//!
//! A factor never owns its variables. It stores [`VarId`]s into the arena of
//! the [`FactorGraph`](crate::engine::factor_graph::FactorGraph) it belongs to
//! and reads their values when scored.

use smallvec::SmallVec;

use crate::dist::{Dist, Distribution};
use crate::engine::channel::{bsc_likelihood, bsc_pair_likelihood};
use crate::engine::errors::ModelError;
use crate::engine::variable::{RandomVariable, VarId};

/// A unique identifier for a factor in a factor graph.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FactorId(pub u32);

impl FactorId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Inline capacity for a factor's variable tuple.
const INLINE_ARITY: usize = 4;

/// The ordered variable tuple of a factor.
pub type Adjacent = SmallVec<[VarId; INLINE_ARITY]>;

/// A factor backed by a distribution.
///
/// The first `num_vars` adjacent variables are scored as values, the
/// remaining `num_params` supply the distribution's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DistFactor {
    dist: Distribution,
    adjacent: Adjacent,
}

impl DistFactor {
    /// Binds a distribution to a variable tuple, checking the arity.
    pub fn new(
        dist: impl Into<Distribution>,
        adjacent: impl IntoIterator<Item = VarId>,
    ) -> Result<Self, ModelError> {
        let dist = dist.into();
        let adjacent: Adjacent = adjacent.into_iter().collect();
        if adjacent.len() != dist.num_vars() + dist.num_params() {
            return Err(ModelError::FactorArity {
                num_vars: dist.num_vars(),
                num_params: dist.num_params(),
                num_adjacent: adjacent.len(),
            });
        }
        Ok(Self { dist, adjacent })
    }

    pub fn dist(&self) -> &Distribution {
        &self.dist
    }

    pub fn adjacent(&self) -> &[VarId] {
        &self.adjacent
    }

    fn score_with(&self, value: impl Fn(VarId) -> f64) -> f64 {
        let values: SmallVec<[f64; INLINE_ARITY]> =
            self.adjacent.iter().map(|id| value(*id)).collect();
        let (vars, params) = values.split_at(self.dist.num_vars());
        self.dist.score(vars, params)
    }
}

/// An observed output of a single binary symmetric channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BscFactor {
    pub input: VarId,
    pub output: bool,
    pub noise_rate: VarId,
}

/// An observed output of a two-layer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BscPairFactor {
    pub input: VarId,
    pub output: bool,
    pub noise_rate1: VarId,
    pub noise_rate2: VarId,
}

/// A factor scoring a fixed non-negative constant.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstFactor {
    adjacent: Adjacent,
    score: f64,
}

impl ConstFactor {
    pub fn new(
        adjacent: impl IntoIterator<Item = VarId>,
        score: f64,
    ) -> Result<Self, ModelError> {
        if !score.is_finite() || score < 0.0 {
            return Err(ModelError::InvalidParameters(format!(
                "constant factor score must be finite and non-negative, got {}",
                score
            )));
        }
        Ok(Self {
            adjacent: adjacent.into_iter().collect(),
            score,
        })
    }
}

/// The closed set of factor kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Factor {
    Dist(DistFactor),
    Bsc(BscFactor),
    BscPair(BscPairFactor),
    Const(ConstFactor),
}

impl Factor {
    /// The variables this factor reads, in slot order.
    pub fn adjacent(&self) -> Adjacent {
        match self {
            Factor::Dist(f) => f.adjacent.clone(),
            Factor::Bsc(f) => smallvec::smallvec![f.input, f.noise_rate],
            Factor::BscPair(f) => smallvec::smallvec![f.input, f.noise_rate1, f.noise_rate2],
            Factor::Const(f) => f.adjacent.clone(),
        }
    }

    /// Non-negative score under the current variable values.
    pub fn score(&self, vars: &[RandomVariable]) -> f64 {
        self.score_with(vars, None)
    }

    /// Score with one variable's value replaced by `assume`.
    ///
    /// Lets the E-step evaluate hypothetical assignments without mutating
    /// the graph. Ids must index into `vars`.
    pub fn score_with(&self, vars: &[RandomVariable], assume: Option<(VarId, f64)>) -> f64 {
        let value = |id: VarId| match assume {
            Some((target, v)) if target == id => v,
            _ => vars[id.index()].value(),
        };
        match self {
            Factor::Dist(f) => f.score_with(value),
            Factor::Bsc(f) => {
                let agree = (value(f.input) != 0.0) == f.output;
                bsc_likelihood(value(f.noise_rate), agree)
            }
            Factor::BscPair(f) => {
                let agree = (value(f.input) != 0.0) == f.output;
                bsc_pair_likelihood(value(f.noise_rate1), value(f.noise_rate2), agree)
            }
            Factor::Const(f) => f.score,
        }
    }
}

impl From<DistFactor> for Factor {
    fn from(f: DistFactor) -> Self {
        Factor::Dist(f)
    }
}

impl From<BscFactor> for Factor {
    fn from(f: BscFactor) -> Self {
        Factor::Bsc(f)
    }
}

impl From<BscPairFactor> for Factor {
    fn from(f: BscPairFactor) -> Self {
        Factor::BscPair(f)
    }
}

impl From<ConstFactor> for Factor {
    fn from(f: ConstFactor) -> Self {
        Factor::Const(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dist::{Bernoulli, Beta, Space};

    fn vars(values: &[(Space, f64)]) -> Vec<RandomVariable> {
        values
            .iter()
            .map(|(space, v)| {
                if space.is_discrete() {
                    RandomVariable::boolean(*v != 0.0)
                } else {
                    RandomVariable::continuous(*space, *v)
                }
            })
            .collect()
    }

    #[test]
    fn dist_factor_scores_values_against_parameter_slots() {
        let arena = vars(&[
            (Space::unit_interval(), 0.1),
            (Space::positive_reals(), 0.5),
            (Space::positive_reals(), 0.5),
        ]);
        let f = DistFactor::new(Beta::new(0.0, 0.0), [VarId(0), VarId(1), VarId(2)]).unwrap();
        let score = Factor::from(f).score(&arena);
        assert!((score - 1.061_032_953_945_969).abs() < 1e-9);
    }

    #[test]
    fn dist_factor_rejects_wrong_arity() {
        let err = DistFactor::new(Beta::new(1.0, 1.0), [VarId(0), VarId(1)]).unwrap_err();
        assert!(matches!(
            err,
            ModelError::FactorArity {
                num_vars: 1,
                num_params: 2,
                num_adjacent: 2
            }
        ));
        assert!(DistFactor::new(Bernoulli::new(0.5).unwrap(), [VarId(0), VarId(1)]).is_ok());
    }

    #[test]
    fn bsc_factor_scores_agreement() {
        let arena = vars(&[(Space::Boolean, 1.0), (Space::unit_interval(), 0.2)]);
        let agree = Factor::from(BscFactor {
            input: VarId(0),
            output: true,
            noise_rate: VarId(1),
        });
        let disagree = Factor::from(BscFactor {
            input: VarId(0),
            output: false,
            noise_rate: VarId(1),
        });
        assert!((agree.score(&arena) - 0.8).abs() < 1e-12);
        assert!((disagree.score(&arena) - 0.2).abs() < 1e-12);
        assert!((agree.score_with(&arena, Some((VarId(0), 0.0))) - 0.2).abs() < 1e-12);
        assert_eq!(agree.adjacent().as_slice(), &[VarId(0), VarId(1)]);
    }

    #[test]
    fn pair_factor_uses_xor_of_layers() {
        let arena = vars(&[
            (Space::Boolean, 0.0),
            (Space::unit_interval(), 0.1),
            (Space::unit_interval(), 0.3),
        ]);
        let f = Factor::from(BscPairFactor {
            input: VarId(0),
            output: false,
            noise_rate1: VarId(1),
            noise_rate2: VarId(2),
        });
        assert!((f.score(&arena) - (0.1 * 0.3 + 0.9 * 0.7)).abs() < 1e-12);
    }

    #[test]
    fn const_factor_ignores_values() {
        let f = Factor::from(ConstFactor::new([VarId(0)], 0.25).unwrap());
        let arena = vars(&[(Space::Boolean, 1.0)]);
        assert_eq!(f.score(&arena), 0.25);
        assert_eq!(f.score_with(&arena, Some((VarId(0), 0.0))), 0.25);
        assert!(ConstFactor::new([VarId(0)], -1.0).is_err());
    }
}
