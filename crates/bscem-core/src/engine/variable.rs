//! Random variables: the mutable value cells of a factor graph.

use crate::dist::space::{Outcome, Space};
use crate::engine::errors::ModelError;

/// A unique identifier for a random variable in a factor graph.
///
/// VarId implements Ord/PartialOrd for stable, deterministic iteration.
/// Uses u32 internally for efficient storage and indexing.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VarId(pub u32);

impl VarId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A scalar cell bound to a space.
///
/// Equality is structural (same space, same value); identity within a graph
/// is the [`VarId`].
#[derive(Debug, Clone, PartialEq)]
pub enum RandomVariable {
    /// A real value in a real-like space.
    Continuous { space: Space, value: f64 },
    /// An outcome of a discrete space, with its real value cached.
    Discrete {
        space: Space,
        outcome: Outcome,
        value: f64,
    },
}

impl RandomVariable {
    /// A continuous variable. The value is not required to lie in the space.
    pub fn continuous(space: Space, value: f64) -> Self {
        RandomVariable::Continuous { space, value }
    }

    /// A discrete variable set to `outcome`.
    pub fn discrete(space: Space, outcome: Outcome) -> Result<Self, ModelError> {
        space.check_outcome(outcome)?;
        Ok(RandomVariable::Discrete {
            space,
            outcome,
            value: space.value_of(outcome),
        })
    }

    /// A variable on the boolean space.
    pub fn boolean(value: bool) -> Self {
        let outcome = Space::bool_outcome(value);
        RandomVariable::Discrete {
            space: Space::Boolean,
            outcome,
            value: Space::Boolean.value_of(outcome),
        }
    }

    pub fn space(&self) -> Space {
        match self {
            RandomVariable::Continuous { space, .. } | RandomVariable::Discrete { space, .. } => {
                *space
            }
        }
    }

    /// The current value as a real number.
    #[inline]
    pub fn value(&self) -> f64 {
        match self {
            RandomVariable::Continuous { value, .. } | RandomVariable::Discrete { value, .. } => {
                *value
            }
        }
    }

    pub fn is_discrete(&self) -> bool {
        matches!(self, RandomVariable::Discrete { .. })
    }

    /// The current outcome, for discrete variables.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            RandomVariable::Discrete { outcome, .. } => Some(*outcome),
            RandomVariable::Continuous { .. } => None,
        }
    }

    /// Overwrites the value. Discrete variables snap to the outcome the
    /// space maps `value` to.
    pub fn set_value(&mut self, new_value: f64) {
        match self {
            RandomVariable::Continuous { value, .. } => *value = new_value,
            RandomVariable::Discrete {
                space,
                outcome,
                value,
            } => {
                *outcome = space.outcome_of(new_value);
                *value = space.value_of(*outcome);
            }
        }
    }

    /// Overwrites the outcome of a discrete variable.
    pub fn set_outcome(&mut self, new_outcome: Outcome) -> Result<(), ModelError> {
        match self {
            RandomVariable::Discrete {
                space,
                outcome,
                value,
            } => {
                space.check_outcome(new_outcome)?;
                *outcome = new_outcome;
                *value = space.value_of(new_outcome);
                Ok(())
            }
            RandomVariable::Continuous { space, .. } => Err(ModelError::InvalidParameters(
                format!("cannot set an outcome on a continuous variable over {:?}", space),
            )),
        }
    }
}
