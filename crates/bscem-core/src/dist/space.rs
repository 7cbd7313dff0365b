//! Sample spaces: the domains random variables and distributions live on.

use crate::engine::errors::ModelError;

/// Identifier of a single outcome in a discrete space.
///
/// Uses u32 internally, matching the id types of the factor graph.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Outcome(pub u32);

impl Outcome {
    /// The outcome index as a usize.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The domain of a random variable.
///
/// Spaces are immutable values. Two spaces are equal when they are of the
/// same kind and, for intervals, have identical bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Space {
    /// The two-point space `{0, 1}`, read as `{false, true}`.
    Boolean,
    /// A closed interval of reals. Unbounded ends use infinities.
    Interval { min: f64, max: f64 },
}

impl Space {
    /// A closed real interval `[min, max]`.
    pub fn interval(min: f64, max: f64) -> Self {
        Space::Interval { min, max }
    }

    /// The unit interval `[0, 1]`, home of probabilities and noise rates.
    pub fn unit_interval() -> Self {
        Space::Interval { min: 0.0, max: 1.0 }
    }

    /// The non-negative reals `[0, ∞)`, home of Beta hyperparameters.
    pub fn positive_reals() -> Self {
        Space::Interval {
            min: 0.0,
            max: f64::INFINITY,
        }
    }

    /// The full real line.
    pub fn real_line() -> Self {
        Space::Interval {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    /// Whether outcomes of this space are countable.
    pub fn is_discrete(&self) -> bool {
        matches!(self, Space::Boolean)
    }

    /// Number of outcomes for discrete spaces, `None` for continuous ones.
    pub fn size(&self) -> Option<usize> {
        match self {
            Space::Boolean => Some(2),
            Space::Interval { .. } => None,
        }
    }

    /// The infimum of the space viewed as a subset of the reals.
    pub fn inf(&self) -> f64 {
        match self {
            Space::Boolean => 0.0,
            Space::Interval { min, .. } => *min,
        }
    }

    /// The supremum of the space viewed as a subset of the reals.
    pub fn sup(&self) -> f64 {
        match self {
            Space::Boolean => 1.0,
            Space::Interval { max, .. } => *max,
        }
    }

    /// Whether a real value lies in the space.
    pub fn contains(&self, value: f64) -> bool {
        match self {
            Space::Boolean => value == 0.0 || value == 1.0,
            Space::Interval { min, max } => value >= *min && value <= *max,
        }
    }

    /// Checks that an outcome index is in range for a discrete space.
    pub fn check_outcome(&self, outcome: Outcome) -> Result<(), ModelError> {
        match self.size() {
            Some(size) if outcome.index() < size => Ok(()),
            Some(size) => Err(ModelError::OutcomeNotInDomain {
                outcome: outcome.0,
                size,
            }),
            None => Err(ModelError::OutcomeNotInDomain {
                outcome: outcome.0,
                size: 0,
            }),
        }
    }

    /// The real value of a discrete outcome.
    pub fn value_of(&self, outcome: Outcome) -> f64 {
        if outcome.0 == 0 {
            0.0
        } else {
            1.0
        }
    }

    /// The discrete outcome corresponding to a real value.
    ///
    /// On the boolean space, `0.0` maps to outcome 0 and anything else to 1.
    pub fn outcome_of(&self, value: f64) -> Outcome {
        if value == 0.0 {
            Outcome(0)
        } else {
            Outcome(1)
        }
    }

    /// Reads a boolean outcome.
    pub fn bool_value(outcome: Outcome) -> bool {
        outcome.0 != 0
    }

    /// The boolean outcome for `value`.
    pub fn bool_outcome(value: bool) -> Outcome {
        if value {
            Outcome(1)
        } else {
            Outcome(0)
        }
    }
}
