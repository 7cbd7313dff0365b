//! Dense, mutable probability mass over a discrete space.

use rand::Rng;

use crate::dist::space::{Outcome, Space};
use crate::engine::errors::{check_probability, ModelError};

/// A mutable discrete distribution storing one weight per outcome.
///
/// Weights are unnormalized until [`normalize`](Self::normalize) (or
/// [`normalize_with_extra`](Self::normalize_with_extra)) is called; reading a
/// probability before that is an error.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseDiscrete {
    space: Space,
    weights: Vec<f64>,
    normalized: bool,
}

impl DenseDiscrete {
    /// Creates an all-zero (unnormalized) mass over a discrete space.
    pub fn new(space: Space) -> Result<Self, ModelError> {
        let size = space.size().ok_or_else(|| {
            ModelError::InvalidParameters(format!(
                "dense discrete distribution needs a discrete space, got {:?}",
                space
            ))
        })?;
        Ok(Self {
            space,
            weights: vec![0.0; size],
            normalized: false,
        })
    }

    /// The sample space.
    pub fn space(&self) -> Space {
        self.space
    }

    /// Raw weights, normalized or not.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Whether the weights currently form a probability vector.
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// The probability of an outcome.
    pub fn prob(&self, outcome: Outcome) -> Result<f64, ModelError> {
        self.space.check_outcome(outcome)?;
        if !self.normalized {
            return Err(ModelError::NotNormalized);
        }
        Ok(self.weights[outcome.index()])
    }

    /// The base-2 log probability of an outcome.
    pub fn lg_prob(&self, outcome: Outcome) -> Result<f64, ModelError> {
        Ok(self.prob(outcome)?.log2())
    }

    /// Sets the mass of one outcome to a probability in `[0, 1]`.
    pub fn set_prob(&mut self, outcome: Outcome, prob: f64) -> Result<(), ModelError> {
        check_probability(prob)?;
        self.set_weight(outcome, prob)
    }

    /// Sets the unnormalized mass of one outcome.
    pub fn set_weight(&mut self, outcome: Outcome, weight: f64) -> Result<(), ModelError> {
        self.space.check_outcome(outcome)?;
        if !weight.is_finite() || weight < 0.0 {
            return Err(ModelError::InvalidParameters(format!(
                "weight must be finite and non-negative, got {}",
                weight
            )));
        }
        self.weights[outcome.index()] = weight;
        self.normalized = false;
        Ok(())
    }

    /// Sets every weight to zero.
    pub fn reset(&mut self) {
        self.weights.iter_mut().for_each(|w| *w = 0.0);
        self.normalized = false;
    }

    /// Rescales the weights to sum to one.
    ///
    /// Outcomes never given a weight keep zero mass. Fails with
    /// [`ModelError::ZeroProbability`] when every weight is zero.
    pub fn normalize(&mut self) -> Result<(), ModelError> {
        let total: f64 = self.weights.iter().sum();
        if total == 0.0 {
            return Err(ModelError::ZeroProbability);
        }
        if total != 1.0 {
            self.weights.iter_mut().for_each(|w| *w /= total);
        }
        self.normalized = true;
        Ok(())
    }

    /// Spreads `rest` uniformly over zero-weight outcomes, then normalizes.
    pub fn normalize_with_extra(&mut self, rest: f64) -> Result<(), ModelError> {
        if !rest.is_finite() || rest < 0.0 {
            return Err(ModelError::InvalidParameters(format!(
                "extra mass must be finite and non-negative, got {}",
                rest
            )));
        }
        if rest != 0.0 {
            let num_zeros = self.weights.iter().filter(|w| **w == 0.0).count();
            if num_zeros > 0 {
                let share = rest / num_zeros as f64;
                self.weights
                    .iter_mut()
                    .filter(|w| **w == 0.0)
                    .for_each(|w| *w = share);
            }
        }
        self.normalize()
    }

    /// Draws one outcome.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Outcome, ModelError> {
        if !self.normalized {
            return Err(ModelError::NotNormalized);
        }
        let mut remaining = rng.gen::<f64>();
        let mut last_positive = None;
        for (i, &p) in self.weights.iter().enumerate() {
            if p > 0.0 {
                last_positive = Some(i);
            }
            remaining -= p;
            if remaining <= 0.0 && p > 0.0 {
                return Ok(Outcome(i as u32));
            }
        }
        // Rounding left a sliver of mass unclaimed.
        last_positive
            .map(|i| Outcome(i as u32))
            .ok_or(ModelError::NotNormalized)
    }

    /// Draws `n` independent outcomes.
    pub fn sample_n<R: Rng + ?Sized>(
        &self,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<Outcome>, ModelError> {
        (0..n).map(|_| self.sample(rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn prob_before_normalize_is_an_error() {
        let mut d = DenseDiscrete::new(Space::Boolean).unwrap();
        d.set_weight(Outcome(0), 3.0).unwrap();
        assert!(matches!(d.prob(Outcome(0)), Err(ModelError::NotNormalized)));
    }

    #[test]
    fn normalize_rescales_weights() {
        let mut d = DenseDiscrete::new(Space::Boolean).unwrap();
        d.set_weight(Outcome(0), 3.0).unwrap();
        d.set_weight(Outcome(1), 1.0).unwrap();
        d.normalize().unwrap();
        assert!((d.prob(Outcome(0)).unwrap() - 0.75).abs() < 1e-12);
        assert!((d.prob(Outcome(1)).unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn normalize_twice_is_idempotent() {
        let mut d = DenseDiscrete::new(Space::Boolean).unwrap();
        d.set_weight(Outcome(0), 0.3).unwrap();
        d.set_weight(Outcome(1), 0.9).unwrap();
        d.normalize().unwrap();
        let once = d.weights().to_vec();
        d.normalize().unwrap();
        for (a, b) in once.iter().zip(d.weights()) {
            assert!((a - b).abs() < 1e-15);
        }
    }

    #[test]
    fn normalize_with_zero_mass_fails() {
        let mut d = DenseDiscrete::new(Space::Boolean).unwrap();
        assert!(matches!(d.normalize(), Err(ModelError::ZeroProbability)));
    }

    #[test]
    fn normalize_with_extra_fills_zero_weights() {
        let mut d = DenseDiscrete::new(Space::Boolean).unwrap();
        d.set_weight(Outcome(1), 0.9).unwrap();
        d.normalize_with_extra(0.1).unwrap();
        assert!((d.prob(Outcome(0)).unwrap() - 0.1).abs() < 1e-12);
        assert!((d.prob(Outcome(1)).unwrap() - 0.9).abs() < 1e-12);

        d.reset();
        d.normalize_with_extra(2.0).unwrap();
        assert!((d.prob(Outcome(0)).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn out_of_domain_and_invalid_weights_are_rejected() {
        let mut d = DenseDiscrete::new(Space::Boolean).unwrap();
        assert!(matches!(
            d.set_weight(Outcome(2), 1.0),
            Err(ModelError::OutcomeNotInDomain { .. })
        ));
        assert!(d.set_weight(Outcome(0), -1.0).is_err());
        assert!(matches!(
            d.set_prob(Outcome(0), 1.5),
            Err(ModelError::InvalidProbability(_))
        ));
        assert!(DenseDiscrete::new(Space::unit_interval()).is_err());
    }

    #[test]
    fn sample_never_returns_zero_mass_outcome() {
        let mut d = DenseDiscrete::new(Space::Boolean).unwrap();
        d.set_weight(Outcome(1), 1.0).unwrap();
        d.normalize().unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let draws = d.sample_n(200, &mut rng).unwrap();
        assert!(draws.iter().all(|o| *o == Outcome(1)));
    }
}
