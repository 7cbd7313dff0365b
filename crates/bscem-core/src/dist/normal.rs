//! The Normal distribution on the real line.

use std::f64::consts::{PI, SQRT_2};

use rand::Rng;
use rand_distr::Distribution as _;
use statrs::function::erf::erf;

use crate::dist::space::Space;
use crate::dist::Dist;
use crate::engine::errors::{check_param_count, ModelError};

/// A Normal(μ, σ) distribution, parameterized by standard deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Normal {
    pub mu: f64,
    pub sigma: f64,
}

impl Normal {
    pub fn new(mu: f64, sigma: f64) -> Self {
        Self { mu, sigma }
    }

    fn has_valid_params(&self) -> bool {
        self.mu.is_finite() && self.sigma > 0.0 && self.sigma.is_finite()
    }

    fn check_params(&self) -> Result<(), ModelError> {
        if self.has_valid_params() {
            Ok(())
        } else {
            Err(ModelError::InvalidParameters(format!(
                "Normal needs finite mu and positive finite sigma, got mu {} and sigma {}",
                self.mu, self.sigma
            )))
        }
    }

    /// Probability density at `x`; 0 for invalid parameters.
    pub fn pdf(&self, x: f64) -> f64 {
        if !self.has_valid_params() {
            return 0.0;
        }
        let z = (x - self.mu) / self.sigma;
        (-0.5 * z * z).exp() / (self.sigma * (2.0 * PI).sqrt())
    }
}

impl Dist for Normal {
    fn space(&self) -> Space {
        Space::real_line()
    }

    fn num_vars(&self) -> usize {
        1
    }

    fn num_params(&self) -> usize {
        2
    }

    fn params(&self) -> Vec<f64> {
        vec![self.mu, self.sigma]
    }

    fn set_params(&mut self, vals: &[f64]) -> Result<(), ModelError> {
        check_param_count(vals, 2)?;
        self.mu = vals[0];
        self.sigma = vals[1];
        Ok(())
    }

    fn score(&self, vars: &[f64], params: &[f64]) -> f64 {
        Normal::new(params[0], params[1]).pdf(vars[0])
    }

    /// NaN for invalid parameters.
    fn cdf(&self, x: f64) -> f64 {
        if !self.has_valid_params() {
            return f64::NAN;
        }
        0.5 * (1.0 + erf((x - self.mu) / (self.sigma * SQRT_2)))
    }

    fn mean(&self) -> f64 {
        self.mu
    }

    fn mode(&self) -> Result<f64, ModelError> {
        Ok(self.mu)
    }

    fn variance(&self) -> f64 {
        self.sigma * self.sigma
    }

    /// Draws `μ + σ·z` with `z` standard normal.
    fn sample_value<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, ModelError> {
        self.check_params()?;
        let law = rand_distr::Normal::new(self.mu, self.sigma)
            .map_err(|e| ModelError::InvalidParameters(e.to_string()))?;
        Ok(law.sample(rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dist::stats;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn pdf_and_cdf_match_reference_values() {
        let d = Normal::new(0.1, 0.9);
        assert!((d.pdf(0.1) - 0.443_269_200_446_036).abs() < 1e-12);
        assert!((d.cdf(0.3) - 0.587_929_552_129_057).abs() < 1e-9);
        assert!((d.cdf(0.1) - 0.5).abs() < 1e-12);
        assert!((d.variance() - 0.81).abs() < 1e-12);

        let d = Normal::new(0.5, 0.5);
        assert!((d.pdf(0.1) - 0.579_383_105_522_966).abs() < 1e-12);
        assert_eq!(d.mode().unwrap(), 0.5);
    }

    #[test]
    fn prob_interval_is_cdf_difference() {
        let d = Normal::new(0.0, 1.0);
        let p = d.prob_interval(-1.0, 1.0);
        assert!((p - 0.682_689_492_137_086).abs() < 1e-9);
    }

    #[test]
    fn draws_are_shifted_and_scaled() {
        let d = Normal::new(3.0, 0.5);
        let mut rng = StdRng::seed_from_u64(5);
        let draws = d.sample_n(2000, &mut rng).unwrap();
        assert!((stats::mean(&draws) - 3.0).abs() < 0.05);
        assert!((stats::variance(&draws) - 0.25).abs() < 0.05);
    }

    #[test]
    fn negative_sigma_cannot_be_sampled() {
        let d = Normal::new(0.0, -1.0);
        let mut rng = StdRng::seed_from_u64(5);
        assert!(matches!(
            d.sample_value(&mut rng),
            Err(ModelError::InvalidParameters(_))
        ));
        assert!(d.sample_n(3, &mut rng).is_err());
        assert!(Normal::new(0.0, 0.0).sample_value(&mut rng).is_err());
        assert!(Normal::new(0.0, f64::INFINITY).sample_value(&mut rng).is_err());
    }

    #[test]
    fn negative_sigma_has_no_cdf_or_density() {
        let d = Normal::new(0.0, -1.0);
        assert!(d.cdf(1.0).is_nan());
        assert_eq!(d.pdf(0.0), 0.0);
    }
}
