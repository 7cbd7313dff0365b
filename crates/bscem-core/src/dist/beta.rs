//! The Beta distribution on the unit interval.

use rand::Rng;
use rand_distr::Distribution as _;
use statrs::function::beta::beta_reg;
use statrs::function::gamma::ln_gamma;

use crate::dist::space::Space;
use crate::dist::{stats, Dist};
use crate::engine::errors::{check_param_count, ModelError};

/// A Beta(α, β) distribution.
///
/// Used as the prior over noise rates. The mean is E[p] = α / (α + β).
/// Parameters are plain fields so a template instance can be built with
/// placeholder values and scored under other parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Beta {
    /// The alpha parameter (pseudo-count of successes)
    pub alpha: f64,
    /// The beta parameter (pseudo-count of failures)
    pub beta: f64,
}

impl Beta {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    fn has_valid_params(&self) -> bool {
        self.alpha > 0.0 && self.beta > 0.0 && self.alpha.is_finite() && self.beta.is_finite()
    }

    /// Probability density at `x`.
    ///
    /// ```text
    /// f(x) = x^(α−1) (1−x)^(β−1) / B(α, β)
    /// ```
    ///
    /// Returns 0 outside `[0, 1]` or for non-positive parameters.
    pub fn pdf(&self, x: f64) -> f64 {
        if !self.has_valid_params() || !(0.0..=1.0).contains(&x) {
            return 0.0;
        }
        let (a, b) = (self.alpha, self.beta);
        // Endpoints: x^0 must read as 1, not 0·ln(0).
        if x == 0.0 {
            return endpoint_density(a, b);
        }
        if x == 1.0 {
            return endpoint_density(b, a);
        }
        let ln_norm = ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b);
        ((a - 1.0) * x.ln() + (b - 1.0) * (1.0 - x).ln() - ln_norm).exp()
    }

    /// Conjugate update after `pos` successes and `neg` failures.
    pub fn posterior(&self, pos: f64, neg: f64) -> Beta {
        Beta {
            alpha: self.alpha + pos,
            beta: self.beta + neg,
        }
    }

    /// Fits Beta parameters to samples by the method of moments.
    ///
    /// ```text
    /// scale = m (1 − m) / v − 1
    /// α = m · scale,  β = (1 − m) · scale
    /// ```
    ///
    /// Undefined when every sample is equal, when the variance is lost to
    /// rounding against `m (1 − m)`, or when the scale is not a positive
    /// finite number; all return [`ModelError::DegenerateMoments`].
    pub fn maximize_by_mom(samples: &[f64]) -> Result<Beta, ModelError> {
        if samples.len() < 2 {
            return Err(ModelError::DegenerateMoments(format!(
                "need at least two samples, got {}",
                samples.len()
            )));
        }
        if stats::max(samples) == stats::min(samples) {
            return Err(ModelError::DegenerateMoments(
                "sample variance is zero".to_string(),
            ));
        }
        let m = stats::mean(samples);
        let v = stats::variance(samples);
        // A rounding-level variance would fit parameters near 1/ε.
        if !(v > f64::EPSILON * m * (1.0 - m)) {
            return Err(ModelError::DegenerateMoments(format!(
                "sample variance {} is below rounding error (mean {})",
                v, m
            )));
        }
        let scale = m * (1.0 - m) / v - 1.0;
        if !(scale > 0.0 && scale.is_finite()) {
            return Err(ModelError::DegenerateMoments(format!(
                "non-positive scale {} (mean {}, variance {})",
                scale, m, v
            )));
        }
        let fitted = Beta {
            alpha: m * scale,
            beta: (1.0 - m) * scale,
        };
        if !fitted.has_valid_params() {
            return Err(ModelError::DegenerateMoments(format!(
                "fitted parameters out of range: {:?}",
                fitted
            )));
        }
        Ok(fitted)
    }
}

/// Density at the endpoint where the exponent on the vanishing factor is
/// `near - 1`.
fn endpoint_density(near: f64, far: f64) -> f64 {
    if near < 1.0 {
        f64::INFINITY
    } else if near == 1.0 {
        // B(1, far) = 1 / far
        far
    } else {
        0.0
    }
}

impl Dist for Beta {
    fn space(&self) -> Space {
        Space::unit_interval()
    }

    fn num_vars(&self) -> usize {
        1
    }

    fn num_params(&self) -> usize {
        2
    }

    fn params(&self) -> Vec<f64> {
        vec![self.alpha, self.beta]
    }

    fn set_params(&mut self, vals: &[f64]) -> Result<(), ModelError> {
        check_param_count(vals, 2)?;
        self.alpha = vals[0];
        self.beta = vals[1];
        Ok(())
    }

    fn score(&self, vars: &[f64], params: &[f64]) -> f64 {
        Beta::new(params[0], params[1]).pdf(vars[0])
    }

    fn cdf(&self, x: f64) -> f64 {
        if x <= 0.0 || !self.has_valid_params() {
            0.0
        } else if x >= 1.0 {
            1.0
        } else {
            beta_reg(self.alpha, self.beta, x)
        }
    }

    fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    /// `(α − 1) / (α + β − 2)`, defined only for α > 1 and β > 1.
    fn mode(&self) -> Result<f64, ModelError> {
        if self.alpha <= 1.0 || self.beta <= 1.0 {
            return Err(ModelError::InvalidParameters(format!(
                "Beta mode undefined for alpha {} and beta {}",
                self.alpha, self.beta
            )));
        }
        Ok((self.alpha - 1.0) / (self.alpha + self.beta - 2.0))
    }

    fn variance(&self) -> f64 {
        let sum = self.alpha + self.beta;
        (self.alpha * self.beta) / (sum * sum * (sum + 1.0))
    }

    fn sample_value<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, ModelError> {
        let law = rand_distr::Beta::new(self.alpha, self.beta)
            .map_err(|e| ModelError::InvalidParameters(e.to_string()))?;
        Ok(law.sample(rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn pdf_and_cdf_match_reference_values() {
        let d = Beta::new(0.1, 0.9);
        assert!(close(d.pdf(0.1), 0.789_602_001_365_603, 1e-9));
        assert!(close(d.cdf(0.1), 0.782_058_177_948_575, 1e-8));
        assert!(close(d.mean(), 0.1, 1e-12));
        assert!(close(d.variance(), 0.045, 1e-12));

        let d = Beta::new(0.5, 0.5);
        assert!(close(d.pdf(0.1), 1.061_032_953_945_969, 1e-9));
        assert!(close(d.variance(), 0.125, 1e-12));
    }

    #[test]
    fn score_uses_supplied_params() {
        let d = Beta::new(0.0, 0.0);
        let s = d.score(&[0.1], &[0.5, 0.5]);
        assert!(close(s, 1.061_032_953_945_969, 1e-9));
    }

    #[test]
    fn pdf_handles_endpoints_and_out_of_range() {
        assert_eq!(Beta::new(1.0, 1.0).pdf(0.0), 1.0);
        assert_eq!(Beta::new(1.0, 3.0).pdf(0.0), 3.0);
        assert_eq!(Beta::new(2.0, 2.0).pdf(1.0), 0.0);
        assert_eq!(Beta::new(0.5, 2.0).pdf(0.0), f64::INFINITY);
        assert_eq!(Beta::new(2.0, 2.0).pdf(1.5), 0.0);
    }

    #[test]
    fn mode_requires_both_params_above_one() {
        assert!(close(Beta::new(2.0, 3.0).mode().unwrap(), 1.0 / 3.0, 1e-12));
        assert!(Beta::new(1.0, 3.0).mode().is_err());
        assert!(Beta::new(0.1, 0.9).mode().is_err());
    }

    #[test]
    fn posterior_adds_counts() {
        let post = Beta::new(2.0, 3.0).posterior(4.0, 1.0);
        assert_eq!(post, Beta::new(6.0, 4.0));
        assert!(close(post.mean(), 0.6, 1e-12));
    }

    #[test]
    fn set_params_rejects_wrong_arity() {
        let mut d = Beta::new(1.0, 1.0);
        assert!(matches!(
            d.set_params(&[1.0]),
            Err(ModelError::ParamCount { expected: 2, got: 1 })
        ));
        d.set_params(&[3.0, 4.0]).unwrap();
        assert_eq!(d.params(), vec![3.0, 4.0]);
    }

    #[test]
    fn method_of_moments_recovers_known_moments() {
        // mean 0.25, sample variance 0.025 / 3: scale = 21.5
        let samples = [0.15, 0.35, 0.2, 0.3];
        let m = stats::mean(&samples);
        let v = stats::variance(&samples);
        let fitted = Beta::maximize_by_mom(&samples).unwrap();
        let scale = m * (1.0 - m) / v - 1.0;
        assert!(close(fitted.alpha, m * scale, 1e-12));
        assert!(close(fitted.beta, (1.0 - m) * scale, 1e-12));
        assert!(close(fitted.mean(), m, 1e-12));
    }

    #[test]
    fn method_of_moments_rejects_degenerate_samples() {
        assert!(matches!(
            Beta::maximize_by_mom(&[0.2, 0.2, 0.2]),
            Err(ModelError::DegenerateMoments(_))
        ));
        assert!(Beta::maximize_by_mom(&[0.3]).is_err());
        // Variance larger than m(1-m) gives a negative scale.
        assert!(Beta::maximize_by_mom(&[0.0, 1.0]).is_err());
    }

    #[test]
    fn method_of_moments_rejects_equal_rates_with_inexact_mean() {
        // The mean of five 1e-3 values is not exactly 1e-3, so the sample
        // variance is rounding noise rather than zero.
        let rates = [1e-3; 5];
        assert!(matches!(
            Beta::maximize_by_mom(&rates),
            Err(ModelError::DegenerateMoments(_))
        ));
        let one_ulp_apart = [0.2, 0.2, 0.2 + 3e-17, 0.2];
        assert!(Beta::maximize_by_mom(&one_ulp_apart).is_err());
    }

    #[test]
    fn draws_stay_in_unit_interval() {
        let d = Beta::new(2.0, 5.0);
        let mut rng = StdRng::seed_from_u64(3);
        let draws = d.sample_n(500, &mut rng).unwrap();
        assert!(draws.iter().all(|x| (0.0..=1.0).contains(x)));
        assert!(close(stats::mean(&draws), d.mean(), 0.03));
    }
}
