//! Sample statistics over slices of reals.
//!
//! Empty inputs yield 0 rather than NaN so callers can guard on the result.

/// Sum of the values.
pub fn sum(x: &[f64]) -> f64 {
    x.iter().sum()
}

/// Sample mean, or 0 for an empty slice.
pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    sum(x) / x.len() as f64
}

/// Unbiased sample variance (n − 1 denominator), or 0 for fewer than two values.
pub fn variance(x: &[f64]) -> f64 {
    if x.len() < 2 {
        return 0.0;
    }
    let m = mean(x);
    let total: f64 = x.iter().map(|v| (m - v) * (m - v)).sum();
    total / (x.len() as f64 - 1.0)
}

/// Smallest value, or 0 for an empty slice.
pub fn min(x: &[f64]) -> f64 {
    x.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

/// Largest value, or 0 for an empty slice.
pub fn max(x: &[f64]) -> f64 {
    x.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: [f64; 0] = [];
    const ONES: [f64; 4] = [1.0, 1.0, 1.0, 1.0];
    const RAMP: [f64; 4] = [1.0, 2.0, 3.0, 4.0];

    #[test]
    fn mean_of_common_inputs() {
        assert_eq!(mean(&EMPTY), 0.0);
        assert_eq!(mean(&ONES), 1.0);
        assert_eq!(mean(&RAMP), 2.5);
    }

    #[test]
    fn variance_uses_sample_denominator() {
        assert_eq!(variance(&EMPTY), 0.0);
        assert_eq!(variance(&ONES), 0.0);
        assert!((variance(&RAMP) - 1.666_666_666_666_667).abs() < 1e-12);
    }

    #[test]
    fn min_and_max() {
        assert_eq!(min(&EMPTY), 0.0);
        assert_eq!(max(&EMPTY), 0.0);
        assert_eq!(min(&RAMP), 1.0);
        assert_eq!(max(&RAMP), 4.0);
        assert_eq!(sum(&RAMP), 10.0);
    }
}
