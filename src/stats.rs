//! Summary statistics over Monte Carlo samples.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};

/// Mean, median, and population standard deviation of a sample set.
///
/// Derived and read-only; recomputed from the full sample each time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
}

impl RunStatistics {
    /// Compute statistics over `samples`.
    ///
    /// The standard deviation is the population one (denominator `n`).
    pub fn compute(samples: &[f64]) -> SimResult<Self> {
        if samples.is_empty() {
            return Err(SimError::EmptyInput);
        }

        // Welford's online update, numerically stable in one pass.
        let mut mean = 0.0;
        let mut diff_2_sum = 0.0;
        for (n_vals, &val) in samples.iter().enumerate() {
            let diff_a = val - mean;
            mean += diff_a / (n_vals + 1) as f64;
            let diff_b = val - mean;
            diff_2_sum += diff_a * diff_b;
        }
        let std_dev = (diff_2_sum / samples.len() as f64).sqrt();

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 1 {
            sorted[mid]
        } else {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        };

        Ok(Self {
            mean,
            median,
            std_dev,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_sample_reference_values() {
        let stats = RunStatistics::compute(&[1.0, 2.0, 3.0]).unwrap();

        assert!((stats.mean - 2.0).abs() < 1e-12);
        assert!((stats.median - 2.0).abs() < 1e-12);
        assert!((stats.std_dev - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn median_of_even_sample_count_averages_the_middles() {
        let stats = RunStatistics::compute(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert!((stats.median - 2.5).abs() < 1e-12);
    }

    #[test]
    fn single_sample_has_zero_spread() {
        let stats = RunStatistics::compute(&[1.5]).unwrap();
        assert_eq!(stats.mean, 1.5);
        assert_eq!(stats.median, 1.5);
        assert_eq!(stats.std_dev, 0.0);
    }

    #[test]
    fn empty_samples_are_rejected() {
        assert!(matches!(
            RunStatistics::compute(&[]),
            Err(SimError::EmptyInput)
        ));
    }
}
