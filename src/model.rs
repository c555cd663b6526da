//! Per-actor happiness state.

use crate::error::{SimError, SimResult};
use rand::prelude::*;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};

/// Clamp a value into the unit interval `[0, 1]`.
pub(crate) fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Happiness of every actor, index-aligned with the social graph.
///
/// Every element lies in `[0, 1]`; each mutation clamps immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HappinessState {
    values: Vec<f64>,
}

impl HappinessState {
    /// Draw `n` happiness values uniformly from `[low, high)`.
    pub fn init_uniform<R: Rng>(n: usize, low: f64, high: f64, rng: &mut R) -> SimResult<Self> {
        if n == 0 {
            return Err(SimError::InvalidParameter(
                "number of actors must be at least 1".into(),
            ));
        }
        if !(low.is_finite() && high.is_finite() && 0.0 <= low && low < high && high <= 1.0) {
            return Err(SimError::InvalidParameter(format!(
                "initial happiness bounds must satisfy 0.0 <= low < high <= 1.0, \
                 but are [{low}, {high})"
            )));
        }

        let dist = Uniform::new(low, high)?;
        let values = (0..n).map(|_| dist.sample(rng)).collect();
        Ok(Self { values })
    }

    /// Wrap an explicit happiness vector; every value must lie in `[0, 1]`.
    pub fn from_values(values: Vec<f64>) -> SimResult<Self> {
        if values.is_empty() {
            return Err(SimError::InvalidParameter(
                "happiness state must have at least one value".into(),
            ));
        }
        if let Some(value) = values.iter().find(|value| !(0.0..=1.0).contains(*value)) {
            return Err(SimError::InvalidParameter(format!(
                "happiness values must be in the range 0.0..=1.0, but found {value}"
            )));
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the happiness of actor `index`.
    pub fn get(&self, index: usize) -> SimResult<f64> {
        self.check_index(index)?;
        Ok(self.values[index])
    }

    /// Total happiness across all actors.
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Apply the trolley-decision shock.
    ///
    /// Each saved actor gains `gain`; the sacrificed actor loses
    /// `gain * saved.len()`. Absent clamping the total change is zero; the
    /// per-element clamp may break that exact conservation when a value
    /// saturates at either bound.
    ///
    /// All indices are validated before any value is touched.
    pub fn apply_shock(&mut self, saved: &[usize], sacrificed: usize, gain: f64) -> SimResult<()> {
        if !(gain.is_finite() && gain >= 0.0) {
            return Err(SimError::InvalidParameter(format!(
                "shock gain must be finite and non-negative, but is {gain}"
            )));
        }
        for &index in saved {
            self.check_index(index)?;
        }
        self.check_index(sacrificed)?;

        for &index in saved {
            self.values[index] = clamp_unit(self.values[index] + gain);
        }
        self.values[sacrificed] = clamp_unit(self.values[sacrificed] - gain * saved.len() as f64);

        Ok(())
    }

    /// Replace the whole vector with the next round's values.
    ///
    /// The caller guarantees length and clamping.
    pub(crate) fn replace(&mut self, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.values.len());
        self.values = values;
    }

    fn check_index(&self, index: usize) -> SimResult<()> {
        if index >= self.values.len() {
            return Err(SimError::IndexOutOfRange {
                index,
                n_actors: self.values.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn init_uniform_respects_bounds() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let state = HappinessState::init_uniform(200, 0.5, 1.0, &mut rng).unwrap();

        assert_eq!(state.len(), 200);
        assert!(state.values().iter().all(|&v| (0.5..1.0).contains(&v)));
    }

    #[test]
    fn init_uniform_is_reproducible() {
        let mut rng_a = ChaCha12Rng::seed_from_u64(7);
        let mut rng_b = ChaCha12Rng::seed_from_u64(7);
        let state_a = HappinessState::init_uniform(50, 0.0, 1.0, &mut rng_a).unwrap();
        let state_b = HappinessState::init_uniform(50, 0.0, 1.0, &mut rng_b).unwrap();
        assert_eq!(state_a, state_b);
    }

    #[test]
    fn init_uniform_rejects_bad_bounds() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        assert!(HappinessState::init_uniform(0, 0.0, 1.0, &mut rng).is_err());
        assert!(HappinessState::init_uniform(5, 0.8, 0.2, &mut rng).is_err());
        assert!(HappinessState::init_uniform(5, -0.1, 0.5, &mut rng).is_err());
        assert!(HappinessState::init_uniform(5, 0.5, 1.1, &mut rng).is_err());
    }

    #[test]
    fn from_values_rejects_out_of_range_values() {
        assert!(HappinessState::from_values(vec![]).is_err());
        assert!(HappinessState::from_values(vec![0.5, 1.2]).is_err());
        assert!(HappinessState::from_values(vec![0.5, -0.1]).is_err());
    }

    #[test]
    fn shock_applies_asymmetric_gain_and_loss() {
        let mut state = HappinessState::from_values(vec![0.5; 5]).unwrap();
        state.apply_shock(&[1, 2, 4], 3, 0.125).unwrap();

        // Dyadic values, so the arithmetic is exact.
        let expected = [0.5, 0.625, 0.625, 0.125, 0.625];
        assert_eq!(state.values(), expected);
    }

    #[test]
    fn unclamped_shock_conserves_total_happiness() {
        let mut state = HappinessState::from_values(vec![0.5; 8]).unwrap();
        let before = state.total();
        // Gains and loss stay strictly inside (0, 1), so no clamp saturates.
        state.apply_shock(&[0, 2, 6], 4, 0.1).unwrap();
        assert!((state.total() - before).abs() < 1e-12);
    }

    #[test]
    fn clamping_may_break_conservation() {
        let mut state = HappinessState::from_values(vec![0.9, 0.2]).unwrap();
        state.apply_shock(&[0], 1, 0.5).unwrap();

        // 0.9 + 0.5 saturates at 1.0 and 0.2 - 0.5 saturates at 0.0.
        assert_eq!(state.values(), [1.0, 0.0]);
    }

    #[test]
    fn shock_rejects_bad_indices_without_partial_effect() {
        let mut state = HappinessState::from_values(vec![0.5; 3]).unwrap();
        let before = state.clone();

        assert!(matches!(
            state.apply_shock(&[0, 7], 1, 0.1),
            Err(SimError::IndexOutOfRange { index: 7, .. })
        ));
        assert!(matches!(
            state.apply_shock(&[0], 9, 0.1),
            Err(SimError::IndexOutOfRange { index: 9, .. })
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn shock_rejects_invalid_gain() {
        let mut state = HappinessState::from_values(vec![0.5; 3]).unwrap();
        assert!(state.apply_shock(&[0], 1, -0.5).is_err());
        assert!(state.apply_shock(&[0], 1, f64::NAN).is_err());
    }
}
