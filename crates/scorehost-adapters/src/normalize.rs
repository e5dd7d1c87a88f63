//! Probability distribution normalization

use scorehost_core::{Distribution, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Allowed deviation of a distribution's sum from 1
pub const SUM_TOLERANCE: f64 = 1e-6;

/// How adapter-produced distributions are checked before reaching callers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionPolicy {
    /// Vectors must already sum to 1 within [`SUM_TOLERANCE`]
    Strict,
    /// Vectors are rescaled to sum to 1; all-zero vectors are rejected
    #[default]
    Normalize,
    /// Vectors are rescaled with a zero-norm guard; all-zero vectors pass
    /// through as all zeros
    NormalizeGuarded,
}

/// Divide `vector` by its L1 norm.
///
/// Entries are first scaled by the largest magnitude so the norm cannot
/// overflow. A zero norm is replaced by the smallest positive normal `f64`,
/// so the result never contains NaN.
pub fn normalize(vector: &[f64]) -> Distribution {
    let peak = vector.iter().fold(0.0_f64, |peak, v| peak.max(v.abs()));
    let scale = if peak > 0.0 { peak } else { 1.0 };

    let mut norm: f64 = vector.iter().map(|v| (v / scale).abs()).sum();
    if norm == 0.0 {
        norm = f64::MIN_POSITIVE;
    }
    vector.iter().map(|v| v / scale / norm).collect()
}

/// Check one distribution (instance `index` of its batch) under `policy`
pub fn check(
    index: usize,
    vector: Distribution,
    policy: DistributionPolicy,
) -> Result<Distribution> {
    if let Some(bad) = vector.iter().find(|v| !v.is_finite()) {
        return Err(Error::invalid_distribution(
            index,
            format!("non-finite entry {bad}"),
        ));
    }
    if let Some(bad) = vector.iter().find(|v| **v < 0.0) {
        return Err(Error::invalid_distribution(
            index,
            format!("negative entry {bad}"),
        ));
    }

    let sum: f64 = vector.iter().sum();

    match policy {
        DistributionPolicy::Strict => {
            if (sum - 1.0).abs() > SUM_TOLERANCE {
                return Err(Error::invalid_distribution(
                    index,
                    format!("entries sum to {sum}, expected 1"),
                ));
            }
            Ok(vector)
        }
        DistributionPolicy::Normalize => {
            if sum == 0.0 {
                return Err(Error::invalid_distribution(index, "all entries are zero"));
            }
            Ok(normalize(&vector))
        }
        DistributionPolicy::NormalizeGuarded => {
            if sum == 0.0 {
                warn!(index, "Degenerate all-zero distribution passed through");
            }
            Ok(normalize(&vector))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use scorehost_core::ErrorKind;

    fn sum(v: &[f64]) -> f64 {
        v.iter().sum()
    }

    #[test]
    fn test_normalize_preserves_proportions() {
        let out = normalize(&[1.0, 3.0]);
        assert!((out[0] - 0.25).abs() < 1e-12);
        assert!((out[1] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_zero_vector_has_no_nan() {
        let out = normalize(&[0.0, 0.0, 0.0]);
        assert_eq!(out, vec![0.0, 0.0, 0.0]);
        assert!(out.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_strict_accepts_unit_sum() {
        let out = check(0, vec![0.2, 0.3, 0.5], DistributionPolicy::Strict).unwrap();
        assert_eq!(out, vec![0.2, 0.3, 0.5]);
    }

    #[test]
    fn test_strict_rejects_raw_scores() {
        let err = check(4, vec![2.0, 2.0], DistributionPolicy::Strict).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDistribution);
        assert!(err.to_string().contains("instance 4"));
    }

    #[test]
    fn test_normalize_rescales_raw_scores() {
        let out = check(0, vec![2.0, 6.0], DistributionPolicy::Normalize).unwrap();
        assert!((sum(&out) - 1.0).abs() < SUM_TOLERANCE);
        assert!((out[1] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_zero_vector_per_policy() {
        let err = check(1, vec![0.0; 3], DistributionPolicy::Normalize).unwrap_err();
        assert!(matches!(err, Error::InvalidDistribution { index: 1, .. }));

        let err = check(1, vec![0.0; 3], DistributionPolicy::Strict).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDistribution);

        let out = check(1, vec![0.0; 3], DistributionPolicy::NormalizeGuarded).unwrap();
        assert_eq!(out, vec![0.0; 3]);
    }

    #[test]
    fn test_negative_and_nan_rejected_under_every_policy() {
        for policy in [
            DistributionPolicy::Strict,
            DistributionPolicy::Normalize,
            DistributionPolicy::NormalizeGuarded,
        ] {
            let err = check(0, vec![1.5, -0.5], policy).unwrap_err();
            assert!(err.to_string().contains("negative"));

            let err = check(0, vec![f64::NAN, 1.0], policy).unwrap_err();
            assert!(err.to_string().contains("non-finite"));
        }
    }

    #[test]
    fn test_huge_entries_do_not_overflow() {
        let out = check(0, vec![f64::MAX, f64::MAX], DistributionPolicy::Normalize).unwrap();
        assert_eq!(out, vec![0.5, 0.5]);

        let skewed = vec![f64::MAX, 0.0, f64::MAX / 2.0];
        let out = check(0, skewed, DistributionPolicy::NormalizeGuarded).unwrap();
        assert!((sum(&out) - 1.0).abs() < SUM_TOLERANCE);

        let err = check(0, vec![f64::MAX, f64::MAX], DistributionPolicy::Strict).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDistribution);
    }

    #[test]
    fn test_policy_yaml_names() {
        let policy: DistributionPolicy = serde_yaml::from_str("normalize_guarded").unwrap();
        assert_eq!(policy, DistributionPolicy::NormalizeGuarded);
        assert_eq!(DistributionPolicy::default(), DistributionPolicy::Normalize);
    }

    proptest! {
        #[test]
        fn prop_normalized_vectors_sum_to_one(
            values in proptest::collection::vec(0.0f64..f64::MAX, 1..12),
        ) {
            prop_assume!(values.iter().any(|v| *v > 0.0));
            let out = check(0, values, DistributionPolicy::Normalize).unwrap();
            prop_assert!((sum(&out) - 1.0).abs() < SUM_TOLERANCE);
            prop_assert!(out.iter().all(|v| *v >= 0.0));
        }

        #[test]
        fn prop_normalize_keeps_ratios(a in 1e-3f64..1e3, b in 1e-3f64..1e3) {
            let out = normalize(&[a, b]);
            prop_assert!((out[0] / out[1] - a / b).abs() < 1e-9 * (a / b).max(1.0));
        }
    }
}
