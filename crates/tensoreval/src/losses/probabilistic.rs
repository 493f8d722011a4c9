//! Losses between distributions and count data.

use crate::ops::{broadcast_binary, reduce_mean_axis, reduce_sum_axis};
use crate::EvalResult;
use scirs2_core::ndarray::ArrayD;

/// `mean(y_pred - y_true * log(y_pred + eps))` over the last axis.
pub fn poisson(
    y_true: &ArrayD<f64>,
    y_pred: &ArrayD<f64>,
    epsilon: f64,
) -> EvalResult<ArrayD<f64>> {
    let per_elem = broadcast_binary("poisson", y_true, y_pred, |t, p| {
        p - t * (p + epsilon).ln()
    })?;
    reduce_mean_axis(&per_elem, -1)
}

/// `sum(y_true * log(y_true / y_pred))` over the last axis, both clipped to `[eps, 1]`.
pub fn kl_divergence(
    y_true: &ArrayD<f64>,
    y_pred: &ArrayD<f64>,
    epsilon: f64,
) -> EvalResult<ArrayD<f64>> {
    let per_elem = broadcast_binary("kl_divergence", y_true, y_pred, |t, p| {
        let t = t.clamp(epsilon, 1.0);
        let p = p.clamp(epsilon, 1.0);
        t * (t / p).ln()
    })?;
    reduce_sum_axis(&per_elem, -1)
}

function_loss!(
    /// Poisson loss for count predictions.
    Poisson,
    "poisson",
    poisson,
    epsilon
);

function_loss!(
    /// Kullback-Leibler divergence.
    KLDivergence,
    "kl_divergence",
    kl_divergence,
    epsilon
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_EPSILON;
    use crate::losses::Loss;
    use approx::assert_abs_diff_eq;
    use scirs2_core::ndarray::array;

    #[test]
    fn test_kld_zero_for_identical_distributions() {
        let p = array![[0.2, 0.3, 0.5]].into_dyn();
        let out = kl_divergence(&p, &p, DEFAULT_EPSILON).unwrap();
        assert_abs_diff_eq!(out[[0]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kld_known_value() {
        let t = array![[0.5, 0.5]].into_dyn();
        let p = array![[0.25, 0.75]].into_dyn();
        let out = kl_divergence(&t, &p, DEFAULT_EPSILON).unwrap();
        let expected = 0.5 * 2f64.ln() + 0.5 * (0.5f64 / 0.75).ln();
        assert_abs_diff_eq!(out[[0]], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_kld_handles_zero_probabilities() {
        let t = array![[1.0, 0.0]].into_dyn();
        let p = array![[0.0, 1.0]].into_dyn();
        assert!(kl_divergence(&t, &p, DEFAULT_EPSILON).unwrap()[[0]].is_finite());
    }

    #[test]
    fn test_poisson() {
        let t = array![[1.0, 2.0]].into_dyn();
        let p = array![[1.0, 1.0]].into_dyn();
        let out = poisson(&t, &p, DEFAULT_EPSILON).unwrap();
        let expected = (1.0 - (1.0 + DEFAULT_EPSILON).ln() + 1.0 - 2.0 * (1.0 + DEFAULT_EPSILON).ln()) / 2.0;
        assert_abs_diff_eq!(out[[0]], expected, epsilon = 1e-12);

        let zero_pred = poisson(&t, &array![[0.0, 0.0]].into_dyn(), DEFAULT_EPSILON).unwrap();
        assert!(zero_pred[[0]].is_finite());
        assert_eq!(Poisson::default().name(), "poisson");
    }
}
