//! Weighted loss reduction.

use crate::ops::{broadcast_binary, div_no_nan};
use crate::shape::squeeze_or_expand_dimensions;
use crate::{EvalError, EvalResult};
use scirs2_core::ndarray::{arr0, ArrayD};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Policy for collapsing a per-example loss array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    /// Return the weighted losses unreduced.
    None,
    /// Sum of the weighted losses.
    Sum,
    /// Sum divided by the number of elements.
    SumOverBatchSize,
    /// `SumOverBatchSize` for arrays with at least one axis, `Sum` for scalars.
    #[default]
    Auto,
    /// Sum divided by the sum of the weights.
    WeightedMean,
}

impl Reduction {
    pub const ALL: [Reduction; 5] = [
        Reduction::None,
        Reduction::Sum,
        Reduction::SumOverBatchSize,
        Reduction::Auto,
        Reduction::WeightedMean,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Reduction::None => "none",
            Reduction::Sum => "sum",
            Reduction::SumOverBatchSize => "sum_over_batch_size",
            Reduction::Auto => "auto",
            Reduction::WeightedMean => "weighted_mean",
        }
    }

    /// Parse a reduction from its canonical lowercase name.
    pub fn parse(name: &str) -> EvalResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == name)
            .ok_or_else(|| {
                EvalError::InvalidArgument(format!(
                    "Unknown reduction '{}'; expected one of none, sum, sum_over_batch_size, auto, weighted_mean",
                    name
                ))
            })
    }

    /// Replace `Auto` with the concrete mode for an array of the given rank.
    pub fn resolve(self, rank: usize) -> Reduction {
        match self {
            Reduction::Auto if rank >= 1 => Reduction::SumOverBatchSize,
            Reduction::Auto => Reduction::Sum,
            other => other,
        }
    }

    /// Whether the mode collapses losses to a scalar.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Reduction::None)
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Reduction {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Apply `sample_weight` to `losses` and reduce them according to `reduction`.
///
/// Returns a rank-0 array for every mode except [`Reduction::None`]. A batch with
/// no elements (or whose weights sum to zero under `WeightedMean`) reduces to 0.
pub fn compute_weighted_loss(
    losses: &ArrayD<f64>,
    sample_weight: Option<&ArrayD<f64>>,
    reduction: Reduction,
) -> EvalResult<ArrayD<f64>> {
    let weights = sample_weight.cloned().unwrap_or_else(|| arr0(1.0).into_dyn());
    let (_, losses, weights) =
        squeeze_or_expand_dimensions::<f64, f64, f64>(losses.clone(), None, Some(weights));
    let weights = weights.unwrap_or_else(|| arr0(1.0).into_dyn());

    let weighted = broadcast_binary("compute_weighted_loss", &losses, &weights, |l, w| l * w)?;

    let resolved = reduction.resolve(weighted.ndim());
    log::trace!(
        "Reducing weighted losses of shape {:?} with {} (requested {})",
        weighted.shape(),
        resolved,
        reduction
    );

    let total: f64 = weighted.sum();
    let value = match resolved {
        Reduction::None => return Ok(weighted),
        Reduction::Sum => total,
        Reduction::SumOverBatchSize | Reduction::Auto => {
            div_no_nan(total, weighted.len() as f64)
        }
        Reduction::WeightedMean => {
            let weight_sum =
                broadcast_binary("compute_weighted_loss", &weights, &weighted, |w, _| w)?.sum();
            div_no_nan(total, weight_sum)
        }
    };
    Ok(arr0(value).into_dyn())
}

/// Extract the value of a rank-0 result.
pub fn scalar_value(array: &ArrayD<f64>) -> Option<f64> {
    if array.ndim() == 0 {
        array.first().copied()
    } else {
        None
    }
}

/// Divide a per-replica loss so that summing across replicas yields the global mean.
pub fn scale_loss_for_distribution(loss: f64, num_replicas: usize) -> f64 {
    if num_replicas > 1 {
        loss / num_replicas as f64
    } else {
        loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray::{array, IxDyn};

    fn reduce(losses: ArrayD<f64>, weights: Option<ArrayD<f64>>, reduction: Reduction) -> f64 {
        let out = compute_weighted_loss(&losses, weights.as_ref(), reduction).unwrap();
        scalar_value(&out).unwrap()
    }

    #[test]
    fn test_reduction_names_round_trip() {
        for reduction in Reduction::ALL {
            assert_eq!(Reduction::parse(reduction.as_str()).unwrap(), reduction);
        }
        assert!(Reduction::parse("mean").is_err());
        assert_eq!("sum".parse::<Reduction>().unwrap(), Reduction::Sum);
    }

    #[test]
    fn test_auto_resolution() {
        assert_eq!(Reduction::Auto.resolve(1), Reduction::SumOverBatchSize);
        assert_eq!(Reduction::Auto.resolve(0), Reduction::Sum);
        assert_eq!(Reduction::Sum.resolve(3), Reduction::Sum);
    }

    #[test]
    fn test_sum_and_mean() {
        let losses = array![1.0, 2.0, 3.0, 4.0].into_dyn();
        assert_eq!(reduce(losses.clone(), None, Reduction::Sum), 10.0);
        assert_eq!(reduce(losses.clone(), None, Reduction::SumOverBatchSize), 2.5);
        assert_eq!(reduce(losses, None, Reduction::Auto), 2.5);
    }

    #[test]
    fn test_none_keeps_weighted_array() {
        let losses = array![1.0, 2.0].into_dyn();
        let weights = array![2.0, 0.5].into_dyn();
        let out = compute_weighted_loss(&losses, Some(&weights), Reduction::None).unwrap();
        assert_eq!(out, array![2.0, 1.0].into_dyn());
    }

    #[test]
    fn test_weighted_mean_divides_by_weight_sum() {
        let losses = array![1.0, 3.0].into_dyn();
        let weights = array![1.0, 3.0].into_dyn();
        // (1 + 9) / 4
        assert_eq!(reduce(losses.clone(), Some(weights.clone()), Reduction::WeightedMean), 2.5);
        // (1 + 9) / 2
        assert_eq!(reduce(losses, Some(weights), Reduction::SumOverBatchSize), 5.0);
    }

    #[test]
    fn test_weights_with_trailing_singleton() {
        let losses = array![1.0, 2.0, 3.0].into_dyn();
        let weights = array![[1.0], [0.0], [1.0]].into_dyn();
        assert_eq!(reduce(losses, Some(weights), Reduction::Sum), 4.0);
    }

    #[test]
    fn test_safe_mean_on_empty_batch() {
        let losses = ArrayD::<f64>::zeros(IxDyn(&[0]));
        let value = reduce(losses.clone(), None, Reduction::SumOverBatchSize);
        assert_eq!(value, 0.0);
        assert!(!value.is_nan());

        let weights = ArrayD::<f64>::zeros(IxDyn(&[0]));
        assert_eq!(reduce(losses, Some(weights), Reduction::WeightedMean), 0.0);
    }

    #[test]
    fn test_fully_masked_batch_weighted_mean_is_zero() {
        let losses = array![1.0, 2.0].into_dyn();
        let weights = array![0.0, 0.0].into_dyn();
        assert_eq!(reduce(losses, Some(weights), Reduction::WeightedMean), 0.0);
    }

    #[test]
    fn test_incompatible_weights_error() {
        let losses = array![1.0, 2.0, 3.0].into_dyn();
        let weights = array![1.0, 2.0].into_dyn();
        let err = compute_weighted_loss(&losses, Some(&weights), Reduction::Sum);
        assert!(matches!(err, Err(EvalError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_scale_loss_for_distribution() {
        assert_eq!(scale_loss_for_distribution(8.0, 4), 2.0);
        assert_eq!(scale_loss_for_distribution(8.0, 1), 8.0);
    }
}
