//! Cross-entropy losses.

use crate::config::LossConfig;
use crate::losses::Loss;
use crate::ops::{broadcast_binary, clip, log_softmax_axis, reduce_mean_axis, reduce_sum_axis, resolve_axis};
use crate::{EvalError, EvalResult};
use scirs2_core::ndarray::{ArrayD, Axis, IxDyn, Zip};

/// Binary cross-entropy averaged over the last axis.
///
/// With `from_logits` the loss is computed directly on the scores as
/// `max(x, 0) - x * z + log(1 + exp(-|x|))`. Otherwise predictions are clipped
/// to `[epsilon, 1 - epsilon]`. Labels are smoothed toward 0.5 first.
pub fn binary_crossentropy(
    y_true: &ArrayD<f64>,
    y_pred: &ArrayD<f64>,
    from_logits: bool,
    label_smoothing: f64,
    epsilon: f64,
) -> EvalResult<ArrayD<f64>> {
    let smooth = |z: f64| z * (1.0 - label_smoothing) + 0.5 * label_smoothing;
    let per_elem = if from_logits {
        broadcast_binary("binary_crossentropy", y_true, y_pred, |z, x| {
            let z = smooth(z);
            x.max(0.0) - x * z + (-x.abs()).exp().ln_1p()
        })?
    } else {
        broadcast_binary("binary_crossentropy", y_true, y_pred, |z, p| {
            let z = smooth(z);
            let p = p.max(epsilon).min(1.0 - epsilon);
            -(z * p.ln() + (1.0 - z) * (1.0 - p).ln())
        })?
    };
    reduce_mean_axis(&per_elem, -1)
}

/// Categorical cross-entropy summed over the class `axis`.
///
/// One-hot labels are smoothed toward `label_smoothing / num_classes`.
/// Probabilities are renormalised over the class axis and clipped before the log.
pub fn categorical_crossentropy(
    y_true: &ArrayD<f64>,
    y_pred: &ArrayD<f64>,
    from_logits: bool,
    label_smoothing: f64,
    axis: isize,
    epsilon: f64,
) -> EvalResult<ArrayD<f64>> {
    if y_true.shape() != y_pred.shape() {
        return Err(EvalError::shape_mismatch(
            "categorical_crossentropy",
            y_true.shape(),
            y_pred.shape(),
        ));
    }
    if y_pred.ndim() == 0 {
        return Err(EvalError::InvalidArgument(
            "categorical_crossentropy requires a class axis".to_string(),
        ));
    }
    let class_axis = Axis(resolve_axis(axis, y_pred.ndim())?);

    let labels = if label_smoothing > 0.0 {
        let num_classes = y_true.len_of(class_axis) as f64;
        y_true.mapv(|z| z * (1.0 - label_smoothing) + label_smoothing / num_classes)
    } else {
        y_true.clone()
    };

    let log_probs = if from_logits {
        log_softmax_axis(y_pred, axis)?
    } else {
        let totals = y_pred.sum_axis(class_axis).insert_axis(class_axis);
        let normalised = broadcast_binary("categorical_crossentropy", y_pred, &totals, |p, s| {
            p / s
        })?;
        clip(&normalised, epsilon, 1.0 - epsilon).mapv(f64::ln)
    };

    let per_elem = broadcast_binary("categorical_crossentropy", &labels, &log_probs, |z, lp| {
        -z * lp
    })?;
    reduce_sum_axis(&per_elem, axis)
}

/// Cross-entropy with integer class labels.
///
/// `y_true` has the shape of `y_pred` without the class (last) axis, optionally
/// with a trailing axis of extent 1. Labels that are not integers in
/// `[0, num_classes)` are rejected.
pub fn sparse_categorical_crossentropy(
    y_true: &ArrayD<f64>,
    y_pred: &ArrayD<f64>,
    from_logits: bool,
    epsilon: f64,
) -> EvalResult<ArrayD<f64>> {
    if y_pred.ndim() == 0 {
        return Err(EvalError::InvalidArgument(
            "sparse_categorical_crossentropy requires a class axis".to_string(),
        ));
    }
    let class_axis = Axis(y_pred.ndim() - 1);
    let num_classes = y_pred.len_of(class_axis);
    let batch_shape = &y_pred.shape()[..y_pred.ndim() - 1];

    let labels = sparse_labels("sparse_categorical_crossentropy", y_true, batch_shape)?;

    let log_probs = if from_logits {
        log_softmax_axis(y_pred, -1)?
    } else {
        let mut probs = y_pred.clone();
        for mut lane in probs.lanes_mut(class_axis) {
            let total: f64 = lane.sum();
            lane.mapv_inplace(|p| (p / total).max(epsilon).min(1.0 - epsilon).ln());
        }
        probs
    };

    let mut out = ArrayD::<f64>::zeros(IxDyn(batch_shape));
    let mut bad_label = None;
    Zip::from(&mut out)
        .and(&labels)
        .and(log_probs.lanes(class_axis))
        .for_each(|o, &label, lane| match class_index(label, num_classes) {
            Some(idx) => *o = -lane[idx],
            None => {
                if bad_label.is_none() {
                    bad_label = Some(label);
                }
            }
        });
    if let Some(label) = bad_label {
        return Err(EvalError::InvalidArgument(format!(
            "Label {} is not a class index in [0, {})",
            label, num_classes
        )));
    }
    Ok(out)
}

/// Bring sparse labels to the batch shape of the predictions.
pub(crate) fn sparse_labels(
    operation: &str,
    y_true: &ArrayD<f64>,
    batch_shape: &[usize],
) -> EvalResult<ArrayD<f64>> {
    if y_true.shape() == batch_shape {
        return Ok(y_true.clone());
    }
    if y_true.ndim() == batch_shape.len() + 1
        && y_true.shape().last() == Some(&1)
        && &y_true.shape()[..batch_shape.len()] == batch_shape
    {
        return Ok(y_true.clone().index_axis_move(Axis(batch_shape.len()), 0));
    }
    Err(EvalError::shape_mismatch(operation, y_true.shape(), batch_shape))
}

/// Integral label in `[0, num_classes)`.
pub(crate) fn class_index(label: f64, num_classes: usize) -> Option<usize> {
    if label.fract() == 0.0 && label >= 0.0 && (label as usize) < num_classes {
        Some(label as usize)
    } else {
        None
    }
}

/// Binary cross-entropy between labels and predictions.
#[derive(Debug, Clone, Default)]
pub struct BinaryCrossentropy {
    pub config: LossConfig,
}

impl BinaryCrossentropy {
    pub fn new(config: LossConfig) -> EvalResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn from_logits() -> Self {
        Self {
            config: LossConfig::default().with_from_logits(true),
        }
    }
}

impl Loss for BinaryCrossentropy {
    fn canonical_name(&self) -> &'static str {
        "binary_crossentropy"
    }

    fn config(&self) -> &LossConfig {
        &self.config
    }

    fn per_example(&self, y_true: &ArrayD<f64>, y_pred: &ArrayD<f64>) -> EvalResult<ArrayD<f64>> {
        binary_crossentropy(
            y_true,
            y_pred,
            self.config.from_logits,
            self.config.label_smoothing,
            self.config.epsilon,
        )
    }
}

/// Categorical cross-entropy for one-hot labels.
#[derive(Debug, Clone, Default)]
pub struct CategoricalCrossentropy {
    pub config: LossConfig,
}

impl CategoricalCrossentropy {
    pub fn new(config: LossConfig) -> EvalResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Loss for CategoricalCrossentropy {
    fn canonical_name(&self) -> &'static str {
        "categorical_crossentropy"
    }

    fn config(&self) -> &LossConfig {
        &self.config
    }

    fn per_example(&self, y_true: &ArrayD<f64>, y_pred: &ArrayD<f64>) -> EvalResult<ArrayD<f64>> {
        categorical_crossentropy(
            y_true,
            y_pred,
            self.config.from_logits,
            self.config.label_smoothing,
            self.config.axis,
            self.config.epsilon,
        )
    }
}

/// Categorical cross-entropy for integer labels.
#[derive(Debug, Clone, Default)]
pub struct SparseCategoricalCrossentropy {
    pub config: LossConfig,
}

impl SparseCategoricalCrossentropy {
    pub fn new(config: LossConfig) -> EvalResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Loss for SparseCategoricalCrossentropy {
    fn canonical_name(&self) -> &'static str {
        "sparse_categorical_crossentropy"
    }

    fn config(&self) -> &LossConfig {
        &self.config
    }

    fn per_example(&self, y_true: &ArrayD<f64>, y_pred: &ArrayD<f64>) -> EvalResult<ArrayD<f64>> {
        sparse_categorical_crossentropy(
            y_true,
            y_pred,
            self.config.from_logits,
            self.config.epsilon,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_EPSILON;
    use approx::assert_abs_diff_eq;
    use scirs2_core::ndarray::array;

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    #[test]
    fn test_bce_known_value() {
        let y_true = array![[1.0, 0.0]].into_dyn();
        let y_pred = array![[0.8, 0.4]].into_dyn();
        let out = binary_crossentropy(&y_true, &y_pred, false, 0.0, DEFAULT_EPSILON).unwrap();
        let expected = -(0.8f64.ln() + 0.6f64.ln()) / 2.0;
        assert_abs_diff_eq!(out[[0]], expected, epsilon = 1e-9);
    }

    #[test]
    fn test_bce_logits_match_probabilities() {
        let y_true = array![[1.0, 0.0, 1.0]].into_dyn();
        let logits = array![[1.5, -0.3, 0.2]].into_dyn();
        let probs = logits.mapv(sigmoid);
        let from_probs = binary_crossentropy(&y_true, &probs, false, 0.0, DEFAULT_EPSILON).unwrap();
        let from_logits = binary_crossentropy(&y_true, &logits, true, 0.0, DEFAULT_EPSILON).unwrap();
        assert_abs_diff_eq!(from_probs[[0]], from_logits[[0]], epsilon = 1e-6);
    }

    #[test]
    fn test_bce_logits_do_not_saturate() {
        let y_true = array![[0.0]].into_dyn();
        let logits = array![[100.0]].into_dyn();
        let out = binary_crossentropy(&y_true, &logits, true, 0.0, DEFAULT_EPSILON).unwrap();
        assert_abs_diff_eq!(out[[0]], 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bce_label_smoothing() {
        let y_true = array![[1.0]].into_dyn();
        let y_pred = array![[0.5]].into_dyn();
        let plain = binary_crossentropy(&y_true, &y_pred, false, 0.0, DEFAULT_EPSILON).unwrap();
        let smoothed = binary_crossentropy(&y_true, &y_pred, false, 1.0, DEFAULT_EPSILON).unwrap();
        // At p = 0.5 the loss does not depend on the label.
        assert_abs_diff_eq!(plain[[0]], smoothed[[0]], epsilon = 1e-12);

        let y_pred = array![[0.9]].into_dyn();
        let plain = binary_crossentropy(&y_true, &y_pred, false, 0.0, DEFAULT_EPSILON).unwrap();
        let smoothed = binary_crossentropy(&y_true, &y_pred, false, 0.2, DEFAULT_EPSILON).unwrap();
        assert!(smoothed[[0]] > plain[[0]]);
    }

    #[test]
    fn test_cce_sums_over_classes() {
        let y_true = array![[0.0, 1.0, 0.0], [0.0, 0.0, 1.0]].into_dyn();
        let y_pred = array![[0.05, 0.95, 0.0], [0.1, 0.8, 0.1]].into_dyn();
        let out =
            categorical_crossentropy(&y_true, &y_pred, false, 0.0, -1, DEFAULT_EPSILON).unwrap();
        assert_abs_diff_eq!(out[[0]], -0.95f64.ln(), epsilon = 1e-9);
        assert_abs_diff_eq!(out[[1]], -0.1f64.ln(), epsilon = 1e-9);
    }

    #[test]
    fn test_cce_renormalises_probabilities() {
        let y_true = array![[1.0, 0.0]].into_dyn();
        let y_pred = array![[2.0, 2.0]].into_dyn();
        let out =
            categorical_crossentropy(&y_true, &y_pred, false, 0.0, -1, DEFAULT_EPSILON).unwrap();
        assert_abs_diff_eq!(out[[0]], 2f64.ln(), epsilon = 1e-9);
    }

    #[test]
    fn test_cce_logits_and_smoothing() {
        let y_true = array![[0.0, 1.0, 0.0]].into_dyn();
        let logits = array![[1.0, 2.0, 0.5]].into_dyn();
        let probs = crate::ops::softmax_axis(&logits, -1).unwrap();
        let a = categorical_crossentropy(&y_true, &logits, true, 0.1, -1, DEFAULT_EPSILON).unwrap();
        let b = categorical_crossentropy(&y_true, &probs, false, 0.1, -1, DEFAULT_EPSILON).unwrap();
        assert_abs_diff_eq!(a[[0]], b[[0]], epsilon = 1e-6);
    }

    #[test]
    fn test_sparse_matches_one_hot() {
        let sparse = array![1.0, 2.0].into_dyn();
        let one_hot = array![[0.0, 1.0, 0.0], [0.0, 0.0, 1.0]].into_dyn();
        let y_pred = array![[0.05, 0.95, 0.0], [0.1, 0.8, 0.1]].into_dyn();

        let a = sparse_categorical_crossentropy(&sparse, &y_pred, false, DEFAULT_EPSILON).unwrap();
        let b =
            categorical_crossentropy(&one_hot, &y_pred, false, 0.0, -1, DEFAULT_EPSILON).unwrap();
        assert_abs_diff_eq!(a[[0]], b[[0]], epsilon = 1e-9);
        assert_abs_diff_eq!(a[[1]], b[[1]], epsilon = 1e-9);

        let column = array![[1.0], [2.0]].into_dyn();
        let c = sparse_categorical_crossentropy(&column, &y_pred, false, DEFAULT_EPSILON).unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn test_sparse_rejects_bad_labels() {
        let y_pred = array![[0.5, 0.5]].into_dyn();
        for bad in [2.0, -1.0, 0.5] {
            let labels = array![bad].into_dyn();
            let err = sparse_categorical_crossentropy(&labels, &y_pred, false, DEFAULT_EPSILON);
            assert!(matches!(err, Err(EvalError::InvalidArgument(_))));
        }
    }

    #[test]
    fn test_sparse_loss_through_trait() {
        let loss = SparseCategoricalCrossentropy::new(
            LossConfig::default().with_from_logits(true),
        )
        .unwrap();
        let labels = array![0.0, 1.0].into_dyn();
        let logits = array![[0.0, 0.0], [0.0, 0.0]].into_dyn();
        let value = loss.compute(&labels, &logits, None).unwrap();
        assert_abs_diff_eq!(value, 2f64.ln(), epsilon = 1e-12);
    }
}
