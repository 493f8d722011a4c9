//! Per-example accuracy functions, meant to be wrapped in a
//! [`MeanMetricWrapper`](crate::metrics::MeanMetricWrapper).

use crate::config::DEFAULT_THRESHOLD;
use crate::losses::{class_index, sparse_labels};
use crate::ops::{broadcast_binary, reduce_mean_axis};
use crate::{EvalError, EvalResult};
use scirs2_core::ndarray::{ArrayD, ArrayView1, Axis, IxDyn, Zip};

/// Default `k` for the top-k accuracies.
pub const DEFAULT_TOP_K: usize = 5;

/// First index of the largest value.
fn argmax(lane: ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (i, &v) in lane.iter().enumerate() {
        if v > lane[best] {
            best = i;
        }
    }
    best
}

/// Whether `target` is among the `k` largest entries; ties at the boundary count as inside.
fn in_top_k(lane: ArrayView1<f64>, target: usize, k: usize) -> bool {
    let value = lane[target];
    if !value.is_finite() {
        return false;
    }
    lane.iter().filter(|&&v| v > value).count() < k
}

fn class_lanes_check(operation: &str, y_pred: &ArrayD<f64>) -> EvalResult<Axis> {
    if y_pred.ndim() == 0 {
        return Err(EvalError::InvalidArgument(format!(
            "{} requires predictions with a class axis",
            operation
        )));
    }
    Ok(Axis(y_pred.ndim() - 1))
}

/// 1 where `y_true == y_pred`, elementwise.
pub fn accuracy(y_true: &ArrayD<f64>, y_pred: &ArrayD<f64>) -> EvalResult<ArrayD<f64>> {
    broadcast_binary("accuracy", y_true, y_pred, |t, p| {
        if t == p {
            1.0
        } else {
            0.0
        }
    })
}

/// Mean over the last axis of `y_true == (y_pred > threshold)`.
pub fn binary_accuracy(
    y_true: &ArrayD<f64>,
    y_pred: &ArrayD<f64>,
    threshold: f64,
) -> EvalResult<ArrayD<f64>> {
    let matches = broadcast_binary("binary_accuracy", y_true, y_pred, |t, p| {
        let predicted = if p > threshold { 1.0 } else { 0.0 };
        if t == predicted {
            1.0
        } else {
            0.0
        }
    })?;
    reduce_mean_axis(&matches, -1)
}

/// [`binary_accuracy`] with the default 0.5 threshold.
pub fn binary_accuracy_default(
    y_true: &ArrayD<f64>,
    y_pred: &ArrayD<f64>,
) -> EvalResult<ArrayD<f64>> {
    binary_accuracy(y_true, y_pred, DEFAULT_THRESHOLD)
}

/// 1 where the arg-max of the one-hot labels equals the arg-max of the predictions.
pub fn categorical_accuracy(y_true: &ArrayD<f64>, y_pred: &ArrayD<f64>) -> EvalResult<ArrayD<f64>> {
    if y_true.shape() != y_pred.shape() {
        return Err(EvalError::shape_mismatch(
            "categorical_accuracy",
            y_true.shape(),
            y_pred.shape(),
        ));
    }
    let last = class_lanes_check("categorical_accuracy", y_pred)?;
    Ok(Zip::from(y_true.lanes(last))
        .and(y_pred.lanes(last))
        .map_collect(|t, p| if argmax(t) == argmax(p) { 1.0 } else { 0.0 }))
}

/// 1 where the integer label equals the arg-max of the predictions.
pub fn sparse_categorical_accuracy(
    y_true: &ArrayD<f64>,
    y_pred: &ArrayD<f64>,
) -> EvalResult<ArrayD<f64>> {
    let last = class_lanes_check("sparse_categorical_accuracy", y_pred)?;
    let batch_shape = &y_pred.shape()[..last.index()];
    let labels = sparse_labels("sparse_categorical_accuracy", y_true, batch_shape)?;
    let mut out = ArrayD::<f64>::zeros(IxDyn(batch_shape));
    Zip::from(&mut out)
        .and(&labels)
        .and(y_pred.lanes(last))
        .for_each(|o, &label, lane| {
            *o = if label == argmax(lane) as f64 { 1.0 } else { 0.0 };
        });
    Ok(out)
}

/// 1 where the labelled class is among the `k` highest predictions.
pub fn top_k_categorical_accuracy(
    y_true: &ArrayD<f64>,
    y_pred: &ArrayD<f64>,
    k: usize,
) -> EvalResult<ArrayD<f64>> {
    if y_true.shape() != y_pred.shape() {
        return Err(EvalError::shape_mismatch(
            "top_k_categorical_accuracy",
            y_true.shape(),
            y_pred.shape(),
        ));
    }
    let last = class_lanes_check("top_k_categorical_accuracy", y_pred)?;
    Ok(Zip::from(y_true.lanes(last))
        .and(y_pred.lanes(last))
        .map_collect(|t, p| if in_top_k(p, argmax(t), k) { 1.0 } else { 0.0 }))
}

/// Top-k accuracy with integer labels.
pub fn sparse_top_k_categorical_accuracy(
    y_true: &ArrayD<f64>,
    y_pred: &ArrayD<f64>,
    k: usize,
) -> EvalResult<ArrayD<f64>> {
    let last = class_lanes_check("sparse_top_k_categorical_accuracy", y_pred)?;
    let num_classes = y_pred.len_of(last);
    let batch_shape = &y_pred.shape()[..last.index()];
    let labels = sparse_labels("sparse_top_k_categorical_accuracy", y_true, batch_shape)?;
    let mut out = ArrayD::<f64>::zeros(IxDyn(batch_shape));
    Zip::from(&mut out)
        .and(&labels)
        .and(y_pred.lanes(last))
        .for_each(|o, &label, lane| {
            let hit = class_index(label, num_classes).is_some_and(|idx| in_top_k(lane, idx, k));
            *o = if hit { 1.0 } else { 0.0 };
        });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray::array;

    #[test]
    fn test_accuracy_elementwise() {
        let out = accuracy(
            &array![1.0, 2.0, 3.0].into_dyn(),
            &array![1.0, 0.0, 3.0].into_dyn(),
        )
        .unwrap();
        assert_eq!(out, array![1.0, 0.0, 1.0].into_dyn());
    }

    #[test]
    fn test_binary_accuracy() {
        let y_true = array![[1.0, 0.0], [1.0, 1.0]].into_dyn();
        let y_pred = array![[0.9, 0.6], [0.5, 0.7]].into_dyn();
        let out = binary_accuracy_default(&y_true, &y_pred).unwrap();
        assert_eq!(out, array![0.5, 0.5].into_dyn());
        let out = binary_accuracy(&y_true, &y_pred, 0.4).unwrap();
        assert_eq!(out, array![0.5, 1.0].into_dyn());
    }

    #[test]
    fn test_categorical_accuracy() {
        let y_true = array![[0.0, 0.0, 1.0], [0.0, 1.0, 0.0]].into_dyn();
        let y_pred = array![[0.1, 0.9, 0.8], [0.05, 0.95, 0.0]].into_dyn();
        let out = categorical_accuracy(&y_true, &y_pred).unwrap();
        assert_eq!(out, array![0.0, 1.0].into_dyn());
    }

    #[test]
    fn test_sparse_categorical_accuracy() {
        let y_pred = array![[0.1, 0.9, 0.8], [0.05, 0.95, 0.0]].into_dyn();
        let out = sparse_categorical_accuracy(&array![2.0, 1.0].into_dyn(), &y_pred).unwrap();
        assert_eq!(out, array![0.0, 1.0].into_dyn());
        let column = array![[2.0], [1.0]].into_dyn();
        assert_eq!(sparse_categorical_accuracy(&column, &y_pred).unwrap(), out);
    }

    #[test]
    fn test_top_k_accuracies() {
        let y_true = array![[0.0, 0.0, 1.0], [0.0, 1.0, 0.0]].into_dyn();
        let y_pred = array![[0.1, 0.9, 0.8], [0.05, 0.95, 0.0]].into_dyn();
        let out = top_k_categorical_accuracy(&y_true, &y_pred, 1).unwrap();
        assert_eq!(out, array![0.0, 1.0].into_dyn());
        let out = top_k_categorical_accuracy(&y_true, &y_pred, 2).unwrap();
        assert_eq!(out, array![1.0, 1.0].into_dyn());

        let sparse = array![2.0, 0.0].into_dyn();
        let out = sparse_top_k_categorical_accuracy(&sparse, &y_pred, 2).unwrap();
        assert_eq!(out, array![1.0, 0.0].into_dyn());
    }

    #[test]
    fn test_top_k_ties_count_as_hits() {
        let lane = array![0.5, 0.5, 0.1];
        assert!(in_top_k(lane.view(), 1, 1));
        assert!(!in_top_k(lane.view(), 2, 2));
    }

    #[test]
    fn test_sparse_out_of_range_label_is_a_miss() {
        let y_pred = array![[0.2, 0.8]].into_dyn();
        let out = sparse_top_k_categorical_accuracy(&array![5.0].into_dyn(), &y_pred, 1).unwrap();
        assert_eq!(out, array![0.0].into_dyn());
    }
}
