//! Confusion-matrix accumulation over a set of decision thresholds.
//!
//! A [`ConfusionAccumulator`] owns one counter per requested
//! [`ConfusionMatrixVariable`], each of shape `[num_thresholds]`. An update
//! compares every prediction against every threshold at once: predictions and
//! thresholds are tiled to `[num_thresholds, N]` and the weighted matches are
//! summed over the second axis. A single threshold goes through the same path.

use crate::config::{MetricConfig, Thresholds};
use crate::metrics::{Metric, MetricValue};
use crate::ops::{broadcast_weights, flatten, resolve_axis, top_k_mask};
use crate::shape::ShapeReconciler;
use crate::{EvalError, EvalResult};
use scirs2_core::ndarray::{Array1, Array2, ArrayD, Axis, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One cell of the binary confusion matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfusionMatrixVariable {
    TruePositives,
    FalsePositives,
    TrueNegatives,
    FalseNegatives,
}

impl ConfusionMatrixVariable {
    pub const ALL: [ConfusionMatrixVariable; 4] = [
        ConfusionMatrixVariable::TruePositives,
        ConfusionMatrixVariable::FalsePositives,
        ConfusionMatrixVariable::TrueNegatives,
        ConfusionMatrixVariable::FalseNegatives,
    ];

    /// `(label_is_positive, prediction_is_positive)` selecting this cell.
    fn conditions(self) -> (bool, bool) {
        match self {
            ConfusionMatrixVariable::TruePositives => (true, true),
            ConfusionMatrixVariable::FalsePositives => (false, true),
            ConfusionMatrixVariable::TrueNegatives => (false, false),
            ConfusionMatrixVariable::FalseNegatives => (true, false),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfusionMatrixVariable::TruePositives => "true_positives",
            ConfusionMatrixVariable::FalsePositives => "false_positives",
            ConfusionMatrixVariable::TrueNegatives => "true_negatives",
            ConfusionMatrixVariable::FalseNegatives => "false_negatives",
        }
    }
}

impl fmt::Display for ConfusionMatrixVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Persistent confusion-matrix counters for one metric instance.
#[derive(Debug, Clone)]
pub struct ConfusionAccumulator {
    name: String,
    thresholds: Array1<f64>,
    variables: Vec<ConfusionMatrixVariable>,
    counters: Vec<Array1<f64>>,
    reconciler: ShapeReconciler,
}

impl ConfusionAccumulator {
    /// Counters for `variables`, all zero, one slot per threshold.
    pub fn new(
        name: impl Into<String>,
        variables: &[ConfusionMatrixVariable],
        thresholds: Vec<f64>,
    ) -> EvalResult<Self> {
        let thresholds = Thresholds::Values(thresholds).resolve()?;
        if variables.is_empty() {
            return Err(EvalError::InvalidArgument(
                "At least one confusion-matrix variable is required".to_string(),
            ));
        }
        Ok(Self::with_raw_thresholds(name, variables, thresholds))
    }

    /// Like [`ConfusionAccumulator::new`] without range checks on the thresholds.
    pub(crate) fn with_raw_thresholds(
        name: impl Into<String>,
        variables: &[ConfusionMatrixVariable],
        thresholds: Vec<f64>,
    ) -> Self {
        let mut unique = Vec::with_capacity(variables.len());
        for &variable in variables {
            if !unique.contains(&variable) {
                unique.push(variable);
            }
        }
        let counters = vec![Array1::zeros(thresholds.len()); unique.len()];
        Self {
            name: name.into(),
            thresholds: Array1::from(thresholds),
            variables: unique,
            counters,
            reconciler: ShapeReconciler::new(),
        }
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Use declared shapes as a fast path for rank reconciliation.
    pub fn with_reconciler(mut self, reconciler: ShapeReconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thresholds(&self) -> &Array1<f64> {
        &self.thresholds
    }

    pub fn num_thresholds(&self) -> usize {
        self.thresholds.len()
    }

    pub fn variables(&self) -> &[ConfusionMatrixVariable] {
        &self.variables
    }

    /// Current counts for `variable`, if it is tracked.
    pub fn get(&self, variable: ConfusionMatrixVariable) -> Option<&Array1<f64>> {
        self.variables
            .iter()
            .position(|&v| v == variable)
            .map(|idx| &self.counters[idx])
    }

    /// Current counts for `variable`, zeros when it is not tracked.
    pub fn counts(&self, variable: ConfusionMatrixVariable) -> Array1<f64> {
        self.get(variable)
            .cloned()
            .unwrap_or_else(|| Array1::zeros(self.num_thresholds()))
    }

    /// Zero every counter.
    pub fn reset(&mut self) {
        for counter in &mut self.counters {
            counter.fill(0.0);
        }
    }

    /// Fold one batch into the counters.
    ///
    /// Predictions must lie in `[0, 1]`. With `top_k`, only the `k` largest
    /// predictions along the last axis can be positive. With `class_id`, labels
    /// and predictions are restricted to that column of the last axis. Nothing
    /// is written unless the whole update succeeds.
    pub fn update(
        &mut self,
        y_true: &ArrayD<f64>,
        y_pred: &ArrayD<f64>,
        sample_weight: Option<&ArrayD<f64>>,
        top_k: Option<usize>,
        class_id: Option<usize>,
    ) -> EvalResult<()> {
        if let Some(&value) = y_pred.iter().find(|v| !(0.0..=1.0).contains(*v)) {
            return Err(EvalError::PredictionOutOfRange {
                metric: self.name.clone(),
                value,
            });
        }

        let (labels, predictions, weights) = self.reconciler.reconcile(
            Some(y_true.clone()),
            y_pred.clone(),
            sample_weight.cloned(),
        );
        let mut labels = labels.unwrap_or_else(|| y_true.clone());
        let mut predictions = predictions;
        let mut weights = weights;

        if let Some(k) = top_k {
            predictions = top_k_mask(&predictions, k)?;
        }
        if let Some(id) = class_id {
            // Weights carrying the class axis lose it along with the inputs.
            if let Some(w) = weights.take() {
                weights = Some(if w.ndim() > 0 && w.ndim() == predictions.ndim() {
                    select_weight_class(&self.name, w, id)?
                } else {
                    w
                });
            }
            labels = select_class(&self.name, labels, id)?;
            predictions = select_class(&self.name, predictions, id)?;
        }

        if labels.shape() != predictions.shape() {
            return Err(EvalError::shape_mismatch(
                &self.name,
                labels.shape(),
                predictions.shape(),
            ));
        }
        let num_predictions = predictions.len();

        let weights = match weights {
            Some(w) => Some(flatten(&broadcast_weights(&w, predictions.shape())?)),
            None => None,
        };
        let label_row: Array1<bool> = labels.iter().map(|&l| l != 0.0).collect();
        let pred_row = flatten(&predictions);

        let deltas = self.weighted_counts(&label_row, &pred_row, weights.as_ref())?;
        for (counter, delta) in self.counters.iter_mut().zip(deltas) {
            *counter += &delta;
        }

        log::debug!(
            "{}: updated {:?} over {} thresholds with {} predictions (top_k={:?}, class_id={:?})",
            self.name,
            self.variables,
            self.thresholds.len(),
            num_predictions,
            top_k,
            class_id
        );
        Ok(())
    }

    /// Per-variable weighted match counts for one batch, shape `[num_thresholds]` each.
    fn weighted_counts(
        &self,
        labels: &Array1<bool>,
        predictions: &Array1<f64>,
        weights: Option<&Array1<f64>>,
    ) -> EvalResult<Vec<Array1<f64>>> {
        let num_thresholds = self.thresholds.len();
        let n = predictions.len();
        let shape = (num_thresholds, n);
        let tile_error = || {
            EvalError::shape_mismatch(&self.name, &[num_thresholds, 1], &[1, n])
        };

        let thresholds_col = self.thresholds.view().insert_axis(Axis(1));
        let tiled_thresholds = thresholds_col.broadcast(shape).ok_or_else(tile_error)?;
        let tiled_predictions = predictions
            .view()
            .insert_axis(Axis(0))
            .broadcast(shape)
            .ok_or_else(tile_error)?
            .to_owned();
        let tiled_labels = labels
            .view()
            .insert_axis(Axis(0))
            .broadcast(shape)
            .ok_or_else(tile_error)?
            .to_owned();
        let tiled_weights = match weights {
            Some(w) => w
                .view()
                .insert_axis(Axis(0))
                .broadcast(shape)
                .ok_or_else(tile_error)?
                .to_owned(),
            None => Array2::ones(shape),
        };

        let pred_is_positive: Array2<bool> = Zip::from(&tiled_predictions)
            .and(&tiled_thresholds)
            .map_collect(|&p, &t| p > t);

        Ok(self
            .variables
            .iter()
            .map(|variable| {
                let (label_cond, pred_cond) = variable.conditions();
                Zip::from(&tiled_labels)
                    .and(&pred_is_positive)
                    .and(&tiled_weights)
                    .map_collect(|&l, &p, &w| {
                        if l == label_cond && p == pred_cond {
                            w
                        } else {
                            0.0
                        }
                    })
                    .sum_axis(Axis(1))
            })
            .collect())
    }
}

/// Keep one column of the last axis.
fn select_class(metric: &str, array: ArrayD<f64>, class_id: usize) -> EvalResult<ArrayD<f64>> {
    let last = resolve_axis(-1, array.ndim()).map_err(|_| {
        EvalError::InvalidArgument(format!(
            "{}: class_id requires inputs with a class axis",
            metric
        ))
    })?;
    let num_classes = array.len_of(Axis(last));
    if class_id >= num_classes {
        return Err(EvalError::InvalidArgument(format!(
            "{}: class_id {} out of range for {} classes",
            metric, class_id, num_classes
        )));
    }
    Ok(array.index_axis_move(Axis(last), class_id))
}

/// Drop the class axis of weights: a singleton is squeezed, otherwise `class_id` is kept.
fn select_weight_class(
    metric: &str,
    weights: ArrayD<f64>,
    class_id: usize,
) -> EvalResult<ArrayD<f64>> {
    let last = weights.ndim() - 1;
    if weights.len_of(Axis(last)) == 1 {
        Ok(weights.index_axis_move(Axis(last), 0))
    } else {
        select_class(metric, weights, class_id)
    }
}

/// Resolve the threshold configuration of a metric, falling back to `default`.
pub(crate) fn metric_thresholds(config: &MetricConfig, default: Thresholds) -> EvalResult<Vec<f64>> {
    config.validate()?;
    config.thresholds.as_ref().unwrap_or(&default).resolve()
}

macro_rules! count_metric {
    ($(#[$meta:meta])* $ty:ident, $canonical:literal, $variable:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $ty {
            config: MetricConfig,
            accumulator: ConfusionAccumulator,
        }

        impl $ty {
            pub fn new(config: MetricConfig) -> EvalResult<Self> {
                let thresholds = metric_thresholds(&config, Thresholds::default())?;
                let name = config.name.clone().unwrap_or_else(|| $canonical.to_string());
                let accumulator = ConfusionAccumulator::new(name, &[$variable], thresholds)?;
                Ok(Self { config, accumulator })
            }

            pub fn accumulator(&self) -> &ConfusionAccumulator {
                &self.accumulator
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self {
                    config: MetricConfig::default(),
                    accumulator: ConfusionAccumulator::with_raw_thresholds(
                        $canonical,
                        &[$variable],
                        vec![crate::config::DEFAULT_THRESHOLD],
                    ),
                }
            }
        }

        impl Metric for $ty {
            fn name(&self) -> &str {
                self.accumulator.name()
            }

            fn update_state(
                &mut self,
                y_true: &ArrayD<f64>,
                y_pred: &ArrayD<f64>,
                sample_weight: Option<&ArrayD<f64>>,
            ) -> EvalResult<()> {
                self.accumulator.update(
                    y_true,
                    y_pred,
                    sample_weight,
                    self.config.top_k,
                    self.config.class_id,
                )
            }

            fn result(&self) -> MetricValue {
                MetricValue::from_per_threshold(self.accumulator.counts($variable))
            }

            fn reset_state(&mut self) {
                self.accumulator.reset();
            }
        }
    };
}

count_metric!(
    /// Weighted number of true positives per threshold.
    TruePositives,
    "true_positives",
    ConfusionMatrixVariable::TruePositives
);

count_metric!(
    /// Weighted number of false positives per threshold.
    FalsePositives,
    "false_positives",
    ConfusionMatrixVariable::FalsePositives
);

count_metric!(
    /// Weighted number of true negatives per threshold.
    TrueNegatives,
    "true_negatives",
    ConfusionMatrixVariable::TrueNegatives
);

count_metric!(
    /// Weighted number of false negatives per threshold.
    FalseNegatives,
    "false_negatives",
    ConfusionMatrixVariable::FalseNegatives
);
