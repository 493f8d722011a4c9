//! Rates derived from confusion-matrix counters.

use crate::config::{MetricConfig, Thresholds, DEFAULT_THRESHOLD};
use crate::metrics::confusion::metric_thresholds;
use crate::metrics::{ConfusionAccumulator, ConfusionMatrixVariable, Metric, MetricValue};
use crate::ops::div_no_nan_vec;
use crate::shape::ShapeReconciler;
use crate::{EvalError, EvalResult};
use scirs2_core::ndarray::{Array1, ArrayD};

use ConfusionMatrixVariable::{FalseNegatives, FalsePositives, TrueNegatives, TruePositives};

/// Default number of thresholds for the sensitivity/specificity metrics.
pub const DEFAULT_CURVE_THRESHOLDS: usize = 200;

/// `a / (a + b)` per threshold, 0 where the denominator is 0.
fn rate(a: &Array1<f64>, b: &Array1<f64>) -> Array1<f64> {
    div_no_nan_vec(a, &(a + b))
}

/// Precision `TP / (TP + FP)` per threshold.
#[derive(Debug, Clone)]
pub struct Precision {
    config: MetricConfig,
    accumulator: ConfusionAccumulator,
}

impl Precision {
    pub fn new(config: MetricConfig) -> EvalResult<Self> {
        let thresholds = metric_thresholds(&config, Thresholds::default())?;
        let name = config.name.clone().unwrap_or_else(|| "precision".to_string());
        let accumulator =
            ConfusionAccumulator::new(name, &[TruePositives, FalsePositives], thresholds)?;
        Ok(Self { config, accumulator })
    }

    /// Declared input shapes used to plan rank reconciliation.
    pub fn with_shape_hints(mut self, reconciler: ShapeReconciler) -> Self {
        self.accumulator = self.accumulator.with_reconciler(reconciler);
        self
    }

    pub fn accumulator(&self) -> &ConfusionAccumulator {
        &self.accumulator
    }
}

impl Metric for Precision {
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
        let tp = self.accumulator.counts(TruePositives);
        let fp = self.accumulator.counts(FalsePositives);
        MetricValue::from_per_threshold(rate(&tp, &fp))
    }

    fn reset_state(&mut self) {
        self.accumulator.reset();
    }
}

/// Recall `TP / (TP + FN)` per threshold.
#[derive(Debug, Clone)]
pub struct Recall {
    config: MetricConfig,
    accumulator: ConfusionAccumulator,
}

impl Recall {
    pub fn new(config: MetricConfig) -> EvalResult<Self> {
        let thresholds = metric_thresholds(&config, Thresholds::default())?;
        let name = config.name.clone().unwrap_or_else(|| "recall".to_string());
        let accumulator =
            ConfusionAccumulator::new(name, &[TruePositives, FalseNegatives], thresholds)?;
        Ok(Self { config, accumulator })
    }

    /// Declared input shapes used to plan rank reconciliation.
    pub fn with_shape_hints(mut self, reconciler: ShapeReconciler) -> Self {
        self.accumulator = self.accumulator.with_reconciler(reconciler);
        self
    }

    pub fn accumulator(&self) -> &ConfusionAccumulator {
        &self.accumulator
    }
}

impl Metric for Recall {
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
        let tp = self.accumulator.counts(TruePositives);
        let fn_ = self.accumulator.counts(FalseNegatives);
        MetricValue::from_per_threshold(rate(&tp, &fn_))
    }

    fn reset_state(&mut self) {
        self.accumulator.reset();
    }
}

/// Thresholds for the curve metrics: `[0.5]` for one, evenly spaced otherwise.
fn curve_thresholds(num_thresholds: usize) -> EvalResult<Vec<f64>> {
    match num_thresholds {
        0 => Err(EvalError::InvalidConfig(
            "num_thresholds must be at least 1".to_string(),
        )),
        1 => Ok(vec![DEFAULT_THRESHOLD]),
        n => Thresholds::Count(n).resolve(),
    }
}

fn check_unit(what: &str, value: f64) -> EvalResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(EvalError::InvalidConfig(format!(
            "{} must be in [0, 1], got {}",
            what, value
        )));
    }
    Ok(())
}

/// Index of the value closest to `target`; the first one wins ties.
fn closest_index(values: &Array1<f64>, target: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, &v) in values.iter().enumerate() {
        let dist = (v - target).abs();
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

/// Shared state of the two sensitivity/specificity metrics.
#[derive(Debug, Clone)]
struct SensitivitySpecificity {
    accumulator: ConfusionAccumulator,
    class_id: Option<usize>,
}

impl SensitivitySpecificity {
    fn new(name: String, num_thresholds: usize, class_id: Option<usize>) -> EvalResult<Self> {
        let thresholds = curve_thresholds(num_thresholds)?;
        let accumulator =
            ConfusionAccumulator::new(name, &ConfusionMatrixVariable::ALL, thresholds)?;
        Ok(Self {
            accumulator,
            class_id,
        })
    }

    fn update(
        &mut self,
        y_true: &ArrayD<f64>,
        y_pred: &ArrayD<f64>,
        sample_weight: Option<&ArrayD<f64>>,
    ) -> EvalResult<()> {
        self.accumulator
            .update(y_true, y_pred, sample_weight, None, self.class_id)
    }

    /// `(sensitivity, specificity)` per threshold.
    fn rates(&self) -> (Array1<f64>, Array1<f64>) {
        let tp = self.accumulator.counts(TruePositives);
        let fp = self.accumulator.counts(FalsePositives);
        let tn = self.accumulator.counts(TrueNegatives);
        let fn_ = self.accumulator.counts(FalseNegatives);
        (rate(&tp, &fn_), rate(&tn, &fp))
    }
}

/// Sensitivity at the threshold whose specificity is closest to a target.
#[derive(Debug, Clone)]
pub struct SensitivityAtSpecificity {
    /// Target specificity in `[0, 1]`.
    pub specificity: f64,
    inner: SensitivitySpecificity,
}

impl SensitivityAtSpecificity {
    pub fn new(specificity: f64) -> EvalResult<Self> {
        Self::with_options(specificity, DEFAULT_CURVE_THRESHOLDS, None, None)
    }

    pub fn with_options(
        specificity: f64,
        num_thresholds: usize,
        class_id: Option<usize>,
        name: Option<String>,
    ) -> EvalResult<Self> {
        check_unit("specificity", specificity)?;
        let name = name.unwrap_or_else(|| "sensitivity_at_specificity".to_string());
        Ok(Self {
            specificity,
            inner: SensitivitySpecificity::new(name, num_thresholds, class_id)?,
        })
    }

    pub fn accumulator(&self) -> &ConfusionAccumulator {
        &self.inner.accumulator
    }
}

impl Metric for SensitivityAtSpecificity {
    fn name(&self) -> &str {
        self.inner.accumulator.name()
    }

    fn update_state(
        &mut self,
        y_true: &ArrayD<f64>,
        y_pred: &ArrayD<f64>,
        sample_weight: Option<&ArrayD<f64>>,
    ) -> EvalResult<()> {
        self.inner.update(y_true, y_pred, sample_weight)
    }

    fn result(&self) -> MetricValue {
        let (sensitivity, specificity) = self.inner.rates();
        let idx = closest_index(&specificity, self.specificity);
        MetricValue::Scalar(sensitivity[idx])
    }

    fn reset_state(&mut self) {
        self.inner.accumulator.reset();
    }
}

/// Specificity at the threshold whose sensitivity is closest to a target.
#[derive(Debug, Clone)]
pub struct SpecificityAtSensitivity {
    /// Target sensitivity in `[0, 1]`.
    pub sensitivity: f64,
    inner: SensitivitySpecificity,
}

impl SpecificityAtSensitivity {
    pub fn new(sensitivity: f64) -> EvalResult<Self> {
        Self::with_options(sensitivity, DEFAULT_CURVE_THRESHOLDS, None, None)
    }

    pub fn with_options(
        sensitivity: f64,
        num_thresholds: usize,
        class_id: Option<usize>,
        name: Option<String>,
    ) -> EvalResult<Self> {
        check_unit("sensitivity", sensitivity)?;
        let name = name.unwrap_or_else(|| "specificity_at_sensitivity".to_string());
        Ok(Self {
            sensitivity,
            inner: SensitivitySpecificity::new(name, num_thresholds, class_id)?,
        })
    }

    pub fn accumulator(&self) -> &ConfusionAccumulator {
        &self.inner.accumulator
    }
}

impl Metric for SpecificityAtSensitivity {
    fn name(&self) -> &str {
        self.inner.accumulator.name()
    }

    fn update_state(
        &mut self,
        y_true: &ArrayD<f64>,
        y_pred: &ArrayD<f64>,
        sample_weight: Option<&ArrayD<f64>>,
    ) -> EvalResult<()> {
        self.inner.update(y_true, y_pred, sample_weight)
    }

    fn result(&self) -> MetricValue {
        let (sensitivity, specificity) = self.inner.rates();
        let idx = closest_index(&sensitivity, self.sensitivity);
        MetricValue::Scalar(specificity[idx])
    }

    fn reset_state(&mut self) {
        self.inner.accumulator.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{DimSize, TensorShape};
    use approx::assert_abs_diff_eq;
    use scirs2_core::ndarray::array;

    fn scalar(metric: &dyn Metric) -> f64 {
        metric.result().as_scalar().unwrap()
    }

    #[test]
    fn test_precision_and_recall() {
        let y_true = array![1.0, 0.0, 1.0, 1.0].into_dyn();
        let y_pred = array![0.9, 0.7, 0.8, 0.4].into_dyn();

        let mut precision = Precision::new(MetricConfig::default()).unwrap();
        let mut recall = Recall::new(MetricConfig::default()).unwrap();
        precision.update_state(&y_true, &y_pred, None).unwrap();
        recall.update_state(&y_true, &y_pred, None).unwrap();

        assert_abs_diff_eq!(scalar(&precision), 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(scalar(&recall), 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_state_is_zero() {
        let precision = Precision::new(MetricConfig::default()).unwrap();
        assert_eq!(precision.result(), MetricValue::Scalar(0.0));
    }

    #[test]
    fn test_result_is_repeatable() {
        let mut recall = Recall::new(MetricConfig::default()).unwrap();
        recall
            .update_state(&array![1.0, 1.0].into_dyn(), &array![0.9, 0.1].into_dyn(), None)
            .unwrap();
        let first = recall.result();
        assert_eq!(first, recall.result());
        assert_eq!(first, MetricValue::Scalar(0.5));
    }

    #[test]
    fn test_hinted_precision_matches_unhinted() {
        let y_true = array![[1.0], [0.0], [1.0], [0.0]].into_dyn();
        let y_pred = array![0.9, 0.7, 0.8, 0.2].into_dyn();
        let hints = ShapeReconciler::with_hints(
            Some(TensorShape::new(vec![DimSize::Dynamic, DimSize::Static(1)])),
            Some(TensorShape::new(vec![DimSize::Dynamic])),
            None,
        );

        let mut hinted = Precision::new(MetricConfig::default()).unwrap().with_shape_hints(hints);
        let mut plain = Precision::new(MetricConfig::default()).unwrap();
        hinted.update_state(&y_true, &y_pred, None).unwrap();
        plain.update_state(&y_true, &y_pred, None).unwrap();
        assert_eq!(hinted.result(), plain.result());
        assert_abs_diff_eq!(scalar(&hinted), 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_precision_multiple_thresholds() {
        let mut precision =
            Precision::new(MetricConfig::default().with_thresholds(vec![0.3, 0.85])).unwrap();
        let y_true = array![1.0, 0.0, 1.0].into_dyn();
        let y_pred = array![0.9, 0.5, 0.4].into_dyn();
        precision.update_state(&y_true, &y_pred, None).unwrap();
        let values = precision.result();
        let values = values.as_vector().unwrap();
        assert_abs_diff_eq!(values[0], 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(values[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sensitivity_at_specificity() {
        let mut metric = SensitivityAtSpecificity::new(0.5).unwrap();
        let y_true = array![0.0, 0.0, 1.0, 1.0].into_dyn();
        let y_pred = array![0.0, 0.5, 0.3, 0.9].into_dyn();
        metric.update_state(&y_true, &y_pred, None).unwrap();
        // Specificity 0.5 is first reached at threshold 0, where both positives are caught.
        assert_abs_diff_eq!(scalar(&metric), 1.0, epsilon = 1e-12);
        assert_eq!(metric.accumulator().num_thresholds(), DEFAULT_CURVE_THRESHOLDS);
    }

    #[test]
    fn test_specificity_at_sensitivity() {
        let mut metric = SpecificityAtSensitivity::new(1.0).unwrap();
        let y_true = array![0.0, 0.0, 1.0, 1.0].into_dyn();
        let y_pred = array![0.1, 0.6, 0.4, 0.9].into_dyn();
        metric.update_state(&y_true, &y_pred, None).unwrap();
        // Full sensitivity first holds at threshold 0, where every prediction is positive.
        assert_abs_diff_eq!(scalar(&metric), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_curve_metric_validation() {
        assert!(SensitivityAtSpecificity::new(1.5).is_err());
        assert!(SpecificityAtSensitivity::with_options(0.5, 0, None, None).is_err());
        let single = SpecificityAtSensitivity::with_options(0.5, 1, None, None).unwrap();
        assert_eq!(single.accumulator().thresholds(), &array![0.5]);
    }
}
