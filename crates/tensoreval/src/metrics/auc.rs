//! Area under the ROC or precision-recall curve, approximated with a Riemann sum
//! over confusion-matrix counters.

use crate::config::DEFAULT_EPSILON;
use crate::metrics::{ConfusionAccumulator, ConfusionMatrixVariable, Metric, MetricValue};
use crate::ops::{div_no_nan, div_no_nan_vec};
use crate::{EvalError, EvalResult};
use scirs2_core::ndarray::{s, Array1, ArrayD};
use serde::{Deserialize, Serialize};

use super::precision_recall::DEFAULT_CURVE_THRESHOLDS;

/// Curve whose area is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AucCurve {
    /// Recall against false-positive rate.
    #[default]
    Roc,
    /// Precision against recall.
    Pr,
}

/// How the height of each bucket is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AucSummationMethod {
    /// Trapezoids for ROC; interpolated precision for PR.
    #[default]
    Interpolation,
    /// Lower bound: the smaller endpoint.
    Minoring,
    /// Upper bound: the larger endpoint.
    Majoring,
}

/// Streaming approximation of the area under a curve.
#[derive(Debug, Clone)]
pub struct Auc {
    curve: AucCurve,
    summation_method: AucSummationMethod,
    accumulator: ConfusionAccumulator,
}

impl Default for Auc {
    fn default() -> Self {
        Self::build(
            DEFAULT_CURVE_THRESHOLDS,
            AucCurve::Roc,
            AucSummationMethod::Interpolation,
        )
    }
}

impl Auc {
    /// Build with `num_thresholds` buckets.
    ///
    /// The outer thresholds sit just outside `[0, 1]` so that predictions of
    /// exactly 0 or 1 land on the curve endpoints.
    pub fn new(
        num_thresholds: usize,
        curve: AucCurve,
        summation_method: AucSummationMethod,
    ) -> EvalResult<Self> {
        if num_thresholds < 2 {
            return Err(EvalError::InvalidConfig(format!(
                "AUC needs at least 2 thresholds, got {}",
                num_thresholds
            )));
        }
        Ok(Self::build(num_thresholds, curve, summation_method))
    }

    fn build(num_thresholds: usize, curve: AucCurve, summation_method: AucSummationMethod) -> Self {
        let last = (num_thresholds - 1) as f64;
        let mut thresholds: Vec<f64> = (0..num_thresholds).map(|i| i as f64 / last).collect();
        thresholds[0] = -DEFAULT_EPSILON;
        thresholds[num_thresholds - 1] = 1.0 + DEFAULT_EPSILON;

        let name = match curve {
            AucCurve::Roc => "auc",
            AucCurve::Pr => "pr_auc",
        };
        let accumulator =
            ConfusionAccumulator::with_raw_thresholds(name, &ConfusionMatrixVariable::ALL, thresholds);
        Self {
            curve,
            summation_method,
            accumulator,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.accumulator = self.accumulator.renamed(name);
        self
    }

    pub fn curve(&self) -> AucCurve {
        self.curve
    }

    pub fn accumulator(&self) -> &ConfusionAccumulator {
        &self.accumulator
    }

    /// Area computed from the current counters.
    pub fn area(&self) -> f64 {
        use ConfusionMatrixVariable::*;
        let tp = self.accumulator.counts(TruePositives);
        let fp = self.accumulator.counts(FalsePositives);
        let tn = self.accumulator.counts(TrueNegatives);
        let fn_ = self.accumulator.counts(FalseNegatives);

        if self.curve == AucCurve::Pr && self.summation_method == AucSummationMethod::Interpolation
        {
            return interpolate_pr_auc(&tp, &fp, &fn_);
        }

        let recall = div_no_nan_vec(&tp, &(&tp + &fn_));
        let (x, y) = match self.curve {
            AucCurve::Roc => (div_no_nan_vec(&fp, &(&fp + &tn)), recall),
            AucCurve::Pr => (recall, div_no_nan_vec(&tp, &(&tp + &fp))),
        };

        let n = x.len();
        let lower = y.slice(s![..n - 1]);
        let upper = y.slice(s![1..]);
        let heights: Array1<f64> = match self.summation_method {
            AucSummationMethod::Interpolation => (&lower + &upper) / 2.0,
            AucSummationMethod::Minoring => {
                lower.iter().zip(upper.iter()).map(|(a, b)| a.min(*b)).collect()
            }
            AucSummationMethod::Majoring => {
                lower.iter().zip(upper.iter()).map(|(a, b)| a.max(*b)).collect()
            }
        };
        let widths = &x.slice(s![..n - 1]) - &x.slice(s![1..]);
        (&widths * &heights).sum()
    }
}

/// Precision-recall area with precision interpolated linearly in the number of
/// predicted positives between buckets (Davis & Goadrich, 2006).
fn interpolate_pr_auc(tp: &Array1<f64>, fp: &Array1<f64>, fn_: &Array1<f64>) -> f64 {
    let n = tp.len();
    let predicted = tp + fp;
    let mut area = 0.0;
    for i in 0..n - 1 {
        let dtp = tp[i] - tp[i + 1];
        let dp = predicted[i] - predicted[i + 1];
        let slope = div_no_nan(dtp, dp.max(0.0));
        let intercept = tp[i + 1] - slope * predicted[i + 1];
        let p_ratio = if predicted[i] > 0.0 && predicted[i + 1] > 0.0 {
            div_no_nan(predicted[i], predicted[i + 1].max(0.0))
        } else {
            1.0
        };
        let bucket = slope * (dtp + intercept * p_ratio.ln());
        area += div_no_nan(bucket, (tp[i + 1] + fn_[i + 1]).max(0.0));
    }
    area
}

impl Metric for Auc {
    fn name(&self) -> &str {
        self.accumulator.name()
    }

    fn update_state(
        &mut self,
        y_true: &ArrayD<f64>,
        y_pred: &ArrayD<f64>,
        sample_weight: Option<&ArrayD<f64>>,
    ) -> EvalResult<()> {
        self.accumulator
            .update(y_true, y_pred, sample_weight, None, None)
    }

    fn result(&self) -> MetricValue {
        MetricValue::Scalar(self.area())
    }

    fn reset_state(&mut self) {
        self.accumulator.reset();
    }
}
