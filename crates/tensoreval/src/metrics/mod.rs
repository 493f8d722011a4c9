//! Streaming metrics.
//!
//! Metrics own their accumulator state and follow an update/result protocol:
//! [`Metric::update_state`] folds one batch into the state, [`Metric::result`]
//! reads it without mutation, and [`Metric::reset_state`] is the only way to
//! clear it.

use crate::EvalResult;
use scirs2_core::ndarray::{Array1, ArrayD};
use std::fmt;

mod accuracy;
mod auc;
mod confusion;
mod precision_recall;
mod reduce;
mod tracker;

pub use accuracy::{
    accuracy, binary_accuracy, binary_accuracy_default, categorical_accuracy, sparse_categorical_accuracy,
    sparse_top_k_categorical_accuracy, top_k_categorical_accuracy, DEFAULT_TOP_K,
};
pub use auc::{Auc, AucCurve, AucSummationMethod};
pub use confusion::{
    ConfusionAccumulator, ConfusionMatrixVariable, FalseNegatives, FalsePositives,
    TrueNegatives, TruePositives,
};
pub use precision_recall::{
    Precision, Recall, SensitivityAtSpecificity, SpecificityAtSensitivity,
    DEFAULT_CURVE_THRESHOLDS,
};
pub use reduce::{MeanMetricWrapper, MetricFn, MetricReduction, Reduce};
pub use tracker::MetricTracker;

/// Value reported by [`Metric::result`].
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// Single value.
    Scalar(f64),
    /// One value per threshold.
    Vector(Array1<f64>),
}

impl MetricValue {
    /// Scalar for a single-element vector, vector otherwise.
    pub fn from_per_threshold(values: Array1<f64>) -> Self {
        if values.len() == 1 {
            MetricValue::Scalar(values[0])
        } else {
            MetricValue::Vector(values)
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(v) => Some(*v),
            MetricValue::Vector(_) => None,
        }
    }

    pub fn as_vector(&self) -> Option<&Array1<f64>> {
        match self {
            MetricValue::Vector(v) => Some(v),
            MetricValue::Scalar(_) => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Scalar(v) => write!(f, "{:.6}", v),
            MetricValue::Vector(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:.6}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Trait for stateful metrics.
pub trait Metric: fmt::Debug + Send + MetricClone {
    /// Canonical or configured name.
    fn name(&self) -> &str;

    /// Fold one batch into the accumulated state.
    ///
    /// On error the state is left exactly as it was before the call.
    fn update_state(
        &mut self,
        y_true: &ArrayD<f64>,
        y_pred: &ArrayD<f64>,
        sample_weight: Option<&ArrayD<f64>>,
    ) -> EvalResult<()>;

    /// Current value of the metric.
    fn result(&self) -> MetricValue;

    /// Zero the accumulated state.
    fn reset_state(&mut self);
}

/// Helper trait for cloning boxed metrics.
pub trait MetricClone {
    fn clone_box(&self) -> Box<dyn Metric>;
}

impl<T: Metric + Clone + 'static> MetricClone for T {
    fn clone_box(&self) -> Box<dyn Metric> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Metric> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
