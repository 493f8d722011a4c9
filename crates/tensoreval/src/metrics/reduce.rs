//! Running sums and weighted means.

use crate::losses::Loss;
use crate::metrics::{Metric, MetricValue};
use crate::ops::{broadcast_binary, broadcast_weights, div_no_nan};
use crate::shape::{remove_squeezable_dimensions, squeeze_or_expand_dimensions};
use crate::EvalResult;
use scirs2_core::ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How a [`Reduce`] metric combines values across updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricReduction {
    /// Running total.
    Sum,
    /// Total divided by the number of values seen.
    SumOverBatchSize,
    /// Total divided by the sum of the weights seen.
    #[default]
    WeightedMean,
}

/// Streaming reduction over weighted values.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduce {
    name: String,
    reduction: MetricReduction,
    total: f64,
    count: f64,
}

impl Reduce {
    pub fn new(name: impl Into<String>, reduction: MetricReduction) -> Self {
        Self {
            name: name.into(),
            reduction,
            total: 0.0,
            count: 0.0,
        }
    }

    /// Running sum.
    pub fn sum(name: impl Into<String>) -> Self {
        Self::new(name, MetricReduction::Sum)
    }

    /// Running weighted mean.
    pub fn mean(name: impl Into<String>) -> Self {
        Self::new(name, MetricReduction::WeightedMean)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reduction(&self) -> MetricReduction {
        self.reduction
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn count(&self) -> f64 {
        self.count
    }

    /// Add `values`, optionally weighted, to the running state.
    pub fn update(
        &mut self,
        values: &ArrayD<f64>,
        sample_weight: Option<&ArrayD<f64>>,
    ) -> EvalResult<()> {
        let (values, weights) = match sample_weight {
            Some(weights) => {
                let (_, values, weights) = squeeze_or_expand_dimensions::<f64, f64, f64>(
                    values.clone(),
                    None,
                    Some(weights.clone()),
                );
                let weights = match weights {
                    Some(w) => Some(broadcast_weights(&w, values.shape())?),
                    None => None,
                };
                match weights {
                    Some(w) => {
                        let weighted = broadcast_binary("reduce", &values, &w, |v, w| v * w)?;
                        (weighted, Some(w))
                    }
                    None => (values, None),
                }
            }
            None => (values.clone(), None),
        };

        let value_sum = values.sum();
        let num_values = match self.reduction {
            MetricReduction::Sum => 0.0,
            MetricReduction::SumOverBatchSize => values.len() as f64,
            MetricReduction::WeightedMean => match &weights {
                Some(w) => w.sum(),
                None => values.len() as f64,
            },
        };

        self.total += value_sum;
        self.count += num_values;
        log::debug!(
            "{}: added {} over {} values (total={}, count={})",
            self.name,
            value_sum,
            values.len(),
            self.total,
            self.count
        );
        Ok(())
    }

    /// `total` for sums, a zero-safe mean otherwise.
    pub fn value(&self) -> f64 {
        match self.reduction {
            MetricReduction::Sum => self.total,
            MetricReduction::SumOverBatchSize | MetricReduction::WeightedMean => {
                div_no_nan(self.total, self.count)
            }
        }
    }

    pub fn reset(&mut self) {
        self.total = 0.0;
        self.count = 0.0;
    }
}

/// Per-example function evaluated by a [`MeanMetricWrapper`].
pub type MetricFn =
    Arc<dyn Fn(&ArrayD<f64>, &ArrayD<f64>) -> EvalResult<ArrayD<f64>> + Send + Sync>;

/// Streaming weighted mean of a per-example function.
#[derive(Clone)]
pub struct MeanMetricWrapper {
    func: MetricFn,
    mean: Reduce,
}

impl MeanMetricWrapper {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&ArrayD<f64>, &ArrayD<f64>) -> EvalResult<ArrayD<f64>> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            mean: Reduce::mean(name),
        }
    }

    /// Track the mean per-example value of a loss.
    pub fn from_loss<L: Loss + 'static>(loss: L) -> Self {
        let name = loss.name().to_string();
        Self::new(name, move |y_true, y_pred| loss.per_example(y_true, y_pred))
    }

    pub fn state(&self) -> &Reduce {
        &self.mean
    }
}

impl fmt::Debug for MeanMetricWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeanMetricWrapper")
            .field("mean", &self.mean)
            .finish_non_exhaustive()
    }
}

impl Metric for MeanMetricWrapper {
    fn name(&self) -> &str {
        self.mean.name()
    }

    fn update_state(
        &mut self,
        y_true: &ArrayD<f64>,
        y_pred: &ArrayD<f64>,
        sample_weight: Option<&ArrayD<f64>>,
    ) -> EvalResult<()> {
        let (y_true, y_pred) = remove_squeezable_dimensions(y_true.clone(), y_pred.clone());
        let values = (self.func)(&y_true, &y_pred)?;
        self.mean.update(&values, sample_weight)
    }

    fn result(&self) -> MetricValue {
        MetricValue::Scalar(self.mean.value())
    }

    fn reset_state(&mut self) {
        self.mean.reset();
    }
}
