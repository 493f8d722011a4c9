//! Metric tracker for managing multiple streaming metrics.

use crate::EvalResult;
use scirs2_core::ndarray::ArrayD;
use std::collections::HashMap;

use super::{Metric, MetricValue};

/// Metric tracker for managing multiple metrics.
#[derive(Debug, Default)]
pub struct MetricTracker {
    /// Metrics to track.
    metrics: Vec<Box<dyn Metric>>,
    /// Recorded results per metric name.
    history: HashMap<String, Vec<MetricValue>>,
}

impl MetricTracker {
    /// Create a new metric tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a metric to track.
    pub fn add(&mut self, metric: Box<dyn Metric>) {
        let name = metric.name().to_string();
        self.history.insert(name, Vec::new());
        self.metrics.push(metric);
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Feed one batch to every metric.
    ///
    /// Either every metric takes the update or none does.
    pub fn update_all(
        &mut self,
        y_true: &ArrayD<f64>,
        y_pred: &ArrayD<f64>,
        sample_weight: Option<&ArrayD<f64>>,
    ) -> EvalResult<()> {
        let mut staged = self.metrics.clone();
        for metric in &mut staged {
            if let Err(e) = metric.update_state(y_true, y_pred, sample_weight) {
                log::debug!("Batch rejected by '{}'; no metric updated", metric.name());
                return Err(e);
            }
        }
        self.metrics = staged;
        Ok(())
    }

    /// Current result of every metric, without recording it.
    pub fn results(&self) -> HashMap<String, MetricValue> {
        self.metrics
            .iter()
            .map(|m| (m.name().to_string(), m.result()))
            .collect()
    }

    /// Read every result and append it to the history.
    pub fn record(&mut self) -> HashMap<String, MetricValue> {
        let results = self.results();
        for (name, value) in &results {
            if let Some(history) = self.history.get_mut(name) {
                history.push(value.clone());
            }
        }
        results
    }

    /// Get history for a specific metric.
    pub fn get_history(&self, metric_name: &str) -> Option<&Vec<MetricValue>> {
        self.history.get(metric_name)
    }

    /// Reset all metrics.
    pub fn reset(&mut self) {
        for metric in &mut self.metrics {
            metric.reset_state();
        }
    }

    /// Clear history.
    pub fn clear_history(&mut self) {
        for history in self.history.values_mut() {
            history.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricConfig;
    use crate::EvalError;
    use crate::metrics::{accuracy, MeanMetricWrapper, Precision, Recall};
    use scirs2_core::ndarray::array;

    #[test]
    fn test_metric_tracker() {
        let mut tracker = MetricTracker::new();
        tracker.add(Box::new(Precision::new(MetricConfig::default()).unwrap()));
        tracker.add(Box::new(Recall::new(MetricConfig::default()).unwrap()));
        tracker.add(Box::new(MeanMetricWrapper::new("accuracy", accuracy)));
        assert_eq!(tracker.len(), 3);

        let y_true = array![1.0, 0.0, 1.0, 1.0].into_dyn();
        let y_pred = array![1.0, 0.0, 1.0, 0.0].into_dyn();
        tracker.update_all(&y_true, &y_pred, None).unwrap();

        let results = tracker.record();
        assert_eq!(results["precision"], MetricValue::Scalar(1.0));
        assert_eq!(results["accuracy"], MetricValue::Scalar(0.75));

        let history = tracker.get_history("recall").unwrap();
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_failed_update_leaves_every_metric_untouched() {
        let mut tracker = MetricTracker::new();
        tracker.add(Box::new(MeanMetricWrapper::new("accuracy", accuracy)));
        tracker.add(Box::new(Precision::new(MetricConfig::default()).unwrap()));

        let y_true = array![1.0, 0.0].into_dyn();
        tracker
            .update_all(&y_true, &array![1.0, 0.0].into_dyn(), None)
            .unwrap();
        let before = tracker.results();

        // Accuracy accepts the batch, precision rejects the out-of-range prediction.
        let err = tracker.update_all(&y_true, &array![2.0, 0.0].into_dyn(), None);
        assert!(matches!(err, Err(EvalError::PredictionOutOfRange { .. })));
        assert_eq!(tracker.results(), before);
        assert_eq!(tracker.results()["accuracy"], MetricValue::Scalar(1.0));
    }

    #[test]
    fn test_reset_keeps_history() {
        let mut tracker = MetricTracker::new();
        tracker.add(Box::new(MeanMetricWrapper::new("accuracy", accuracy)));
        let y = array![1.0, 0.0].into_dyn();
        tracker.update_all(&y, &y, None).unwrap();
        tracker.record();

        tracker.reset();
        assert_eq!(tracker.results()["accuracy"], MetricValue::Scalar(0.0));
        assert_eq!(tracker.get_history("accuracy").unwrap().len(), 1);

        tracker.clear_history();
        assert!(tracker.get_history("accuracy").unwrap().is_empty());
    }
}
