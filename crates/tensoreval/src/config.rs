//! Construction-time configuration for losses and metrics.

use crate::reduction::Reduction;
use crate::{EvalError, EvalResult};
use serde::{Deserialize, Serialize};

/// Fuzz factor used to guard logs and divisions.
pub const DEFAULT_EPSILON: f64 = 1e-7;

/// Decision threshold used when a metric is built without one.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Configuration shared by every loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossConfig {
    /// Overrides the canonical name.
    pub name: Option<String>,
    /// Reduction applied to the per-example losses.
    pub reduction: Reduction,
    /// Whether predictions are pre-activation scores.
    pub from_logits: bool,
    /// Smoothing factor in `[0, 1]` for cross-entropy losses.
    pub label_smoothing: f64,
    /// Class axis for class-wise losses.
    pub axis: isize,
    /// Clipping epsilon.
    pub epsilon: f64,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            name: None,
            reduction: Reduction::Auto,
            from_logits: false,
            label_smoothing: 0.0,
            axis: -1,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl LossConfig {
    pub fn with_reduction(mut self, reduction: Reduction) -> Self {
        self.reduction = reduction;
        self
    }

    pub fn with_from_logits(mut self, from_logits: bool) -> Self {
        self.from_logits = from_logits;
        self
    }

    pub fn with_label_smoothing(mut self, label_smoothing: f64) -> Self {
        self.label_smoothing = label_smoothing;
        self
    }

    pub fn with_axis(mut self, axis: isize) -> Self {
        self.axis = axis;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> EvalResult<()> {
        if !(0.0..=1.0).contains(&self.label_smoothing) {
            return Err(EvalError::InvalidConfig(format!(
                "label_smoothing must be between 0 and 1, got {}",
                self.label_smoothing
            )));
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(EvalError::InvalidConfig(format!(
                "epsilon must be positive and finite, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> EvalResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

/// Decision thresholds for confusion-matrix metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Thresholds {
    /// Explicit thresholds, each in `[0, 1]`.
    Values(Vec<f64>),
    /// `n >= 2` evenly spaced thresholds from 0 to 1 inclusive.
    Count(usize),
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds::Values(vec![DEFAULT_THRESHOLD])
    }
}

impl From<f64> for Thresholds {
    fn from(threshold: f64) -> Self {
        Thresholds::Values(vec![threshold])
    }
}

impl From<Vec<f64>> for Thresholds {
    fn from(thresholds: Vec<f64>) -> Self {
        Thresholds::Values(thresholds)
    }
}

impl Thresholds {
    /// Materialise the threshold values.
    pub fn resolve(&self) -> EvalResult<Vec<f64>> {
        match self {
            Thresholds::Values(values) => {
                if values.is_empty() {
                    return Err(EvalError::InvalidArgument(
                        "At least one threshold is required".to_string(),
                    ));
                }
                if let Some(bad) = values.iter().find(|t| !(0.0..=1.0).contains(*t)) {
                    return Err(EvalError::InvalidArgument(format!(
                        "Threshold values must be in [0, 1], got {}",
                        bad
                    )));
                }
                Ok(values.clone())
            }
            Thresholds::Count(n) => {
                if *n < 2 {
                    return Err(EvalError::InvalidArgument(format!(
                        "num_thresholds must be greater than 1, got {}",
                        n
                    )));
                }
                let last = (*n - 1) as f64;
                Ok((0..*n).map(|i| i as f64 / last).collect())
            }
        }
    }
}

/// Configuration shared by confusion-matrix metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    /// Overrides the canonical name.
    pub name: Option<String>,
    /// Decision thresholds. `None` selects the metric's own default.
    pub thresholds: Option<Thresholds>,
    /// Only the `k` highest predictions per example count as positive.
    pub top_k: Option<usize>,
    /// Restrict the metric to one class column.
    pub class_id: Option<usize>,
}

impl MetricConfig {
    pub fn with_thresholds(mut self, thresholds: impl Into<Thresholds>) -> Self {
        self.thresholds = Some(thresholds.into());
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_class_id(mut self, class_id: usize) -> Self {
        self.class_id = Some(class_id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> EvalResult<()> {
        if self.top_k == Some(0) {
            return Err(EvalError::InvalidConfig(
                "top_k must be at least 1".to_string(),
            ));
        }
        if let Some(thresholds) = &self.thresholds {
            thresholds.resolve()?;
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> EvalResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
