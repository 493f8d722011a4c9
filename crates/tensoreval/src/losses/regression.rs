//! Regression losses and cosine similarity.

use crate::config::LossConfig;
use crate::losses::Loss;
use crate::ops::{broadcast_binary, l2_normalize, reduce_mean_axis, reduce_sum_axis, softplus};
use crate::{EvalError, EvalResult};
use scirs2_core::ndarray::ArrayD;
use std::f64::consts::LN_2;

/// Epsilon guarding the L2 norm in [`cosine_similarity`].
const COSINE_EPSILON: f64 = 1e-12;

/// `mean((y_pred - y_true)^2)` over the last axis.
pub fn mean_squared_error(y_true: &ArrayD<f64>, y_pred: &ArrayD<f64>) -> EvalResult<ArrayD<f64>> {
    let sq = broadcast_binary("mean_squared_error", y_pred, y_true, |p, t| {
        let diff = p - t;
        diff * diff
    })?;
    reduce_mean_axis(&sq, -1)
}

/// `mean(|y_pred - y_true|)` over the last axis.
pub fn mean_absolute_error(y_true: &ArrayD<f64>, y_pred: &ArrayD<f64>) -> EvalResult<ArrayD<f64>> {
    let abs = broadcast_binary("mean_absolute_error", y_pred, y_true, |p, t| (p - t).abs())?;
    reduce_mean_axis(&abs, -1)
}

/// `100 * mean(|y_true - y_pred| / max(|y_true|, eps))` over the last axis.
pub fn mean_absolute_percentage_error(
    y_true: &ArrayD<f64>,
    y_pred: &ArrayD<f64>,
    epsilon: f64,
) -> EvalResult<ArrayD<f64>> {
    let pct = broadcast_binary("mean_absolute_percentage_error", y_true, y_pred, |t, p| {
        100.0 * (t - p).abs() / t.abs().max(epsilon)
    })?;
    reduce_mean_axis(&pct, -1)
}

/// `mean((log(max(y_pred, eps) + 1) - log(max(y_true, eps) + 1))^2)` over the last axis.
pub fn mean_squared_logarithmic_error(
    y_true: &ArrayD<f64>,
    y_pred: &ArrayD<f64>,
    epsilon: f64,
) -> EvalResult<ArrayD<f64>> {
    let sq = broadcast_binary("mean_squared_logarithmic_error", y_pred, y_true, |p, t| {
        let diff = p.max(epsilon).ln_1p() - t.max(epsilon).ln_1p();
        diff * diff
    })?;
    reduce_mean_axis(&sq, -1)
}

/// Huber loss: quadratic for `|error| <= delta`, linear beyond.
pub fn huber(y_true: &ArrayD<f64>, y_pred: &ArrayD<f64>, delta: f64) -> EvalResult<ArrayD<f64>> {
    let per_elem = broadcast_binary("huber", y_pred, y_true, |p, t| {
        let abs_error = (p - t).abs();
        let quadratic = abs_error.min(delta);
        let linear = abs_error - quadratic;
        0.5 * quadratic * quadratic + delta * linear
    })?;
    reduce_mean_axis(&per_elem, -1)
}

/// `mean(log(cosh(y_pred - y_true)))` over the last axis.
pub fn log_cosh(y_true: &ArrayD<f64>, y_pred: &ArrayD<f64>) -> EvalResult<ArrayD<f64>> {
    // log(cosh(x)) = x + softplus(-2x) - log(2), which does not overflow for large |x|.
    let per_elem = broadcast_binary("log_cosh", y_pred, y_true, |p, t| {
        let x = p - t;
        x + softplus(-2.0 * x) - LN_2
    })?;
    reduce_mean_axis(&per_elem, -1)
}

/// Negative cosine similarity along `axis`.
///
/// Ranges from -1 (same direction) to 1 (opposite); zero vectors give 0.
pub fn cosine_similarity(
    y_true: &ArrayD<f64>,
    y_pred: &ArrayD<f64>,
    axis: isize,
) -> EvalResult<ArrayD<f64>> {
    if y_true.shape() != y_pred.shape() {
        return Err(EvalError::shape_mismatch(
            "cosine_similarity",
            y_true.shape(),
            y_pred.shape(),
        ));
    }
    let t = l2_normalize(y_true, axis, COSINE_EPSILON)?;
    let p = l2_normalize(y_pred, axis, COSINE_EPSILON)?;
    let prod = broadcast_binary("cosine_similarity", &t, &p, |a, b| -(a * b))?;
    reduce_sum_axis(&prod, axis)
}

function_loss!(
    /// Mean of squared errors.
    MeanSquaredError,
    "mean_squared_error",
    mean_squared_error
);

function_loss!(
    /// Mean of absolute errors.
    MeanAbsoluteError,
    "mean_absolute_error",
    mean_absolute_error
);

function_loss!(
    /// Mean absolute percentage error.
    MeanAbsolutePercentageError,
    "mean_absolute_percentage_error",
    mean_absolute_percentage_error,
    epsilon
);

function_loss!(
    /// Mean squared logarithmic error.
    MeanSquaredLogarithmicError,
    "mean_squared_logarithmic_error",
    mean_squared_logarithmic_error,
    epsilon
);

function_loss!(
    /// Logarithm of the hyperbolic cosine of the prediction error.
    LogCosh,
    "log_cosh",
    log_cosh
);

/// Huber loss for robust regression.
#[derive(Debug, Clone)]
pub struct Huber {
    pub config: LossConfig,
    /// Point where the loss changes from quadratic to linear.
    pub delta: f64,
}

impl Default for Huber {
    fn default() -> Self {
        Self {
            config: LossConfig::default(),
            delta: 1.0,
        }
    }
}

impl Huber {
    pub fn new(config: LossConfig, delta: f64) -> EvalResult<Self> {
        config.validate()?;
        if !(delta.is_finite() && delta > 0.0) {
            return Err(EvalError::InvalidConfig(format!(
                "Huber delta must be positive, got {}",
                delta
            )));
        }
        Ok(Self { config, delta })
    }
}

impl Loss for Huber {
    fn canonical_name(&self) -> &'static str {
        "huber"
    }

    fn config(&self) -> &LossConfig {
        &self.config
    }

    fn per_example(&self, y_true: &ArrayD<f64>, y_pred: &ArrayD<f64>) -> EvalResult<ArrayD<f64>> {
        huber(y_true, y_pred, self.delta)
    }
}

/// Negative cosine similarity between labels and predictions.
///
/// The reduction axis comes from [`LossConfig::axis`].
#[derive(Debug, Clone, Default)]
pub struct CosineSimilarity {
    pub config: LossConfig,
}

impl CosineSimilarity {
    pub fn new(config: LossConfig) -> EvalResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Loss for CosineSimilarity {
    fn canonical_name(&self) -> &'static str {
        "cosine_similarity"
    }

    fn config(&self) -> &LossConfig {
        &self.config
    }

    fn per_example(&self, y_true: &ArrayD<f64>, y_pred: &ArrayD<f64>) -> EvalResult<ArrayD<f64>> {
        cosine_similarity(y_true, y_pred, self.config.axis)
    }
}
