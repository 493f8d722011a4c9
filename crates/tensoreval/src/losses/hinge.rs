//! Hinge losses for maximum-margin classification.

use crate::config::LossConfig;
use crate::losses::Loss;
use crate::ops::{broadcast_binary, reduce_mean_axis};
use crate::{EvalError, EvalResult};
use scirs2_core::ndarray::{ArrayD, Axis, Zip};
use serde::{Deserialize, Serialize};

/// How hinge losses interpret their labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelEncoding {
    /// Labels are already in `{-1, +1}`.
    #[default]
    Signed,
    /// Labels are in `{0, 1}` and are mapped to `2y - 1`.
    Binary,
}

impl LabelEncoding {
    #[inline]
    pub fn to_signed(self, label: f64) -> f64 {
        match self {
            LabelEncoding::Signed => label,
            LabelEncoding::Binary => 2.0 * label - 1.0,
        }
    }
}

/// `mean(max(1 - y * y_pred, 0))` over the last axis.
pub fn hinge(
    y_true: &ArrayD<f64>,
    y_pred: &ArrayD<f64>,
    encoding: LabelEncoding,
) -> EvalResult<ArrayD<f64>> {
    let margins = broadcast_binary("hinge", y_true, y_pred, |y, p| {
        (1.0 - encoding.to_signed(y) * p).max(0.0)
    })?;
    reduce_mean_axis(&margins, -1)
}

/// `mean(max(1 - y * y_pred, 0)^2)` over the last axis.
pub fn squared_hinge(
    y_true: &ArrayD<f64>,
    y_pred: &ArrayD<f64>,
    encoding: LabelEncoding,
) -> EvalResult<ArrayD<f64>> {
    let margins = broadcast_binary("squared_hinge", y_true, y_pred, |y, p| {
        let m = (1.0 - encoding.to_signed(y) * p).max(0.0);
        m * m
    })?;
    reduce_mean_axis(&margins, -1)
}

/// `max(0, neg - pos + 1)` with `pos = sum(y * y_pred)` and `neg = max((1 - y) * y_pred)`
/// taken over the last axis. Labels are one-hot.
pub fn categorical_hinge(y_true: &ArrayD<f64>, y_pred: &ArrayD<f64>) -> EvalResult<ArrayD<f64>> {
    if y_true.shape() != y_pred.shape() {
        return Err(EvalError::shape_mismatch(
            "categorical_hinge",
            y_true.shape(),
            y_pred.shape(),
        ));
    }
    if y_pred.ndim() == 0 {
        return Err(EvalError::InvalidArgument(
            "categorical_hinge requires a class axis".to_string(),
        ));
    }
    let last = Axis(y_pred.ndim() - 1);
    Ok(Zip::from(y_true.lanes(last))
        .and(y_pred.lanes(last))
        .map_collect(|t, p| {
            let mut pos = 0.0;
            let mut neg = f64::NEG_INFINITY;
            for (&y, &s) in t.iter().zip(p.iter()) {
                pos += y * s;
                neg = neg.max((1.0 - y) * s);
            }
            (neg - pos + 1.0).max(0.0)
        }))
}

/// Hinge loss.
#[derive(Debug, Clone, Default)]
pub struct Hinge {
    pub config: LossConfig,
    pub encoding: LabelEncoding,
}

impl Hinge {
    pub fn new(config: LossConfig, encoding: LabelEncoding) -> EvalResult<Self> {
        config.validate()?;
        Ok(Self { config, encoding })
    }
}

impl Loss for Hinge {
    fn canonical_name(&self) -> &'static str {
        "hinge"
    }

    fn config(&self) -> &LossConfig {
        &self.config
    }

    fn per_example(&self, y_true: &ArrayD<f64>, y_pred: &ArrayD<f64>) -> EvalResult<ArrayD<f64>> {
        hinge(y_true, y_pred, self.encoding)
    }
}

/// Squared hinge loss.
#[derive(Debug, Clone, Default)]
pub struct SquaredHinge {
    pub config: LossConfig,
    pub encoding: LabelEncoding,
}

impl SquaredHinge {
    pub fn new(config: LossConfig, encoding: LabelEncoding) -> EvalResult<Self> {
        config.validate()?;
        Ok(Self { config, encoding })
    }
}

impl Loss for SquaredHinge {
    fn canonical_name(&self) -> &'static str {
        "squared_hinge"
    }

    fn config(&self) -> &LossConfig {
        &self.config
    }

    fn per_example(&self, y_true: &ArrayD<f64>, y_pred: &ArrayD<f64>) -> EvalResult<ArrayD<f64>> {
        squared_hinge(y_true, y_pred, self.encoding)
    }
}

function_loss!(
    /// Categorical hinge loss for one-hot labels.
    CategoricalHinge,
    "categorical_hinge",
    categorical_hinge
);
