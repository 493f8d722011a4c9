//! Error types for loss and metric evaluation.

use thiserror::Error;

/// Errors that can occur while evaluating losses or updating metrics.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Shapes that remain incompatible after reconciliation.
    #[error("Shape mismatch in {operation}: {lhs:?} vs {rhs:?}")]
    ShapeMismatch {
        /// Operation that detected the mismatch.
        operation: String,
        /// Left-hand shape.
        lhs: Vec<usize>,
        /// Right-hand shape.
        rhs: Vec<usize>,
    },

    /// Invalid argument passed to a loss, metric or lookup.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Threshold metrics require predictions in `[0, 1]`.
    #[error("Predictions must lie in [0, 1], found value {value} in {metric}")]
    PredictionOutOfRange {
        /// Metric whose precondition failed.
        metric: String,
        /// First offending value.
        value: f64,
    },

    /// Error in configuration.
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// Error decoding a JSON configuration.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EvalError {
    pub(crate) fn shape_mismatch(operation: &str, lhs: &[usize], rhs: &[usize]) -> Self {
        EvalError::ShapeMismatch {
            operation: operation.to_string(),
            lhs: lhs.to_vec(),
            rhs: rhs.to_vec(),
        }
    }
}

/// Result type for evaluation operations.
pub type EvalResult<T> = Result<T, EvalError>;
