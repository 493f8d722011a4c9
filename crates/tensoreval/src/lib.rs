//! Loss reduction, shape reconciliation and streaming metrics over SciRS2 arrays.
//!
//! **Version**: 0.1.0-alpha.1
//!
//! - Shape reconciliation between labels, predictions and sample weights
//! - Weighted loss reduction with a zero-safe mean
//! - Loss catalog (cross-entropy, error, hinge, cosine, Huber, Poisson, KL, log-cosh)
//! - Stateful confusion-matrix counters for threshold metrics
//! - Running sums and means for streaming metric wrappers
//! - Name-based lookup of losses and metrics from JSON identifiers
//!
//! ```
//! use scirs2_core::ndarray::array;
//! use tensoreval::{Loss, MeanSquaredError};
//!
//! let loss = MeanSquaredError::default();
//! let value = loss
//!     .compute(&array![1.0, 2.0, 3.0].into_dyn(), &array![1.0, 2.0, 4.0].into_dyn(), None)
//!     .unwrap();
//! assert!((value - 1.0 / 3.0).abs() < 1e-12);
//! ```

mod config;
mod error;
mod losses;
mod metrics;
mod ops;
mod reduction;
mod registry;
mod shape;

#[cfg(feature = "structured-logging")]
pub mod structured_logging;

pub use config::{LossConfig, MetricConfig, Thresholds, DEFAULT_EPSILON, DEFAULT_THRESHOLD};
pub use error::{EvalError, EvalResult};
pub use losses::{
    binary_crossentropy, categorical_crossentropy, categorical_hinge, cosine_similarity, hinge,
    huber, kl_divergence, log_cosh, mean_absolute_error, mean_absolute_percentage_error,
    mean_squared_error, mean_squared_logarithmic_error, poisson, sparse_categorical_crossentropy,
    squared_hinge, BinaryCrossentropy, CategoricalCrossentropy, CategoricalHinge,
    CosineSimilarity, Hinge, Huber, KLDivergence, LabelEncoding, LogCosh, Loss,
    MeanAbsoluteError, MeanAbsolutePercentageError, MeanSquaredError,
    MeanSquaredLogarithmicError, Poisson, SparseCategoricalCrossentropy, SquaredHinge,
};
pub use metrics::{
    accuracy, binary_accuracy, binary_accuracy_default, categorical_accuracy,
    sparse_categorical_accuracy, sparse_top_k_categorical_accuracy, top_k_categorical_accuracy,
    Auc, AucCurve, AucSummationMethod, ConfusionAccumulator, ConfusionMatrixVariable,
    FalseNegatives, FalsePositives, MeanMetricWrapper, Metric, MetricClone, MetricFn, MetricReduction,
    MetricTracker, MetricValue, Precision, Recall, Reduce, SensitivityAtSpecificity,
    SpecificityAtSensitivity, TrueNegatives, TruePositives, DEFAULT_CURVE_THRESHOLDS,
    DEFAULT_TOP_K,
};
pub use ops::{
    broadcast_shape, broadcast_weights, div_no_nan, l2_normalize, log_softmax_axis,
    softmax_axis, top_k_mask,
};
pub use reduction::{compute_weighted_loss, scale_loss_for_distribution, Reduction};
pub use registry::{
    serialize_name, CustomObjects, Factory, LossRegistry, MetricRegistry, Registry,
};
pub use shape::{
    plan_label_squeeze, plan_weight_alignment, remove_squeezable_dimensions,
    squeeze_or_expand_dimensions, DimSize, ShapeReconciler, SqueezePlan, TensorShape, WeightPlan,
};
