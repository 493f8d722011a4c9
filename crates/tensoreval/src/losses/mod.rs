//! Loss functions.
//!
//! Every loss is a per-example formula followed by [`compute_weighted_loss`]
//! with the instance's [`Reduction`]. The formulas are also exposed as free
//! functions so metric wrappers can reuse them.
//!
//! # Example
//!
//! ```
//! use tensoreval::{Loss, MeanSquaredError};
//! use scirs2_core::ndarray::array;
//!
//! let loss = MeanSquaredError::default();
//! let y_true = array![1.0, 2.0, 3.0].into_dyn();
//! let y_pred = array![1.0, 2.0, 4.0].into_dyn();
//! let value = loss.compute(&y_true, &y_pred, None).unwrap();
//! assert!((value - 1.0 / 3.0).abs() < 1e-12);
//! ```

/// Define a loss from a per-example formula.
///
/// Trailing field names are read from the instance's [`LossConfig`] and passed
/// to the formula after the labels and predictions.
macro_rules! function_loss {
    ($(#[$meta:meta])* $ty:ident, $canonical:literal, $func:path $(, $field:ident)*) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default)]
        pub struct $ty {
            pub config: crate::config::LossConfig,
        }

        impl $ty {
            pub fn new(config: crate::config::LossConfig) -> crate::EvalResult<Self> {
                config.validate()?;
                Ok(Self { config })
            }

            pub fn with_reduction(reduction: crate::reduction::Reduction) -> Self {
                Self {
                    config: crate::config::LossConfig::default().with_reduction(reduction),
                }
            }
        }

        impl crate::losses::Loss for $ty {
            fn canonical_name(&self) -> &'static str {
                $canonical
            }

            fn config(&self) -> &crate::config::LossConfig {
                &self.config
            }

            fn per_example(
                &self,
                y_true: &scirs2_core::ndarray::ArrayD<f64>,
                y_pred: &scirs2_core::ndarray::ArrayD<f64>,
            ) -> crate::EvalResult<scirs2_core::ndarray::ArrayD<f64>> {
                $func(y_true, y_pred $(, self.config.$field)*)
            }
        }
    };
}

mod classification;
mod hinge;
mod probabilistic;
mod regression;

pub(crate) use classification::{class_index, sparse_labels};
pub use classification::{
    binary_crossentropy, categorical_crossentropy, sparse_categorical_crossentropy,
    BinaryCrossentropy, CategoricalCrossentropy, SparseCategoricalCrossentropy,
};
pub use hinge::{
    categorical_hinge, hinge, squared_hinge, CategoricalHinge, Hinge, LabelEncoding, SquaredHinge,
};
pub use probabilistic::{kl_divergence, poisson, KLDivergence, Poisson};
pub use regression::{
    cosine_similarity, huber, log_cosh, mean_absolute_error, mean_absolute_percentage_error,
    mean_squared_error, mean_squared_logarithmic_error, CosineSimilarity, Huber, LogCosh,
    MeanAbsoluteError, MeanAbsolutePercentageError, MeanSquaredError, MeanSquaredLogarithmicError,
};

use crate::config::LossConfig;
use crate::reduction::{compute_weighted_loss, scalar_value, Reduction};
use crate::shape::remove_squeezable_dimensions;
use crate::{EvalError, EvalResult};
use scirs2_core::ndarray::ArrayD;
use std::fmt::Debug;

/// Trait for loss functions.
pub trait Loss: Debug + Send + Sync {
    /// Registry name of the formula.
    fn canonical_name(&self) -> &'static str;

    /// Configured name, falling back to the canonical one.
    fn name(&self) -> &str {
        self.config()
            .name
            .as_deref()
            .unwrap_or_else(|| self.canonical_name())
    }

    /// Construction-time configuration.
    fn config(&self) -> &LossConfig;

    /// Per-example losses for already reconciled inputs.
    fn per_example(&self, y_true: &ArrayD<f64>, y_pred: &ArrayD<f64>)
        -> EvalResult<ArrayD<f64>>;

    /// Reduction applied by [`Loss::call`].
    fn reduction(&self) -> Reduction {
        self.config().reduction
    }

    /// Reconcile shapes, evaluate the formula and reduce.
    fn call(
        &self,
        y_true: &ArrayD<f64>,
        y_pred: &ArrayD<f64>,
        sample_weight: Option<&ArrayD<f64>>,
    ) -> EvalResult<ArrayD<f64>> {
        let (y_true, y_pred) = remove_squeezable_dimensions(y_true.clone(), y_pred.clone());
        let losses = self.per_example(&y_true, &y_pred)?;
        log::trace!(
            "{}: per-example losses {:?} reduced with {}",
            self.name(),
            losses.shape(),
            self.reduction()
        );
        compute_weighted_loss(&losses, sample_weight, self.reduction())
    }

    /// Like [`Loss::call`], for reductions that produce a scalar.
    fn compute(
        &self,
        y_true: &ArrayD<f64>,
        y_pred: &ArrayD<f64>,
        sample_weight: Option<&ArrayD<f64>>,
    ) -> EvalResult<f64> {
        let value = self.call(y_true, y_pred, sample_weight)?;
        scalar_value(&value).ok_or_else(|| {
            EvalError::InvalidArgument(format!(
                "Loss '{}' with reduction '{}' does not produce a scalar",
                self.name(),
                self.reduction()
            ))
        })
    }
}
