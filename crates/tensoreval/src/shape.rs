//! Shape reconciliation between labels, predictions and sample weights.
//!
//! Inputs shaped `[batch, 1]` and `[batch]` are the common case this module
//! resolves: a trailing singleton axis is squeezed from whichever side carries
//! it, and weights are squeezed or expanded by one trailing axis to match the
//! predictions. Anything else is left alone; incompatible shapes surface later
//! as [`EvalError::ShapeMismatch`](crate::EvalError) from the numeric code.
//!
//! The decision is always taken from the runtime rank of the arrays. Static
//! [`TensorShape`] hints only short-circuit that decision when they fully
//! determine it, and are ignored whenever they disagree with the actual data.

use crate::ops::{expand_last, squeeze_last};
use scirs2_core::ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// Shape information for a tensor dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimSize {
    /// Static known size.
    Static(usize),
    /// Size only known at evaluation time.
    Dynamic,
}

impl DimSize {
    pub fn is_static(&self) -> bool {
        matches!(self, DimSize::Static(_))
    }

    pub fn as_static(&self) -> Option<usize> {
        match self {
            DimSize::Static(size) => Some(*size),
            DimSize::Dynamic => None,
        }
    }
}

/// Declared tensor shape. `dims == None` means the rank itself is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TensorShape {
    pub dims: Option<Vec<DimSize>>,
}

impl TensorShape {
    pub fn new(dims: Vec<DimSize>) -> Self {
        TensorShape { dims: Some(dims) }
    }

    pub fn static_shape(sizes: &[usize]) -> Self {
        TensorShape {
            dims: Some(sizes.iter().copied().map(DimSize::Static).collect()),
        }
    }

    /// Known rank, every extent dynamic.
    pub fn dynamic(rank: usize) -> Self {
        TensorShape {
            dims: Some(vec![DimSize::Dynamic; rank]),
        }
    }

    /// Unknown rank.
    pub fn unknown() -> Self {
        TensorShape { dims: None }
    }

    pub fn from_array<T>(array: &ArrayD<T>) -> Self {
        Self::static_shape(array.shape())
    }

    pub fn rank(&self) -> Option<usize> {
        self.dims.as_ref().map(Vec::len)
    }

    pub fn last_dim(&self) -> Option<DimSize> {
        self.dims.as_ref().and_then(|d| d.last().copied())
    }

    pub fn is_static(&self) -> bool {
        self.dims
            .as_ref()
            .is_some_and(|d| d.iter().all(DimSize::is_static))
    }

    /// Equal rank and equal extent on every axis where both sides are static.
    ///
    /// Unknown rank on either side is treated as compatible.
    pub fn compatible_with(&self, other: &TensorShape) -> bool {
        let (Some(a), Some(b)) = (&self.dims, &other.dims) else {
            return true;
        };
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b.iter()).all(|pair| match pair {
            (DimSize::Static(x), DimSize::Static(y)) => x == y,
            _ => true,
        })
    }

    /// Whether a concrete runtime shape satisfies this declaration.
    pub fn matches(&self, shape: &[usize]) -> bool {
        self.compatible_with(&TensorShape::static_shape(shape))
    }
}

/// Outcome of reconciling labels against predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqueezePlan {
    Keep,
    SqueezeLabels,
    SqueezePredictions,
    /// Not decidable from the declared shapes.
    Deferred,
}

/// Outcome of reconciling weights against predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightPlan {
    Keep,
    Squeeze,
    Expand,
    /// Not decidable from the declared shapes.
    Deferred,
}

fn singleton_plan<P: Copy>(last: Option<DimSize>, on_singleton: P, otherwise: P, deferred: P) -> P {
    match last {
        Some(DimSize::Static(1)) => on_singleton,
        Some(DimSize::Dynamic) | None => deferred,
        Some(DimSize::Static(_)) => otherwise,
    }
}

/// Decide statically how labels and predictions should be reconciled.
pub fn plan_label_squeeze(labels: &TensorShape, predictions: &TensorShape) -> SqueezePlan {
    let (Some(label_rank), Some(pred_rank)) = (labels.rank(), predictions.rank()) else {
        return SqueezePlan::Deferred;
    };

    if pred_rank == label_rank + 1 {
        singleton_plan(
            predictions.last_dim(),
            SqueezePlan::SqueezePredictions,
            SqueezePlan::Keep,
            SqueezePlan::Deferred,
        )
    } else if label_rank == pred_rank + 1 {
        singleton_plan(
            labels.last_dim(),
            SqueezePlan::SqueezeLabels,
            SqueezePlan::Keep,
            SqueezePlan::Deferred,
        )
    } else {
        SqueezePlan::Keep
    }
}

/// Decide statically how weights should be aligned with predictions.
pub fn plan_weight_alignment(weights: &TensorShape, predictions: &TensorShape) -> WeightPlan {
    let (Some(weight_rank), Some(pred_rank)) = (weights.rank(), predictions.rank()) else {
        return WeightPlan::Deferred;
    };

    if weight_rank == 0 {
        WeightPlan::Keep
    } else if weight_rank == pred_rank + 1 {
        singleton_plan(
            weights.last_dim(),
            WeightPlan::Squeeze,
            WeightPlan::Keep,
            WeightPlan::Deferred,
        )
    } else if pred_rank == weight_rank + 1 {
        WeightPlan::Expand
    } else {
        WeightPlan::Keep
    }
}

fn runtime_label_plan(label_shape: &[usize], pred_shape: &[usize]) -> SqueezePlan {
    plan_label_squeeze(
        &TensorShape::static_shape(label_shape),
        &TensorShape::static_shape(pred_shape),
    )
}

fn runtime_weight_plan(weight_shape: &[usize], pred_shape: &[usize]) -> WeightPlan {
    plan_weight_alignment(
        &TensorShape::static_shape(weight_shape),
        &TensorShape::static_shape(pred_shape),
    )
}

/// Squeeze a trailing singleton axis from whichever of labels/predictions has one extra axis.
pub fn remove_squeezable_dimensions<L, P>(
    labels: ArrayD<L>,
    predictions: ArrayD<P>,
) -> (ArrayD<L>, ArrayD<P>) {
    let plan = runtime_label_plan(labels.shape(), predictions.shape());
    apply_label_plan(plan, labels, predictions)
}

fn apply_label_plan<L, P>(
    plan: SqueezePlan,
    labels: ArrayD<L>,
    predictions: ArrayD<P>,
) -> (ArrayD<L>, ArrayD<P>) {
    match plan {
        SqueezePlan::SqueezeLabels => (squeeze_last(labels), predictions),
        SqueezePlan::SqueezePredictions => (labels, squeeze_last(predictions)),
        SqueezePlan::Keep | SqueezePlan::Deferred => (labels, predictions),
    }
}

fn apply_weight_plan<W>(plan: WeightPlan, weights: ArrayD<W>) -> ArrayD<W> {
    match plan {
        WeightPlan::Squeeze => squeeze_last(weights),
        WeightPlan::Expand => expand_last(weights),
        WeightPlan::Keep | WeightPlan::Deferred => weights,
    }
}

/// Reconcile `(labels, predictions, weights)` using runtime ranks only.
pub fn squeeze_or_expand_dimensions<L, P, W>(
    predictions: ArrayD<P>,
    labels: Option<ArrayD<L>>,
    weights: Option<ArrayD<W>>,
) -> (Option<ArrayD<L>>, ArrayD<P>, Option<ArrayD<W>>) {
    ShapeReconciler::new().reconcile(labels, predictions, weights)
}

/// Reconciles the rank relationship of labels, predictions and weights.
///
/// Carries optional declared shapes used as a fast path; results are identical
/// with or without them.
#[derive(Debug, Clone, Default)]
pub struct ShapeReconciler {
    label_hint: Option<TensorShape>,
    prediction_hint: Option<TensorShape>,
    weight_hint: Option<TensorShape>,
}

impl ShapeReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach declared shapes for the three inputs.
    pub fn with_hints(
        labels: Option<TensorShape>,
        predictions: Option<TensorShape>,
        weights: Option<TensorShape>,
    ) -> Self {
        Self {
            label_hint: labels,
            prediction_hint: predictions,
            weight_hint: weights,
        }
    }

    fn static_label_plan(&self, label_shape: &[usize], pred_shape: &[usize]) -> Option<SqueezePlan> {
        let labels = self.label_hint.as_ref()?;
        let predictions = self.prediction_hint.as_ref()?;
        if !labels.matches(label_shape) || !predictions.matches(pred_shape) {
            log::warn!(
                "Declared shapes {:?}/{:?} disagree with runtime shapes {:?}/{:?}; using runtime ranks",
                labels.dims,
                predictions.dims,
                label_shape,
                pred_shape
            );
            return None;
        }
        match plan_label_squeeze(labels, predictions) {
            SqueezePlan::Deferred => None,
            plan => Some(plan),
        }
    }

    fn static_weight_plan(&self, weight_shape: &[usize], pred_shape: &[usize]) -> Option<WeightPlan> {
        let weights = self.weight_hint.as_ref()?;
        let predictions = self.prediction_hint.as_ref()?;
        if !weights.matches(weight_shape) || !predictions.matches(pred_shape) {
            return None;
        }
        match plan_weight_alignment(weights, predictions) {
            WeightPlan::Deferred => None,
            plan => Some(plan),
        }
    }

    /// Reconcile labels with predictions, then weights with the updated predictions.
    pub fn reconcile<L, P, W>(
        &self,
        labels: Option<ArrayD<L>>,
        predictions: ArrayD<P>,
        weights: Option<ArrayD<W>>,
    ) -> (Option<ArrayD<L>>, ArrayD<P>, Option<ArrayD<W>>) {
        let (labels, predictions, predictions_squeezed) = match labels {
            Some(labels) => {
                let plan = self
                    .static_label_plan(labels.shape(), predictions.shape())
                    .unwrap_or_else(|| runtime_label_plan(labels.shape(), predictions.shape()));
                let (labels, predictions) = apply_label_plan(plan, labels, predictions);
                (Some(labels), predictions, plan == SqueezePlan::SqueezePredictions)
            }
            None => (None, predictions, false),
        };

        let weights = weights.map(|weights| {
            // The prediction hint only describes the pre-squeeze shape.
            let plan = if predictions_squeezed {
                None
            } else {
                self.static_weight_plan(weights.shape(), predictions.shape())
            }
            .unwrap_or_else(|| runtime_weight_plan(weights.shape(), predictions.shape()));
            log::trace!(
                "Weight alignment {:?} for weights {:?} against predictions {:?}",
                plan,
                weights.shape(),
                predictions.shape()
            );
            apply_weight_plan(plan, weights)
        });

        (labels, predictions, weights)
    }
}
