//! Array primitives consumed from the SciRS2 ndarray engine.
//!
//! Everything the loss and metric code needs from the tensor engine goes
//! through this module: broadcasting, singleton-axis surgery, axis
//! reductions and a few numerically guarded helpers.

use crate::{EvalError, EvalResult};
use scirs2_core::ndarray::{Array1, ArrayD, Axis, Zip};

/// Value assigned to entries removed by [`top_k_mask`].
///
/// Far below any threshold in `[0, 1]`, so masked entries never count as positive.
pub const NEG_INF: f64 = -1e10;

/// Broadcast two shapes following NumPy rules.
///
/// Returns `None` when some axis pair differs and neither side is 1.
pub fn broadcast_shape(lhs: &[usize], rhs: &[usize]) -> Option<Vec<usize>> {
    let rank = lhs.len().max(rhs.len());
    let lhs_offset = rank - lhs.len();
    let rhs_offset = rank - rhs.len();

    let mut out = Vec::with_capacity(rank);
    for i in 0..rank {
        let a = if i < lhs_offset { 1 } else { lhs[i - lhs_offset] };
        let b = if i < rhs_offset { 1 } else { rhs[i - rhs_offset] };
        let dim = if a == b {
            a
        } else if a == 1 {
            b
        } else if b == 1 {
            a
        } else {
            return None;
        };
        out.push(dim);
    }
    Some(out)
}

/// Combine two arrays elementwise after broadcasting them to a common shape.
pub fn broadcast_binary<F>(
    operation: &str,
    lhs: &ArrayD<f64>,
    rhs: &ArrayD<f64>,
    f: F,
) -> EvalResult<ArrayD<f64>>
where
    F: Fn(f64, f64) -> f64,
{
    let shape = broadcast_shape(lhs.shape(), rhs.shape())
        .ok_or_else(|| EvalError::shape_mismatch(operation, lhs.shape(), rhs.shape()))?;

    let lhs_view = lhs
        .broadcast(shape.as_slice())
        .ok_or_else(|| EvalError::shape_mismatch(operation, lhs.shape(), &shape))?;
    let rhs_view = rhs
        .broadcast(shape.as_slice())
        .ok_or_else(|| EvalError::shape_mismatch(operation, rhs.shape(), &shape))?;

    Ok(Zip::from(lhs_view)
        .and(rhs_view)
        .map_collect(|&a, &b| f(a, b)))
}

/// Broadcast a weight array to the shape of `values`.
///
/// Weights must either be a scalar or have the same rank as `values`, with every
/// axis equal to the corresponding value axis or 1.
pub fn broadcast_weights(weights: &ArrayD<f64>, values_shape: &[usize]) -> EvalResult<ArrayD<f64>> {
    if weights.shape() == values_shape {
        return Ok(weights.clone());
    }

    let compatible = weights.ndim() == 0
        || (weights.ndim() == values_shape.len()
            && weights
                .shape()
                .iter()
                .zip(values_shape.iter())
                .all(|(&w, &v)| w == v || w == 1));
    if !compatible {
        return Err(EvalError::shape_mismatch(
            "broadcast_weights",
            weights.shape(),
            values_shape,
        ));
    }

    weights
        .broadcast(values_shape)
        .map(|view| view.to_owned())
        .ok_or_else(|| EvalError::shape_mismatch("broadcast_weights", weights.shape(), values_shape))
}

/// Drop the trailing axis. The caller guarantees its extent is 1.
pub fn squeeze_last<T>(array: ArrayD<T>) -> ArrayD<T> {
    let last = array.ndim() - 1;
    array.index_axis_move(Axis(last), 0)
}

/// Append a trailing singleton axis.
pub fn expand_last<T>(array: ArrayD<T>) -> ArrayD<T> {
    let rank = array.ndim();
    array.insert_axis(Axis(rank))
}

/// Resolve a possibly negative axis index against `rank`.
pub fn resolve_axis(axis: isize, rank: usize) -> EvalResult<usize> {
    let resolved = if axis < 0 { axis + rank as isize } else { axis };
    if resolved < 0 || resolved as usize >= rank {
        return Err(EvalError::InvalidArgument(format!(
            "Axis {} out of range for array of rank {}",
            axis, rank
        )));
    }
    Ok(resolved as usize)
}

/// Mean along `axis`. Rank-0 inputs are returned unchanged; empty axes reduce to 0.
pub fn reduce_mean_axis(array: &ArrayD<f64>, axis: isize) -> EvalResult<ArrayD<f64>> {
    if array.ndim() == 0 {
        return Ok(array.clone());
    }
    let ax = Axis(resolve_axis(axis, array.ndim())?);
    let n = array.len_of(ax) as f64;
    let sum = array.sum_axis(ax);
    if n == 0.0 {
        return Ok(sum);
    }
    Ok(sum.mapv(|s| s / n))
}

/// Sum along `axis`. Rank-0 inputs are returned unchanged.
pub fn reduce_sum_axis(array: &ArrayD<f64>, axis: isize) -> EvalResult<ArrayD<f64>> {
    if array.ndim() == 0 {
        return Ok(array.clone());
    }
    let ax = Axis(resolve_axis(axis, array.ndim())?);
    Ok(array.sum_axis(ax))
}

/// Max along `axis`. Rank-0 inputs are returned unchanged.
pub fn reduce_max_axis(array: &ArrayD<f64>, axis: isize) -> EvalResult<ArrayD<f64>> {
    if array.ndim() == 0 {
        return Ok(array.clone());
    }
    let ax = Axis(resolve_axis(axis, array.ndim())?);
    Ok(array.fold_axis(ax, f64::NEG_INFINITY, |&acc, &x| acc.max(x)))
}

/// Division that yields 0 instead of NaN or infinity when the denominator is 0.
#[inline]
pub fn div_no_nan(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Elementwise [`div_no_nan`] over two equally sized vectors.
pub fn div_no_nan_vec(numerator: &Array1<f64>, denominator: &Array1<f64>) -> Array1<f64> {
    Zip::from(numerator)
        .and(denominator)
        .map_collect(|&n, &d| div_no_nan(n, d))
}

/// Clip every element into `[lo, hi]`.
pub fn clip(array: &ArrayD<f64>, lo: f64, hi: f64) -> ArrayD<f64> {
    array.mapv(|v| v.max(lo).min(hi))
}

/// Normalise along `axis` by the L2 norm, guarding the squared norm with `epsilon`.
pub fn l2_normalize(array: &ArrayD<f64>, axis: isize, epsilon: f64) -> EvalResult<ArrayD<f64>> {
    if array.ndim() == 0 {
        return Ok(array.mapv(|v| v / (v * v).max(epsilon).sqrt()));
    }
    let ax = Axis(resolve_axis(axis, array.ndim())?);
    let inv_norm = array
        .mapv(|v| v * v)
        .sum_axis(ax)
        .insert_axis(ax)
        .mapv(|s| 1.0 / s.max(epsilon).sqrt());
    broadcast_binary("l2_normalize", array, &inv_norm, |x, n| x * n)
}

/// Log-softmax along `axis`, computed with the max-shift for stability.
pub fn log_softmax_axis(array: &ArrayD<f64>, axis: isize) -> EvalResult<ArrayD<f64>> {
    if array.ndim() == 0 {
        return Ok(array.mapv(|_| 0.0));
    }
    let ax = Axis(resolve_axis(axis, array.ndim())?);
    let mut out = array.clone();
    for mut lane in out.lanes_mut(ax) {
        let max = lane.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let log_sum = lane.iter().map(|&v| (v - max).exp()).sum::<f64>().ln();
        lane.mapv_inplace(|v| v - max - log_sum);
    }
    Ok(out)
}

/// Softmax along `axis`.
pub fn softmax_axis(array: &ArrayD<f64>, axis: isize) -> EvalResult<ArrayD<f64>> {
    Ok(log_softmax_axis(array, axis)?.mapv(f64::exp))
}

/// Keep the `k` largest entries along the last axis and replace the rest with [`NEG_INF`].
///
/// Ties resolve towards the lower index.
pub fn top_k_mask(array: &ArrayD<f64>, k: usize) -> EvalResult<ArrayD<f64>> {
    if k == 0 {
        return Err(EvalError::InvalidArgument(
            "top_k must be at least 1".to_string(),
        ));
    }
    if array.ndim() == 0 {
        return Ok(array.clone());
    }
    let last = Axis(array.ndim() - 1);
    let mut out = array.clone();
    for mut lane in out.lanes_mut(last) {
        if k >= lane.len() {
            continue;
        }
        let mut order: Vec<usize> = (0..lane.len()).collect();
        order.sort_by(|&a, &b| {
            lane[b]
                .partial_cmp(&lane[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for &idx in &order[k..] {
            lane[idx] = NEG_INF;
        }
    }
    Ok(out)
}

/// Flatten in logical (row-major) order.
pub fn flatten(array: &ArrayD<f64>) -> Array1<f64> {
    array.iter().copied().collect()
}

/// Numerically stable `log(1 + exp(x))`.
#[inline]
pub fn softplus(x: f64) -> f64 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}
