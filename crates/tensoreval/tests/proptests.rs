//! Property-based tests for tensoreval.
//!
//! These tests use proptest to check reconciliation, reduction and counter
//! properties over randomly generated batches.

use proptest::prelude::*;
use scirs2_core::ndarray::{Array1, ArrayD, IxDyn};
use tensoreval::{
    binary_crossentropy, compute_weighted_loss, squeeze_or_expand_dimensions,
    ConfusionAccumulator, ConfusionMatrixVariable, Reduction, DEFAULT_EPSILON,
};

use ConfusionMatrixVariable::{FalseNegatives, FalsePositives, TrueNegatives, TruePositives};

const ALL: [ConfusionMatrixVariable; 4] =
    [TruePositives, FalsePositives, TrueNegatives, FalseNegatives];

/// Strategy for a batch of probabilities with matching binary labels.
fn labelled_batch() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (1usize..32).prop_flat_map(|n| {
        (
            prop::collection::vec(prop::bool::ANY.prop_map(|b| if b { 1.0 } else { 0.0 }), n),
            prop::collection::vec(0.0..=1.0f64, n),
        )
    })
}

fn column(values: &[f64]) -> ArrayD<f64> {
    ArrayD::from_shape_vec(IxDyn(&[values.len(), 1]), values.to_vec()).unwrap()
}

fn row(values: &[f64]) -> ArrayD<f64> {
    ArrayD::from_shape_vec(IxDyn(&[values.len()]), values.to_vec()).unwrap()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

proptest! {
    /// Reconciling an already reconciled triple changes nothing
    #[test]
    fn test_reconcile_idempotent(
        batch in 1usize..6,
        label_extra in prop::bool::ANY,
        weight_rank in 0usize..3,
    ) {
        let preds = ArrayD::<f64>::zeros(IxDyn(&[batch]));
        let label_shape: Vec<usize> = if label_extra { vec![batch, 1] } else { vec![batch] };
        let labels = ArrayD::<f64>::zeros(IxDyn(&label_shape));
        let weight_shape: Vec<usize> = match weight_rank {
            0 => vec![],
            1 => vec![batch],
            _ => vec![batch, 1],
        };
        let weights = ArrayD::<f64>::ones(IxDyn(&weight_shape));

        let (l1, p1, w1) = squeeze_or_expand_dimensions(preds, Some(labels), Some(weights));
        let (l1, w1) = (l1.unwrap(), w1.unwrap());
        let (l2, p2, w2) =
            squeeze_or_expand_dimensions(p1.clone(), Some(l1.clone()), Some(w1.clone()));
        let (l2, w2) = (l2.unwrap(), w2.unwrap());
        prop_assert_eq!(l2.shape(), l1.shape());
        prop_assert_eq!(p2.shape(), p1.shape());
        prop_assert_eq!(w2.shape(), w1.shape());
    }

    /// Mean reductions of any batch are finite, and of an empty batch are zero
    #[test]
    fn test_safe_mean(values in prop::collection::vec(-10.0..10.0f64, 0..16)) {
        let losses = row(&values);
        for reduction in [Reduction::SumOverBatchSize, Reduction::WeightedMean, Reduction::Auto] {
            let out = compute_weighted_loss(&losses, None, reduction).unwrap();
            let value = out[IxDyn(&[])];
            prop_assert!(value.is_finite());
            if values.is_empty() {
                prop_assert_eq!(value, 0.0);
            }
        }
    }

    /// Counters never decrease under non-negative weights
    #[test]
    fn test_counter_monotonicity(
        batches in prop::collection::vec((labelled_batch(), 0.0..2.0f64), 1..5),
    ) {
        let mut acc = ConfusionAccumulator::new("counts", &ALL, vec![0.2, 0.5, 0.8]).unwrap();
        let mut previous: Vec<Array1<f64>> = ALL.iter().map(|&v| acc.counts(v)).collect();
        for ((labels, preds), weight) in batches {
            let w = ArrayD::from_elem(IxDyn(&[]), weight);
            acc.update(&row(&labels), &row(&preds), Some(&w), None, None).unwrap();
            for (i, &variable) in ALL.iter().enumerate() {
                let current = acc.counts(variable);
                for (now, before) in current.iter().zip(previous[i].iter()) {
                    prop_assert!(now >= before);
                }
                previous[i] = current;
            }
        }
    }

    /// A single threshold reproduces the matching slot of a multi-threshold run
    #[test]
    fn test_single_vs_multi_threshold((labels, preds) in labelled_batch()) {
        let mut single = ConfusionAccumulator::new("single", &ALL, vec![0.5]).unwrap();
        let mut multi = ConfusionAccumulator::new("multi", &ALL, vec![0.3, 0.5, 0.7]).unwrap();
        single.update(&column(&labels), &row(&preds), None, None, None).unwrap();
        multi.update(&column(&labels), &row(&preds), None, None, None).unwrap();
        for variable in ALL {
            prop_assert_eq!(single.counts(variable)[0], multi.counts(variable)[1]);
        }
    }

    /// The logits path agrees with the probability path away from saturation
    #[test]
    fn test_bce_logits_equivalence(
        pairs in prop::collection::vec((prop::bool::ANY, -4.0..4.0f64), 1..16),
    ) {
        let labels: Vec<f64> = pairs.iter().map(|(b, _)| if *b { 1.0 } else { 0.0 }).collect();
        let logits: Vec<f64> = pairs.iter().map(|(_, x)| *x).collect();
        let probs: Vec<f64> = logits.iter().map(|&x| sigmoid(x)).collect();

        let from_probs =
            binary_crossentropy(&row(&labels), &row(&probs), false, 0.0, DEFAULT_EPSILON).unwrap();
        let from_logits =
            binary_crossentropy(&row(&labels), &row(&logits), true, 0.0, DEFAULT_EPSILON).unwrap();
        let diff = (from_probs[IxDyn(&[])] - from_logits[IxDyn(&[])]).abs();
        prop_assert!(diff < 1e-5, "logits path differs by {}", diff);
    }

    /// Zero label smoothing reproduces the plain cross-entropy formula
    #[test]
    fn test_zero_label_smoothing((labels, preds) in labelled_batch()) {
        let out =
            binary_crossentropy(&row(&labels), &row(&preds), false, 0.0, DEFAULT_EPSILON).unwrap();
        let expected = labels
            .iter()
            .zip(preds.iter())
            .map(|(&z, &p)| {
                let p = p.clamp(DEFAULT_EPSILON, 1.0 - DEFAULT_EPSILON);
                -(z * p.ln() + (1.0 - z) * (1.0 - p).ln())
            })
            .sum::<f64>()
            / labels.len() as f64;
        let diff = (out[IxDyn(&[])] - expected).abs();
        prop_assert!(diff < 1e-9, "unsmoothed loss differs by {}", diff);
    }
}
