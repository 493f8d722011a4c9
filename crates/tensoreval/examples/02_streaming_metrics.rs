//! Streaming metrics over several batches.
//!
//! This example demonstrates:
//! - Confusion-matrix counters at several thresholds
//! - Precision, recall and AUC accumulated across batches
//! - A loss tracked as a streaming mean
//! - Building a metric set from JSON and recording results per step

use scirs2_core::ndarray::{array, ArrayD};
use serde_json::json;
use tensoreval::{
    Auc, AucCurve, AucSummationMethod, BinaryCrossentropy, ConfusionAccumulator,
    ConfusionMatrixVariable, MeanMetricWrapper, Metric, MetricConfig, MetricRegistry,
    MetricTracker, Precision, Recall, Thresholds,
};

fn batches() -> Vec<(ArrayD<f64>, ArrayD<f64>)> {
    vec![
        (
            array![1.0, 0.0, 1.0, 1.0].into_dyn(),
            array![0.9, 0.1, 0.8, 0.4].into_dyn(),
        ),
        (
            array![0.0, 0.0, 1.0, 0.0].into_dyn(),
            array![0.6, 0.3, 0.7, 0.2].into_dyn(),
        ),
        (
            array![1.0, 1.0, 0.0, 0.0].into_dyn(),
            array![0.55, 0.95, 0.45, 0.05].into_dyn(),
        ),
    ]
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Streaming Metrics ===\n");

    // Raw counters at five thresholds
    let mut counts = ConfusionAccumulator::new(
        "counts",
        &ConfusionMatrixVariable::ALL,
        Thresholds::Count(5).resolve()?,
    )?;
    for (labels, scores) in batches() {
        counts.update(&labels, &scores, None, None, None)?;
    }
    println!("Thresholds: {}", counts.thresholds());
    for variable in ConfusionMatrixVariable::ALL {
        println!("  {:<16} {}", variable, counts.counts(variable));
    }

    // Rates and curve summaries
    let mut precision = Precision::new(MetricConfig::default())?;
    let mut recall = Recall::new(MetricConfig::default().with_thresholds(vec![0.3, 0.5, 0.7]))?;
    let mut roc = Auc::default();
    let mut pr = Auc::new(200, AucCurve::Pr, AucSummationMethod::Interpolation)?;
    let mut bce = MeanMetricWrapper::from_loss(BinaryCrossentropy::default());
    for (labels, scores) in batches() {
        precision.update_state(&labels, &scores, None)?;
        recall.update_state(&labels, &scores, None)?;
        roc.update_state(&labels, &scores, None)?;
        pr.update_state(&labels, &scores, None)?;
        bce.update_state(&labels, &scores, None)?;
    }
    println!("\nprecision@0.5: {}", precision.result());
    println!("recall@[0.3, 0.5, 0.7]: {}", recall.result());
    println!("ROC AUC: {}", roc.result());
    println!("PR AUC: {}", pr.result());
    println!("mean BCE: {}", bce.result());

    // Metric set from configuration, recorded once per batch
    let registry = MetricRegistry::with_standard_metrics();
    let mut tracker = MetricTracker::new();
    for identifier in [
        json!("binary_accuracy"),
        json!({"class_name": "specificity_at_sensitivity", "config": {"sensitivity": 0.5}}),
        json!({"class_name": "auc", "config": {"curve": "pr", "name": "pr_auc"}}),
    ] {
        if let Some(metric) = registry.deserialize(&identifier, None)? {
            tracker.add(metric);
        }
    }
    for (step, (labels, scores)) in batches().into_iter().enumerate() {
        tracker.update_all(&labels, &scores, None)?;
        let mut results: Vec<_> = tracker.record().into_iter().collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));
        println!("\nstep {}:", step);
        for (name, value) in results {
            println!("  {:<28} {}", name, value);
        }
    }

    Ok(())
}
