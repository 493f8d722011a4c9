//! Benchmark streaming metric updates.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use scirs2_core::ndarray::{Array1, Array2, ArrayD};
use std::hint::black_box;
use tensoreval::{
    categorical_accuracy, Auc, ConfusionAccumulator, ConfusionMatrixVariable, MeanMetricWrapper,
    Metric, MetricConfig, Precision, Recall, SensitivityAtSpecificity, Thresholds,
};

fn generate_binary_data(n_samples: usize) -> (ArrayD<f64>, ArrayD<f64>) {
    let labels = Array1::from_shape_fn(n_samples, |i| if i % 3 == 0 { 1.0 } else { 0.0 });
    let scores = Array1::from_shape_fn(n_samples, |i| ((i as f64) * 0.37).sin().abs());
    (labels.into_dyn(), scores.into_dyn())
}

fn generate_classification_data(n_samples: usize, n_classes: usize) -> (ArrayD<f64>, ArrayD<f64>) {
    let targets = Array2::from_shape_fn((n_samples, n_classes), |(i, j)| {
        if j == (i + 1) % n_classes {
            1.0
        } else {
            0.0
        }
    });
    let predictions = Array2::from_shape_fn((n_samples, n_classes), |(i, j)| {
        ((i * n_classes + j) as f64 * 0.13).cos().abs()
    });
    (targets.into_dyn(), predictions.into_dyn())
}

fn benchmark_basic_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("basic_metrics");
    let (labels, scores) = generate_binary_data(1000);

    group.bench_function("precision", |b| {
        let mut metric = Precision::new(MetricConfig::default()).unwrap();
        b.iter(|| {
            metric.update_state(&labels, &scores, None).unwrap();
            black_box(metric.result());
        });
    });

    group.bench_function("recall", |b| {
        let mut metric = Recall::new(MetricConfig::default()).unwrap();
        b.iter(|| {
            metric.update_state(&labels, &scores, None).unwrap();
            black_box(metric.result());
        });
    });

    group.bench_function("auc", |b| {
        let mut metric = Auc::default();
        b.iter(|| {
            metric.update_state(&labels, &scores, None).unwrap();
            black_box(metric.result());
        });
    });

    group.bench_function("sensitivity_at_specificity", |b| {
        let mut metric = SensitivityAtSpecificity::new(0.5).unwrap();
        b.iter(|| {
            metric.update_state(&labels, &scores, None).unwrap();
            black_box(metric.result());
        });
    });

    let (targets, predictions) = generate_classification_data(1000, 10);
    group.bench_function("categorical_accuracy", |b| {
        let mut metric = MeanMetricWrapper::new("categorical_accuracy", categorical_accuracy);
        b.iter(|| {
            metric.update_state(&targets, &predictions, None).unwrap();
            black_box(metric.result());
        });
    });

    group.finish();
}

fn benchmark_threshold_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("threshold_scaling");
    let (labels, scores) = generate_binary_data(1000);

    for num_thresholds in [1usize, 10, 200].iter() {
        let thresholds = match *num_thresholds {
            1 => vec![0.5],
            n => Thresholds::Count(n).resolve().unwrap(),
        };
        group.bench_with_input(
            BenchmarkId::new("confusion_update", num_thresholds),
            num_thresholds,
            |b, _| {
                let mut acc = ConfusionAccumulator::new(
                    "counts",
                    &ConfusionMatrixVariable::ALL,
                    thresholds.clone(),
                )
                .unwrap();
                b.iter(|| {
                    acc.update(&labels, &scores, None, None, None).unwrap();
                    black_box(acc.counts(ConfusionMatrixVariable::TruePositives));
                });
            },
        );
    }

    group.finish();
}

fn benchmark_top_k(c: &mut Criterion) {
    let mut group = c.benchmark_group("top_k_precision");
    let (targets, predictions) = generate_classification_data(1000, 10);

    for k in [1usize, 3, 5].iter() {
        group.bench_with_input(BenchmarkId::new("precision_top_k", k), k, |b, &k| {
            let mut metric = Precision::new(MetricConfig::default().with_top_k(k)).unwrap();
            b.iter(|| {
                metric.update_state(&targets, &predictions, None).unwrap();
                black_box(metric.result());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_basic_metrics,
    benchmark_threshold_scaling,
    benchmark_top_k,
);
criterion_main!(benches);
