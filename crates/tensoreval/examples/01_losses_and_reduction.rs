//! Losses and weighted reduction.
//!
//! This example demonstrates:
//! - Evaluating catalog losses on a small batch
//! - How each reduction mode collapses per-example losses
//! - Sample weights and column-shaped labels
//! - Looking losses up by name from JSON identifiers

use scirs2_core::ndarray::array;
use serde_json::json;
use tensoreval::{
    compute_weighted_loss, serialize_name, BinaryCrossentropy, Hinge, LabelEncoding, Loss,
    LossConfig, LossRegistry, MeanSquaredError, Reduction,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Losses and Reduction ===\n");

    let y_true = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]].into_dyn();
    let y_pred = array![[0.8, 0.3], [0.4, 0.6], [0.9, 0.2]].into_dyn();

    // Per-example values first, then every scalar reduction
    let mse = MeanSquaredError::default();
    let per_example = mse.per_example(&y_true, &y_pred)?;
    println!("MSE per example: {}", per_example);
    for reduction in [
        Reduction::Sum,
        Reduction::SumOverBatchSize,
        Reduction::WeightedMean,
        Reduction::Auto,
    ] {
        let weights = array![1.0, 0.5, 0.0].into_dyn();
        let reduced = compute_weighted_loss(&per_example, Some(&weights), reduction)?;
        println!("  {:<20} {:.6}", reduction.to_string(), reduced.sum());
    }

    // Cross-entropy on probabilities and on logits
    let bce = BinaryCrossentropy::new(LossConfig::default().with_label_smoothing(0.1))?;
    println!("\nBCE (smoothing 0.1): {:.6}", bce.compute(&y_true, &y_pred, None)?);
    let logits = y_pred.mapv(|p: f64| (p / (1.0 - p)).ln());
    let bce_logits = BinaryCrossentropy::from_logits();
    println!("BCE from logits:     {:.6}", bce_logits.compute(&y_true, &logits, None)?);

    // Hinge with {0, 1} labels needs the binary encoding
    let hinge = Hinge::new(LossConfig::default(), LabelEncoding::Binary)?;
    println!("Hinge (binary labels): {:.6}", hinge.compute(&y_true, &y_pred, None)?);

    // Column-shaped labels are reconciled against flat predictions
    let column = array![[1.0], [0.0], [1.0]].into_dyn();
    let flat = array![0.7, 0.2, 0.6].into_dyn();
    println!("\nMSE with [batch, 1] labels: {:.6}", mse.compute(&column, &flat, None)?);

    // Name-based lookup
    let registry = LossRegistry::with_standard_losses();
    for identifier in [
        json!("mse"),
        json!("kld"),
        json!({"class_name": "huber", "config": {"delta": 0.5, "reduction": "sum"}}),
        json!("no_such_loss"),
    ] {
        match registry.deserialize(&identifier, None)? {
            Some(loss) => println!(
                "{} -> {} ({}) = {:.6}",
                identifier,
                serialize_name(loss.as_ref()),
                loss.reduction(),
                loss.compute(&y_true, &y_pred, None)?
            ),
            None => println!("{} -> not registered", identifier),
        }
    }

    Ok(())
}
