use crate::image::InputTensor;
use crate::inference::types::{Prediction, PredictionResult, TOP_K};
use crate::models::{CategoryLabels, Classify};
use crate::utils::error::DashError;
use crate::Result;
use ndarray::Axis;
use std::cmp::Ordering;

/// Numerically stable softmax, accumulated in `f64`.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = logits.iter().map(|&l| (l as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|e| (e / sum) as f32).collect()
}

/// Indices of the `k` largest values, largest first; ties keep the lower index first.
pub fn top_k(values: &[f32], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    order.truncate(k);
    order
}

/// Runs one forward pass and ranks the five most likely classes.
pub fn predict<M: Classify + ?Sized>(
    model: &M,
    input: &InputTensor,
    labels: &CategoryLabels,
) -> Result<PredictionResult> {
    if model.num_classes() != labels.len() {
        return Err(DashError::Inference(format!(
            "model produces {} classes but {} labels are loaded",
            model.num_classes(),
            labels.len()
        )));
    }
    if labels.len() < TOP_K {
        return Err(DashError::Inference(format!(
            "need at least {} classes to rank, got {}",
            TOP_K,
            labels.len()
        )));
    }

    let batch = input.view().insert_axis(Axis(0));
    let logits = model.forward(batch)?;
    if logits.dim() != (1, labels.len()) {
        return Err(DashError::Inference(format!(
            "unexpected output shape {:?}, expected (1, {})",
            logits.dim(),
            labels.len()
        )));
    }

    let row: Vec<f32> = logits.row(0).to_vec();
    if row.iter().any(|v| !v.is_finite()) {
        return Err(DashError::Inference(
            "model produced non-finite scores".to_string(),
        ));
    }

    let probabilities = softmax(&row);
    let top = top_k(&probabilities, TOP_K)
        .into_iter()
        .map(|index| Prediction {
            index,
            label: labels.get(index).unwrap_or_default().to_string(),
            probability: probabilities[index],
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        "Top prediction for {}: {} ({:.4})",
        model.name(),
        top[0].label,
        top[0].probability
    );

    Ok(PredictionResult { top, probabilities })
}
