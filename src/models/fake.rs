use crate::models::{Classify, Differentiable};
use crate::utils::error::DashError;
use crate::Result;
use ndarray::{Array2, Array4, ArrayView4, Axis};

/// Deterministic linear stand-in for the pretrained network.
///
/// `logit[k] = bias[k] + sum_c weight[k][c] * mean_{y,x}(focus(y, x) * input[c, y, x])`
/// where `focus` emphasises the image centre. Gradients are exact and
/// independent of the input, which makes attribution results predictable.
pub struct FakeClassifier {
    num_classes: usize,
    weights: Array2<f32>,
    bias: Vec<f32>,
}

impl FakeClassifier {
    pub fn new(num_classes: usize) -> Self {
        let weights = Array2::from_shape_fn((num_classes, 3), |(k, c)| {
            ((k as f32 + 1.0) * (c as f32 + 1.0) * 0.37).sin()
        });
        let bias = (0..num_classes)
            .map(|k| (k as f32 * 0.11).cos() * 0.05)
            .collect();
        Self {
            num_classes,
            weights,
            bias,
        }
    }

    fn focus(y: usize, x: usize, height: usize, width: usize) -> f32 {
        let cy = (height as f32 - 1.0) / 2.0;
        let cx = (width as f32 - 1.0) / 2.0;
        let dy = (y as f32 - cy) / height.max(1) as f32;
        let dx = (x as f32 - cx) / width.max(1) as f32;
        2.0 - (dy * dy + dx * dx).sqrt()
    }

    fn check_channels(batch: &ArrayView4<'_, f32>) -> Result<()> {
        let channels = batch.dim().1;
        if channels != 3 {
            return Err(DashError::Inference(format!(
                "expected 3 input channels, got {}",
                channels
            )));
        }
        Ok(())
    }
}

impl Classify for FakeClassifier {
    fn name(&self) -> &str {
        "fake-linear"
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn forward(&self, batch: ArrayView4<'_, f32>) -> Result<Array2<f32>> {
        Self::check_channels(&batch)?;
        let (n, _, height, width) = batch.dim();
        let area = (height * width).max(1) as f32;

        let mut logits = Array2::<f32>::zeros((n, self.num_classes));
        for (b, image) in batch.axis_iter(Axis(0)).enumerate() {
            let mut pooled = [0.0f32; 3];
            for ((c, y, x), &value) in image.indexed_iter() {
                pooled[c] += Self::focus(y, x, height, width) * value / area;
            }
            for k in 0..self.num_classes {
                let score: f32 = (0..3).map(|c| self.weights[[k, c]] * pooled[c]).sum();
                logits[[b, k]] = score + self.bias[k];
            }
        }
        Ok(logits)
    }
}

impl Differentiable for FakeClassifier {
    fn target_gradients(&self, batch: ArrayView4<'_, f32>, target: usize) -> Result<Array4<f32>> {
        Self::check_channels(&batch)?;
        if target >= self.num_classes {
            return Err(DashError::Attribution(format!(
                "target {} out of range for {} classes",
                target, self.num_classes
            )));
        }

        let (n, c, height, width) = batch.dim();
        let area = (height * width).max(1) as f32;
        Ok(Array4::from_shape_fn((n, c, height, width), |(_, c, y, x)| {
            self.weights[[target, c]] * Self::focus(y, x, height, width) / area
        }))
    }
}
