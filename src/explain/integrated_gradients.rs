use crate::explain::IntegrationMethod;
use crate::image::InputTensor;
use crate::models::Differentiable;
use crate::utils::error::DashError;
use crate::Result;
use ndarray::{stack, Array2, Array3, Array4, Axis};

#[derive(Debug, Clone)]
pub struct IgConfig {
    /// Number of points on the baseline-to-input path.
    pub n_steps: usize,
    pub method: IntegrationMethod,
    /// Path points evaluated per gradient call.
    pub internal_batch_size: usize,
}

impl Default for IgConfig {
    fn default() -> Self {
        Self {
            n_steps: 50,
            method: IntegrationMethod::GaussLegendre,
            internal_batch_size: 8,
        }
    }
}

impl IgConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.internal_batch_size == 0 {
            return Err("internal batch size must be at least 1".to_string());
        }
        self.method.alphas_and_weights(self.n_steps).map(|_| ())
    }
}

/// Per-element attributions for one target class, congruent with the input tensor.
#[derive(Debug, Clone)]
pub struct AttributionMap {
    values: Array3<f32>,
    target: usize,
    convergence_delta: f32,
}

impl AttributionMap {
    /// Raw attributions, `(channels, height, width)`.
    pub fn values(&self) -> &Array3<f32> {
        &self.values
    }

    /// Channels summed into one value per pixel, `(height, width)`.
    pub fn collapsed(&self) -> Array2<f32> {
        self.values.sum_axis(Axis(0))
    }

    /// `(height, width)`
    pub fn spatial_dims(&self) -> (usize, usize) {
        let (_, height, width) = self.values.dim();
        (height, width)
    }

    pub fn target(&self) -> usize {
        self.target
    }

    /// Sum of attributions minus the score difference they should account for.
    pub fn convergence_delta(&self) -> f32 {
        self.convergence_delta
    }

    pub fn total(&self) -> f32 {
        self.values.sum()
    }
}

/// Integrated gradients from an all-zero baseline.
pub struct IntegratedGradients<'m, M: Differentiable + ?Sized> {
    model: &'m M,
    config: IgConfig,
}

impl<'m, M: Differentiable + ?Sized> IntegratedGradients<'m, M> {
    pub fn new(model: &'m M, config: IgConfig) -> Self {
        Self { model, config }
    }

    pub fn attribute(&self, input: &InputTensor, target: usize) -> Result<AttributionMap> {
        self.config.validate().map_err(DashError::Attribution)?;
        if target >= self.model.num_classes() {
            return Err(DashError::Attribution(format!(
                "target {} out of range for {} classes",
                target,
                self.model.num_classes()
            )));
        }

        let x = input.view();
        let baseline = Array3::<f32>::zeros(x.raw_dim());
        let delta = &x - &baseline;
        let (channels, height, width) = x.dim();

        let (alphas, weights) = self
            .config
            .method
            .alphas_and_weights(self.config.n_steps)
            .map_err(DashError::Attribution)?;

        let mut integrated = Array3::<f32>::zeros(x.raw_dim());
        let chunk = self.config.internal_batch_size;
        for (chunk_index, (alpha_chunk, weight_chunk)) in
            alphas.chunks(chunk).zip(weights.chunks(chunk)).enumerate()
        {
            let mut batch = Array4::<f32>::zeros((alpha_chunk.len(), channels, height, width));
            for (mut slot, &alpha) in batch.axis_iter_mut(Axis(0)).zip(alpha_chunk) {
                slot.assign(&baseline);
                slot.scaled_add(alpha as f32, &delta);
            }

            let grads = self.model.target_gradients(batch.view(), target)?;
            if grads.dim() != batch.dim() {
                return Err(DashError::Attribution(format!(
                    "gradient shape {:?} does not match input batch {:?}",
                    grads.dim(),
                    batch.dim()
                )));
            }

            for (grad, &weight) in grads.axis_iter(Axis(0)).zip(weight_chunk) {
                integrated.scaled_add(weight as f32, &grad);
            }
            tracing::trace!(
                "Integrated gradients chunk {} ({} points) done",
                chunk_index,
                alpha_chunk.len()
            );
        }

        let values = integrated * &delta;

        let endpoints = stack(Axis(0), &[baseline.view(), x])
            .map_err(|e| DashError::Attribution(e.to_string()))?;
        let scores = self.model.forward(endpoints.view())?;
        let expected = scores[[1, target]] - scores[[0, target]];
        let convergence_delta = values.sum() - expected;

        tracing::debug!(
            "Attribution for class {}: total={:.5}, score change={:.5}, delta={:.3e}",
            target,
            values.sum(),
            expected,
            convergence_delta
        );

        Ok(AttributionMap {
            values,
            target,
            convergence_delta,
        })
    }
}
