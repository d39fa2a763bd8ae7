use crate::dashboard::types::{RunReport, Stage, StageTimings};
use crate::explain::IntegratedGradients;
use crate::image::ImageLoader;
use crate::inference::predict;
use crate::models::ModelManager;
use crate::render::Presenter;
use crate::utils::error::DashError;
use crate::Result;
use image::GenericImageView;
use std::time::Instant;

/// One upload from raw bytes to a rendered dashboard.
///
/// Stages run strictly in order; the first failure aborts the run and is
/// returned unchanged, so nothing downstream of it is computed or shown.
pub struct Pipeline<'a> {
    manager: &'a ModelManager,
    presenter: Presenter,
}

impl<'a> Pipeline<'a> {
    pub fn new(manager: &'a ModelManager) -> Self {
        Self {
            manager,
            presenter: Presenter::default(),
        }
    }

    pub fn run(&self, bytes: &[u8]) -> Result<RunReport> {
        let start = Instant::now();
        let mut timings = StageTimings::default();
        let model = self.manager.model();

        let image = Self::timed(Stage::Decode, &mut timings, || {
            ImageLoader::from_bytes(bytes)
        })?;

        let input = Self::timed(Stage::Preprocess, &mut timings, || {
            self.manager.preprocessor().preprocess(&image)
        })?;

        let predictions = Self::timed(Stage::Predict, &mut timings, || {
            predict(&**model, &input, self.manager.labels())
        })?;
        let target = predictions
            .top_index()
            .ok_or_else(|| DashError::Inference("no prediction to explain".to_string()))?;

        let attribution = Self::timed(Stage::Explain, &mut timings, || {
            IntegratedGradients::new(&**model, self.manager.explain_config().clone())
                .attribute(&input, target)
        })?;

        let dashboard = Self::timed(Stage::Render, &mut timings, || {
            self.presenter.render(&image, &predictions, &attribution)
        })?;

        timings.total_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Classified {}x{} image as '{}' ({:.3}) in {}ms (explain {}ms, delta {:.3e})",
            image.width(),
            image.height(),
            predictions.top_label().unwrap_or_default(),
            predictions.top[0].probability,
            timings.total_ms,
            timings.explain_ms,
            attribution.convergence_delta()
        );

        Ok(RunReport {
            predictions: predictions.top,
            dashboard,
            image_size: image.dimensions(),
            attribution_size: attribution.spatial_dims(),
            convergence_delta: attribution.convergence_delta(),
            timings,
        })
    }

    fn timed<T>(
        stage: Stage,
        timings: &mut StageTimings,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let start = Instant::now();
        let result = f();
        let ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => {
                timings.record(stage, ms);
                tracing::debug!("Stage {} finished in {}ms", stage, ms);
            }
            Err(e) => tracing::warn!("Stage {} failed after {}ms: {}", stage, ms, e),
        }
        result
    }
}
