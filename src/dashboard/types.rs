use crate::inference::Prediction;
use crate::render::Dashboard;
use serde::Serialize;
use std::fmt;

/// Stages of one classification run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decode,
    Preprocess,
    Predict,
    Explain,
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Decode => "decode",
            Stage::Preprocess => "preprocess",
            Stage::Predict => "predict",
            Stage::Explain => "explain",
            Stage::Render => "render",
        };
        f.write_str(name)
    }
}

/// Wall-clock time per stage, in milliseconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    pub decode_ms: u64,
    pub preprocess_ms: u64,
    pub predict_ms: u64,
    pub explain_ms: u64,
    pub render_ms: u64,
    pub total_ms: u64,
}

impl StageTimings {
    pub fn record(&mut self, stage: Stage, ms: u64) {
        match stage {
            Stage::Decode => self.decode_ms = ms,
            Stage::Preprocess => self.preprocess_ms = ms,
            Stage::Predict => self.predict_ms = ms,
            Stage::Explain => self.explain_ms = ms,
            Stage::Render => self.render_ms = ms,
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub predictions: Vec<Prediction>,
    #[serde(skip)]
    pub dashboard: Dashboard,
    /// Uploaded image size, `(width, height)`.
    pub image_size: (u32, u32),
    /// Spatial size of the attribution map, `(height, width)`.
    pub attribution_size: (usize, usize),
    pub convergence_delta: f32,
    pub timings: StageTimings,
}
