use serde::Serialize;

/// Number of ranked classes reported per image.
pub const TOP_K: usize = 5;

/// One ranked class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Position in the model output.
    pub index: usize,
    pub label: String,
    /// Softmax probability in `[0, 1]`.
    pub probability: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    /// Highest probability first.
    pub top: Vec<Prediction>,
    /// Full distribution over every class.
    #[serde(skip)]
    pub probabilities: Vec<f32>,
}

impl PredictionResult {
    /// Index of the most likely class, the attribution target.
    pub fn top_index(&self) -> Option<usize> {
        self.top.first().map(|p| p.index)
    }

    pub fn top_label(&self) -> Option<&str> {
        self.top.first().map(|p| p.label.as_str())
    }
}
