pub mod predictor;
pub mod types;

pub use predictor::{predict, softmax, top_k};
pub use types::{Prediction, PredictionResult, TOP_K};
