//! Pixel attributions explaining a single prediction.

pub mod integrated_gradients;
pub mod quadrature;

pub use integrated_gradients::{AttributionMap, IgConfig, IntegratedGradients};
pub use quadrature::IntegrationMethod;
