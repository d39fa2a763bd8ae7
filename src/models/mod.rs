pub mod fake;
pub mod labels;
pub mod manager;
pub mod resnet;

pub use fake::FakeClassifier;
pub use labels::CategoryLabels;
pub use manager::{health_check, get_model_stats, ModelCache, ModelManager, ModelStats};
pub use resnet::ResNet50;

use crate::Result;
use ndarray::{Array2, Array4, ArrayView4};
use std::fmt;
use std::str::FromStr;

/// Forward inference over a channel-first `(N, 3, H, W)` batch.
pub trait Classify: Send + Sync {
    fn name(&self) -> &str;

    fn num_classes(&self) -> usize;

    /// Raw scores, shape `(N, num_classes)`.
    fn forward(&self, batch: ArrayView4<'_, f32>) -> Result<Array2<f32>>;
}

/// A classifier that can differentiate one output score with respect to its input.
pub trait Differentiable: Classify {
    /// Gradient of `logits[:, target]` with respect to every input element,
    /// one gradient per batch entry, same shape as `batch`.
    fn target_gradients(&self, batch: ArrayView4<'_, f32>, target: usize) -> Result<Array4<f32>>;
}

/// Pretrained ResNet-50 weight releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum WeightSet {
    #[serde(rename = "IMAGENET1K_V1")]
    Imagenet1kV1,
    #[default]
    #[serde(rename = "IMAGENET1K_V2")]
    Imagenet1kV2,
}

impl WeightSet {
    pub fn name(&self) -> &'static str {
        match self {
            WeightSet::Imagenet1kV1 => "IMAGENET1K_V1",
            WeightSet::Imagenet1kV2 => "IMAGENET1K_V2",
        }
    }

    /// torchvision checkpoint file name.
    pub fn file_name(&self) -> &'static str {
        match self {
            WeightSet::Imagenet1kV1 => "resnet50-0676ba61.pth",
            WeightSet::Imagenet1kV2 => "resnet50-11ad3fa6.pth",
        }
    }

    /// Shorter-side resize used by the release's evaluation transform.
    pub fn resize_size(&self) -> u32 {
        match self {
            WeightSet::Imagenet1kV1 => 256,
            WeightSet::Imagenet1kV2 => 232,
        }
    }
}

impl fmt::Display for WeightSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WeightSet {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v1" | "imagenet1k_v1" => Ok(WeightSet::Imagenet1kV1),
            "v2" | "imagenet1k_v2" => Ok(WeightSet::Imagenet1kV2),
            other => Err(format!("unknown weight set '{}', expected v1 or v2", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_sets_parse_short_and_long_names() {
        assert_eq!("v1".parse::<WeightSet>().unwrap(), WeightSet::Imagenet1kV1);
        assert_eq!("IMAGENET1K_V2".parse::<WeightSet>().unwrap(), WeightSet::Imagenet1kV2);
        assert!("v3".parse::<WeightSet>().is_err());
    }

    #[test]
    fn default_weight_set_is_v2() {
        let weights = WeightSet::default();
        assert_eq!(weights.name(), "IMAGENET1K_V2");
        assert_eq!(weights.resize_size(), 232);
    }

    #[test]
    fn weight_sets_map_to_torchvision_files() {
        assert_eq!(WeightSet::Imagenet1kV1.file_name(), "resnet50-0676ba61.pth");
        assert_eq!(WeightSet::Imagenet1kV1.resize_size(), 256);
        assert_eq!(WeightSet::Imagenet1kV2.file_name(), "resnet50-11ad3fa6.pth");
    }
}
