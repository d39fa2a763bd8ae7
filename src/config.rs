use crate::explain::IgConfig;
use crate::image::PreprocessMode;
use crate::models::WeightSet;
use crate::utils::error::DashError;
use crate::Result;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,

    /// Directory holding weights and the category list
    pub models_dir: PathBuf,

    /// Runtime worker threads
    pub workers: usize,

    /// Development mode
    pub dev_mode: bool,

    pub model_config: ModelConfig,

    pub explain_config: IgConfig,

    pub server_config: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Pretrained weight set to load
    pub weights: WeightSet,

    /// How uploads are turned into model input
    pub preprocess: PreprocessMode,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum request body size (bytes)
    pub max_request_size: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weights: WeightSet::Imagenet1kV2,
            preprocess: PreprocessMode::Recipe,
        }
    }
}

impl Config {
    pub fn new(
        bind_addr: String,
        models_dir: String,
        workers: Option<usize>,
        dev_mode: bool,
        model_config: ModelConfig,
        explain_config: IgConfig,
    ) -> Result<Self> {
        let workers = workers.unwrap_or_else(num_cpus::get);
        if workers == 0 {
            return Err(DashError::Config("workers must be at least 1".to_string()));
        }

        explain_config.validate().map_err(DashError::Config)?;

        let server_config = ServerConfig {
            max_request_size: 50 * 1024 * 1024, // 50MB
        };

        Ok(Self {
            bind_addr,
            models_dir: PathBuf::from(models_dir),
            workers,
            dev_mode,
            model_config,
            explain_config,
            server_config,
        })
    }

    /// Weights file for the configured weight set. A `.safetensors` file with the
    /// same stem takes precedence over the torchvision `.pth` checkpoint.
    pub fn weights_path(&self) -> PathBuf {
        let pth = self.models_dir.join(self.model_config.weights.file_name());
        let safetensors = pth.with_extension("safetensors");
        if safetensors.exists() {
            safetensors
        } else {
            pth
        }
    }

    /// ImageNet category names, one per line, in model output order.
    pub fn labels_path(&self) -> PathBuf {
        self.models_dir.join("imagenet_categories.txt")
    }
}
