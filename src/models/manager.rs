use crate::explain::IgConfig;
use crate::image::Preprocessor;
use crate::models::{CategoryLabels, Differentiable, ResNet50, WeightSet};
use crate::utils::error::DashError;
use crate::{Config, Result};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Initialize-once holder for a shared, read-only value.
///
/// The initializer runs at most once per cache even under concurrent callers;
/// a failed initialization leaves the cache empty so a later call can retry.
pub struct ModelCache<T> {
    cell: OnceCell<Arc<T>>,
}

impl<T> ModelCache<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub fn get_or_try_init<F>(&self, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        self.cell
            .get_or_try_init(|| init().map(Arc::new))
            .map(Arc::clone)
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> Default for ModelCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide model manager
static MODEL_MANAGER: ModelCache<ModelManager> = ModelCache::new();

/// Everything a classification run reads: the network, its labels, and the
/// settings that go with them.
pub struct ModelManager {
    model: Arc<dyn Differentiable>,
    labels: Arc<CategoryLabels>,
    preprocessor: Preprocessor,
    weights: WeightSet,
    explain_config: IgConfig,
    load_time: Duration,
}

impl ModelManager {
    /// Load the configured model on first call; later calls return the same instance.
    pub fn ensure_initialized(config: &Config) -> Result<Arc<ModelManager>> {
        MODEL_MANAGER.get_or_try_init(|| Self::load(config))
    }

    /// Make `manager` the shared instance without touching the models
    /// directory. If one is already installed it is kept and returned.
    pub fn install(manager: ModelManager) -> Result<Arc<ModelManager>> {
        MODEL_MANAGER.get_or_try_init(|| Ok(manager))
    }

    /// The shared instance, if `ensure_initialized` has succeeded.
    pub fn get() -> Result<Arc<ModelManager>> {
        MODEL_MANAGER
            .get()
            .ok_or_else(|| DashError::Internal("Model manager not initialized".to_string()))
    }

    /// Build a manager from the weights and category list in the models directory.
    pub fn load(config: &Config) -> Result<Self> {
        let start = Instant::now();
        let labels = CategoryLabels::from_file(config.labels_path())?;

        tracing::info!(
            "Loading ResNet-50 ({}) from {}",
            config.model_config.weights,
            config.weights_path().display()
        );
        let model = ResNet50::load(&config.weights_path(), labels.len())?;

        let mut manager = Self::with_model(Arc::new(model), labels, config)?;
        manager.load_time = start.elapsed();
        tracing::info!(
            "Model manager initialized in {:.2}s",
            manager.load_time.as_secs_f32()
        );
        Ok(manager)
    }

    /// Assemble a manager around an already constructed model.
    pub fn with_model(
        model: Arc<dyn Differentiable>,
        labels: CategoryLabels,
        config: &Config,
    ) -> Result<Self> {
        if model.num_classes() != labels.len() {
            return Err(DashError::ModelLoad(format!(
                "model '{}' has {} outputs but {} category labels were loaded",
                model.name(),
                model.num_classes(),
                labels.len()
            )));
        }

        let weights = config.model_config.weights;
        Ok(Self {
            model,
            labels: Arc::new(labels),
            preprocessor: Preprocessor::new(config.model_config.preprocess, weights),
            weights,
            explain_config: config.explain_config.clone(),
            load_time: Duration::ZERO,
        })
    }

    pub fn model(&self) -> &Arc<dyn Differentiable> {
        &self.model
    }

    pub fn labels(&self) -> &CategoryLabels {
        &self.labels
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn explain_config(&self) -> &IgConfig {
        &self.explain_config
    }

    pub fn get_stats(&self) -> ModelStats {
        ModelStats {
            model: self.model.name().to_string(),
            weights: self.weights,
            num_classes: self.model.num_classes(),
            preprocess: format!("{:?}", self.preprocessor.mode()).to_lowercase(),
            ig_steps: self.explain_config.n_steps,
            ig_method: self.explain_config.method.to_string(),
            load_time_ms: self.load_time.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelStats {
    pub model: String,
    pub weights: WeightSet,
    pub num_classes: usize,
    pub preprocess: String,
    pub ig_steps: usize,
    pub ig_method: String,
    pub load_time_ms: u64,
}

pub fn health_check() -> Result<()> {
    let manager = ModelManager::get()?;
    if manager.labels().len() != manager.model().num_classes() {
        return Err(DashError::Internal(
            "label count no longer matches model outputs".to_string(),
        ));
    }
    Ok(())
}

pub fn get_model_stats() -> Result<ModelStats> {
    Ok(ModelManager::get()?.get_stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::models::FakeClassifier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config() -> Config {
        Config::new(
            "127.0.0.1:0".to_string(),
            "models".to_string(),
            Some(1),
            false,
            ModelConfig::default(),
            IgConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn cache_initializes_once_and_returns_same_instance() {
        let cache: ModelCache<String> = ModelCache::new();
        let inits = AtomicUsize::new(0);
        let init = || {
            inits.fetch_add(1, Ordering::SeqCst);
            Ok("resnet".to_string())
        };

        assert!(!cache.is_initialized());
        let first = cache.get_or_try_init(init).unwrap();
        let second = cache
            .get_or_try_init(|| {
                inits.fetch_add(1, Ordering::SeqCst);
                Ok("other".to_string())
            })
            .unwrap();

        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &cache.get().unwrap()));
    }

    #[test]
    fn failed_initialization_can_be_retried() {
        let cache: ModelCache<u32> = ModelCache::new();
        let err = cache.get_or_try_init(|| Err(DashError::ModelLoad("missing".to_string())));
        assert!(err.is_err());
        assert!(cache.get().is_none());

        assert_eq!(*cache.get_or_try_init(|| Ok(7)).unwrap(), 7);
    }

    #[test]
    fn cache_is_shared_across_threads() {
        let cache: Arc<ModelCache<usize>> = Arc::new(ModelCache::new());
        let inits = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let inits = Arc::clone(&inits);
                std::thread::spawn(move || {
                    cache
                        .get_or_try_init(|| {
                            inits.fetch_add(1, Ordering::SeqCst);
                            Ok(42)
                        })
                        .unwrap()
                })
            })
            .collect();

        let values: Vec<Arc<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
    }

    #[test]
    fn label_count_must_match_model_outputs() {
        let labels = CategoryLabels::from_names((0..10).map(|i| format!("class {}", i))).unwrap();
        let model = Arc::new(FakeClassifier::new(12));
        let err = ModelManager::with_model(model, labels, &test_config()).err().unwrap();
        assert!(matches!(err, DashError::ModelLoad(_)));
    }

    #[test]
    fn stats_describe_the_loaded_model() {
        let labels = CategoryLabels::from_names((0..10).map(|i| format!("class {}", i))).unwrap();
        let manager =
            ModelManager::with_model(Arc::new(FakeClassifier::new(10)), labels, &test_config())
                .unwrap();
        let stats = manager.get_stats();
        assert_eq!(stats.num_classes, 10);
        assert_eq!(stats.weights, WeightSet::Imagenet1kV2);
        assert_eq!(stats.preprocess, "recipe");
        assert_eq!(stats.ig_steps, 50);
    }
}
