use anyhow::Result;
use clap::Parser;
use resnet_dash::{
    config::{Config, ModelConfig},
    explain::{IgConfig, IntegrationMethod},
    image::PreprocessMode,
    models::WeightSet,
    web::serve,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "resnet-dash")]
#[command(about = "ResNet-50 image classification dashboard with integrated-gradients explanations")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:8501")]
    bind: String,

    /// Directory holding the weights file and imagenet_categories.txt
    ///
    /// Weights: torchvision's resnet50-0676ba61.pth (v1) or
    /// resnet50-11ad3fa6.pth (v2), or the same tensors as .safetensors.
    /// Categories: the 1000 ImageNet class names, one per line, e.g.
    /// pytorch/hub's imagenet_classes.txt saved under that name.
    #[arg(long, default_value = "models")]
    models_dir: String,

    /// Pretrained weight set (v1 or v2)
    #[arg(long, default_value = "v2")]
    weights: WeightSet,

    /// Input preprocessing (recipe or direct)
    #[arg(long, default_value = "recipe")]
    preprocess: PreprocessMode,

    /// Integration steps for attributions
    #[arg(long, default_value_t = 50)]
    ig_steps: usize,

    /// Interpolated inputs per gradient batch
    #[arg(long, default_value_t = 8)]
    ig_batch_size: usize,

    /// Quadrature rule for the path integral
    #[arg(long, default_value = "gausslegendre")]
    ig_method: IntegrationMethod,

    /// Number of worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable development mode
    #[arg(long)]
    dev: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting ResNet-50 dashboard...");
    tracing::info!("Bind address: {}", args.bind);
    tracing::info!("Models directory: {}", args.models_dir);

    let model_config = ModelConfig {
        weights: args.weights,
        preprocess: args.preprocess,
    };
    let explain_config = IgConfig {
        n_steps: args.ig_steps,
        method: args.ig_method,
        internal_batch_size: args.ig_batch_size,
    };

    let config = Config::new(
        args.bind,
        args.models_dir,
        args.workers,
        args.dev,
        model_config,
        explain_config,
    )?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))?;

    Ok(())
}
