pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod ui;

use crate::{models::ModelManager, utils::error::DashError, Config, Result};
use axum::{
    extract::DefaultBodyLimit,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};

pub async fn serve(config: Config) -> Result<()> {
    // Weights load before the listener opens; a failure stops startup.
    let init_config = config.clone();
    tokio::task::spawn_blocking(move || ModelManager::ensure_initialized(&init_config))
        .await
        .map_err(|e| DashError::Internal(format!("Model loading task failed: {}", e)))??;

    let app = create_app(config.clone());

    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        DashError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET  /              - Dashboard");
    tracing::info!("  POST /api/classify  - Multipart image upload (field 'file')");
    tracing::info!("  GET  /health        - Health check");
    tracing::info!("  GET  /api/info      - Service information");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        DashError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| DashError::Internal(format!("Server failed to start: {}", e)))?;

    Ok(())
}

pub fn create_app(config: Config) -> Router {
    let mut app = Router::new()
        .route("/", get(ui::index_handler))
        .route("/api/classify", post(handlers::classify_handler))
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(
            config.server_config.max_request_size,
        ))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_logging));

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    app.with_state(config)
}

async fn health_handler() -> Result<Json<serde_json::Value>> {
    crate::models::health_check()?;
    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })))
}

async fn info_handler() -> Result<Json<serde_json::Value>> {
    let stats = crate::models::get_model_stats()?;
    Ok(Json(json!({
        "service": "ResNet-50 Image Classifier",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "model": stats,
        "features": {
            "top_k": crate::inference::TOP_K,
            "attribution": "integrated_gradients",
            "formats": ["png", "jpeg"]
        }
    })))
}
