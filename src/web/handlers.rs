use crate::{
    dashboard::{Pipeline, StageTimings},
    inference::Prediction,
    models::ModelManager,
    utils::error::DashError,
    web::extractors::RequestId,
    Config, Result,
};
use axum::{
    extract::{Multipart, State},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

/// JSON response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub timestamp: String,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, request_id: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        }
    }

    pub fn error(err: &DashError, request_id: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code: err.error_code().to_string(),
                message: err.user_message(),
            }),
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        }
    }
}

/// Payload of a successful classification.
#[derive(Debug, Serialize)]
pub struct ClassifyData {
    pub predictions: Vec<Prediction>,
    /// Ready-to-insert dashboard markup.
    pub html: String,
    pub timings: StageTimings,
    pub convergence_delta: f32,
}

/// Multipart upload handler; the image is read from the `file` field.
pub async fn classify_handler(
    State(config): State<Config>,
    RequestId(request_id): RequestId,
    multipart: Multipart,
) -> Response {
    tracing::info!("Processing classification request: request_id={}", request_id);

    match classify(&config, &request_id, multipart).await {
        Ok(data) => Json(ApiResponse::success(data, request_id)).into_response(),
        Err(err) => {
            tracing::error!(
                "Classification failed: request_id={}, error={}",
                request_id,
                err
            );
            (
                err.status_code(),
                Json(ApiResponse::<()>::error(&err, request_id)),
            )
                .into_response()
        }
    }
}

async fn classify(
    config: &Config,
    request_id: &str,
    mut multipart: Multipart,
) -> Result<ClassifyData> {
    let mut image_data: Option<axum::body::Bytes> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        DashError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "file" => {
                tracing::debug!(
                    "Upload field: file_name={:?}, content_type={:?}",
                    field.file_name(),
                    field.content_type()
                );

                let data = field.bytes().await.map_err(|e| {
                    DashError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;

                if data.is_empty() {
                    return Err(DashError::InvalidInput("Empty file".to_string()));
                }

                tracing::debug!("Received file: {} bytes", data.len());
                image_data = Some(data);
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let image_data =
        image_data.ok_or_else(|| DashError::InvalidInput("No image file provided".to_string()))?;

    let manager = ModelManager::get()?;
    let report = tokio::task::spawn_blocking(move || Pipeline::new(&manager).run(&image_data))
        .await
        .map_err(|e| DashError::Internal(format!("Classification task failed: {}", e)))??;

    if config.dev_mode {
        tracing::debug!("Stage timings [{}]: {:?}", request_id, report.timings);
    }
    tracing::info!(
        "Classification completed: request_id={}, top={}, time={}ms",
        request_id,
        report
            .predictions
            .first()
            .map(|p| p.label.as_str())
            .unwrap_or("none"),
        report.timings.total_ms
    );

    Ok(ClassifyData {
        html: report.dashboard.to_html(),
        predictions: report.predictions,
        timings: report.timings,
        convergence_delta: report.convergence_delta,
    })
}
