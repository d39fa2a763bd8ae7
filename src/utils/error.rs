use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Label prepended to every error shown on the dashboard.
pub const USER_ERROR_PREFIX: &str = "An error occurred";

#[derive(Error, Debug)]
pub enum DashError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Preprocessing failed: {0}")]
    Preprocess(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Attribution failed: {0}")]
    Attribution(String),

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl DashError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DashError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DashError::ImageDecode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DashError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DashError::Preprocess(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DashError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            DashError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            DashError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            DashError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            DashError::InvalidInput(_) => "INVALID_INPUT",
            DashError::Preprocess(_) => "PREPROCESS_ERROR",
            DashError::Inference(_) => "INFERENCE_ERROR",
            DashError::Attribution(_) => "ATTRIBUTION_ERROR",
            DashError::Render(_) => "RENDER_ERROR",
            DashError::Config(_) => "CONFIG_ERROR",
            DashError::Io(_) => "IO_ERROR",
            DashError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// The single message the dashboard shows for any failed run.
    pub fn user_message(&self) -> String {
        format!("{}: {}", USER_ERROR_PREFIX, self)
    }
}

impl IntoResponse for DashError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "success": false,
            "error": {
                "code": self.error_code(),
                "message": self.user_message(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        tracing::error!("Request failed: {} ({})", self, status);

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_carries_fixed_prefix() {
        let err = DashError::Inference("bad shape".to_string());
        assert_eq!(
            err.user_message(),
            "An error occurred: Inference failed: bad shape"
        );
    }

    #[test]
    fn decode_errors_are_client_errors() {
        let err = DashError::from(image::ImageError::IoError(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "truncated",
        )));
        assert_eq!(err.error_code(), "IMAGE_DECODE_ERROR");
        assert!(err.status_code().is_client_error());
    }
}
