use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb};
use resnet_dash::config::ModelConfig;
use resnet_dash::explain::IgConfig;
use resnet_dash::image::PreprocessMode;
use resnet_dash::models::{CategoryLabels, FakeClassifier, ModelManager, WeightSet};
use resnet_dash::web::create_app;
use resnet_dash::Config;
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;
use tower::ServiceExt;

const NUM_CLASSES: usize = 1000;
const BOUNDARY: &str = "resnet-dash-test-boundary";

fn config() -> Config {
    Config::new(
        "127.0.0.1:0".to_string(),
        "models".to_string(),
        Some(1),
        false,
        ModelConfig {
            weights: WeightSet::Imagenet1kV2,
            preprocess: PreprocessMode::Recipe,
        },
        IgConfig {
            n_steps: 4,
            ..IgConfig::default()
        },
    )
    .unwrap()
}

/// Router backed by the shared manager, installed once per test binary.
fn app() -> Router {
    let config = config();
    let labels =
        CategoryLabels::from_names((0..NUM_CLASSES).map(|i| format!("class_{:04}", i))).unwrap();
    let manager =
        ModelManager::with_model(Arc::new(FakeClassifier::new(NUM_CLASSES)), labels, &config)
            .unwrap();
    ModelManager::install(manager).unwrap();
    create_app(config)
}

fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload(field: &str, bytes: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/classify")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header("x-request-id", "web-test")
        .body(Body::from(multipart_body(field, "upload.png", bytes)))
        .unwrap()
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageOutputFormat::Png).unwrap();
    buffer.into_inner()
}

#[tokio::test]
async fn corrupt_upload_returns_error_envelope_without_dashboard() {
    let mut bytes = png(64, 64);
    bytes.truncate(bytes.len() / 2);

    let (status, body) = send(upload("file", &bytes)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["request_id"], "web-test");
    assert_eq!(body["error"]["code"], "IMAGE_DECODE_ERROR");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("An error occurred: "));
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn upload_without_file_field_is_rejected() {
    let (status, body) = send(upload("picture", &png(8, 8))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn valid_upload_returns_dashboard_html() {
    let (status, body) = send(upload("file", &png(320, 240))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body.get("error").is_none());

    let data = &body["data"];
    assert_eq!(data["predictions"].as_array().unwrap().len(), 5);
    let html = data["html"].as_str().unwrap();
    assert!(html.contains("Top 5 Probabilities"));
    assert!(html.contains("data:image/png;base64,"));
}

#[tokio::test]
async fn thin_strip_upload_is_served() {
    let (status, body) = send(upload("file", &png(1, 20000))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn health_reports_installed_model() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
