//! API integration tests.

use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb};
use mnist_api::{create_router, ApiConfig, AppState};
use mnist_inference::{check_input_shape, Classifier, InferenceError, InferenceResult};
use ndarray::Array4;
use serde_json::Value;
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;

const BOUNDARY: &str = "mnist-test-boundary";

/// Scores each digit by its distance from the mean pixel intensity.
struct MeanIntensity;

impl Classifier for MeanIntensity {
    fn scores(&self, input: &Array4<f32>) -> InferenceResult<Vec<f32>> {
        check_input_shape(input)?;
        let target = input.mean().unwrap_or(0.0) * 9.0;
        Ok((0..10).map(|c| -(c as f32 - target).abs()).collect())
    }

    fn describe(&self) -> String {
        "mean-intensity".to_string()
    }
}

struct Broken;

impl Classifier for Broken {
    fn scores(&self, _input: &Array4<f32>) -> InferenceResult<Vec<f32>> {
        Err(InferenceError::inference("session exploded"))
    }
}

fn router_with(classifier: Arc<dyn Classifier>) -> Router {
    let state = AppState::with_classifier(ApiConfig::default(), classifier);
    create_router(state, None)
}

fn create_test_router() -> Router {
    router_with(Arc::new(MeanIntensity))
}

fn png_digit(value: u8) -> Vec<u8> {
    let img = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(28, 28, Luma([value])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}

fn multipart_body(field: &str, filename: Option<&str>, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    write!(body, "--{}\r\n", BOUNDARY).unwrap();
    match filename {
        Some(name) => write!(
            body,
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, name
        )
        .unwrap(),
        None => write!(body, "Content-Disposition: form-data; name=\"{}\"\r\n", field).unwrap(),
    }
    write!(body, "Content-Type: {}\r\n\r\n", content_type).unwrap();
    body.extend_from_slice(data);
    write!(body, "\r\n--{}--\r\n", BOUNDARY).unwrap();
    body
}

fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn file_upload(data: &[u8], content_type: &str) -> Request<Body> {
    upload_request(
        "/predict/",
        multipart_body("file", Some("digit.png"), content_type, data),
    )
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Test health endpoint.
#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_router();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model"], "mean-intensity");
}

/// Test a valid image yields a digit prediction.
#[tokio::test]
async fn test_predict_valid_image() {
    let app = create_test_router();

    let response = app
        .oneshot(file_upload(&png_digit(255), "image/png"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let digit: u8 = body["prediction"].as_str().unwrap().parse().unwrap();
    assert!(digit <= 9);
    assert_eq!(digit, 9);
    assert!(body.get("error").is_none());
}

/// Test the route also answers without the trailing slash.
#[tokio::test]
async fn test_predict_without_trailing_slash() {
    let app = create_test_router();

    let body = multipart_body("file", Some("digit.png"), "image/png", &png_digit(0));
    let response = app.oneshot(upload_request("/predict", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["prediction"], "0");
}

/// Test colour images of arbitrary size are accepted.
#[tokio::test]
async fn test_predict_large_colour_image() {
    let app = create_test_router();

    let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(640, 480, Rgb([0u8, 255, 255])));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg).unwrap();

    let response = app.oneshot(file_upload(&bytes, "image/jpeg")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    // Only the red channel is used, so a cyan image reads as black
    assert_eq!(json_body(response).await["prediction"], "0");
}

/// Test a text upload is rejected with a server error.
#[tokio::test]
async fn test_predict_text_file_fails() {
    let app = create_test_router();

    let response = app
        .oneshot(upload_request(
            "/predict/",
            multipart_body("file", Some("notes.txt"), "text/plain", b"not an image at all"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(!body["error"].as_str().unwrap().is_empty());
    assert!(body.get("prediction").is_none());
}

/// Test an empty upload is rejected.
#[tokio::test]
async fn test_predict_empty_file_fails() {
    let app = create_test_router();

    let response = app.oneshot(file_upload(&[], "image/png")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

/// Test a form without any file is rejected.
#[tokio::test]
async fn test_predict_missing_file_fails() {
    let app = create_test_router();

    let response = app
        .oneshot(upload_request(
            "/predict/",
            multipart_body("note", None, "text/plain", b"hello"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "No file uploaded");
}

/// Test a file field under another name is still used.
#[tokio::test]
async fn test_predict_uses_first_named_file() {
    let app = create_test_router();

    let response = app
        .oneshot(upload_request(
            "/predict/",
            multipart_body("image", Some("digit.png"), "image/png", &png_digit(255)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["prediction"], "9");
}

/// Test a non-multipart body is rejected with a server error.
#[tokio::test]
async fn test_predict_non_multipart_fails() {
    let app = create_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict/")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"image": "abc"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!json_body(response).await["error"].as_str().unwrap().is_empty());
}

/// Test model failures surface as server errors.
#[tokio::test]
async fn test_predict_model_failure() {
    let app = router_with(Arc::new(Broken));

    let response = app
        .oneshot(file_upload(&png_digit(128), "image/png"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await["error"],
        "Inference failed: session exploded"
    );
}

/// Test repeated uploads of the same image agree.
#[tokio::test]
async fn test_predict_is_deterministic() {
    let app = create_test_router();
    let image = png_digit(140);

    let mut predictions = Vec::new();
    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(file_upload(&image, "image/png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        predictions.push(json_body(response).await["prediction"].clone());
    }

    assert!(predictions.windows(2).all(|w| w[0] == w[1]));
}

/// Test GET is not routed to the predictor.
#[tokio::test]
async fn test_predict_requires_post() {
    let app = create_test_router();

    let response = app
        .oneshot(Request::builder().uri("/predict/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

/// Test request ids are echoed back.
#[tokio::test]
async fn test_request_id_header() {
    let app = create_test_router();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("X-Request-ID", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "abc-123");

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

/// Test security headers.
#[tokio::test]
async fn test_security_headers() {
    let app = create_test_router();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    fn count(&self, needle: &str) -> usize {
        self.contents().lines().filter(|l| l.contains(needle)).count()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Route logs at INFO and above into a buffer for the current thread.
fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

/// Test each outcome is logged exactly once.
#[tokio::test]
async fn test_each_outcome_logged_once() {
    let (logs, _guard) = capture_logs();

    let app = create_test_router();

    let response = app
        .clone()
        .oneshot(file_upload(&png_digit(255), "image/png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(logs.count("Prediction: 9"), 1);
    assert_eq!(logs.count("Prediction failed"), 0);

    let response = app
        .oneshot(file_upload(b"garbage", "image/png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(logs.count("Prediction: "), 1);
    assert_eq!(logs.count("Prediction failed"), 1);
    assert!(logs.contents().contains("ERROR"));

    // The request logger stays below INFO for predictions
    assert_eq!(logs.count("Request completed"), 0);
}

/// Test uploads over the body limit fail like any other bad upload.
#[tokio::test]
async fn test_predict_oversized_upload_fails() {
    let (logs, _guard) = capture_logs();

    let config = ApiConfig {
        max_body_size: 1024,
        ..ApiConfig::default()
    };
    let app = create_router(
        AppState::with_classifier(config, Arc::new(MeanIntensity)),
        None,
    );

    let body = multipart_body("file", Some("digit.png"), "image/png", &[0u8; 4096]);
    let request = Request::builder()
        .method("POST")
        .uri("/predict/")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(!body["error"].as_str().unwrap().is_empty());
    assert!(body.get("prediction").is_none());
    assert_eq!(logs.count("Prediction failed"), 1);
}
