//! Digit prediction handler.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::{Extension, Json};
use mnist_inference::{classify_image, Prediction};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::middleware::RequestId;
use crate::state::AppState;

/// Preferred multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

/// Successful prediction response.
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    /// Predicted class index as a string.
    pub prediction: String,
}

/// Classify an uploaded image.
///
/// Any failure, including a missing or malformed upload, is reported as a
/// 500 with an `error` message.
pub async fn predict(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<PredictionResponse>> {
    let request_id = request_id.map(|Extension(id)| id.0).unwrap_or_default();
    let start = Instant::now();

    match run_prediction(&state, multipart).await {
        Ok(prediction) => {
            info!(
                request_id = %request_id,
                confidence = prediction.confidence(),
                "Prediction: {}",
                prediction.class_index
            );
            metrics::record_prediction(prediction.class_index, start.elapsed().as_secs_f64());

            Ok(Json(PredictionResponse {
                prediction: prediction.class_index.to_string(),
            }))
        }
        Err(e) => {
            error!(request_id = %request_id, kind = e.kind(), "Prediction failed: {}", e);
            metrics::record_prediction_failure(e.kind());
            Err(e)
        }
    }
}

async fn run_prediction(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Prediction> {
    let multipart = multipart.map_err(|e| ApiError::multipart(e.body_text()))?;
    let bytes = read_upload(multipart).await?;
    debug!(size = bytes.len(), "Upload received");

    // Decoding and inference are CPU-bound
    let classifier = Arc::clone(&state.classifier);
    let prediction = tokio::task::spawn_blocking(move || classify_image(classifier.as_ref(), &bytes))
        .await
        .map_err(|e| ApiError::internal(format!("Prediction task failed: {}", e)))??;

    Ok(prediction)
}

/// Read the uploaded file into memory.
///
/// Uses the `file` field, or the first field carrying a filename.
async fn read_upload(mut multipart: Multipart) -> ApiResult<Bytes> {
    let mut fallback = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::multipart(e.body_text()))?
    {
        let is_file_field = field.name() == Some(FILE_FIELD);
        let has_filename = field.file_name().is_some();

        if is_file_field || (fallback.is_none() && has_filename) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::multipart(e.body_text()))?;
            if is_file_field {
                return Ok(bytes);
            }
            fallback = Some(bytes);
        }
    }

    fallback.ok_or(ApiError::MissingFile)
}
