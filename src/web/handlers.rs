use crate::{
    detection::{DetectionPipeline, DetectionResult},
    samples::{list_sample_images, ImageInfo},
    utils::error::GatewayError,
    web::{
        extractors::{ImageUpload, RequestId, ValidatedJson},
        AppState,
    },
    Result,
};
use axum::{extract::State, response::Json};
use serde::Deserialize;

/// JSON request body (base64 mode)
#[derive(Debug, Deserialize)]
pub struct DetectJsonRequest {
    /// Base64 image data, optionally as a data URL
    pub image: String,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub output: Option<String>,
}

/// Multipart or raw-body detection.
///
/// Image and model problems come back in-band with HTTP 200; only a
/// malformed request is rejected.
pub async fn predict_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    upload: ImageUpload,
) -> Result<Json<DetectionResult>> {
    let options = state.detect_options(upload.model.as_deref(), upload.output.as_deref())?;

    tracing::info!(
        "Processing detection request: request_id={}, backend={}, bytes={}",
        request_id,
        options.backend,
        upload.image.len()
    );

    let result = DetectionPipeline::process_bytes(
        state.models.clone(),
        upload.image,
        state.config.server_config.max_request_size,
        options,
    )
    .await;

    tracing::info!(
        "Detection request done: request_id={}, faces={}",
        request_id,
        result.face_count
    );

    Ok(Json(result))
}

/// Base64 JSON detection
pub async fn predict_json_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ValidatedJson(request): ValidatedJson<DetectJsonRequest>,
) -> Result<Json<DetectionResult>> {
    let options = state.detect_options(request.model.as_deref(), request.output.as_deref())?;

    tracing::info!(
        "Processing JSON detection request: request_id={}, backend={}",
        request_id,
        options.backend
    );

    let result = DetectionPipeline::process_base64(
        state.models.clone(),
        request.image,
        state.config.server_config.max_request_size,
        options,
    )
    .await;

    tracing::info!(
        "JSON detection request done: request_id={}, faces={}",
        request_id,
        result.face_count
    );

    Ok(Json(result))
}

pub async fn list_images_handler(State(state): State<AppState>) -> Result<Json<Vec<ImageInfo>>> {
    let res_dir = state.config.res_dir.clone();

    let images = tokio::task::spawn_blocking(move || list_sample_images(&res_dir))
        .await
        .map_err(|e| GatewayError::Internal(format!("Image listing task failed: {}", e)))??;

    Ok(Json(images))
}
