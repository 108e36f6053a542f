use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Model not loaded: {0}")]
    ModelUnavailable(String),

    #[error("Detection failed: {0}")]
    Inference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Request body too large: {0}")]
    BodyTooLarge(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::FileTooLarge(_, _) | GatewayError::BodyTooLarge(_) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            GatewayError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            GatewayError::Base64(_) => StatusCode::BAD_REQUEST,
            GatewayError::ImageDecode(_) => StatusCode::BAD_REQUEST,
            GatewayError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::ModelLoad(_) | GatewayError::ModelUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            GatewayError::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            GatewayError::Inference(_) => "INFERENCE_ERROR",
            GatewayError::InvalidInput(_) => "INVALID_INPUT",
            GatewayError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            GatewayError::BodyTooLarge(_) => "BODY_TOO_LARGE",
            GatewayError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            GatewayError::ResourceNotFound(_) => "RESOURCE_NOT_FOUND",
            GatewayError::Config(_) => "CONFIG_ERROR",
            GatewayError::Io(_) => "IO_ERROR",
            GatewayError::Base64(_) => "BASE64_DECODE_ERROR",
            GatewayError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            GatewayError::Ort(_) => "ORT_ERROR",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        });

        tracing::error!("Request failed: {} ({})", self, status);

        (status, axum::Json(error_response)).into_response()
    }
}
