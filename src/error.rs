use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OdometerError {
    #[error("Invalid image dimensions: {0}")]
    InvalidImageDimensions(String),

    #[error("Recognition engine not ready, try again shortly")]
    OcrEngineUnavailable,

    #[error("Recognition engine failed: {0}")]
    OcrEngineFailure(String),

    #[error("Recognition was cancelled before it completed")]
    Cancelled,

    #[error("Failed to initialize OCR engine: {0}")]
    InitializationError(String),

    #[error("Preprocessing failed: {0}")]
    PreprocessingError(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OdometerError {
    /// HTTP status and stable machine-readable code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            OdometerError::InvalidImageDimensions(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_IMAGE_DIMENSIONS")
            }
            OdometerError::OcrEngineUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "OCR_ENGINE_UNAVAILABLE")
            }
            OdometerError::OcrEngineFailure(_) => (StatusCode::BAD_GATEWAY, "OCR_ENGINE_FAILURE"),
            OdometerError::Cancelled => (StatusCode::REQUEST_TIMEOUT, "CANCELLED"),
            OdometerError::InitializationError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INIT_ERROR")
            }
            OdometerError::PreprocessingError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PREPROCESSING_ERROR")
            }
            OdometerError::UnsupportedFormat(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_FORMAT")
            }
            OdometerError::ImageTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE")
            }
            OdometerError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            OdometerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            OdometerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for OdometerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}
