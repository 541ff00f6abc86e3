//! HTTP-facing errors. The extraction pipeline itself never errors; these only
//! cover request handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The multipart form had no `file` field, or it was empty.
    #[error("No file provided")]
    MissingFile,

    /// The multipart body could not be read.
    #[error("Could not parse multipart form: {0}")]
    Multipart(String),

    /// The request body exceeded the configured upload limit.
    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    /// The upload is neither a PDF nor an image.
    #[error("Unsupported file type: {0}. Upload a PDF or an image")]
    UnsupportedMediaType(String),

    #[error("Receipt not found: {0}")]
    ReceiptNotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFile | Self::Multipart(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::ReceiptNotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!("Request rejected ({}): {}", status, self);
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(e.body_text())
        } else {
            Self::Multipart(e.body_text())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::MissingFile.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Multipart("eof".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::PayloadTooLarge("limit".into()).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::UnsupportedMediaType("text/plain".into()).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            ApiError::ReceiptNotFound("rcpt_x".into()).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_into_response_status() {
        let response = ApiError::MissingFile.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
