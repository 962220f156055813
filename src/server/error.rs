//! HTTP mapping for [`InvoiceError`].

use crate::error::InvoiceError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

impl InvoiceError {
    /// HTTP status for this failure class.
    pub fn status_code(&self) -> StatusCode {
        match self {
            InvoiceError::UnsupportedFormat { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            InvoiceError::ConversionError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            InvoiceError::MissingUpload | InvoiceError::InvalidUpload { .. } => {
                StatusCode::BAD_REQUEST
            }
            InvoiceError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            InvoiceError::EngineUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InvoiceError::NetworkError { .. }
            | InvoiceError::AuthError { .. }
            | InvoiceError::ParseError { .. } => StatusCode::BAD_GATEWAY,
            InvoiceError::InvalidConfig(_) | InvoiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for InvoiceError {
    fn into_response(self) -> Response {
        match &self {
            InvoiceError::InvalidConfig(_) | InvoiceError::Internal(_) => {
                tracing::error!("Internal error: {}", self);
            }
            InvoiceError::EngineUnavailable { .. } => {
                tracing::error!("Engine error: {}", self);
            }
            InvoiceError::NetworkError { .. }
            | InvoiceError::AuthError { .. }
            | InvoiceError::ParseError { .. } => {
                tracing::warn!("Model error: {}", self);
            }
            _ => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = json!({
            "success": false,
            "error": self.kind(),
            "message": self.to_string(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}
