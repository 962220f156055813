//! Error types for the invoice-extract library.
//!
//! Every failure is scoped to a single document: nothing here is fatal to the
//! process and nothing is retried. [`InvoiceError`] carries one variant per
//! failure class so the HTTP layer can map it to a status code and the CLI can
//! print a useful hint.
//!
//! | Variant | Raised by |
//! |---------|-----------|
//! | [`InvoiceError::UnsupportedFormat`] | loader, content type is neither PDF nor image |
//! | [`InvoiceError::ConversionError`]   | loader, rasterizer rejected the PDF or image did not decode |
//! | [`InvoiceError::EngineUnavailable`] | OCR / rasterizer binary missing or failing |
//! | [`InvoiceError::NetworkError`]      | AI pipeline, model API unreachable or failing |
//! | [`InvoiceError::AuthError`]         | AI pipeline, bad or missing API key |
//! | [`InvoiceError::ParseError`]        | AI pipeline, model answer is not the expected JSON |

use thiserror::Error;

/// All errors returned by the invoice-extract library.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ── Loader errors ─────────────────────────────────────────────────────
    /// The upload is neither a PDF nor a supported image type.
    #[error("Unsupported file type '{content_type}'. Supported formats: PDF, PNG, JPEG, TIFF, BMP, WebP, GIF")]
    UnsupportedFormat { content_type: String },

    /// The document could not be turned into page images (corrupt PDF,
    /// undecodable image, renderer produced nothing).
    #[error("Document conversion failed: {detail}")]
    ConversionError { detail: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// An external binary (recognition engine or rasterizer) is missing or
    /// failed to run.
    #[error("{engine} is unavailable: {detail}")]
    EngineUnavailable { engine: String, detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The hosted model could not be reached or returned a server failure.
    #[error("Model API request to '{provider}' failed: {detail}")]
    NetworkError { provider: String, detail: String },

    /// The hosted model rejected the credentials, or none are configured.
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// The model answered, but not with the expected structured fields.
    #[error("Could not parse model response: {detail}")]
    ParseError { detail: String },

    // ── Upload errors ─────────────────────────────────────────────────────
    /// The multipart request carried no file part.
    #[error("No file was uploaded; send the document in a multipart field named 'file'")]
    MissingUpload,

    /// The multipart body itself could not be read.
    #[error("Invalid upload: {detail}")]
    InvalidUpload { detail: String },

    /// The request body is larger than the configured upload limit.
    #[error("Upload exceeds the limit of {limit_bytes} bytes")]
    UploadTooLarge { limit_bytes: usize },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InvoiceError {
    /// Stable name of the failure class, used as the `error` field of JSON
    /// error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            InvoiceError::UnsupportedFormat { .. } => "UnsupportedFormat",
            InvoiceError::ConversionError { .. } => "ConversionError",
            InvoiceError::EngineUnavailable { .. } => "EngineUnavailable",
            InvoiceError::NetworkError { .. } => "NetworkError",
            InvoiceError::AuthError { .. } => "AuthError",
            InvoiceError::ParseError { .. } => "ParseError",
            InvoiceError::MissingUpload => "MissingUpload",
            InvoiceError::InvalidUpload { .. } => "InvalidUpload",
            InvoiceError::UploadTooLarge { .. } => "UploadTooLarge",
            InvoiceError::InvalidConfig(_) => "InvalidConfig",
            InvoiceError::Internal(_) => "Internal",
        }
    }

    /// `true` when the caller sent something we cannot process, as opposed to
    /// a failure on our side or upstream.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            InvoiceError::UnsupportedFormat { .. }
                | InvoiceError::ConversionError { .. }
                | InvoiceError::MissingUpload
                | InvoiceError::InvalidUpload { .. }
                | InvoiceError::UploadTooLarge { .. }
        )
    }

    pub(crate) fn engine(engine: &str, detail: impl Into<String>) -> Self {
        InvoiceError::EngineUnavailable {
            engine: engine.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn conversion(detail: impl Into<String>) -> Self {
        InvoiceError::ConversionError {
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_display() {
        let e = InvoiceError::UnsupportedFormat {
            content_type: "text/plain".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("text/plain"), "got: {msg}");
        assert!(msg.contains("PDF"));
    }

    #[test]
    fn engine_unavailable_display() {
        let e = InvoiceError::engine("tesseract", "binary not found");
        assert_eq!(e.to_string(), "tesseract is unavailable: binary not found");
        assert_eq!(e.kind(), "EngineUnavailable");
    }

    #[test]
    fn auth_error_display() {
        let e = InvoiceError::AuthError {
            provider: "gemini".into(),
            detail: "invalid key".into(),
        };
        assert!(e.to_string().contains("gemini"));
        assert!(e.to_string().contains("invalid key"));
    }

    #[test]
    fn client_errors_are_classified() {
        assert!(InvoiceError::UnsupportedFormat {
            content_type: "text/csv".into()
        }
        .is_client_error());
        assert!(InvoiceError::conversion("corrupt").is_client_error());
        assert!(InvoiceError::MissingUpload.is_client_error());
        assert!(!InvoiceError::ParseError {
            detail: "not json".into()
        }
        .is_client_error());
        assert!(!InvoiceError::engine("pdftoppm", "missing").is_client_error());
    }
}
