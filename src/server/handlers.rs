//! Request handlers.

use super::AppState;
use crate::error::InvoiceError;
use crate::extract;
use crate::output::{ExtractedInvoice, ExtractionMethod};
use crate::pipeline::input::UploadedDocument;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

/// Name of the multipart field carrying the document.
const UPLOAD_FIELD: &str = "file";

/// Success envelope for both processing routes.
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub filename: Option<String>,
    pub file_size_bytes: usize,
    pub method: ExtractionMethod,
    pub page_count: usize,
    pub extracted_data: ExtractedInvoice,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "message": "Invoice Processing API is running",
    }))
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Welcome to Invoice Processing API",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /process-invoice": "Upload an invoice (field 'file') and extract fields with OCR",
            "POST /process-invoice-ai": "Upload an invoice (field 'file') and extract fields with a vision model",
            "POST /process": "Alias of /process-invoice",
            "GET /health": "Check API health status",
        },
    }))
}

pub async fn process_invoice(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessResponse>, InvoiceError> {
    process(state, multipart, ExtractionMethod::Ocr).await
}

pub async fn process_invoice_ai(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessResponse>, InvoiceError> {
    process(state, multipart, ExtractionMethod::Ai).await
}

async fn process(
    state: AppState,
    multipart: Result<Multipart, MultipartRejection>,
    method: ExtractionMethod,
) -> Result<Json<ProcessResponse>, InvoiceError> {
    let multipart = multipart.map_err(|e| InvoiceError::InvalidUpload {
        detail: e.body_text(),
    })?;
    let doc = read_upload(multipart, state.max_upload_bytes).await?;
    let file_size_bytes = doc.bytes.len();
    info!(
        "Processing {:?} ({} bytes) with {}",
        doc.filename, file_size_bytes, method
    );

    let output = extract::extract(&doc, method, &state.config).await?;

    Ok(Json(ProcessResponse {
        success: true,
        filename: doc.filename,
        file_size_bytes,
        method: output.method,
        page_count: output.page_count,
        extracted_data: output.invoice,
    }))
}

/// Pull the document out of the multipart body: the part named `file`, or
/// failing that the first part that carries a filename.
async fn read_upload(
    mut multipart: Multipart,
    limit_bytes: usize,
) -> Result<UploadedDocument, InvoiceError> {
    let mut fallback: Option<UploadedDocument> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit_bytes))?
    {
        let is_upload_field = field.name() == Some(UPLOAD_FIELD);
        let filename = field.file_name().map(str::to_string);
        if !is_upload_field && (filename.is_none() || fallback.is_some()) {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, limit_bytes))?;

        let mut doc = UploadedDocument::new(bytes.to_vec(), content_type);
        if let Some(name) = filename {
            doc = doc.with_filename(name);
        }
        if is_upload_field {
            return Ok(doc);
        }
        fallback = Some(doc);
    }

    fallback.ok_or(InvoiceError::MissingUpload)
}

fn multipart_error(e: MultipartError, limit_bytes: usize) -> InvoiceError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        InvoiceError::UploadTooLarge { limit_bytes }
    } else {
        InvoiceError::InvalidUpload {
            detail: e.body_text(),
        }
    }
}
