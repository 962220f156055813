//! Extraction entry points: one document in, one [`ExtractionOutput`] out.
//!
//! Both pipelines share the loading stage ([`input::load_document`]) and
//! differ after it: the OCR pipeline runs the local recognition engine and
//! the field rules, the AI pipeline sends page images to a vision model.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::output::{ExtractionMethod, ExtractionOutput, ExtractionStats};
use crate::pipeline::input::{self, UploadedDocument};
use crate::pipeline::{fields, llm, ocr};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Run the selected pipeline over one document.
pub async fn extract(
    doc: &UploadedDocument,
    method: ExtractionMethod,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, InvoiceError> {
    match method {
        ExtractionMethod::Ocr => extract_with_ocr(doc, config).await,
        ExtractionMethod::Ai => extract_with_ai(doc, config).await,
    }
}

/// OCR pipeline: load → recognise every page → field rules.
///
/// # Errors
/// Fails as a whole when the engine is unavailable for any page; no partial
/// record is returned.
pub async fn extract_with_ocr(
    doc: &UploadedDocument,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, InvoiceError> {
    let total_start = Instant::now();

    let load_start = Instant::now();
    let loaded = input::load_document(doc, config).await?;
    let load_duration_ms = load_start.elapsed().as_millis() as u64;

    let extract_start = Instant::now();
    let transcript = ocr::recognize_pages(&loaded.pages, config).await?;
    let invoice = fields::parse_invoice(&transcript);
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

    info!(
        "OCR extraction: {} page(s), {} field(s) in {}ms",
        loaded.page_count(),
        invoice.populated_fields(),
        total_start.elapsed().as_millis()
    );

    Ok(ExtractionOutput {
        invoice,
        method: ExtractionMethod::Ocr,
        page_count: loaded.page_count(),
        stats: ExtractionStats {
            load_duration_ms,
            extract_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        },
    })
}

/// AI pipeline: load → encode the first `ai_max_pages` pages → model call →
/// JSON parsing.
///
/// The upload's format is checked before the model is resolved, so an
/// unsupported file is reported as such even when no API key is configured.
pub async fn extract_with_ai(
    doc: &UploadedDocument,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, InvoiceError> {
    let total_start = Instant::now();

    input::detect_kind(doc)?;
    let model = llm::resolve_model(config)?;

    let load_start = Instant::now();
    let loaded = input::load_document(doc, config).await?;
    let load_duration_ms = load_start.elapsed().as_millis() as u64;

    let extract_start = Instant::now();
    let invoice = llm::extract_invoice(model.as_ref(), &loaded.pages, config).await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

    info!(
        "AI extraction via {}: {} page(s), {} field(s) in {}ms",
        model.provider_name(),
        loaded.page_count(),
        invoice.populated_fields(),
        total_start.elapsed().as_millis()
    );

    Ok(ExtractionOutput {
        invoice,
        method: ExtractionMethod::Ai,
        page_count: loaded.page_count(),
        stats: ExtractionStats {
            load_duration_ms,
            extract_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        },
    })
}

/// Read a document from disk and run the selected pipeline over it.
///
/// The content type is guessed from the file extension; files without a
/// known extension fall back to magic-byte detection.
pub async fn extract_file(
    path: impl AsRef<Path>,
    method: ExtractionMethod,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, InvoiceError> {
    let doc = read_document(path.as_ref()).await?;
    extract(&doc, method, config).await
}

/// Load a file into an [`UploadedDocument`].
pub async fn read_document(path: &Path) -> Result<UploadedDocument, InvoiceError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            InvoiceError::conversion(format!("file not found: {}", path.display()))
        } else {
            InvoiceError::Internal(format!("Failed to read {}: {}", path.display(), e))
        }
    })?;

    let content_type = mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string());
    let mut doc = UploadedDocument::new(bytes, content_type);
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        doc = doc.with_filename(name);
    }
    Ok(doc)
}
