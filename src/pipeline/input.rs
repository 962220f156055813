//! Document loading: turn an upload into an ordered list of page images.
//!
//! The declared content type decides the route. Browsers and `curl -F` often
//! send `application/octet-stream` for files they do not recognise, so in that
//! case (or when no type is declared) we fall back to the filename extension
//! and finally to the file's magic bytes. A declared type that is neither PDF
//! nor an image is rejected outright.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::pipeline::render;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;
use tracing::{debug, info};

/// Raw upload as received from the HTTP layer or read from disk.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub bytes: Vec<u8>,
    /// Declared MIME type, e.g. `application/pdf`.
    pub content_type: Option<String>,
    /// Original filename, used only for type inference.
    pub filename: Option<String>,
}

impl UploadedDocument {
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// What an upload turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image(ImageFormat),
}

/// A document ready for either pipeline: one image per page, in page order.
#[derive(Debug)]
pub struct LoadedDocument {
    pub kind: DocumentKind,
    pub pages: Vec<DynamicImage>,
}

impl LoadedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Load an upload into page images.
///
/// Images pass through as a single page; PDFs are rasterised page by page at
/// `config.dpi` by the external renderer.
pub async fn load_document(
    doc: &UploadedDocument,
    config: &ExtractionConfig,
) -> Result<LoadedDocument, InvoiceError> {
    let kind = detect_kind(doc)?;
    if doc.bytes.is_empty() {
        return Err(InvoiceError::conversion("uploaded file is empty"));
    }
    info!("Loading {:?} document ({} bytes)", kind, doc.bytes.len());

    let pages = match kind {
        DocumentKind::Pdf => render::render_pdf(&doc.bytes, config).await?,
        DocumentKind::Image(format) => vec![decode_image(doc.bytes.clone(), format).await?],
    };

    debug!("Loaded {} page(s)", pages.len());
    Ok(LoadedDocument { kind, pages })
}

/// Decide whether an upload is a PDF or an image.
pub fn detect_kind(doc: &UploadedDocument) -> Result<DocumentKind, InvoiceError> {
    let declared = doc.content_type.as_deref().map(normalise_mime);

    if let Some(mime) = declared
        .as_deref()
        .filter(|m| *m != "application/octet-stream")
    {
        return kind_from_mime(mime).ok_or_else(|| InvoiceError::UnsupportedFormat {
            content_type: mime.to_string(),
        });
    }

    infer_kind(doc).ok_or_else(|| InvoiceError::UnsupportedFormat {
        content_type: declared.unwrap_or_else(|| "unknown".to_string()),
    })
}

/// Map a normalised MIME type onto a supported document kind.
fn kind_from_mime(mime: &str) -> Option<DocumentKind> {
    let format = match mime {
        "application/pdf" | "application/x-pdf" => return Some(DocumentKind::Pdf),
        "image/png" => ImageFormat::Png,
        "image/jpeg" | "image/jpg" | "image/pjpeg" => ImageFormat::Jpeg,
        "image/tiff" | "image/tif" => ImageFormat::Tiff,
        "image/bmp" | "image/x-bmp" | "image/x-ms-bmp" => ImageFormat::Bmp,
        "image/webp" => ImageFormat::WebP,
        "image/gif" => ImageFormat::Gif,
        _ => return None,
    };
    Some(DocumentKind::Image(format))
}

/// Infer the kind from the filename extension, then from magic bytes.
fn infer_kind(doc: &UploadedDocument) -> Option<DocumentKind> {
    let from_name = doc.filename.as_deref().and_then(|name| {
        mime_guess::from_path(name)
            .first()
            .and_then(|m| kind_from_mime(m.essence_str()))
    });
    if from_name.is_some() {
        return from_name;
    }

    if doc.bytes.starts_with(b"%PDF") {
        return Some(DocumentKind::Pdf);
    }
    image::guess_format(&doc.bytes)
        .ok()
        .and_then(|f| kind_from_mime(f.to_mime_type()))
}

fn normalise_mime(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Decode an uploaded image off the async executor, turned upright
/// according to its EXIF orientation tag.
async fn decode_image(bytes: Vec<u8>, format: ImageFormat) -> Result<DynamicImage, InvoiceError> {
    tokio::task::spawn_blocking(move || decode_upright(&bytes, format))
        .await
        .map_err(|e| InvoiceError::Internal(format!("Image decode task panicked: {}", e)))?
        .map_err(|e| InvoiceError::conversion(format!("image could not be decoded: {}", e)))
}

fn decode_upright(bytes: &[u8], format: ImageFormat) -> image::ImageResult<DynamicImage> {
    let mut decoder = ImageReader::with_format(Cursor::new(bytes), format).into_decoder()?;
    // A damaged EXIF block should not reject an otherwise readable image.
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder)?;
    if orientation != Orientation::NoTransforms {
        debug!("Applying EXIF orientation {:?}", orientation);
        img.apply_orientation(orientation);
    }
    Ok(img)
}
