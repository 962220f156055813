//! Image encoding: `DynamicImage` → PNG bytes / base64 `ImageData`.
//!
//! Both pipelines work on PNG. Tesseract reads it from a temp file; the
//! vision model receives it as a base64 data payload. PNG is lossless, which
//! keeps thin glyphs (decimal points, commas in amounts) intact.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a page as PNG bytes.
pub fn png_bytes(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode a page as a base64 PNG ready for the model API.
///
/// `detail: "high"` keeps the provider from downscaling the page to a single
/// low-resolution tile, which loses line-item amounts and footers.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let b64 = STANDARD.encode(png_bytes(img)?);
    debug!("Encoded page → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
