//! Text recognition via the external `tesseract` binary.
//!
//! Each page is cleaned up (see [`preprocess`], unless disabled in the
//! config), written to a temporary PNG and recognised with
//! `tesseract <image> stdout -l <lang> --oem <oem> --psm <psm>`. Any failure
//! of the engine (binary missing, spawn error, non-zero exit) fails the whole
//! document: a transcript with holes would feed the field rules garbage.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::pipeline::{encode, postprocess, preprocess};
use image::DynamicImage;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

const ENGINE: &str = "tesseract";

/// Recognise every page and join the cleaned texts in page order.
///
/// Pages that come back empty are skipped; the page banner still carries the
/// original page number.
pub async fn recognize_pages(
    pages: &[DynamicImage],
    config: &ExtractionConfig,
) -> Result<String, InvoiceError> {
    let mut texts: Vec<(usize, String)> = Vec::with_capacity(pages.len());

    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;
        let raw = recognize_page(page, config).await?;
        let text = postprocess::clean_ocr_text(&raw);
        debug!("Page {}: {} characters recognised", page_num, text.len());
        if !text.is_empty() {
            texts.push((page_num, text));
        }
    }

    info!(
        "OCR complete: {}/{} page(s) with text",
        texts.len(),
        pages.len()
    );
    Ok(join_pages(&texts, pages.len(), config))
}

/// Join page texts, prefixing each with the configured separator. Only a
/// single-page document goes without a separator.
fn join_pages(texts: &[(usize, String)], page_count: usize, config: &ExtractionConfig) -> String {
    if page_count == 1 {
        return texts.first().map(|(_, text)| text.clone()).unwrap_or_default();
    }
    texts
        .iter()
        .map(|(page_num, text)| format!("{}{}", config.page_separator.render(*page_num), text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Recognise a single page image.
pub async fn recognize_page(
    page: &DynamicImage,
    config: &ExtractionConfig,
) -> Result<String, InvoiceError> {
    let page = page.clone();
    let preprocess_page = config.ocr_preprocess;
    let png = tokio::task::spawn_blocking(move || {
        if preprocess_page {
            encode::png_bytes(&preprocess::prepare_for_ocr(&page))
        } else {
            encode::png_bytes(&page)
        }
    })
    .await
    .map_err(|e| InvoiceError::Internal(format!("Page encode task panicked: {}", e)))?
    .map_err(|e| InvoiceError::Internal(format!("PNG encoding failed: {}", e)))?;

    let file = tempfile::Builder::new()
        .prefix("invoice-page-")
        .suffix(".png")
        .tempfile()
        .map_err(|e| InvoiceError::Internal(format!("tempfile: {e}")))?;
    tokio::fs::write(file.path(), &png)
        .await
        .map_err(|e| InvoiceError::Internal(format!("Failed to write page image: {}", e)))?;

    // `file` is dropped (and the image deleted) when this function returns
    run_tesseract(file.path(), config).await
}

async fn run_tesseract(image_path: &Path, config: &ExtractionConfig) -> Result<String, InvoiceError> {
    let binary = &config.tesseract_path;
    let output = Command::new(binary)
        .arg(image_path)
        .arg("stdout")
        .args(["-l", &config.tesseract_language])
        .args(["--oem", &config.tesseract_oem.to_string()])
        .args(["--psm", &config.tesseract_psm.to_string()])
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(InvoiceError::engine(
                ENGINE,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(InvoiceError::engine(
            ENGINE,
            format!(
                "'{}' not found (install tesseract-ocr or set TESSERACT_PATH)",
                binary.display()
            ),
        )),
        Err(e) => Err(InvoiceError::engine(
            ENGINE,
            format!("failed to run '{}': {}", binary.display(), e),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageSeparator;
    use image::{Rgba, RgbaImage};

    fn blank_page() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn single_page_has_no_banner() {
        let config = ExtractionConfig::default();
        let texts = vec![(1, "Invoice #1".to_string())];
        assert_eq!(join_pages(&texts, 1, &config), "Invoice #1");
    }

    #[test]
    fn lone_text_page_of_multi_page_document_keeps_banner() {
        let config = ExtractionConfig::default();
        let texts = vec![(2, "Total: 10.00".to_string())];
        assert_eq!(join_pages(&texts, 3, &config), "--- Page 2 ---\nTotal: 10.00");
    }

    #[test]
    fn blank_single_page_is_empty() {
        assert_eq!(join_pages(&[], 1, &ExtractionConfig::default()), "");
    }

    #[test]
    fn pages_joined_with_banners_in_order() {
        let config = ExtractionConfig::default();
        let texts = vec![(1, "first".to_string()), (3, "third".to_string())];
        assert_eq!(
            join_pages(&texts, 3, &config),
            "--- Page 1 ---\nfirst\n\n--- Page 3 ---\nthird"
        );
    }

    #[test]
    fn pages_joined_without_separator() {
        let config = ExtractionConfig::builder()
            .page_separator(PageSeparator::None)
            .build()
            .unwrap();
        let texts = vec![(1, "a".to_string()), (2, "b".to_string())];
        assert_eq!(join_pages(&texts, 2, &config), "a\n\nb");
    }

    #[tokio::test]
    async fn missing_engine_is_unavailable() {
        let config = ExtractionConfig::builder()
            .tesseract_path("/nonexistent/bin/tesseract")
            .build()
            .unwrap();
        let err = recognize_pages(&[blank_page()], &config).await.unwrap_err();
        match err {
            InvoiceError::EngineUnavailable { engine, detail } => {
                assert_eq!(engine, "tesseract");
                assert!(detail.contains("not found"), "got: {detail}");
            }
            other => panic!("expected EngineUnavailable, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_engine_is_unavailable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("tesseract");
        std::fs::write(&script, "#!/bin/sh\necho 'Error opening data file' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = ExtractionConfig::builder().tesseract_path(&script).build().unwrap();
        let err = recognize_pages(&[blank_page()], &config).await.unwrap_err();
        assert_eq!(err.kind(), "EngineUnavailable");
        assert!(err.to_string().contains("Error opening data file"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn recognised_text_is_cleaned() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("tesseract");
        std::fs::write(&script, "#!/bin/sh\nprintf 'ACME  Corp\\n|\\nInvoice #12345\\n'\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = ExtractionConfig::builder().tesseract_path(&script).build().unwrap();
        let text = recognize_pages(&[blank_page()], &config).await.unwrap();
        assert_eq!(text, "ACME Corp\nInvoice #12345");
    }
}
