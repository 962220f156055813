//! PDF rasterisation via the external `pdftoppm` renderer.
//!
//! The renderer writes one PNG per page into a scratch directory, named
//! `<prefix>-<N>.png`. `N` is zero-padded to the width of the page count
//! (`page-01.png` … `page-12.png`), so files are ordered by the parsed page
//! number rather than by name. The scratch directory is a [`TempDir`] and is
//! removed when this stage returns, on success or failure.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

const ENGINE: &str = "pdftoppm";
const PAGE_PREFIX: &str = "page";

/// Rasterise every page of a PDF into images, in page order.
pub async fn render_pdf(
    pdf_bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<Vec<DynamicImage>, InvoiceError> {
    let temp_dir = TempDir::new().map_err(|e| InvoiceError::Internal(format!("tempdir: {e}")))?;
    let pdf_path = temp_dir.path().join("input.pdf");
    tokio::fs::write(&pdf_path, pdf_bytes)
        .await
        .map_err(|e| InvoiceError::Internal(format!("Failed to write temp PDF: {}", e)))?;

    run_pdftoppm(&config.pdftoppm_path, config.dpi, &pdf_path, temp_dir.path()).await?;

    let page_files = collect_page_files(temp_dir.path())?;
    if page_files.is_empty() {
        return Err(InvoiceError::conversion("renderer produced no pages"));
    }
    info!("Rasterised {} page(s) at {} DPI", page_files.len(), config.dpi);

    let mut pages = Vec::with_capacity(page_files.len());
    for (page_num, path) in page_files {
        let image = tokio::task::spawn_blocking(move || image::open(&path))
            .await
            .map_err(|e| InvoiceError::Internal(format!("Page decode task panicked: {}", e)))?
            .map_err(|e| {
                InvoiceError::conversion(format!("page {} could not be decoded: {}", page_num, e))
            })?;
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );
        pages.push(image);
    }

    Ok(pages)
}

/// Invoke the renderer. A missing binary is an engine problem; a non-zero exit
/// means the document itself could not be converted.
async fn run_pdftoppm(
    binary: &Path,
    dpi: u32,
    pdf_path: &Path,
    out_dir: &Path,
) -> Result<(), InvoiceError> {
    let output = Command::new(binary)
        .arg("-png")
        .arg("-r")
        .arg(dpi.to_string())
        .arg(pdf_path)
        .arg(out_dir.join(PAGE_PREFIX))
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => Ok(()),
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(InvoiceError::conversion(format!(
                "{} exited with {}: {}",
                ENGINE,
                output.status,
                stderr.trim()
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(InvoiceError::engine(
            ENGINE,
            format!(
                "'{}' not found (install poppler-utils or set PDFTOPPM_PATH)",
                binary.display()
            ),
        )),
        Err(e) => Err(InvoiceError::engine(
            ENGINE,
            format!("failed to run '{}': {}", binary.display(), e),
        )),
    }
}

/// List `page-N.png` files in `dir`, sorted by `N`.
fn collect_page_files(dir: &Path) -> Result<Vec<(usize, PathBuf)>, InvoiceError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| InvoiceError::Internal(format!("Failed to read render dir: {}", e)))?;

    let mut pages: Vec<(usize, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            page_number(name).map(|n| (n, path))
        })
        .collect();

    pages.sort_by_key(|(n, _)| *n);
    Ok(pages)
}

/// Parse the page number out of a renderer output name such as `page-007.png`.
fn page_number(file_name: &str) -> Option<usize> {
    file_name
        .strip_suffix(".png")?
        .strip_prefix(PAGE_PREFIX)?
        .strip_prefix('-')?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_number_parses_padded_names() {
        assert_eq!(page_number("page-1.png"), Some(1));
        assert_eq!(page_number("page-01.png"), Some(1));
        assert_eq!(page_number("page-112.png"), Some(112));
        assert_eq!(page_number("input.pdf"), None);
        assert_eq!(page_number("page-x.png"), None);
        assert_eq!(page_number("other-3.png"), None);
    }

    #[test]
    fn page_files_sort_numerically() {
        let dir = TempDir::new().unwrap();
        for name in ["page-10.png", "page-2.png", "page-1.png", "input.pdf"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let pages = collect_page_files(dir.path()).unwrap();
        let order: Vec<usize> = pages.iter().map(|(n, _)| *n).collect();
        assert_eq!(order, vec![1, 2, 10]);
    }

    #[tokio::test]
    async fn missing_renderer_is_engine_unavailable() {
        let config = ExtractionConfig::builder()
            .pdftoppm_path("/nonexistent/bin/pdftoppm")
            .build()
            .unwrap();
        let err = render_pdf(b"%PDF-1.4", &config).await.unwrap_err();
        match err {
            InvoiceError::EngineUnavailable { engine, .. } => assert_eq!(engine, "pdftoppm"),
            other => panic!("expected EngineUnavailable, got {other:?}"),
        }
    }
}
