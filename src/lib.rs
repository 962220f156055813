//! # invoice-extract
//!
//! Extract structured fields (invoice number, dates, vendor, totals, VAT
//! number, …) from invoice PDFs and images, served over HTTP.
//!
//! Two interchangeable pipelines produce the same [`ExtractedInvoice`] shape:
//!
//! * **OCR**: pages are recognised by the local `tesseract` binary and an
//!   ordered set of regex rules picks the fields out of the transcript.
//! * **AI**: page images are sent to a hosted vision model (Gemini by
//!   default, any `edgequake-llm` provider works) which answers with JSON.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (PDF / PNG / JPEG / TIFF / …)
//!  │
//!  ├─ 1. Load     classify the upload, rasterise PDFs via pdftoppm
//!  ├─ 2a. OCR     tesseract per page → cleanup → field rules
//!  ├─ 2b. AI      base64 PNG pages → vision model → JSON parsing
//!  └─ 3. Output   ExtractedInvoice + page count + timings
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice_extract::{extract_file, ExtractionConfig, ExtractionMethod};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let output = extract_file("invoice.pdf", ExtractionMethod::Ocr, &config).await?;
//!     println!("{:?}", output.invoice.invoice_number);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice-extract` binary (clap + anyhow + tracing-subscriber) |
//!
//! ## External Tools
//!
//! | Tool | Used by | Override |
//! |------|---------|----------|
//! | `tesseract` | OCR pipeline | `TESSERACT_PATH` / [`ExtractionConfig::tesseract_path`] |
//! | `pdftoppm` (poppler-utils) | PDF uploads, both pipelines | `PDFTOPPM_PATH` / [`ExtractionConfig::pdftoppm_path`] |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, PageSeparator};
pub use error::InvoiceError;
pub use extract::{extract, extract_file, extract_with_ai, extract_with_ocr, read_document};
pub use output::{ExtractedInvoice, ExtractionMethod, ExtractionOutput, ExtractionStats};
pub use pipeline::input::UploadedDocument;
pub use pipeline::llm::{ProviderModel, VisionModel};
pub use server::{serve, AppState, ServerConfig};
