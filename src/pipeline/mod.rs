//! Pipeline stages for invoice extraction.
//!
//! Each submodule implements one transformation step. Both pipelines share
//! the loading stages and split afterwards.
//!
//! ## Data Flow
//!
//! ```text
//!                          ┌──▶ preprocess ──▶ ocr ──▶ postprocess ──▶ fields  (OCR)
//! input ──▶ render ────────┤
//! (upload)  (pdftoppm)     └──▶ encode ──▶ llm ──▶ postprocess     (AI)
//!                                (base64)  (VLM)   (JSON block)
//! ```
//!
//! 1. [`input`]: classify the upload (PDF or image) and produce page images
//! 2. [`render`]: rasterise PDF pages with the external `pdftoppm` binary
//! 3. [`preprocess`]: grayscale, denoise and binarise pages for recognition
//! 4. [`ocr`]: recognise each page with the external `tesseract` binary
//! 5. [`fields`]: ordered regex rules that turn the transcript into fields
//! 6. [`encode`]: PNG-encode pages, base64-wrap them for the model request
//! 7. [`llm`]: the model call and JSON answer parsing; the only stage with
//!    network I/O
//! 8. [`postprocess`]: deterministic cleanup of OCR text and model answers

pub mod encode;
pub mod fields;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod postprocess;
pub mod preprocess;
pub mod render;
