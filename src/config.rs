//! Configuration types for invoice extraction.
//!
//! Every knob for both pipelines lives in [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. The server shares one config across requests
//! behind an `Arc`; the CLI builds one from its flags.

use crate::error::InvoiceError;
use crate::pipeline::llm::VisionModel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one extraction run (or a whole server lifetime).
///
/// # Example
/// ```rust
/// use invoice_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .dpi(200)
///     .tesseract_path("/usr/local/bin/tesseract")
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rasterisation DPI for PDF pages. Range: 72–600. Default: 300.
    ///
    /// Tesseract is tuned for ~300 DPI text; lower values lose small print
    /// such as VAT numbers in footers.
    pub dpi: u32,

    /// Path (or bare name looked up on `PATH`) of the `pdftoppm` rasterizer.
    pub pdftoppm_path: PathBuf,

    /// Path (or bare name looked up on `PATH`) of the `tesseract` binary.
    pub tesseract_path: PathBuf,

    /// Tesseract language pack(s), e.g. `eng` or `eng+deu`. Default: `eng`.
    pub tesseract_language: String,

    /// Tesseract OCR engine mode (`--oem`). Default: 3 (LSTM + legacy).
    pub tesseract_oem: u8,

    /// Tesseract page segmentation mode (`--psm`). Default: 6 (single block).
    pub tesseract_psm: u8,

    /// Grayscale, denoise and binarise pages before recognition. Default: true.
    pub ocr_preprocess: bool,

    /// Separator inserted between page texts in the OCR transcript.
    pub page_separator: PageSeparator,

    /// LLM provider name passed to `ProviderFactory`. Default: `gemini`.
    pub provider_name: String,

    /// LLM model identifier. Default: `gemini-2.0-flash`.
    pub model: String,

    /// Pre-constructed vision model. Takes precedence over `provider_name`.
    pub vision_model: Option<Arc<dyn VisionModel>>,

    /// Sampling temperature for the extraction call. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 2048.
    pub max_tokens: usize,

    /// Maximum number of page images sent to the model. Default: 5.
    ///
    /// Invoice fields live on the first pages; later pages are usually terms
    /// and conditions that only add input tokens.
    pub ai_max_pages: usize,

    /// Custom system prompt. If None, uses the built-in extraction prompt.
    pub system_prompt: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            pdftoppm_path: PathBuf::from("pdftoppm"),
            tesseract_path: PathBuf::from("tesseract"),
            tesseract_language: "eng".to_string(),
            tesseract_oem: 3,
            tesseract_psm: 6,
            ocr_preprocess: true,
            page_separator: PageSeparator::default(),
            provider_name: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            vision_model: None,
            temperature: 0.1,
            max_tokens: 2048,
            ai_max_pages: 5,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("pdftoppm_path", &self.pdftoppm_path)
            .field("tesseract_path", &self.tesseract_path)
            .field("tesseract_language", &self.tesseract_language)
            .field("tesseract_oem", &self.tesseract_oem)
            .field("tesseract_psm", &self.tesseract_psm)
            .field("ocr_preprocess", &self.ocr_preprocess)
            .field("page_separator", &self.page_separator)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field(
                "vision_model",
                &self.vision_model.as_ref().map(|_| "<dyn VisionModel>"),
            )
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("ai_max_pages", &self.ai_max_pages)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn pdftoppm_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdftoppm_path = path.into();
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn tesseract_language(mut self, lang: impl Into<String>) -> Self {
        self.config.tesseract_language = lang.into();
        self
    }

    pub fn tesseract_oem(mut self, oem: u8) -> Self {
        self.config.tesseract_oem = oem;
        self
    }

    pub fn tesseract_psm(mut self, psm: u8) -> Self {
        self.config.tesseract_psm = psm;
        self
    }

    pub fn ocr_preprocess(mut self, enabled: bool) -> Self {
        self.config.ocr_preprocess = enabled;
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn vision_model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.config.vision_model = Some(model);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn ai_max_pages(mut self, n: usize) -> Self {
        self.config.ai_max_pages = n.max(1);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, InvoiceError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(InvoiceError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.tesseract_psm > 13 {
            return Err(InvoiceError::InvalidConfig(format!(
                "Tesseract page segmentation mode must be 0–13, got {}",
                c.tesseract_psm
            )));
        }
        if c.tesseract_oem > 3 {
            return Err(InvoiceError::InvalidConfig(format!(
                "Tesseract engine mode must be 0–3, got {}",
                c.tesseract_oem
            )));
        }
        if c.tesseract_language.trim().is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "Tesseract language must not be empty".into(),
            ));
        }
        if c.vision_model.is_none() && (c.provider_name.is_empty() || c.model.is_empty()) {
            return Err(InvoiceError::InvalidConfig(
                "Provider name and model must be set when no vision model is supplied".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How page texts are joined in the OCR transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSeparator {
    /// Blank line only.
    None,
    /// Banner line with the page number: "--- Page N ---". (default)
    #[default]
    Banner,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the heading placed before page `page_num` (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::None => String::new(),
            PageSeparator::Banner => format!("--- Page {} ---\n", page_num),
            PageSeparator::Custom(s) => format!("{}\n", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ExtractionConfig::default();
        assert_eq!(c.dpi, 300);
        assert_eq!(c.tesseract_path, PathBuf::from("tesseract"));
        assert_eq!(c.pdftoppm_path, PathBuf::from("pdftoppm"));
        assert_eq!(c.provider_name, "gemini");
        assert_eq!(c.max_tokens, 2048);
        assert!(c.vision_model.is_none());
        assert!(c.ocr_preprocess);
    }

    #[test]
    fn builder_clamps_dpi() {
        let c = ExtractionConfig::builder().dpi(10).build().unwrap();
        assert_eq!(c.dpi, 72);
        let c = ExtractionConfig::builder().dpi(5000).build().unwrap();
        assert_eq!(c.dpi, 600);
    }

    #[test]
    fn builder_rejects_bad_psm() {
        let err = ExtractionConfig::builder().tesseract_psm(42).build().unwrap_err();
        assert!(matches!(err, InvoiceError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_empty_language() {
        let err = ExtractionConfig::builder()
            .tesseract_language("  ")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("language"));
    }

    #[test]
    fn page_separator_render() {
        assert_eq!(PageSeparator::Banner.render(2), "--- Page 2 ---\n");
        assert_eq!(PageSeparator::None.render(2), "");
        assert_eq!(PageSeparator::Custom("===".into()).render(3), "===\n");
    }
}
