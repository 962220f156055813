//! Vision-model interaction: send page images, parse the fields back.
//!
//! The model sits behind the [`VisionModel`] trait. The production
//! implementation, [`ProviderModel`], wraps an `edgequake_llm` provider;
//! tests and embedders can plug in their own. Prompt text lives in
//! [`crate::prompts`].
//!
//! There is no retry here: a failed call fails the request, and the error
//! is classified so the HTTP layer can tell a bad key from an outage.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::output::ExtractedInvoice;
use crate::pipeline::{encode, postprocess};
use crate::prompts::{page_instruction, DEFAULT_EXTRACTION_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use image::DynamicImage;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A hosted model that can read page images and answer with text.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Provider name, used in error messages.
    fn provider_name(&self) -> &str;

    /// Send one system prompt plus one user turn carrying `pages`; return the
    /// model's raw answer.
    async fn complete(
        &self,
        system_prompt: &str,
        instruction: &str,
        pages: Vec<ImageData>,
    ) -> Result<String, InvoiceError>;
}

/// [`VisionModel`] backed by an `edgequake_llm` provider.
pub struct ProviderModel {
    name: String,
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl ProviderModel {
    /// Instantiate a named provider. The factory reads the API key from the
    /// provider's environment variable (`GEMINI_API_KEY` for `gemini`).
    pub fn new(
        provider_name: &str,
        model: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<Self, InvoiceError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model)
            .map_err(|e| classify_factory_error(provider_name, format!("{e}")))?;
        Ok(Self {
            name: provider_name.to_string(),
            provider,
            temperature,
            max_tokens,
        })
    }

    pub fn from_config(config: &ExtractionConfig) -> Result<Self, InvoiceError> {
        Self::new(
            &config.provider_name,
            &config.model,
            config.temperature,
            config.max_tokens,
        )
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl VisionModel for ProviderModel {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        system_prompt: &str,
        instruction: &str,
        pages: Vec<ImageData>,
    ) -> Result<String, InvoiceError> {
        let messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user_with_images(instruction, pages),
        ];
        let options = self.options();

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                debug!(
                    "{}: {} input tokens, {} output tokens",
                    self.name, response.prompt_tokens, response.completion_tokens
                );
                Ok(response.content)
            }
            Err(e) => Err(classify_provider_error(&self.name, format!("{}", e))),
        }
    }
}

/// Use the configured model if one was injected, otherwise build one from
/// the provider name and model id.
pub fn resolve_model(config: &ExtractionConfig) -> Result<Arc<dyn VisionModel>, InvoiceError> {
    if let Some(model) = &config.vision_model {
        return Ok(Arc::clone(model));
    }
    let model = ProviderModel::from_config(config)?;
    Ok(Arc::new(model))
}

/// Classify a provider construction failure.
///
/// An unknown or unsupported provider name is a configuration mistake;
/// anything else (typically a missing API key) is a credentials problem.
pub fn classify_factory_error(provider: &str, message: String) -> InvoiceError {
    const CONFIG_MARKERS: [&str; 6] = [
        "unknown provider",
        "unsupported provider",
        "not supported",
        "invalid provider",
        "no such provider",
        "unrecognized provider",
    ];

    let lower = message.to_lowercase();
    if CONFIG_MARKERS.iter().any(|m| lower.contains(m)) {
        InvoiceError::InvalidConfig(format!("provider '{}': {}", provider, message))
    } else {
        InvoiceError::AuthError {
            provider: provider.to_string(),
            detail: message,
        }
    }
}

/// Classify a provider failure from its message.
///
/// Providers surface HTTP failures as text, so credential problems are
/// recognised by status code or wording; everything else counts as a
/// network failure.
pub fn classify_provider_error(provider: &str, message: String) -> InvoiceError {
    const AUTH_MARKERS: [&str; 8] = [
        "401",
        "403",
        "unauthorized",
        "unauthenticated",
        "forbidden",
        "api key",
        "api_key",
        "permission denied",
    ];

    let lower = message.to_lowercase();
    if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        InvoiceError::AuthError {
            provider: provider.to_string(),
            detail: message,
        }
    } else {
        InvoiceError::NetworkError {
            provider: provider.to_string(),
            detail: message,
        }
    }
}

/// Run the AI extraction over already-loaded pages.
///
/// At most `config.ai_max_pages` pages are sent; the rest are ignored.
pub async fn extract_invoice(
    model: &dyn VisionModel,
    pages: &[DynamicImage],
    config: &ExtractionConfig,
) -> Result<ExtractedInvoice, InvoiceError> {
    let start = Instant::now();
    let sent = pages.len().min(config.ai_max_pages);
    if sent < pages.len() {
        warn!(
            "Document has {} pages; sending only the first {} to the model",
            pages.len(),
            sent
        );
    }

    let to_send = pages[..sent].to_vec();
    let images = tokio::task::spawn_blocking(move || {
        to_send
            .iter()
            .map(encode::encode_page)
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .map_err(|e| InvoiceError::Internal(format!("Page encode task panicked: {}", e)))?
    .map_err(|e| InvoiceError::Internal(format!("Page encoding failed: {}", e)))?;

    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_EXTRACTION_PROMPT);
    let instruction = page_instruction(sent, pages.len());

    let answer = model.complete(system_prompt, &instruction, images).await?;
    info!(
        "{} answered in {:?} ({} chars)",
        model.provider_name(),
        start.elapsed(),
        answer.len()
    );

    parse_model_response(&answer)
}

/// Keys the model may answer with, aliases included.
const KNOWN_KEYS: [&str; 15] = [
    "invoice_number",
    "date",
    "invoice_date",
    "vendor",
    "vendor_name",
    "total_amount",
    "vendor_email",
    "vendor_phone",
    "customer_number",
    "po_number",
    "vat_number",
    "subtotal",
    "tax_amount",
    "payment_terms",
    "dates_found",
];

/// Parse a model answer into an [`ExtractedInvoice`].
///
/// Accepts a JSON object, optionally fenced or wrapped in prose, that names
/// at least one invoice field (an explicit `null` counts). Field values may
/// be strings, numbers or null; `dates_found` is an array. Anything else is
/// a [`InvoiceError::ParseError`]. `raw_text` keeps the full answer.
pub fn parse_model_response(answer: &str) -> Result<ExtractedInvoice, InvoiceError> {
    let block = postprocess::extract_json_block(answer);
    let value: Value = serde_json::from_str(block).map_err(|e| InvoiceError::ParseError {
        detail: format!("model answer is not valid JSON: {}", e),
    })?;
    let obj = match value {
        Value::Object(obj) => obj,
        other => {
            return Err(InvoiceError::ParseError {
                detail: format!("expected a JSON object, got {}", json_type(&other)),
            })
        }
    };
    if !KNOWN_KEYS.iter().any(|key| obj.contains_key(*key)) {
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.truncate(5);
        return Err(InvoiceError::ParseError {
            detail: if keys.is_empty() {
                "model answered with an empty JSON object".to_string()
            } else {
                format!("model answer has no invoice fields (keys: {})", keys.join(", "))
            },
        });
    }

    Ok(ExtractedInvoice {
        invoice_number: text_field(&obj, &["invoice_number"])?,
        date: text_field(&obj, &["date", "invoice_date"])?,
        vendor: text_field(&obj, &["vendor", "vendor_name"])?,
        total_amount: text_field(&obj, &["total_amount"])?,
        vendor_email: text_field(&obj, &["vendor_email"])?,
        vendor_phone: text_field(&obj, &["vendor_phone"])?,
        customer_number: text_field(&obj, &["customer_number"])?,
        po_number: text_field(&obj, &["po_number"])?,
        vat_number: text_field(&obj, &["vat_number"])?,
        subtotal: text_field(&obj, &["subtotal"])?,
        tax_amount: text_field(&obj, &["tax_amount"])?,
        payment_terms: text_field(&obj, &["payment_terms"])?,
        dates_found: dates_field(&obj)?,
        raw_text: Some(answer.to_string()),
    })
}

/// First non-null value among `names`, as a string.
fn text_field(obj: &Map<String, Value>, names: &[&str]) -> Result<Option<String>, InvoiceError> {
    for name in names {
        match obj.get(*name) {
            None | Some(Value::Null) => continue,
            Some(value) => return scalar_text(name, value),
        }
    }
    Ok(None)
}

fn scalar_text(name: &str, value: &Value) -> Result<Option<String>, InvoiceError> {
    match value {
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.trim().to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(InvoiceError::ParseError {
            detail: format!(
                "field '{}' should be a string, got {}",
                name,
                json_type(other)
            ),
        }),
    }
}

fn dates_field(obj: &Map<String, Value>) -> Result<Vec<String>, InvoiceError> {
    match obj.get("dates_found") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => {
            let mut dates = Vec::with_capacity(items.len());
            for item in items {
                if let Some(date) = scalar_text("dates_found", item)? {
                    dates.push(date);
                }
            }
            Ok(dates)
        }
        Some(other) => Err(InvoiceError::ParseError {
            detail: format!("field 'dates_found' should be an array, got {}", json_type(other)),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
