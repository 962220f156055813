//! Result types returned by the extraction pipelines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured fields pulled out of one invoice.
///
/// Every field is optional: extraction is best-effort and a missing label in
/// the document simply leaves the field `None`. Both pipelines produce the
/// same shape so callers can switch between them freely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedInvoice {
    pub invoice_number: Option<String>,
    /// Primary (issue) date, as written in the document.
    pub date: Option<String>,
    /// Name of the issuing company.
    pub vendor: Option<String>,
    /// Final payable amount, including the currency symbol when present.
    pub total_amount: Option<String>,
    pub vendor_email: Option<String>,
    pub vendor_phone: Option<String>,
    pub customer_number: Option<String>,
    pub po_number: Option<String>,
    pub vat_number: Option<String>,
    pub subtotal: Option<String>,
    pub tax_amount: Option<String>,
    pub payment_terms: Option<String>,
    /// Every date found in the document, in order of appearance.
    #[serde(default)]
    pub dates_found: Vec<String>,
    /// OCR transcript (OCR pipeline) or the model's raw answer (AI pipeline).
    pub raw_text: Option<String>,
}

impl ExtractedInvoice {
    /// Number of scalar fields that were filled in (ignores `raw_text` and
    /// `dates_found`).
    pub fn populated_fields(&self) -> usize {
        [
            &self.invoice_number,
            &self.date,
            &self.vendor,
            &self.total_amount,
            &self.vendor_email,
            &self.vendor_phone,
            &self.customer_number,
            &self.po_number,
            &self.vat_number,
            &self.subtotal,
            &self.tax_amount,
            &self.payment_terms,
        ]
        .iter()
        .filter(|f| f.is_some())
        .count()
    }
}

/// Which pipeline produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Local recognition engine + field heuristics.
    Ocr,
    /// Hosted vision model.
    Ai,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMethod::Ocr => f.write_str("ocr"),
            ExtractionMethod::Ai => f.write_str("ai"),
        }
    }
}

/// Timing for one extraction run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Time spent decoding / rasterising the upload.
    pub load_duration_ms: u64,
    /// Time spent in the recognition engine or the model call.
    pub extract_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Complete result of running one pipeline over one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub invoice: ExtractedInvoice,
    pub method: ExtractionMethod,
    /// Pages in the loaded document (not only those sent to the model).
    pub page_count: usize,
    pub stats: ExtractionStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_serialises_lowercase() {
        assert_eq!(serde_json::to_string(&ExtractionMethod::Ai).unwrap(), "\"ai\"");
        assert_eq!(ExtractionMethod::Ocr.to_string(), "ocr");
    }

    #[test]
    fn empty_invoice_serialises_nulls() {
        let json = serde_json::to_value(ExtractedInvoice::default()).unwrap();
        assert!(json["invoice_number"].is_null());
        assert!(json["raw_text"].is_null());
        assert_eq!(json["dates_found"], serde_json::json!([]));
    }

    #[test]
    fn populated_fields_counts_scalars() {
        let inv = ExtractedInvoice {
            invoice_number: Some("12345".into()),
            total_amount: Some("$10.00".into()),
            raw_text: Some("Invoice #12345".into()),
            dates_found: vec!["01.02.2024".into()],
            ..Default::default()
        };
        assert_eq!(inv.populated_fields(), 2);
    }
}
