//! Prompts for vision-model invoice extraction.
//!
//! Callers can override the system prompt via
//! [`crate::config::ExtractionConfig::system_prompt`]; the constants here are
//! used only when no override is provided. The field names in the prompt must
//! stay in sync with [`crate::output::ExtractedInvoice`] (the response parser
//! also accepts `vendor_name` and `invoice_date` as aliases).

/// Default system prompt for extracting invoice fields from page images.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You are an expert invoice data extraction system. Analyse the provided invoice page images and extract the fields below.

Rules:
1. Prefer explicitly labelled values ("Invoice No:", "VAT:", "Total:", ...)
2. Look in the usual places: header, address blocks, totals section, footer
3. Amounts keep their currency symbol or code exactly as printed
4. Dates are copied as printed; list EVERY date you find in dates_found
5. If a field is missing or unreadable, use null. Never guess

Fields:
- invoice_number: unique invoice identifier
- date: primary (issue) date of the invoice
- vendor: full name of the company that issued the invoice
- vendor_email: vendor email address
- vendor_phone: vendor phone number, with country code if printed
- customer_number: customer / account number
- po_number: purchase order number
- vat_number: VAT or tax registration number of the vendor
- subtotal: amount before tax
- tax_amount: VAT / tax amount
- total_amount: final payable amount
- payment_terms: payment terms or due-date wording
- dates_found: array of all dates in the document

Output ONLY a single JSON object with exactly these keys. No markdown fences, no commentary:
{"invoice_number": null, "date": null, "vendor": null, "vendor_email": null, "vendor_phone": null, "customer_number": null, "po_number": null, "vat_number": null, "subtotal": null, "tax_amount": null, "total_amount": null, "payment_terms": null, "dates_found": []}"#;

/// Text of the user turn that carries the page images.
pub fn page_instruction(sent_pages: usize, total_pages: usize) -> String {
    if sent_pages == total_pages {
        format!("Extract the invoice fields from these {} page image(s).", sent_pages)
    } else {
        format!(
            "Extract the invoice fields from the first {} of {} page image(s).",
            sent_pages, total_pages
        )
    }
}
