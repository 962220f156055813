//! Field heuristics: pull invoice fields out of an OCR transcript.
//!
//! Every field has an ordered list of rules. Each rule is tried against the
//! whole transcript and the first acceptable match wins; when no rule
//! matches, the field stays `None`. Identifier rules only accept tokens that
//! contain a digit, so a label followed by a word (`Invoice Date`,
//! `Customer Service`) is skipped and the search moves on.

use crate::output::ExtractedInvoice;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

// ── Building blocks ──────────────────────────────────────────────────────

/// Optional currency symbol followed by a number with `.`/`,` grouping.
const AMOUNT: &str = r"([€$£¥]?[ \t]?\d(?:[\d.,]*\d)?)";

/// Optional ISO currency code in parentheses, e.g. `Total (EUR)`.
const CURRENCY_CODE: &str = r"(?:\([A-Z]{3}\))?";

const MONTHS: &str = r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

/// `2024-01-15`, `15.01.2024`, `15 January 2024`, `Jan. 15, 2024`.
static DATE: Lazy<String> = Lazy::new(|| {
    format!(
        r"(?:\d{{4}}[./\-]\d{{1,2}}[./\-]\d{{1,2}}|\d{{1,2}}[./\-]\d{{1,2}}[./\-]\d{{4}}|\d{{1,2}}(?:st|nd|rd|th)?[ \t]+{m}\b\.?,?[ \t]+\d{{4}}|{m}\b\.?[ \t]+\d{{1,2}}(?:st|nd|rd|th)?,?[ \t]+\d{{4}})",
        m = MONTHS
    )
});

fn rules(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
}

// ── Rule tables ──────────────────────────────────────────────────────────

static INVOICE_NUMBER: Lazy<Vec<Regex>> = Lazy::new(|| {
    rules(&[
        r"(?i)\binvoice[ \t]*(?:no\.?|number|num\.?|nr\.?|id)?[ \t]*#?[ \t]*:?[ \t]*([A-Z0-9][A-Z0-9\-_/]*)".to_string(),
        r"(?i)\b(INV[-_]?\d+)\b".to_string(),
        r"(?i)#[ \t]*([A-Z0-9][A-Z0-9\-_/]*)".to_string(),
    ])
});

static LABELLED_DATE: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["invoice[ \\t]+date", "date[ \\t]+of[ \\t]+issue", "issue[ \\t]+date", "date"]
        .iter()
        .map(|label| {
            Regex::new(&format!(r"(?i)\b{}\b[ \t]*:?[ \t]*({})\b", label, *DATE)).unwrap()
        })
        .collect()
});

static ANY_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\b{}\b", *DATE)).unwrap());

static TOTAL: Lazy<Vec<Regex>> = Lazy::new(|| {
    rules(&[
        format!(
            r"(?i)\b(?:grand[ \t]+total|total[ \t]+due|amount[ \t]+due|balance[ \t]+due)[ \t]*{CURRENCY_CODE}[ \t]*:?[ \t]*{AMOUNT}"
        ),
        format!(
            r"(?i)\btotal\b[ \t]*(?:amount|payable)?[ \t]*{CURRENCY_CODE}[ \t]*:?[ \t]*{AMOUNT}"
        ),
        format!(r"(?i)\bamount\b[ \t]*:?[ \t]*{AMOUNT}"),
        format!(r"(?i)\bsum\b[ \t]*:?[ \t]*{AMOUNT}"),
    ])
});

static SUBTOTAL: Lazy<Vec<Regex>> = Lazy::new(|| {
    rules(&[format!(
        r"(?i)\b(?:sub[ \t\-]?total|net[ \t]+(?:amount|total))[ \t]*{CURRENCY_CODE}[ \t]*:?[ \t]*{AMOUNT}"
    )])
});

static TAX_AMOUNT: Lazy<Vec<Regex>> = Lazy::new(|| {
    rules(&[format!(
        r"(?i)\b(?:VAT|tax)\b(?:[ \t]*\(?\d{{1,2}}(?:[.,]\d+)?[ \t]*%\)?)?[ \t]*(?:amount)?[ \t]*:?[ \t]*{AMOUNT}"
    )])
});

static VAT_NUMBER: Lazy<Vec<Regex>> = Lazy::new(|| {
    rules(&[
        r"(?i)\b(?:VAT|Tax[ \t]*ID|TIN)[ \t]*(?:No\.?|Number|Reg\.?(?:[ \t]*No\.?)?)?[ \t]*:?[ \t]*([A-Z]{0,2}\d[A-Z0-9]{5,14})\b".to_string(),
    ])
});

static CUSTOMER_NUMBER: Lazy<Vec<Regex>> = Lazy::new(|| {
    rules(&[
        r"(?i)\b(?:customer|cust\.?|client)[ \t]*(?:no\.?|number|id|#)?[ \t]*:?[ \t]*([A-Z0-9][A-Z0-9\-_/]*)".to_string(),
    ])
});

static PO_NUMBER: Lazy<Vec<Regex>> = Lazy::new(|| {
    rules(&[
        r"(?i)\b(?:purchase[ \t]+order|P\.?O\.?)[ \t]*(?:no\.?|number|#)?[ \t]*:?[ \t]*([A-Z0-9][A-Z0-9\-_/]*)".to_string(),
    ])
});

static PAYMENT_TERMS: Lazy<Vec<Regex>> = Lazy::new(|| {
    rules(&[
        r"(?im)\b(?:payment[ \t]+terms|terms)[ \t]*:[ \t]*(\S.*)$".to_string(),
        r"(?i)\b(net[ \t]?\d{1,3}(?:[ \t]+days)?|due[ \t]+on[ \t]+receipt)\b".to_string(),
    ])
});

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w.\-]+@[\w.\-]+\.\w+").unwrap());

static PHONE: Lazy<Vec<Regex>> = Lazy::new(|| {
    rules(&[
        r"(?i)\b(?:tel(?:efon|ephone)?|phone|ph|fon|mobile)\.?[ \t]*:?[ \t]*(\+?\d[\d \-()/]{6,}\d)".to_string(),
        r"(\+\d[\d \-()]{8,}\d)".to_string(),
    ])
});

static VENDOR_LABELLED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:vendor|from|seller|supplier|bill[ \t]+from|sold[ \t]+by)[ \t]*:[ \t]*(\S.*)$")
        .unwrap()
});

static COMPANY_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:gmbh|llc|inc|ltd|limited|corp|corporation|plc|ag|bv|company)\b").unwrap()
});

/// Vendor names are expected near the top of the first page.
const VENDOR_SCAN_LINES: usize = 10;

// ── Entry point ──────────────────────────────────────────────────────────

/// Parse an OCR transcript into invoice fields. `raw_text` is set to the
/// transcript itself.
pub fn parse_invoice(text: &str) -> ExtractedInvoice {
    let dates_found = find_dates(text);

    let invoice = ExtractedInvoice {
        invoice_number: first_capture(&INVOICE_NUMBER, text, has_digit),
        date: first_capture(&LABELLED_DATE, text, |_| true).or_else(|| dates_found.first().cloned()),
        vendor: find_vendor(text),
        total_amount: first_capture(&TOTAL, text, |_| true),
        vendor_email: EMAIL.find(text).map(|m| m.as_str().to_string()),
        vendor_phone: first_capture(&PHONE, text, |_| true),
        customer_number: first_capture(&CUSTOMER_NUMBER, text, has_digit),
        po_number: first_capture(&PO_NUMBER, text, has_digit),
        vat_number: first_capture(&VAT_NUMBER, text, |_| true),
        subtotal: first_capture(&SUBTOTAL, text, |_| true),
        tax_amount: first_capture(&TAX_AMOUNT, text, |_| true),
        payment_terms: first_capture(&PAYMENT_TERMS, text, |_| true),
        dates_found,
        raw_text: Some(text.to_string()),
    };

    debug!(
        "Field rules filled {}/12 fields, {} date(s) found",
        invoice.populated_fields(),
        invoice.dates_found.len()
    );
    invoice
}

/// Every date in the text, deduplicated, in order of first appearance.
pub fn find_dates(text: &str) -> Vec<String> {
    let mut dates: Vec<String> = Vec::new();
    for m in ANY_DATE.find_iter(text) {
        let date = m.as_str().to_string();
        if !dates.contains(&date) {
            dates.push(date);
        }
    }
    dates
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn has_digit(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
}

/// First capture group of the first rule that yields an accepted value.
fn first_capture(rules: &[Regex], text: &str, accept: impl Fn(&str) -> bool) -> Option<String> {
    rules.iter().find_map(|re| {
        re.captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .find(|value| !value.is_empty() && accept(*value))
            .map(str::to_string)
    })
}

fn find_vendor(text: &str) -> Option<String> {
    if let Some(caps) = VENDOR_LABELLED.captures(text) {
        return caps.get(1).map(|m| m.as_str().trim().to_string());
    }

    let head: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("---"))
        .take(VENDOR_SCAN_LINES)
        .collect();

    if let Some(line) = head.iter().find(|line| COMPANY_SUFFIX.is_match(line)) {
        return Some(line.to_string());
    }

    head.iter()
        .find(|line| {
            !line.starts_with(|c: char| c.is_ascii_digit())
                && line.split_whitespace().count() >= 2
                && !line.to_lowercase().contains("invoice")
                && !line.contains(':')
                && !line.contains('@')
        })
        .map(|line| line.to_string())
}
