//! Post-processing: deterministic cleanup of engine and model output.
//!
//! Two consumers:
//!
//! * [`clean_ocr_text`] runs on every page Tesseract returns, before the
//!   field rules see it. OCR output is full of stray whitespace, one-character
//!   noise lines from table borders and invisible code points that break
//!   label matching.
//! * [`extract_json_block`] runs on the model's answer before JSON parsing.
//!   Models wrap JSON in ```` ```json ```` fences or add a sentence of prose
//!   despite the prompt asking for JSON only.
//!
//! ## Rule Order (OCR text)
//!
//! Line endings are normalised first so per-line rules see clean lines;
//! invisible characters are removed before whitespace collapsing so that a
//! zero-width space between two spaces does not survive as a double space.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all OCR cleanup rules to one page of recognised text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Collapse runs of spaces/tabs within a line and trim each line
/// 4. Drop lines shorter than two characters (scanner noise, table rules)
pub fn clean_ocr_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = collapse_inline_whitespace(&s);
    drop_noise_lines(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Collapse inline whitespace ───────────────────────────────────────

static RE_INLINE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{00A0}]+").unwrap());

fn collapse_inline_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| RE_INLINE_WS.replace_all(line.trim(), " ").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Drop noise lines ─────────────────────────────────────────────────

fn drop_noise_lines(input: &str) -> String {
    input
        .lines()
        .filter(|line| line.chars().count() >= 2)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Model answers ────────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n?(.*?)\n?```\s*$").unwrap());

/// Isolate the JSON object in a model answer.
///
/// Strips outer code fences; if prose surrounds the object, keeps the span
/// from the first `{` to the last `}`. Returns the trimmed input unchanged
/// when no braces are present so the JSON parser reports the real problem.
pub fn extract_json_block(answer: &str) -> &str {
    let trimmed = answer.trim();
    let unfenced = match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps.get(1).map_or(trimmed, |m| m.as_str().trim()),
        None => trimmed,
    };

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(remove_invisible_chars("In\u{200B}voice\u{FEFF}"), "Invoice");
    }

    #[test]
    fn test_collapse_inline_whitespace() {
        assert_eq!(
            collapse_inline_whitespace("  Total:\t\t $150.50  \nVAT   No."),
            "Total: $150.50\nVAT No."
        );
    }

    #[test]
    fn test_drop_noise_lines() {
        assert_eq!(drop_noise_lines("Invoice\n|\n\nTotal"), "Invoice\nTotal");
    }

    #[test]
    fn test_clean_ocr_text_full_pipeline() {
        let raw = "ACME  Corp\r\n|\r\n  Invoice #12345 \r\n\u{200B}\r\nTotal:   $99.00\r\n";
        assert_eq!(clean_ocr_text(raw), "ACME Corp\nInvoice #12345\nTotal: $99.00");
    }

    #[test]
    fn test_extract_json_fenced() {
        let answer = "```json\n{\"invoice_number\": \"A-1\"}\n```";
        assert_eq!(extract_json_block(answer), "{\"invoice_number\": \"A-1\"}");
    }

    #[test]
    fn test_extract_json_fence_no_lang() {
        let answer = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json_block(answer), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_with_prose() {
        let answer = "Here is the data:\n{\"a\": 1}\nLet me know if you need more.";
        assert_eq!(extract_json_block(answer), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_passthrough_without_braces() {
        assert_eq!(extract_json_block("  I cannot read this image. "), "I cannot read this image.");
    }
}
