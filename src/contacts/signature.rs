//! Signature Extractor: contact details from the tail of an email body.
//!
//! Pure string processing, no I/O. Every function here is total: any input
//! produces a record, with `""` for fields that could not be found.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::contacts::model::{ContactRecord, organization_from_email};

/// Phone-shaped run: optional `+`, a digit, at least five of digit / hyphen /
/// en-dash / parenthesis / space / tab, then a closing digit. Newlines never
/// join two numbers. Digits are ASCII only.
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+?[0-9][0-9\-\x{2013}() \t]{5,}[0-9]").expect("phone pattern")
});

/// Dutch-style postcode, e.g. `1234 AB` or `1234AB`. Word boundaries are
/// ASCII, so a trailing accented letter still ends the match.
static POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u:\b)[0-9]{4}\s?[A-Za-z]{2}(?-u:\b)").expect("postcode pattern")
});

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://|www\.").expect("url pattern"));

/// A blank line: newline, optional whitespace, newline.
static BLANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n\s*\r?\n").expect("blank line pattern"));

/// Isolate the signature block of `body`.
///
/// If `sender_name` occurs literally in the body, the block runs from its
/// first occurrence to the end. Otherwise it is the last non-empty
/// blank-line-separated paragraph (the whole body when there is only one).
pub fn extract_signature_block(body: &str, sender_name: &str) -> String {
    if !sender_name.is_empty()
        && let Some(idx) = body.find(sender_name)
    {
        return body[idx..].trim().to_string();
    }

    let paragraphs: Vec<&str> = BLANK_LINE.split(body).collect();
    if paragraphs.len() < 2 {
        return body.trim().to_string();
    }
    paragraphs
        .iter()
        .rev()
        .find(|p| !p.trim().is_empty())
        .map(|p| p.trim().to_string())
        .unwrap_or_default()
}

/// Parse a signature block into a contact record.
///
/// `email` is always the sender address; `organization` is derived from its
/// domain.
pub fn parse_signature(block: &str, sender_name: &str, sender_email: &str) -> ContactRecord {
    let lines: Vec<&str> = block
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    ContactRecord {
        name: extract_name(block, &lines, sender_name, sender_email),
        email: sender_email.to_string(),
        phone: extract_phone(block),
        organization: organization_from_email(sender_email),
        postcode: extract_postcode(&lines),
    }
}

/// Full extraction: isolate the block, then parse it.
pub fn extract_contact(body: &str, sender_name: &str, sender_email: &str) -> ContactRecord {
    let block = extract_signature_block(body, sender_name);
    let record = parse_signature(&block, sender_name, sender_email);
    debug!(
        block_len = block.len(),
        has_name = !record.name.is_empty(),
        has_phone = !record.phone.is_empty(),
        has_postcode = !record.postcode.is_empty(),
        "Signature parsed"
    );
    record
}

fn extract_name(block: &str, lines: &[&str], sender_name: &str, sender_email: &str) -> String {
    if !sender_name.is_empty() && block.to_lowercase().contains(&sender_name.to_lowercase()) {
        return sender_name.to_string();
    }

    lines
        .iter()
        .find(|line| is_name_line(line, sender_email))
        .map(|line| line.to_string())
        .unwrap_or_default()
}

/// A line can be a name if it is not the sender address, a phone number, a
/// URL, or something starting with a digit or `+`.
fn is_name_line(line: &str, sender_email: &str) -> bool {
    if !sender_email.is_empty() && line.contains(sender_email) {
        return false;
    }
    if PHONE.is_match(line) || URL.is_match(line) {
        return false;
    }
    !line.starts_with(|c: char| c.is_ascii_digit() || c == '+')
}

/// Longest phone-shaped match in the block; the first one wins a tie.
fn extract_phone(block: &str) -> String {
    let mut best: Option<&str> = None;
    for m in PHONE.find_iter(block) {
        let candidate = m.as_str();
        match best {
            Some(current) if current.chars().count() >= candidate.chars().count() => {}
            _ => best = Some(candidate),
        }
    }
    best.map(str::to_string).unwrap_or_default()
}

fn extract_postcode(lines: &[&str]) -> String {
    lines
        .iter()
        .find_map(|line| POSTCODE.find(line))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str =
        "Hi,\n\nJohn Smith\nSales Director\n+31 6 1234 5678\n1234 AB Amsterdam\njohn@example.com";

    #[test]
    fn full_signature_scenario() {
        let record = extract_contact(BODY, "John Smith", "john@example.com");
        assert_eq!(record.name, "John Smith");
        assert_eq!(record.phone, "+31 6 1234 5678");
        assert_eq!(record.postcode, "1234 AB");
        assert_eq!(record.email, "john@example.com");
        assert_eq!(record.organization, "Example");
    }

    #[test]
    fn block_starts_at_sender_name() {
        let block = extract_signature_block(BODY, "John Smith");
        assert!(block.starts_with("John Smith\nSales Director"));
        assert!(block.ends_with("john@example.com"));
    }

    #[test]
    fn block_falls_back_to_last_paragraph() {
        let body = "Please find the offer attached.\n\nKind regards,\n \nJane Doe\nAcme BV";
        assert_eq!(extract_signature_block(body, "Someone Else"), "Jane Doe\nAcme BV");
    }

    #[test]
    fn block_skips_trailing_empty_paragraph() {
        let body = "Hello there\r\n\r\nJane Doe\r\n+44 20 7946 0958\r\n\r\n   ";
        assert_eq!(
            extract_signature_block(body, ""),
            "Jane Doe\r\n+44 20 7946 0958"
        );
    }

    #[test]
    fn single_paragraph_is_whole_body() {
        assert_eq!(extract_signature_block("  just one line  ", ""), "just one line");
    }

    #[test]
    fn name_from_first_qualifying_line() {
        let block = "jane@acme.com\n+31 20 123 4567\nwww.acme.com\n12 Main Street\nJane Doe\nCEO";
        let record = parse_signature(block, "", "jane@acme.com");
        assert_eq!(record.name, "Jane Doe");
    }

    #[test]
    fn name_matches_sender_case_insensitively() {
        let record = parse_signature("JOHN SMITH\nDirector", "John Smith", "john@example.com");
        assert_eq!(record.name, "John Smith");
    }

    #[test]
    fn no_qualifying_name_line_yields_empty() {
        let record = parse_signature("+31 6 1234 5678\nhttps://acme.com", "", "x@acme.com");
        assert_eq!(record.name, "");
    }

    #[test]
    fn longest_phone_wins() {
        let block = "T 020-123 45\nM +31 (0)6 1234 5678\nF 020 123 4567";
        assert_eq!(extract_phone(block), "+31 (0)6 1234 5678");
    }

    #[test]
    fn equal_length_phones_keep_first() {
        assert_eq!(extract_phone("020 1234567\n030 7654321"), "020 1234567");
    }

    #[test]
    fn phone_accepts_en_dash() {
        assert_eq!(extract_phone("Tel: 020\u{2013}123\u{2013}4567"), "020\u{2013}123\u{2013}4567");
    }

    #[test]
    fn short_digit_runs_are_not_phones() {
        assert_eq!(extract_phone("Room 12345"), "");
    }

    #[test]
    fn non_ascii_digits_are_not_phones() {
        assert_eq!(extract_phone("Tel: ٠٢٠ ١٢٣ ٤٥٦٧"), "");
    }

    #[test]
    fn postcode_followed_by_accented_letter() {
        let record = parse_signature("Jane\n1234ABé Utrecht", "", "");
        assert_eq!(record.postcode, "1234AB");
    }

    #[test]
    fn postcode_without_space() {
        let record = parse_signature("Jane\nKeizersgracht 1, 1015CJ Amsterdam", "", "");
        assert_eq!(record.postcode, "1015CJ");
    }

    #[test]
    fn empty_sender_email_does_not_reject_every_line() {
        let record = parse_signature("Jane Doe\nAcme", "", "");
        assert_eq!(record.name, "Jane Doe");
        assert_eq!(record.organization, "");
    }

    #[test]
    fn total_on_degenerate_input() {
        for body in ["", "\n\n\n", "+", "\u{2013}\u{2013}", "é\r\n\r\n\u{0}"] {
            let record = extract_contact(body, "", "");
            assert_eq!(record.phone, "");
            assert_eq!(record.postcode, "");
        }
    }
}
