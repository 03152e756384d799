use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Maximum accepted Name length after trimming.
pub const MAX_NAME_LEN: usize = 200;

/// Prefix for the constructed existing-member card number.
pub const CARD_NO_PREFIX: &str = "PRF-";

/// Digit width the card number is left-padded to.
pub const CARD_NO_WIDTH: usize = 7;

/// Prefix for the HQ note carried on every output row.
pub const HQ_NOTE_PREFIX: &str = "PRFHQ-";

/// Sentinel country code for names missing from the mapping table.
pub const COUNTRY_FALLBACK: &str = "ZZ";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$").unwrap());
static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,18}(\.\d{1,2})?$").unwrap());
static CURRENCY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{3}$").unwrap());
static MONTH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:[1-9]|1[0-2])$").unwrap());

/// Non-empty after trimming and at most [`MAX_NAME_LEN`] characters.
pub fn is_valid_name(s: &str) -> bool {
    let t = s.trim();
    !t.is_empty() && t.chars().count() <= MAX_NAME_LEN
}

/// `local@domain.tld` shape, case-insensitive, trimmed length under 255.
pub fn is_valid_email(s: &str) -> bool {
    let t = s.trim();
    t.chars().count() < 255 && EMAIL_RE.is_match(t)
}

/// Syntactic amount check: 1-18 integer digits, optional 1-2 fraction digits.
/// Positivity is a separate check with its own error code.
pub fn is_valid_amount(s: &str) -> bool {
    AMOUNT_RE.is_match(s.trim())
}

/// A syntactically valid amount must also be strictly positive.
pub fn is_positive_amount(s: &str) -> bool {
    s.trim().parse::<f64>().map(|v| v > 0.0).unwrap_or(false)
}

pub fn normalize_currency(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Exactly three ASCII letters once normalized. Shape only, not checked
/// against a real ISO-4217 list.
pub fn is_valid_currency(normalized: &str) -> bool {
    CURRENCY_RE.is_match(normalized)
}

/// Literal integer 1-12 with no leading zero and no decimal point.
pub fn is_valid_month(s: &str) -> bool {
    MONTH_RE.is_match(s.trim())
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%b %d, %Y", "%d %b %Y"];

/// Permissive date check covering RFC 3339, RFC 2822 and the common
/// date / date-time layouts seen in exported spreadsheets.
pub fn parses_as_date(s: &str) -> bool {
    let t = s.trim();
    if t.is_empty() {
        return false;
    }
    if DateTime::parse_from_rfc3339(t).is_ok() || DateTime::parse_from_rfc2822(t).is_ok() {
        return true;
    }
    if DATETIME_FORMATS
        .iter()
        .any(|f| NaiveDateTime::parse_from_str(t, f).is_ok())
    {
        return true;
    }
    DATE_FORMATS
        .iter()
        .any(|f| NaiveDate::parse_from_str(t, f).is_ok())
}

pub fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Build the existing-member card number from a validated digit string.
/// Returns the constructed value and whether the input exceeded the pad
/// width (emitted as a warning upstream, never an error).
pub fn build_card_no(digits: &str) -> (String, bool) {
    if digits.len() > CARD_NO_WIDTH {
        (format!("{}{}", CARD_NO_PREFIX, digits), true)
    } else {
        (
            format!("{}{:0>width$}", CARD_NO_PREFIX, digits, width = CARD_NO_WIDTH),
            false,
        )
    }
}

/// HQ note carried on every output row regardless of HQID digit-ness.
pub fn build_hq_note(hqid: &str) -> String {
    format!("{}{}", HQ_NOTE_PREFIX, hqid.trim())
}

/// True when the trimmed HQID contains anything other than ASCII digits.
/// An empty HQID is not flagged.
pub fn hqid_has_non_digits(hqid: &str) -> bool {
    hqid.trim().bytes().any(|b| !b.is_ascii_digit())
}

/// Read-only country-name to country-code table with a catch-all fallback.
/// Injected into the pipeline so tests can substitute mappings.
#[derive(Debug, Clone)]
pub struct CountryMap {
    entries: HashMap<String, String>,
}

impl CountryMap {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    /// Map a country name to its code. Unmapped names get the fallback
    /// sentinel; the bool reports whether the lookup actually matched.
    pub fn lookup(&self, name: &str) -> (String, bool) {
        match self.entries.get(name.trim()) {
            Some(code) => (code.clone(), true),
            None => (COUNTRY_FALLBACK.to_string(), false),
        }
    }
}

impl Default for CountryMap {
    fn default() -> Self {
        let mut entries = HashMap::new();
        entries.insert("Myanmar".to_string(), "MM".to_string());
        entries.insert("Thailand".to_string(), "TH".to_string());
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_rejects_empty_and_oversized() {
        assert!(is_valid_name("Aung Aung"));
        assert!(is_valid_name("  x  "));
        assert!(!is_valid_name("   "));
        assert!(!is_valid_name(&"a".repeat(201)));
        assert!(is_valid_name(&"a".repeat(200)));
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("  First.Last+tag@sub.example.co  "));
        assert!(!is_valid_email("no-at-sign.example.com"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user@example.c"));
        let long_local = format!("{}@example.com", "a".repeat(250));
        assert!(!is_valid_email(&long_local));
    }

    #[test]
    fn amount_syntax_and_positivity_are_distinct() {
        assert!(is_valid_amount("100"));
        assert!(is_valid_amount("100.50"));
        assert!(is_valid_amount("0.00"));
        assert!(!is_valid_amount("100.505"));
        assert!(!is_valid_amount("-5"));
        assert!(!is_valid_amount("1,000"));
        assert!(!is_valid_amount(&"9".repeat(19)));

        assert!(is_positive_amount("0.01"));
        assert!(!is_positive_amount("0"));
        assert!(!is_positive_amount("0.00"));
    }

    #[test]
    fn currency_is_three_letters_after_normalization() {
        assert!(is_valid_currency(&normalize_currency(" usd ")));
        assert!(is_valid_currency(&normalize_currency("MMK")));
        assert!(!is_valid_currency(&normalize_currency("US")));
        assert!(!is_valid_currency(&normalize_currency("USDT")));
        assert!(!is_valid_currency(&normalize_currency("U$D")));
    }

    #[test]
    fn month_accepts_1_through_12_only() {
        assert!(is_valid_month("1"));
        assert!(is_valid_month("12"));
        assert!(is_valid_month(" 9 "));
        assert!(!is_valid_month("0"));
        assert!(!is_valid_month("13"));
        assert!(!is_valid_month("01"));
        assert!(!is_valid_month("1.0"));
        assert!(!is_valid_month(""));
    }

    #[test]
    fn date_parse_is_permissive() {
        assert!(parses_as_date("2025-08-30"));
        assert!(parses_as_date("2025/08/30"));
        assert!(parses_as_date("08/30/2025"));
        assert!(parses_as_date("2025-08-30T10:15:00+06:30"));
        assert!(parses_as_date(" 2025-08-30 10:15:00 "));
        assert!(!parses_as_date("not a date"));
        assert!(!parses_as_date(""));
    }

    #[test]
    fn card_no_padding_and_long_flag() {
        assert_eq!(build_card_no("123"), ("PRF-0000123".to_string(), false));
        assert_eq!(build_card_no("1234567"), ("PRF-1234567".to_string(), false));
        assert_eq!(build_card_no("12345678"), ("PRF-12345678".to_string(), true));
    }

    #[test]
    fn hq_note_and_digit_check() {
        assert_eq!(build_hq_note(" 42 "), "PRFHQ-42");
        assert_eq!(build_hq_note(""), "PRFHQ-");
        assert!(hqid_has_non_digits("42a"));
        assert!(!hqid_has_non_digits("42"));
        assert!(!hqid_has_non_digits(""));
    }

    #[test]
    fn country_map_falls_back_to_sentinel() {
        let map = CountryMap::default();
        assert_eq!(map.lookup("Myanmar"), ("MM".to_string(), true));
        assert_eq!(map.lookup(" Thailand "), ("TH".to_string(), true));
        assert_eq!(map.lookup("Atlantis"), ("ZZ".to_string(), false));
    }
}
