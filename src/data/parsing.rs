//! Parsers for display-text market values.
//!
//! Screener pages and scanner APIs hand out numbers the way they render them:
//! `"128.682M"`, `"−0.59%"`, `"3.55 T USD"`, `"1,204.10"`. Every parser here
//! turns such a token into a finite `f64` or `None`. None of them panic and
//! none of them return NaN; text without a usable number is simply absent.

/// Placeholder shown by the quote-table screener for a missing value.
const EM_DASH: &str = "—";
/// Placeholder shown by the scanner pages for a missing value.
const DOUBLE_HYPHEN: &str = "--";

/// Scale suffixes in the order they are looked for.
const SCALE_SUFFIXES: [(char, f64); 4] = [
    ('T', 1_000_000_000_000.0),
    ('B', 1_000_000_000.0),
    ('M', 1_000_000.0),
    ('K', 1_000.0),
];

/// Returns true for the tokens sources print instead of a value.
pub fn is_placeholder(text: &str) -> bool {
    text == EM_DASH || text == DOUBLE_HYPHEN
}

/// Parses a price such as `"$1,204.10"` or `"477.40 USD"`.
pub fn parse_currency(value: Option<&str>) -> Option<f64> {
    let cleaned = keep_numeric(&strip_separators(&normalize_minus(non_empty(value)?)));
    parse_leading_float(&cleaned)
}

/// Parses a signed absolute change such as `"−1.25"`.
///
/// Same cleaning rules as [`parse_currency`].
pub fn parse_change(value: Option<&str>) -> Option<f64> {
    parse_currency(value)
}

/// Parses a percentage such as `"-0.59%"` into `-0.59`.
///
/// Thousands separators are dropped before reading, so `"1,234%"` is 1234
/// rather than stopping at the comma.
pub fn parse_percent(value: Option<&str>) -> Option<f64> {
    let cleaned = strip_separators(&normalize_minus(non_empty(value)?)).replacen('%', "", 1);
    parse_leading_float(&cleaned)
}

/// Parses a scaled quantity such as `"37.58 M"`, `"3.55 T USD"` or `"750K"`.
///
/// Used for volume, average volume, relative volume and market cap. The first
/// suffix found in T, B, M, K order sets the multiplier, and the text is cut at
/// that letter before the numeric part is read.
///
/// # Examples
/// ```
/// use movers_scan::data::parsing::parse_volume;
///
/// assert_eq!(parse_volume(Some("750K")), Some(750_000.0));
/// assert_eq!(parse_volume(Some("477.40 USD")), Some(477.40));
/// assert_eq!(parse_volume(Some("-")), None);
/// ```
pub fn parse_volume(value: Option<&str>) -> Option<f64> {
    let cleaned = strip_separators(&normalize_minus(non_empty(value)?))
        .trim()
        .to_uppercase();

    let (numeric, multiplier) = SCALE_SUFFIXES
        .iter()
        .find_map(|&(suffix, multiplier)| {
            cleaned
                .find(suffix)
                .map(|at| (&cleaned[..at], multiplier))
        })
        .unwrap_or((cleaned.as_str(), 1.0));

    let number = parse_leading_float(&keep_numeric(numeric))?;
    Some(number * multiplier).filter(|scaled| scaled.is_finite())
}

/// Parses a plain ratio such as a P/E column (`"24.31"`).
pub fn parse_ratio(value: Option<&str>) -> Option<f64> {
    parse_leading_float(&strip_separators(&normalize_minus(non_empty(value)?)))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.is_empty())
}

/// Unicode minus sign (U+2212) to ASCII hyphen-minus.
fn normalize_minus(text: &str) -> String {
    text.replace('\u{2212}', "-")
}

fn strip_separators(text: &str) -> String {
    text.replace(',', "")
}

fn keep_numeric(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect()
}

/// Reads the longest number at the start of `text`, ignoring what follows.
///
/// Accepts an optional sign, digits with an optional fraction, and an optional
/// exponent. Returns `None` when no digit is present or the value overflows.
fn parse_leading_float(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let digits_from = |mut at: usize| {
        while at < bytes.len() && bytes[at].is_ascii_digit() {
            at += 1;
        }
        at
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut digits = int_end - end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        let frac_digits = frac_end - (end + 1);
        if digits + frac_digits > 0 {
            digits += frac_digits;
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_end = digits_from(end + 1 + sign);
        if exp_end > end + 1 + sign {
            end = exp_end;
        }
    }

    text[..end]
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}
