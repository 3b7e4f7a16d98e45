//! Locale-tolerant price parsing

use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

/// Currency markers removed before the direct parse (longest first)
const CURRENCY_TOKENS: &[&str] = &[
    "US$", "MX$", "M.N.", "MXN", "mxn", "USD", "usd", "MN", "$", "€", "£",
];

/// First price-looking token in free text: grouped thousands or a plain number,
/// optionally followed by one or two decimals
static PRICE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,3}(?:[.,\u{a0}\u{202f}]\d{3})+(?:[.,]\d{1,2})?|\d+(?:[.,]\d{1,2})?")
        .expect("price token regex is valid")
});

/// Parses a price string into a decimal, tolerating locale formatting
///
/// # Parsing Steps
///
/// 1. Strip non-breaking spaces, whitespace and currency markers
/// 2. If only digits and separators remain, resolve the decimal separator
///    (the last of `.`/`,` when both appear; a single `,` followed by one or two
///    digits is a decimal comma; otherwise separators are thousands groups)
///    and parse directly
/// 3. Otherwise scan the original text for the first price-looking token and
///    parse that, treating a trailing `,dd` as a decimal comma
///
/// Never fails: anything unparsable yields `None`.
///
/// # Examples
///
/// ```
/// use rust_decimal::Decimal;
/// use shelf_tracker::normalize::parse_price;
///
/// assert_eq!(parse_price("1,234.56"), Some(Decimal::new(123456, 2)));
/// assert_eq!(parse_price("1 234,56"), Some(Decimal::new(123456, 2)));
/// assert_eq!(parse_price("N/A"), None);
/// ```
pub fn parse_price(raw: &str) -> Option<Decimal> {
    if let Some(direct) = strip_noise(raw).and_then(|s| parse_grouped(&s)) {
        return Some(direct);
    }

    let token = PRICE_TOKEN.find(raw)?;
    let compact: String = token
        .as_str()
        .chars()
        .filter(|c| *c != '\u{a0}' && *c != '\u{202f}')
        .collect();
    parse_grouped(&compact)
}

/// Removes currency markers and whitespace; returns `None` if anything other than
/// digits and separators is left
fn strip_noise(raw: &str) -> Option<String> {
    let mut text = raw.replace(['\u{a0}', '\u{202f}'], " ");
    for token in CURRENCY_TOKENS {
        text = text.replace(token, " ");
    }

    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty()
        || !compact
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
    {
        return None;
    }

    Some(compact)
}

/// Parses a digits-and-separators string, resolving which separator is decimal
fn parse_grouped(text: &str) -> Option<Decimal> {
    if !text.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = match (text.rfind('.'), text.rfind(',')) {
        (Some(dot), Some(comma)) if dot > comma => text.replace(',', ""),
        (Some(_), Some(_)) => text.replace('.', "").replace(',', "."),
        (None, Some(comma)) => {
            let decimals = text.len() - comma - 1;
            if text.matches(',').count() == 1 && (1..=2).contains(&decimals) {
                text.replace(',', ".")
            } else {
                text.replace(',', "")
            }
        }
        (Some(_), None) if text.matches('.').count() > 1 => text.replace('.', ""),
        _ => text.to_string(),
    };

    Decimal::from_str(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(units: i64, scale: u32) -> Option<Decimal> {
        Some(Decimal::new(units, scale))
    }

    #[test]
    fn test_thousands_comma_decimal_dot() {
        assert_eq!(parse_price("1,234.56"), dec(123456, 2));
    }

    #[test]
    fn test_space_grouping_decimal_comma() {
        assert_eq!(parse_price("1 234,56"), dec(123456, 2));
        assert_eq!(parse_price("1\u{a0}234,56"), dec(123456, 2));
        assert_eq!(parse_price("1\u{202f}234,56"), dec(123456, 2));
    }

    #[test]
    fn test_currency_symbol() {
        assert_eq!(parse_price("$99.00"), dec(9900, 2));
        assert_eq!(parse_price("$ 25.50 MXN"), dec(2550, 2));
        assert_eq!(parse_price("MX$1,099"), dec(1099, 0));
    }

    #[test]
    fn test_european_grouping() {
        assert_eq!(parse_price("1.234,56"), dec(123456, 2));
        assert_eq!(parse_price("1.234.567"), dec(1234567, 0));
    }

    #[test]
    fn test_plain_numbers() {
        assert_eq!(parse_price("199.90"), dec(19990, 2));
        assert_eq!(parse_price("45"), dec(45, 0));
        assert_eq!(parse_price("12,5"), dec(125, 1));
    }

    #[test]
    fn test_empty_and_missing() {
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("   "), None);
        assert_eq!(parse_price("N/A"), None);
        assert_eq!(parse_price("Agotado"), None);
    }

    #[test]
    fn test_fallback_scans_free_text() {
        assert_eq!(parse_price("Precio: $1,299.00 antes $1,499.00"), dec(129900, 2));
        assert_eq!(parse_price("Ahora 37,50 c/u"), dec(3750, 2));
        assert_eq!(parse_price("desde 18.5 por kg"), dec(185, 1));
    }

    #[test]
    fn test_numeric_equality_ignores_scale() {
        assert_eq!(parse_price("99"), parse_price("$99.00"));
    }
}
