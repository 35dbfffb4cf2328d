//! Currency code normalization.

const SYMBOLS: &[(&str, &str)] = &[
    ("USD", "$"),
    ("EUR", "€"),
    ("PEN", "S/."),
    ("ARS", "$"),
    ("BOB", "Bs"),
    ("BRL", "R$"),
    ("CLP", "$"),
    ("COP", "$"),
    ("CRC", "₡"),
    ("DOP", "RD$"),
    ("GTQ", "Q"),
    ("HNL", "L"),
    ("MXN", "$"),
    ("NIO", "C$"),
    ("PAB", "B/."),
    ("PYG", "₲"),
    ("UYU", "$U"),
    ("VES", "Bs."),
];

const ALIASES: &[(&str, &str)] = &[
    ("S/", "PEN"),
    ("S/.", "PEN"),
    ("SOLES", "PEN"),
    ("US$", "USD"),
    ("U$S", "USD"),
    ("DOLARES", "USD"),
    ("DÓLARES", "USD"),
    ("€", "EUR"),
];

fn known_code(currency: &str) -> Option<&'static str> {
    let trimmed = currency.trim();
    let upper = trimmed.to_uppercase();

    if let Some((_, code)) = ALIASES.iter().find(|(alias, _)| *alias == trimmed || *alias == upper) {
        return Some(*code);
    }

    SYMBOLS
        .iter()
        .find(|(code, _)| *code == upper)
        .map(|(code, _)| *code)
}

/// Normalize a currency string to an upper-case ISO code.
///
/// Known aliases (`S/`, `US$`, ...) and codes in any case map to their ISO
/// code. Anything else is returned trimmed.
pub fn normalize_currency(currency: &str) -> String {
    known_code(currency)
        .map(str::to_string)
        .unwrap_or_else(|| currency.trim().to_string())
}

/// Display symbol for a currency code or alias.
pub fn currency_symbol(currency: &str) -> String {
    match known_code(currency) {
        Some(code) => SYMBOLS
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, symbol)| symbol.to_string())
            .unwrap_or_else(|| code.to_string()),
        None => currency.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_aliases() {
        assert_eq!(normalize_currency("S/"), "PEN");
        assert_eq!(normalize_currency(" S/. "), "PEN");
        assert_eq!(normalize_currency("US$"), "USD");
        assert_eq!(normalize_currency("soles"), "PEN");
        assert_eq!(normalize_currency("€"), "EUR");
    }

    #[test]
    fn test_normalize_codes_case_insensitive() {
        assert_eq!(normalize_currency("pen"), "PEN");
        assert_eq!(normalize_currency("Usd"), "USD");
    }

    #[test]
    fn test_unknown_currency_is_trimmed() {
        assert_eq!(normalize_currency("  XYZ "), "XYZ");
        assert_eq!(currency_symbol(" XYZ"), "XYZ");
    }

    #[test]
    fn test_symbols() {
        assert_eq!(currency_symbol("PEN"), "S/.");
        assert_eq!(currency_symbol("S/"), "S/.");
        assert_eq!(currency_symbol("brl"), "R$");
    }
}
