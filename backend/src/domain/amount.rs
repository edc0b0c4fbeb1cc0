//! Free-form amount parsing.
//!
//! Administrators type amounts as shorthand: `5к` is 5 000, `2кк` is
//! 2 000 000, and a comma works as the decimal separator (`1,5к` → 1 500).
//! The Latin letters `k`/`kk` are accepted as aliases for the Cyrillic
//! markers. Parsing is best-effort: anything unreadable becomes 0.

/// Convert a free-form amount string into a signed integer. Never fails.
pub fn parse_amount(input: &str) -> i64 {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    // Fold the Latin shorthand into the Cyrillic markers before suffix
    // detection; order matters so "kk" is not consumed as two "k"s.
    let cleaned = cleaned.replace("kk", "кк").replace('k', "к");

    let (sign, body) = if let Some(rest) = cleaned.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = cleaned.strip_prefix('-') {
        (-1, rest)
    } else {
        (1, cleaned.as_str())
    };

    if let Some(number) = body.strip_suffix("кк") {
        return sign * scaled(number, 1_000_000);
    }
    if let Some(number) = body.strip_suffix('к') {
        return sign * scaled(number, 1_000);
    }

    let body = body.replace(',', ".");
    let value = if body.contains('.') {
        // Real number, truncated toward zero
        body.parse::<f64>().map(|v| v.trunc() as i64).unwrap_or(0)
    } else {
        body.parse::<i64>().unwrap_or(0)
    };

    sign * value
}

/// Parse the numeric part in front of a shorthand marker and scale it.
/// `1,5` with factor 1 000 becomes 1 500; unreadable input becomes 0.
fn scaled(number: &str, factor: i64) -> i64 {
    match number.replace(',', ".").parse::<f64>() {
        Ok(value) => (value * factor as f64).trunc() as i64,
        Err(_) => 0,
    }
}
