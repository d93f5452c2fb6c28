use log::debug;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parses a decimal string leniently.
///
/// Empty, missing or non-numeric values count as zero: extracted and
/// hand-entered amounts are expected to be occasionally malformed, and a single
/// bad value must not stop a recomputation.
pub fn parse_decimal(raw: &str) -> Decimal {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Decimal::ZERO;
    }

    if let Ok(value) = Decimal::from_str(trimmed) {
        return value;
    }

    if let Ok(value) = Decimal::from_scientific(trimmed) {
        return value;
    }

    debug!("Treating non-numeric value '{}' as zero", raw);
    Decimal::ZERO
}

/// Canonical decimal-string form written back onto the statement ("60", "100.5", "-3").
pub fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Sums decimal strings. A term that would overflow is skipped.
pub fn sum_decimal_strings<'a, I>(values: I) -> Decimal
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .fold(Decimal::ZERO, |acc, raw| checked_add(acc, parse_decimal(raw)))
}

pub fn checked_add(acc: Decimal, term: Decimal) -> Decimal {
    match acc.checked_add(term) {
        Some(sum) => sum,
        None => {
            debug!("Skipping term {} that overflows running total {}", term, acc);
            acc
        }
    }
}

pub fn checked_sub(lhs: Decimal, rhs: Decimal) -> Decimal {
    match lhs.checked_sub(rhs) {
        Some(diff) => diff,
        None => {
            debug!("Subtraction {} - {} overflows; keeping left operand", lhs, rhs);
            lhs
        }
    }
}

/// Splits a PascalCase storage key into words: `RepairsAndMaintenance` -> `Repairs And Maintenance`.
///
/// Used to back-fill labels for keys that are not in the canonical chart.
pub fn humanize_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 8);

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                out.push(' ');
            }
        }
        out.push(c);
    }

    out
}
