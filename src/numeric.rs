use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

/// Parse a decimal written plainly ("0.245") or in scientific notation ("2.45e-1").
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Read a decimal from a JSON number or numeric string.
// serde_json keeps the source text of numbers (arbitrary_precision), so no digits are lost to f64.
pub fn decimal_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}
