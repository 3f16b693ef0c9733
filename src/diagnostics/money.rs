//! Exact decimal parsing for monetary and time fields.
//!
//! The reasoning agent emits prices and hours as JSON numbers or as strings
//! like `"$1,249.50"`. Both are parsed from their shortest textual form into
//! `rust_decimal::Decimal`, so `45.99` stays `45.99` and never passes through
//! binary-float arithmetic.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse a JSON value (number or numeric string) into an exact decimal.
pub fn parse_decimal(value: &Value) -> Result<Decimal, String> {
    match value {
        Value::Number(n) => {
            // serde_json prints floats in shortest round-trip form ("45.99").
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map_err(|e| format!("'{text}' is not an exact decimal: {e}"))
        }
        Value::String(s) => parse_decimal_str(s),
        Value::Null => Err("value is missing".to_string()),
        other => Err(format!("expected a number, got {other}")),
    }
}

/// Parse a human-entered amount such as `"$1,249.50"` or `" 2.0 "`.
pub fn parse_decimal_str(raw: &str) -> Result<Decimal, String> {
    let trimmed = raw.trim();
    let unsigned = trimmed.strip_prefix('$').unwrap_or(trimmed).trim();
    let cleaned: String = unsigned.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Err("value is empty".to_string());
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|_| format!("'{raw}' is not a number"))
}

fn non_negative(value: Decimal) -> Result<Decimal, String> {
    if value.is_sign_negative() && !value.is_zero() {
        Err(format!("{value} must not be negative"))
    } else {
        Ok(value.normalize())
    }
}

// ─── Serde Adapters ─────────────────────────────────────────────────────────

/// Deserialize a required non-negative amount.
pub fn de_amount<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_decimal(&value)
        .and_then(non_negative)
        .map_err(D::Error::custom)
}

/// Deserialize an optional non-negative amount (`null` and absent are `None`).
pub fn de_opt_amount<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse_decimal(&value)
            .and_then(non_negative)
            .map(Some)
            .map_err(D::Error::custom),
    }
}

/// Deserialize a strictly positive quantity, defaulting to one when absent.
pub fn de_quantity<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(Decimal::ONE),
        Some(value) => {
            let qty = parse_decimal(&value).map_err(D::Error::custom)?;
            if qty <= Decimal::ZERO {
                return Err(D::Error::custom(format!("quantity {qty} must be positive")));
            }
            Ok(qty.normalize())
        }
    }
}

/// Deserialize an optional confidence in `[0, 1]`.
pub fn de_opt_confidence<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let c = parse_decimal(&value).map_err(D::Error::custom)?;
            if c < Decimal::ZERO || c > Decimal::ONE {
                return Err(D::Error::custom(format!(
                    "confidence {c} must be between 0 and 1"
                )));
            }
            Ok(Some(c.normalize()))
        }
    }
}

pub(crate) fn default_quantity() -> Decimal {
    Decimal::ONE
}
