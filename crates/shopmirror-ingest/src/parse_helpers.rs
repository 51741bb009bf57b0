//! Lenient scalar readers for storefront payload values.
//!
//! The storefront serializes post meta inconsistently: the same field can
//! arrive as a JSON number, a numeric string, an empty string, a
//! single-element array, or not at all. Everything here maps "no usable
//! value" to `None` instead of failing, so a single odd field never sinks a
//! whole record.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Unwraps the single-element arrays some exports wrap meta values in.
fn scalar(value: &Value) -> &Value {
    match value {
        Value::Array(items) if items.len() == 1 => &items[0],
        other => other,
    }
}

/// Reads a decimal from a number or numeric string. Accepts a comma as the
/// decimal separator (`"12,50"`).
#[must_use]
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match scalar(value) {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_owned()
    };
    match Decimal::from_str(&normalized).or_else(|_| Decimal::from_scientific(&normalized)) {
        Ok(d) => Some(d),
        Err(_) => {
            tracing::debug!(value = trimmed, "ignoring non-numeric decimal field");
            None
        }
    }
}

/// Reads an integer from a number or numeric string. Whole-valued decimals
/// (`"3.0"`) are accepted; fractional ones are not.
#[must_use]
pub fn i64_from_value(value: &Value) -> Option<i64> {
    match scalar(value) {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<i64>().ok().or_else(|| {
                parse_decimal(trimmed)
                    .filter(|d| d.fract().is_zero())
                    .and_then(|d| i64::try_from(d).ok())
            })
        }
        _ => None,
    }
}

#[must_use]
pub fn i32_from_value(value: &Value) -> Option<i32> {
    i64_from_value(value).and_then(|v| i32::try_from(v).ok())
}

/// Reads a non-empty, trimmed string. Numbers are rendered as text.
#[must_use]
pub fn string_from_value(value: &Value) -> Option<String> {
    match scalar(value) {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// serde adapters
// ---------------------------------------------------------------------------

fn deserialize_with<'de, D, T>(d: D, read: fn(&Value) -> Option<T>) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.as_ref().and_then(read))
}

/// `#[serde(deserialize_with = "lenient_decimal")]`
///
/// # Errors
///
/// Only fails when the input is not valid JSON at all.
pub fn lenient_decimal<'de, D>(d: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_with(d, decimal_from_value)
}

/// `#[serde(deserialize_with = "lenient_i64")]`
///
/// # Errors
///
/// Only fails when the input is not valid JSON at all.
pub fn lenient_i64<'de, D>(d: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_with(d, i64_from_value)
}

/// `#[serde(deserialize_with = "lenient_i32")]`
///
/// # Errors
///
/// Only fails when the input is not valid JSON at all.
pub fn lenient_i32<'de, D>(d: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_with(d, i32_from_value)
}

/// `#[serde(deserialize_with = "lenient_string")]`
///
/// # Errors
///
/// Only fails when the input is not valid JSON at all.
pub fn lenient_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_with(d, string_from_value)
}
