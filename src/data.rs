//! Typed cell values and text-to-value conversion.
//!
//! A converted cell is `Option<Value>`: `None` stands for "no value" and is
//! always a successful conversion, regardless of the declared field type.
//! Required-ness is the row pipeline's concern, not the converter's.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::profile::FieldType;

/// A typed cell value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Decimal(Decimal),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Renders the value for the JSON record output: numbers stay numbers,
    /// timestamps become ISO-ish strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Integer(i) => serde_json::Value::Number((*i).into()),
            Value::Decimal(d) => d
                .to_f64()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(d.to_string())),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::DateTime(dt) => {
                serde_json::Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
        }
    }

    /// True for the values the required-field check treats as empty.
    pub fn is_blank(&self) -> bool {
        matches!(self, Value::String(s) if s.trim().is_empty())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Row-local conversion failure. `Display` is the human-readable message
/// that ends up in the row's error list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("Cannot parse '{raw}' as {field_type}.")]
    Unparseable { raw: String, field_type: FieldType },
}

/// Converts raw text into a typed value for `field_type`.
///
/// `None` and all-whitespace input succeed with `None` for every field type;
/// "empty" is never a conversion failure.
pub fn convert(field_type: FieldType, raw: Option<&str>) -> Result<Option<Value>, ConvertError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let fail = || ConvertError::Unparseable {
        raw: trimmed.to_string(),
        field_type,
    };

    let value = match field_type {
        FieldType::String => Value::String(trimmed.to_string()),
        FieldType::Int => {
            let parsed: i64 = trimmed.parse().map_err(|_| fail())?;
            Value::Integer(parsed)
        }
        FieldType::Decimal => {
            let parsed: Decimal = trimmed.parse().map_err(|_| fail())?;
            Value::Decimal(parsed)
        }
        FieldType::Bool => {
            let parsed = parse_bool(trimmed).ok_or_else(fail)?;
            Value::Boolean(parsed)
        }
        FieldType::DateTime => {
            let parsed = parse_naive_datetime(trimmed).ok_or_else(fail)?;
            Value::DateTime(parsed)
        }
    };
    Ok(Some(value))
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Invariant-culture style date/time parse: month-before-day for slashed
/// dates, date-only input resolves to midnight.
pub fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%m/%d/%Y %H:%M",
    ];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(parsed);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    None
}
