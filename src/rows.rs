//! Row validation: drives column mappings and value conversion over each
//! physical data row, accumulating every applicable error per row.
//!
//! All fields are always processed; nothing short-circuits on the first
//! error, so one [`RowResult`] carries the complete error list for its row.
//! Errors here are row-local: a bad row is excluded from the valid set,
//! it never aborts the run.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};

use anyhow::Result;
use log::info;

use crate::{
    data::{Value, convert},
    mapping::ColumnMapping,
    profile::{FieldType, ImportProfile},
    source::SourceReader,
};

/// Outcome of validating one physical data row.
#[derive(Debug, Clone)]
pub struct RowResult {
    /// 1-based data row number, excluding the header row.
    pub row_number: usize,
    /// Target field name -> converted value.
    pub values: BTreeMap<String, Option<Value>>,
    /// Human-readable error messages for this row.
    pub errors: Vec<String>,
}

impl RowResult {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            values: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Converted value for `field_name`; an absent entry reads as null.
    pub fn value(&self, field_name: &str) -> Option<&Value> {
        self.values.get(field_name).and_then(|v| v.as_ref())
    }
}

/// Validates the current row of `reader` against the profile's mappings.
pub fn validate_row(
    profile: &ImportProfile,
    mappings: &[ColumnMapping],
    reader: &dyn SourceReader,
    row_number: usize,
) -> RowResult {
    let mut result = RowResult::new(row_number);

    for mapping in mappings {
        let field = &profile.target_fields[mapping.field_index];

        let Some(source) = &mapping.source else {
            if field.is_required && profile.strict_required_fields {
                result.errors.push(format!(
                    "Required field '{}' is not mapped to any source column.",
                    field.name
                ));
            }
            result.values.insert(field.name.clone(), None);
            continue;
        };

        let raw = match reader.field(source.index) {
            Ok(raw) => raw,
            Err(err) => {
                result.errors.push(format!(
                    "Error reading column '{}' (index {}): {err}",
                    source.header, source.index
                ));
                result.values.insert(field.name.clone(), None);
                continue;
            }
        };

        match convert(field.field_type, raw.as_deref()) {
            Err(err) => {
                result.errors.push(format!("Field '{}': {err}", field.name));
                result.values.insert(field.name.clone(), None);
            }
            Ok(converted) => {
                let is_blank = converted.as_ref().is_none_or(Value::is_blank);

                let mut stored = converted;
                if field.field_type == FieldType::String
                    && let Some(max) = field.max_length
                    && let Some(Value::String(s)) = &stored
                    && s.chars().count() > max
                {
                    let truncated: String = s.chars().take(max).collect();
                    result.errors.push(format!(
                        "Field '{}': string length {} exceeds max {}.",
                        field.name,
                        s.chars().count(),
                        max
                    ));
                    // Keep a usable value; the row is still marked invalid.
                    stored = Some(Value::String(truncated));
                }

                if field.is_required && profile.strict_required_fields && is_blank {
                    result
                        .errors
                        .push(format!("Required field '{}' is empty.", field.name));
                }

                result.values.insert(field.name.clone(), stored);
            }
        }
    }

    result
}

/// Walks `reader` sequentially, producing one [`RowResult`] per physical
/// data row. The optional cancellation flag is checked once per row and
/// takes effect between rows, never mid-row.
pub fn scan_rows(
    profile: &ImportProfile,
    mappings: &[ColumnMapping],
    reader: &mut dyn SourceReader,
    cancel: Option<&AtomicBool>,
) -> Result<Vec<RowResult>> {
    let mut results = Vec::new();
    let mut row_number = 0usize;

    while reader.next_row()? {
        if let Some(flag) = cancel
            && flag.load(Ordering::Relaxed)
        {
            info!("Cancellation requested; stopping after {row_number} row(s)");
            break;
        }
        row_number += 1;
        results.push(validate_row(profile, mappings, reader, row_number));
    }

    Ok(results)
}
