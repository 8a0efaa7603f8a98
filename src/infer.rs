//! Schema inference: profiles a bounded sample of rows to suggest target
//! fields, and bucketizes observed string lengths into stable column widths.

use anyhow::Result;

use crate::{
    data::{parse_bool, parse_naive_datetime},
    profile::{FieldType, TargetField},
    source::SourceReader,
};

/// Ascending column-width buckets for inferred string fields.
pub const STRING_LENGTH_BUCKETS: &[usize] = &[50, 100, 255, 500, 1000, 2000, 3000, 4000];

/// Rounds an observed maximum string length up to the nearest bucket.
/// Zero returns the smallest bucket; anything beyond the table is clamped
/// to the largest bucket.
pub fn suggested_length(max_observed: usize) -> usize {
    if max_observed == 0 {
        return STRING_LENGTH_BUCKETS[0];
    }
    for bucket in STRING_LENGTH_BUCKETS {
        if max_observed <= *bucket {
            return *bucket;
        }
    }
    STRING_LENGTH_BUCKETS[STRING_LENGTH_BUCKETS.len() - 1]
}

/// Per-column profiling state. Each type flag starts `true` and is cleared
/// by the first non-blank counterexample, independently of the others.
#[derive(Debug, Clone)]
struct ColumnProfiler {
    name: String,
    saw_non_empty: bool,
    saw_empty: bool,
    all_ints: bool,
    all_decimals: bool,
    all_bools: bool,
    all_datetimes: bool,
    max_string_length: usize,
}

impl ColumnProfiler {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            saw_non_empty: false,
            saw_empty: false,
            all_ints: true,
            all_decimals: true,
            all_bools: true,
            all_datetimes: true,
            max_string_length: 0,
        }
    }

    fn observe(&mut self, raw: Option<&str>) {
        let trimmed = raw.map(str::trim).unwrap_or_default();
        if trimmed.is_empty() {
            self.saw_empty = true;
            return;
        }
        self.saw_non_empty = true;
        self.max_string_length = self.max_string_length.max(trimmed.chars().count());

        if self.all_ints && trimmed.parse::<i64>().is_err() {
            self.all_ints = false;
        }
        if self.all_decimals && trimmed.parse::<rust_decimal::Decimal>().is_err() {
            self.all_decimals = false;
        }
        if self.all_bools && parse_bool(trimmed).is_none() {
            self.all_bools = false;
        }
        if self.all_datetimes && parse_naive_datetime(trimmed).is_none() {
            self.all_datetimes = false;
        }
    }

    fn decide(&self) -> FieldType {
        if !self.saw_non_empty {
            return FieldType::String;
        }
        if self.all_ints {
            FieldType::Int
        } else if self.all_decimals {
            FieldType::Decimal
        } else if self.all_bools {
            FieldType::Bool
        } else if self.all_datetimes {
            FieldType::DateTime
        } else {
            FieldType::String
        }
    }

    fn into_target_field(self) -> TargetField {
        let field_type = self.decide();
        // Required means the sample never showed a blank, not a guarantee
        // over the full file.
        let is_required = self.saw_non_empty && !self.saw_empty;
        let max_length = match field_type {
            FieldType::String => Some(suggested_length(self.max_string_length)),
            _ => None,
        };
        TargetField {
            name: self.name,
            field_type,
            is_required,
            max_length,
        }
    }
}

/// Infers one [`TargetField`] per header, in header order, by scanning up to
/// `sample_limit` rows (0 means no cap). Rows shorter than the header list
/// count as blanks for the missing columns.
pub fn infer_target_fields<I, R>(headers: &[String], rows: I, sample_limit: usize) -> Vec<TargetField>
where
    I: IntoIterator<Item = R>,
    R: AsRef<[Option<String>]>,
{
    let mut profilers: Vec<ColumnProfiler> =
        headers.iter().map(|h| ColumnProfiler::new(h)).collect();

    for (processed, row) in rows.into_iter().enumerate() {
        if sample_limit > 0 && processed >= sample_limit {
            break;
        }
        let row = row.as_ref();
        for (idx, profiler) in profilers.iter_mut().enumerate() {
            let value = row.get(idx).and_then(|v| v.as_deref());
            profiler.observe(value);
        }
    }

    profilers
        .into_iter()
        .map(ColumnProfiler::into_target_field)
        .collect()
}

/// Drains up to `sample_limit` rows from `reader` and infers target fields
/// from them. The reader is consumed; callers reopen the source for the
/// actual import pass.
pub fn infer_from_source(
    reader: &mut dyn SourceReader,
    sample_limit: usize,
) -> Result<Vec<TargetField>> {
    let headers = reader.headers().to_vec();
    let mut samples: Vec<Vec<Option<String>>> = Vec::new();
    while reader.next_row()? {
        let mut row = Vec::with_capacity(headers.len());
        for idx in 0..headers.len() {
            row.push(reader.field(idx)?);
        }
        samples.push(row);
        if sample_limit > 0 && samples.len() >= sample_limit {
            break;
        }
    }
    Ok(infer_target_fields(&headers, samples, sample_limit))
}
