//! Source readers: the boundary between physical files and the import core.
//!
//! A [`SourceReader`] reports an ordered header row, advances row by row,
//! and hands back the text of a cell by column index (`None` for blank or
//! absent cells). The core is agnostic to whether rows come from delimited
//! text or spreadsheet cells; [`open_source`] dispatches on file extension.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use calamine::{DataType, Reader as CalamineReader, Xlsx, open_workbook};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use encoding_rs::Encoding;

use crate::io_utils;

pub trait SourceReader: std::fmt::Debug {
    /// Ordered header strings, as they appear in the file.
    fn headers(&self) -> &[String];
    /// Advances to the next data row; `false` when the file is exhausted.
    fn next_row(&mut self) -> Result<bool>;
    /// Text of the cell at `index` in the current row, `None` when blank
    /// or absent.
    fn field(&self, index: usize) -> Result<Option<String>>;
}

/// Opens the reader matching the file extension (`.csv`/`.tsv`/`.xlsx`).
pub fn open_source(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<Box<dyn SourceReader>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "csv" | "tsv" | "txt" => {
            let resolved = io_utils::resolve_input_delimiter(path, delimiter);
            Ok(Box::new(CsvSource::open(path, resolved, encoding)?))
        }
        "xlsx" => Ok(Box::new(ExcelSource::open(path)?)),
        other => bail!("File type '.{other}' is not supported. Supported types: .csv, .tsv, .xlsx"),
    }
}

/// Streaming CSV reader with encoding-aware cell decoding.
#[derive(Debug)]
pub struct CsvSource {
    reader: csv::Reader<BufReader<File>>,
    headers: Vec<String>,
    current: csv::ByteRecord,
    encoding: &'static Encoding,
}

impl CsvSource {
    pub fn open(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Self> {
        let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        let header_record = reader
            .byte_headers()
            .with_context(|| format!("Reading header row from {path:?}"))?
            .clone();
        let headers = io_utils::decode_record(&header_record, encoding)?;
        if headers.is_empty() {
            bail!("Input file {path:?} appears to be empty");
        }
        Ok(Self {
            reader,
            headers,
            current: csv::ByteRecord::new(),
            encoding,
        })
    }
}

impl SourceReader for CsvSource {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn next_row(&mut self) -> Result<bool> {
        self.reader
            .read_byte_record(&mut self.current)
            .context("Reading CSV record")
    }

    fn field(&self, index: usize) -> Result<Option<String>> {
        match self.current.get(index) {
            None => Ok(None),
            Some(bytes) if bytes.is_empty() => Ok(None),
            Some(bytes) => io_utils::decode_bytes(bytes, self.encoding).map(Some),
        }
    }
}

/// Spreadsheet reader over the first worksheet of an `.xlsx` workbook.
/// calamine materializes the used range, so rows are served from memory.
#[derive(Debug)]
pub struct ExcelSource {
    headers: Vec<String>,
    rows: Vec<Vec<DataType>>,
    /// Row cursor; `None` before the first `next_row` call.
    cursor: Option<usize>,
}

impl ExcelSource {
    pub fn open(path: &Path) -> Result<Self> {
        let mut workbook: Xlsx<_> =
            open_workbook(path).with_context(|| format!("Opening workbook {path:?}"))?;
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("Workbook {path:?} has no sheets"))?;
        let range = workbook
            .worksheet_range(&sheet_name)
            .with_context(|| format!("Reading worksheet '{sheet_name}'"))?;

        let mut rows = range.rows();
        let header_row = rows
            .next()
            .ok_or_else(|| anyhow!("Worksheet '{sheet_name}' is empty"))?;
        let headers = header_row
            .iter()
            .map(|cell| render_cell(cell).map(|v| v.unwrap_or_default()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            headers,
            rows: rows.map(|r| r.to_vec()).collect(),
            cursor: None,
        })
    }
}

impl SourceReader for ExcelSource {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn next_row(&mut self) -> Result<bool> {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next < self.rows.len() {
            self.cursor = Some(next);
            Ok(true)
        } else {
            self.cursor = Some(self.rows.len());
            Ok(false)
        }
    }

    fn field(&self, index: usize) -> Result<Option<String>> {
        let Some(cursor) = self.cursor.filter(|c| *c < self.rows.len()) else {
            return Ok(None);
        };
        match self.rows[cursor].get(index) {
            None => Ok(None),
            Some(cell) => render_cell(cell),
        }
    }
}

/// Renders a spreadsheet cell as text the converter can re-parse. Integral
/// floats print without a trailing `.0` so numeric columns stay numeric.
fn render_cell(cell: &DataType) -> Result<Option<String>> {
    let text = match cell {
        DataType::Empty => return Ok(None),
        DataType::String(s) => s.clone(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        DataType::Bool(b) => b.to_string(),
        DataType::DateTime(serial) => match excel_serial_to_datetime(*serial) {
            Some(parsed) if serial.fract() > 0.0 => {
                parsed.format("%Y-%m-%d %H:%M:%S").to_string()
            }
            Some(parsed) => parsed.format("%Y-%m-%d").to_string(),
            None => serial.to_string(),
        },
        DataType::Duration(d) => d.to_string(),
        DataType::DateTimeIso(s) => s.clone(),
        DataType::DurationIso(s) => s.clone(),
        DataType::Error(err) => bail!("cell error: {err:?}"),
    };
    if text.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(text))
    }
}

/// Converts an Excel serial date to a naive datetime. Excel's epoch is
/// 1899-12-30 once the fictitious 1900 leap day is accounted for.
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = epoch.checked_add_signed(Duration::days(serial.trunc() as i64))?;
    let total_seconds = (serial.fract() * 86_400.0).round() as i64;
    let time = NaiveTime::from_hms_opt(
        ((total_seconds / 3600) % 24) as u32,
        ((total_seconds / 60) % 60) as u32,
        (total_seconds % 60) as u32,
    )?;
    Some(NaiveDateTime::new(date, time))
}
