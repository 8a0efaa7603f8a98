use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{profile::NameStyle, writer::WriteMode};

#[derive(Debug, Parser)]
#[command(author, version, about = "Map, validate, and load tabular files into SQL Server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import a CSV/TSV/XLSX file: map columns, validate rows, emit JSON,
    /// and optionally load the valid rows into a database table
    Import(ImportArgs),
    /// Generate a CREATE TABLE script from a profile or an inferred file schema
    Schema(SchemaArgs),
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Input file to import (.csv, .tsv, .xlsx)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination for the validated-row JSON (defaults to <input>.out.json)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Import profile JSON declaring target fields, aliases, and keys
    #[arg(short = 'p', long = "profile")]
    pub profile: Option<PathBuf>,
    /// Target table name, optionally schema-qualified (overrides the profile)
    #[arg(long = "table")]
    pub table: Option<String>,
    /// Database schema to write into (overrides profile and config)
    #[arg(long = "db-schema")]
    pub db_schema: Option<String>,
    /// Naming style for generated column names
    #[arg(long = "column-style")]
    pub column_style: Option<NameStyle>,
    /// Rows to sample when inferring a schema without a profile (0 means full scan)
    #[arg(long = "sample-rows", default_value_t = 1000)]
    pub sample_rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Write valid rows to the database
    #[arg(long = "write-db")]
    pub write_db: bool,
    /// Write strategy for database loads
    #[arg(long = "write-mode", value_enum, default_value_t = WriteMode::Insert)]
    pub write_mode: WriteMode,
    /// Key fields for upsert matching (comma-separated, overrides the profile)
    #[arg(long = "key-fields", value_delimiter = ',')]
    pub key_fields: Vec<String>,
    /// ADO-style connection string (overrides profile and config)
    #[arg(long = "connection-string")]
    pub connection_string: Option<String>,
    /// Create the target table before writing when it does not exist
    #[arg(long = "ensure-table")]
    pub ensure_table: bool,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Input file to infer target fields from when the profile has none
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// Import profile JSON declaring target fields
    #[arg(short = 'p', long = "profile")]
    pub profile: Option<PathBuf>,
    /// Destination .sql file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// SQL dialect for the generated script
    #[arg(long, default_value = "sqlserver")]
    pub dialect: String,
    /// Target table name, optionally schema-qualified (overrides the profile)
    #[arg(long = "table")]
    pub table: Option<String>,
    /// Naming style for generated column names
    #[arg(long = "column-style")]
    pub column_style: Option<NameStyle>,
    /// Rows to sample when inferring types (0 means full scan)
    #[arg(long = "sample-rows", default_value_t = 1000)]
    pub sample_rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
