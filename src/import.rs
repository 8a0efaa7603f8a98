//! Import orchestration: profile resolution, schema inference fallback,
//! column mapping, row validation, JSON output, and the optional database
//! write phase.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, ensure};
use log::{info, warn};

use crate::{
    cli::ImportArgs,
    config::{self, AppConfig},
    data::Value,
    db::{self, MssqlExecutor},
    ddl, infer, io_utils,
    mapping::{self, ColumnMapping},
    profile::ImportProfile,
    rows::{self, RowResult},
    source,
    writer::DataWriter,
};

/// Invalid rows echoed into the log before the report truncates.
const INVALID_ROW_SAMPLE: usize = 5;

pub fn execute(args: &ImportArgs) -> Result<()> {
    let config = AppConfig::load();
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let mut profile = resolve_profile(args, &config)?;

    if profile.target_fields.is_empty() {
        let mut sample_reader = source::open_source(&args.input, args.delimiter, encoding)?;
        let inferred = infer::infer_from_source(sample_reader.as_mut(), args.sample_rows)?;
        ensure!(
            !inferred.is_empty(),
            "Unable to infer schema from {:?}. Provide a profile or ensure the file has headers.",
            args.input
        );
        info!(
            "Inferred {} target field(s) from {:?}",
            inferred.len(),
            args.input
        );
        profile.target_fields = inferred;
    }

    let settings = config::resolve_connection(
        args.connection_string.as_deref(),
        args.db_schema.as_deref(),
        &profile,
        &config,
    );
    if profile.table_schema.is_none() {
        profile.table_schema = Some(settings.schema.clone());
    }
    // The profile is final from here on.
    let profile = profile;

    if args.ensure_table {
        let connection_string = settings.connection_string.as_deref().ok_or_else(|| {
            anyhow!(
                "No connection string found. Provide --connection-string, set the profile's tableConnectionString, or configure {}.",
                config::CONFIG_FILE_NAME
            )
        })?;
        let schema = ddl::build_table_schema(&profile)?;
        let mut executor = MssqlExecutor::connect(connection_string)?;
        db::ensure_table(&mut executor, &schema)?;
    }

    let mut reader = source::open_source(&args.input, args.delimiter, encoding)?;
    let columns = mapping::source_columns(reader.headers());
    let mappings = mapping::generate_mappings(&profile, &columns);
    log_mappings(&profile, &mappings);

    info!("Processing rows from {:?}", args.input);
    let results = rows::scan_rows(&profile, &mappings, reader.as_mut(), None)?;

    let (valid, invalid): (Vec<&RowResult>, Vec<&RowResult>) =
        results.iter().partition(|r| r.is_valid());

    info!("Total rows:   {}", results.len());
    info!("Valid rows:   {}", valid.len());
    info!("Invalid rows: {}", invalid.len());
    if !invalid.is_empty() {
        warn!(
            "Sample errors (up to first {INVALID_ROW_SAMPLE} rows with issues):"
        );
        for row in invalid.iter().take(INVALID_ROW_SAMPLE) {
            warn!("  Row {}:", row.row_number);
            for error in &row.errors {
                warn!("    - {error}");
            }
        }
    }

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));
    write_records(&profile, &valid, &output_path)?;
    info!("Wrote {} valid row(s) to {:?}", valid.len(), output_path);

    if args.write_db {
        let connection_string = settings.connection_string.as_deref().ok_or_else(|| {
            anyhow!(
                "No connection string found. Provide --connection-string, set the profile's tableConnectionString, or configure {}.",
                config::CONFIG_FILE_NAME
            )
        })?;

        let key_fields = resolve_key_fields(&args.key_fields, &profile);
        info!(
            "Writing {} row(s) to SQL Server using mode {:?}...",
            valid.len(),
            args.write_mode
        );

        let writer = DataWriter::new(
            profile.clone(),
            args.write_mode,
            &key_fields,
            Some(&settings.schema),
        )?;
        let mut executor = MssqlExecutor::connect(connection_string)?;
        let owned: Vec<RowResult> = valid.iter().map(|r| (*r).clone()).collect();
        writer.write_rows(&mut executor, &owned)?;
        info!("Database write completed.");
    }

    Ok(())
}

/// Folds CLI flags and config defaults into the loaded (or blank) profile.
/// All mutation happens here, before any row is processed.
fn resolve_profile(args: &ImportArgs, config: &AppConfig) -> Result<ImportProfile> {
    let has_profile = args.profile.is_some();
    let mut profile = match &args.profile {
        Some(path) => ImportProfile::load(path)?,
        None => ImportProfile::default(),
    };

    let table_is_blank = profile
        .table_name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .is_empty();
    if let Some(table) = &args.table {
        profile.table_name = Some(table.clone());
    } else if !has_profile && table_is_blank {
        profile.table_name = derive_table_name(&args.input);
    }

    if profile.name.trim().is_empty() {
        profile.name = profile
            .table_name
            .clone()
            .or_else(|| derive_table_name(&args.input))
            .unwrap_or_else(|| "tabload import".to_string());
    }

    if let Some(style) = args.column_style {
        profile.column_name_style = style;
    } else if !has_profile {
        profile.column_name_style = config.defaults.column_name_style;
    }

    if profile.table_schema.is_none()
        && let Some(schema) = &args.db_schema
    {
        profile.table_schema = Some(schema.clone());
    }

    Ok(profile)
}

/// Key fields from the CLI override the profile's; trimmed and deduped
/// case-insensitively, in first-seen order.
fn resolve_key_fields(cli_keys: &[String], profile: &ImportProfile) -> Vec<String> {
    let source = if cli_keys.is_empty() {
        &profile.key_fields
    } else {
        cli_keys
    };
    let mut resolved: Vec<String> = Vec::new();
    for key in source {
        let trimmed = key.trim();
        if trimmed.is_empty() || resolved.iter().any(|k| k.eq_ignore_ascii_case(trimmed)) {
            continue;
        }
        resolved.push(trimmed.to_string());
    }
    resolved
}

pub(crate) fn derive_table_name(input: &Path) -> Option<String> {
    input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.trim().to_string())
        .filter(|stem| !stem.is_empty())
}

fn default_output_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(".out.json");
    PathBuf::from(name)
}

fn log_mappings(profile: &ImportProfile, mappings: &[ColumnMapping]) {
    info!("Column mappings:");
    for mapping in mappings {
        let field = &profile.target_fields[mapping.field_index];
        let source = match &mapping.source {
            Some(column) => format!("{} (index {})", column.header, column.index),
            None => "<UNMAPPED>".to_string(),
        };
        let auto = if mapping.auto_mapped { "auto" } else { "none" };
        info!("  {:<20} -> {:<30} [{auto}]", field.name, source);
    }
}

/// Serializes the valid rows as a JSON array of field-name -> typed-value
/// objects, fields in declared order.
fn write_records(profile: &ImportProfile, valid: &[&RowResult], output: &Path) -> Result<()> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating output directory {parent:?}"))?;
    }

    let payload: Vec<serde_json::Value> =
        valid.iter().map(|row| record_json(profile, row)).collect();
    let rendered = serde_json::to_string_pretty(&payload).context("Serializing records")?;
    fs::write(output, rendered).with_context(|| format!("Writing output file {output:?}"))?;
    Ok(())
}

fn record_json(profile: &ImportProfile, row: &RowResult) -> serde_json::Value {
    let mut record = serde_json::Map::with_capacity(profile.target_fields.len());
    for field in &profile.target_fields {
        let value = row
            .value(&field.name)
            .map(Value::to_json)
            .unwrap_or(serde_json::Value::Null);
        record.insert(field.name.clone(), value);
    }
    serde_json::Value::Object(record)
}
