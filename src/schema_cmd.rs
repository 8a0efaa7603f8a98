//! The `schema` subcommand: renders a `CREATE TABLE` script from a profile,
//! inferring target fields from the input file when the profile has none.

use std::fs;

use anyhow::{Result, anyhow, bail, ensure};
use log::info;

use crate::{
    cli::SchemaArgs,
    config::AppConfig,
    ddl, import, infer, io_utils,
    profile::ImportProfile,
    source,
};

pub fn execute(args: &SchemaArgs) -> Result<()> {
    if args.profile.is_none() && args.input.is_none() {
        bail!("Provide --profile or --input to generate a schema");
    }

    let config = AppConfig::load();
    let mut profile = match &args.profile {
        Some(path) => ImportProfile::load(path)?,
        None => ImportProfile::default(),
    };
    apply_defaults(&mut profile, args, &config);

    if profile.target_fields.is_empty() {
        let input = args.input.as_deref().ok_or_else(|| {
            anyhow!("Unable to infer schema. Provide --input or ensure the profile defines target fields.")
        })?;
        let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
        let mut reader = source::open_source(input, args.delimiter, encoding)?;
        let inferred = infer::infer_from_source(reader.as_mut(), args.sample_rows)?;
        ensure!(
            !inferred.is_empty(),
            "Schema inference found no columns in {input:?}"
        );
        info!("Inferred {} field(s) from {input:?}", inferred.len());
        profile.target_fields = inferred;
    }

    let schema = ddl::build_table_schema(&profile)?;
    let dialect = ddl::dialect_for(&args.dialect);
    let sql = dialect.generate_create_table(&schema);

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &sql)?;
            info!("Wrote CREATE TABLE script to {path:?}");
        }
        None => print!("{sql}"),
    }

    Ok(())
}

fn apply_defaults(profile: &mut ImportProfile, args: &SchemaArgs, config: &AppConfig) {
    let has_profile = args.profile.is_some();

    let table_is_blank = profile
        .table_name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .is_empty();
    if let Some(table) = &args.table {
        profile.table_name = Some(table.clone());
    } else if table_is_blank
        && let Some(input) = &args.input
    {
        profile.table_name = import::derive_table_name(input);
    }

    if profile.name.trim().is_empty() {
        profile.name = profile
            .table_name
            .clone()
            .unwrap_or_else(|| "tabload schema".to_string());
    }

    if let Some(style) = args.column_style {
        profile.column_name_style = style;
    } else if !has_profile {
        profile.column_name_style = config.defaults.column_name_style;
    }
}
