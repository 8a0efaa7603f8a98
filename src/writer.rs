//! Database writer: precomputes parameterized INSERT/UPDATE/TRUNCATE
//! statements from a profile and drives them row by row.
//!
//! All configuration problems (no fields, missing table name, bad key
//! fields) surface at construction time, before any row is touched.
//! Statement execution goes through the [`SqlExecutor`] seam; the
//! update-then-insert upsert lives behind it so a backend with a native
//! atomic merge could be substituted without changing this contract.
//! Writes are not wrapped in a transaction: each statement commits on its
//! own, and an executor error aborts the remainder of the run with the
//! already-written rows left in place.

use anyhow::{Context, Result};
use itertools::Itertools;
use thiserror::Error;

use crate::{
    data::Value,
    ddl::quote_identifier,
    naming,
    profile::{FieldType, ImportProfile},
    rows::RowResult,
};

pub const DEFAULT_SCHEMA: &str = "dbo";

/// How validated rows reach the target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum WriteMode {
    /// Append rows to the table.
    Insert,
    /// Clear the table once, then append.
    TruncateInsert,
    /// Update rows matched by key fields, insert the rest.
    Upsert,
}

/// Construction-time configuration failure; aborts the run before any
/// row is written.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WriterConfigError {
    #[error("import profile does not define any target fields to write")]
    NoTargetFields,
    #[error("profile table name must be provided before writing")]
    MissingTableName,
    #[error("unable to derive a column name for target field '{0}'")]
    UnnameableColumn(String),
    #[error("upsert mode requires at least one key field")]
    UpsertWithoutKeys,
    #[error("key field(s) not found in profile: {0}")]
    UnknownKeyFields(String),
}

/// One positional statement parameter: the declared field type travels with
/// the value so executors can bind typed NULLs.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParam {
    pub field_type: FieldType,
    pub value: Option<Value>,
}

impl SqlParam {
    pub fn text(value: &str) -> Self {
        Self {
            field_type: FieldType::String,
            value: Some(Value::String(value.to_string())),
        }
    }
}

/// Executes parameterized statements against a database. Parameters are
/// positional (`@P1`..`@Pn`).
pub trait SqlExecutor {
    /// Runs a statement, returning the affected-row count.
    fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64>;
    /// Runs a scalar count query.
    fn query_count(&mut self, sql: &str, params: &[SqlParam]) -> Result<i64>;
}

#[derive(Debug, Clone)]
struct ColumnBinding {
    /// Index into the profile's `target_fields`.
    field_index: usize,
    column_name: String,
    is_key: bool,
}

#[derive(Debug)]
pub struct DataWriter {
    profile: ImportProfile,
    write_mode: WriteMode,
    columns: Vec<ColumnBinding>,
    qualified_table: String,
    insert_sql: String,
    update_sql: Option<String>,
    truncate_sql: String,
}

impl DataWriter {
    /// Validates the configuration and precomputes every statement.
    pub fn new(
        profile: ImportProfile,
        write_mode: WriteMode,
        key_field_names: &[String],
        schema_override: Option<&str>,
    ) -> Result<Self, WriterConfigError> {
        if profile.target_fields.is_empty() {
            return Err(WriterConfigError::NoTargetFields);
        }

        let (schema_name, table_name) = resolve_schema_and_table(&profile, schema_override)?;
        let qualified_table = format!(
            "{}.{}",
            quote_identifier(&schema_name),
            quote_identifier(&table_name)
        );

        let mut requested: Vec<&str> = Vec::new();
        for key in key_field_names {
            let trimmed = key.trim();
            if trimmed.is_empty() || requested.iter().any(|k| k.eq_ignore_ascii_case(trimmed)) {
                continue;
            }
            requested.push(trimmed);
        }

        let mut columns = Vec::with_capacity(profile.target_fields.len());
        for (field_index, field) in profile.target_fields.iter().enumerate() {
            let column_name = naming::column_name(&field.name, profile.column_name_style);
            if column_name.trim().is_empty() {
                return Err(WriterConfigError::UnnameableColumn(field.name.clone()));
            }
            let is_key = requested
                .iter()
                .any(|k| k.eq_ignore_ascii_case(&field.name));
            columns.push(ColumnBinding {
                field_index,
                column_name,
                is_key,
            });
        }

        let key_count = columns.iter().filter(|c| c.is_key).count();
        if write_mode == WriteMode::Upsert && key_count == 0 {
            return Err(WriterConfigError::UpsertWithoutKeys);
        }

        let missing: Vec<&str> = requested
            .iter()
            .filter(|requested_key| {
                !profile
                    .target_fields
                    .iter()
                    .any(|f| f.name.eq_ignore_ascii_case(requested_key))
            })
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(WriterConfigError::UnknownKeyFields(missing.join(", ")));
        }

        let insert_sql = build_insert_sql(&qualified_table, &columns);
        let update_sql = match write_mode {
            WriteMode::Upsert => build_update_sql(&qualified_table, &columns),
            _ => None,
        };
        let truncate_sql = format!("TRUNCATE TABLE {qualified_table};");

        Ok(Self {
            profile,
            write_mode,
            columns,
            qualified_table,
            insert_sql,
            update_sql,
            truncate_sql,
        })
    }

    pub fn qualified_table(&self) -> &str {
        &self.qualified_table
    }

    pub fn insert_sql(&self) -> &str {
        &self.insert_sql
    }

    pub fn update_sql(&self) -> Option<&str> {
        self.update_sql.as_deref()
    }

    pub fn truncate_sql(&self) -> &str {
        &self.truncate_sql
    }

    /// Writes `rows` with the configured mode. TruncateInsert clears the
    /// table exactly once, before the first row.
    pub fn write_rows(&self, executor: &mut dyn SqlExecutor, rows: &[RowResult]) -> Result<()> {
        if self.write_mode == WriteMode::TruncateInsert {
            executor
                .execute(&self.truncate_sql, &[])
                .with_context(|| format!("Truncating {}", self.qualified_table))?;
        }

        for row in rows {
            match self.write_mode {
                WriteMode::Insert | WriteMode::TruncateInsert => {
                    self.execute_insert(executor, row)?;
                }
                WriteMode::Upsert => {
                    if !self.try_execute_update(executor, row)? {
                        self.execute_insert(executor, row)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn execute_insert(&self, executor: &mut dyn SqlExecutor, row: &RowResult) -> Result<()> {
        let params: Vec<SqlParam> = self
            .columns
            .iter()
            .map(|column| self.bind(column, row))
            .collect();
        executor
            .execute(&self.insert_sql, &params)
            .with_context(|| format!("Inserting row {}", row.row_number))?;
        Ok(())
    }

    /// Runs the precomputed UPDATE; `false` when no row matched the key
    /// predicate (or the writer has nothing to update).
    fn try_execute_update(&self, executor: &mut dyn SqlExecutor, row: &RowResult) -> Result<bool> {
        let Some(update_sql) = self.update_sql.as_deref() else {
            return Ok(false);
        };

        // Set parameters first, then the key predicate, matching the
        // placeholder numbering in the statement.
        let params: Vec<SqlParam> = self
            .columns
            .iter()
            .filter(|c| !c.is_key)
            .chain(self.columns.iter().filter(|c| c.is_key))
            .map(|column| self.bind(column, row))
            .collect();

        let affected = executor
            .execute(update_sql, &params)
            .with_context(|| format!("Updating row {}", row.row_number))?;
        Ok(affected > 0)
    }

    fn bind(&self, column: &ColumnBinding, row: &RowResult) -> SqlParam {
        let field = &self.profile.target_fields[column.field_index];
        SqlParam {
            field_type: field.field_type,
            // A field with no entry is a NULL, never a write-time error.
            value: row.value(&field.name).cloned(),
        }
    }
}

fn build_insert_sql(qualified_table: &str, columns: &[ColumnBinding]) -> String {
    let column_list = columns
        .iter()
        .map(|c| quote_identifier(&c.column_name))
        .join(", ");
    let value_list = (1..=columns.len()).map(|i| format!("@P{i}")).join(", ");
    format!("INSERT INTO {qualified_table} ({column_list}) VALUES ({value_list});")
}

fn build_update_sql(qualified_table: &str, columns: &[ColumnBinding]) -> Option<String> {
    let non_key: Vec<&ColumnBinding> = columns.iter().filter(|c| !c.is_key).collect();
    let key: Vec<&ColumnBinding> = columns.iter().filter(|c| c.is_key).collect();
    if non_key.is_empty() || key.is_empty() {
        return None;
    }

    let set_list = non_key
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = @P{}", quote_identifier(&c.column_name), i + 1))
        .join(", ");
    let where_list = key
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "{} = @P{}",
                quote_identifier(&c.column_name),
                non_key.len() + i + 1
            )
        })
        .join(" AND ");

    Some(format!(
        "UPDATE {qualified_table} SET {set_list} WHERE {where_list};"
    ))
}

/// Splits an optionally dot-qualified table name and applies the schema
/// resolution precedence: explicit override, then the profile schema, then
/// the embedded qualifier, then `dbo`.
fn resolve_schema_and_table(
    profile: &ImportProfile,
    schema_override: Option<&str>,
) -> Result<(String, String), WriterConfigError> {
    let trimmed = profile.table_name.as_deref().map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(WriterConfigError::MissingTableName);
    }

    let (embedded_schema, table_name) = match trimmed.split_once('.') {
        Some((schema, table)) if !schema.trim().is_empty() && !table.trim().is_empty() => {
            (Some(schema.trim()), table.trim())
        }
        _ => (None, trimmed),
    };

    let schema = [schema_override, profile.table_schema.as_deref(), embedded_schema]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SCHEMA);

    Ok((schema.to_string(), table_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::TargetField;

    fn field(name: &str, field_type: FieldType) -> TargetField {
        TargetField {
            name: name.to_string(),
            field_type,
            is_required: false,
            max_length: None,
        }
    }

    fn ticket_profile() -> ImportProfile {
        ImportProfile {
            table_name: Some("Tickets".to_string()),
            target_fields: vec![
                field("TicketId", FieldType::String),
                field("Quantity", FieldType::Int),
                field("Active", FieldType::Bool),
            ],
            ..ImportProfile::default()
        }
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    /// Records every statement instead of talking to a database.
    struct RecordingExecutor {
        statements: Vec<(String, Vec<SqlParam>)>,
        update_affected: u64,
    }

    impl RecordingExecutor {
        fn new() -> Self {
            Self {
                statements: Vec::new(),
                update_affected: 0,
            }
        }
    }

    impl SqlExecutor for RecordingExecutor {
        fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64> {
            self.statements.push((sql.to_string(), params.to_vec()));
            if sql.starts_with("UPDATE") {
                Ok(self.update_affected)
            } else {
                Ok(1)
            }
        }

        fn query_count(&mut self, _sql: &str, _params: &[SqlParam]) -> Result<i64> {
            Ok(0)
        }
    }

    fn valid_row(row_number: usize, ticket: &str, quantity: i64) -> RowResult {
        let mut row = RowResult::new(row_number);
        row.values
            .insert("TicketId".into(), Some(Value::String(ticket.into())));
        row.values
            .insert("Quantity".into(), Some(Value::Integer(quantity)));
        row.values.insert("Active".into(), Some(Value::Boolean(true)));
        row
    }

    #[test]
    fn insert_mode_without_keys_constructs() {
        let writer = DataWriter::new(ticket_profile(), WriteMode::Insert, &[], None).expect("writer");
        assert_eq!(
            writer.insert_sql(),
            "INSERT INTO [dbo].[Tickets] ([ticket_id], [quantity], [active]) VALUES (@P1, @P2, @P3);"
        );
        assert_eq!(writer.update_sql(), None);
    }

    #[test]
    fn upsert_without_keys_is_a_config_error() {
        let err = DataWriter::new(ticket_profile(), WriteMode::Upsert, &[], None).unwrap_err();
        assert_eq!(err, WriterConfigError::UpsertWithoutKeys);
    }

    #[test]
    fn unknown_key_fields_are_named_in_the_error() {
        let err = DataWriter::new(
            ticket_profile(),
            WriteMode::Insert,
            &keys(&["TicketId", "Nope"]),
            None,
        )
        .unwrap_err();
        assert_eq!(err, WriterConfigError::UnknownKeyFields("Nope".to_string()));
    }

    #[test]
    fn empty_profile_is_a_config_error() {
        let profile = ImportProfile {
            table_name: Some("Tickets".to_string()),
            ..ImportProfile::default()
        };
        let err = DataWriter::new(profile, WriteMode::Insert, &[], None).unwrap_err();
        assert_eq!(err, WriterConfigError::NoTargetFields);
    }

    #[test]
    fn missing_table_name_is_a_config_error() {
        let profile = ImportProfile {
            table_name: None,
            target_fields: vec![field("A", FieldType::String)],
            ..ImportProfile::default()
        };
        let err = DataWriter::new(profile, WriteMode::Insert, &[], None).unwrap_err();
        assert_eq!(err, WriterConfigError::MissingTableName);
    }

    #[test]
    fn schema_resolution_prefers_override_then_profile_then_embedded() {
        let mut profile = ticket_profile();
        profile.table_name = Some("embedded.Tickets".to_string());
        profile.table_schema = Some("profile_schema".to_string());

        let writer =
            DataWriter::new(profile.clone(), WriteMode::Insert, &[], Some("override")).expect("writer");
        assert_eq!(writer.qualified_table(), "[override].[Tickets]");

        let writer = DataWriter::new(profile.clone(), WriteMode::Insert, &[], None).expect("writer");
        assert_eq!(writer.qualified_table(), "[profile_schema].[Tickets]");

        profile.table_schema = None;
        let writer = DataWriter::new(profile.clone(), WriteMode::Insert, &[], None).expect("writer");
        assert_eq!(writer.qualified_table(), "[embedded].[Tickets]");

        profile.table_name = Some("Tickets".to_string());
        let writer = DataWriter::new(profile, WriteMode::Insert, &[], None).expect("writer");
        assert_eq!(writer.qualified_table(), "[dbo].[Tickets]");
    }

    #[test]
    fn upsert_update_sets_non_keys_and_filters_on_keys() {
        let writer = DataWriter::new(
            ticket_profile(),
            WriteMode::Upsert,
            &keys(&["TicketId"]),
            None,
        )
        .expect("writer");
        assert_eq!(
            writer.update_sql(),
            Some(
                "UPDATE [dbo].[Tickets] SET [quantity] = @P1, [active] = @P2 WHERE [ticket_id] = @P3;"
            )
        );
    }

    #[test]
    fn insert_binds_every_column_in_declared_order() {
        let writer = DataWriter::new(ticket_profile(), WriteMode::Insert, &[], None).expect("writer");
        let mut executor = RecordingExecutor::new();
        writer
            .write_rows(&mut executor, &[valid_row(1, "T-1", 5)])
            .expect("write");

        assert_eq!(executor.statements.len(), 1);
        let (sql, params) = &executor.statements[0];
        assert!(sql.starts_with("INSERT INTO"));
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].value, Some(Value::String("T-1".into())));
        assert_eq!(params[1].value, Some(Value::Integer(5)));
        assert_eq!(params[2].value, Some(Value::Boolean(true)));
    }

    #[test]
    fn missing_field_entry_binds_a_typed_null() {
        let writer = DataWriter::new(ticket_profile(), WriteMode::Insert, &[], None).expect("writer");
        let mut executor = RecordingExecutor::new();
        // Row has no entry for Quantity or Active at all.
        let mut row = RowResult::new(1);
        row.values
            .insert("TicketId".into(), Some(Value::String("T-9".into())));
        writer.write_rows(&mut executor, &[row]).expect("write");

        let (_, params) = &executor.statements[0];
        assert_eq!(params[1], SqlParam { field_type: FieldType::Int, value: None });
        assert_eq!(params[2], SqlParam { field_type: FieldType::Bool, value: None });
    }

    #[test]
    fn truncate_insert_truncates_once_before_rows() {
        let writer =
            DataWriter::new(ticket_profile(), WriteMode::TruncateInsert, &[], None).expect("writer");
        let mut executor = RecordingExecutor::new();
        writer
            .write_rows(&mut executor, &[valid_row(1, "T-1", 1), valid_row(2, "T-2", 2)])
            .expect("write");

        let statements: Vec<&str> = executor
            .statements
            .iter()
            .map(|(sql, _)| sql.as_str())
            .collect();
        assert_eq!(statements[0], "TRUNCATE TABLE [dbo].[Tickets];");
        assert_eq!(statements.len(), 3);
        assert!(statements[1].starts_with("INSERT INTO"));
        assert!(statements[2].starts_with("INSERT INTO"));
    }

    #[test]
    fn upsert_falls_back_to_insert_when_update_matches_nothing() {
        let writer = DataWriter::new(
            ticket_profile(),
            WriteMode::Upsert,
            &keys(&["TicketId"]),
            None,
        )
        .expect("writer");

        let mut executor = RecordingExecutor::new();
        executor.update_affected = 0;
        writer
            .write_rows(&mut executor, &[valid_row(1, "T-1", 5)])
            .expect("write");

        let statements: Vec<&str> = executor
            .statements
            .iter()
            .map(|(sql, _)| sql.as_str())
            .collect();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("UPDATE"));
        assert!(statements[1].starts_with("INSERT INTO"));

        // Update parameters carry set values first, then the key predicate.
        let (_, update_params) = &executor.statements[0];
        assert_eq!(update_params[0].value, Some(Value::Integer(5)));
        assert_eq!(update_params[1].value, Some(Value::Boolean(true)));
        assert_eq!(update_params[2].value, Some(Value::String("T-1".into())));
    }

    #[test]
    fn upsert_skips_insert_when_update_matches() {
        let writer = DataWriter::new(
            ticket_profile(),
            WriteMode::Upsert,
            &keys(&["TicketId"]),
            None,
        )
        .expect("writer");

        let mut executor = RecordingExecutor::new();
        executor.update_affected = 1;
        writer
            .write_rows(&mut executor, &[valid_row(1, "T-1", 5)])
            .expect("write");

        assert_eq!(executor.statements.len(), 1);
        assert!(executor.statements[0].0.starts_with("UPDATE"));
    }

    #[test]
    fn upsert_with_only_key_columns_inserts_directly() {
        let profile = ImportProfile {
            table_name: Some("Lookup".to_string()),
            target_fields: vec![field("Code", FieldType::String)],
            ..ImportProfile::default()
        };
        let writer =
            DataWriter::new(profile, WriteMode::Upsert, &keys(&["Code"]), None).expect("writer");
        assert_eq!(writer.update_sql(), None);

        let mut executor = RecordingExecutor::new();
        let mut row = RowResult::new(1);
        row.values
            .insert("Code".into(), Some(Value::String("A".into())));
        writer.write_rows(&mut executor, &[row]).expect("write");

        assert_eq!(executor.statements.len(), 1);
        assert!(executor.statements[0].0.starts_with("INSERT INTO"));
    }
}
