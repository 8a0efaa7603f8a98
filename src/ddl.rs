//! Database table schema construction and `CREATE TABLE` generation.
//!
//! [`build_table_schema`] turns a profile's target fields into a column
//! list with generated names; [`SqlDialect`] renders that schema as DDL.
//! Only the SQL Server dialect ships today, but dialects are swappable
//! strategies behind the same contract.

use anyhow::{Result, ensure};

use crate::{
    naming,
    profile::{FieldType, ImportProfile},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    pub field_type: FieldType,
    pub max_length: Option<usize>,
    pub is_required: bool,
}

#[derive(Debug, Clone)]
pub struct TableSchema {
    pub table_name: String,
    pub schema_name: Option<String>,
    pub columns: Vec<TableColumn>,
}

impl TableSchema {
    /// `[schema].[table]` when a schema is set, else `[table]`.
    pub fn qualified_name(&self) -> String {
        match self.schema_name.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(&self.table_name)),
            None => quote_identifier(&self.table_name),
        }
    }
}

/// Derives the table schema for a profile. Column names are generated with
/// the profile's naming style; field type, max length, and required flag
/// carry over unchanged.
pub fn build_table_schema(profile: &ImportProfile) -> Result<TableSchema> {
    let table_name = profile.table_name.as_deref().map(str::trim).unwrap_or_default();
    ensure!(!table_name.is_empty(), "Profile table name is not set");

    let columns = profile
        .target_fields
        .iter()
        .map(|field| TableColumn {
            name: naming::column_name(&field.name, profile.column_name_style),
            field_type: field.field_type,
            max_length: field.max_length,
            is_required: field.is_required,
        })
        .collect();

    Ok(TableSchema {
        table_name: table_name.to_string(),
        schema_name: profile.table_schema.clone(),
        columns,
    })
}

/// Bracket-quotes a SQL Server identifier, doubling embedded `]`.
pub fn quote_identifier(identifier: &str) -> String {
    format!("[{}]", identifier.replace(']', "]]"))
}

pub trait SqlDialect {
    fn generate_create_table(&self, schema: &TableSchema) -> String;
}

/// Picks the dialect for a CLI token; SQL Server is the only one shipped
/// and the default.
pub fn dialect_for(name: &str) -> Box<dyn SqlDialect> {
    match name.to_ascii_lowercase().as_str() {
        "sqlserver" => Box::new(SqlServerDialect),
        _ => Box::new(SqlServerDialect),
    }
}

pub struct SqlServerDialect;

impl SqlDialect for SqlServerDialect {
    fn generate_create_table(&self, schema: &TableSchema) -> String {
        let mut sql = format!("CREATE TABLE {} (\n", schema.qualified_name());
        let last = schema.columns.len().saturating_sub(1);
        for (idx, column) in schema.columns.iter().enumerate() {
            let null_clause = if column.is_required { "NOT NULL" } else { "NULL" };
            let separator = if idx < last { "," } else { "" };
            sql.push_str(&format!(
                "    {} {} {}{}\n",
                quote_identifier(&column.name),
                sql_type(column),
                null_clause,
                separator
            ));
        }
        sql.push_str(");\n");
        sql
    }
}

fn sql_type(column: &TableColumn) -> String {
    match column.field_type {
        FieldType::String => format!("VARCHAR({})", column.max_length.unwrap_or(255)),
        FieldType::Int => "INT".to_string(),
        FieldType::Decimal => "DECIMAL(18, 2)".to_string(),
        FieldType::Bool => "BIT".to_string(),
        FieldType::DateTime => "DATETIME2".to_string(),
    }
}
