//! Import profile model and JSON persistence.
//!
//! An [`ImportProfile`] declares the target shape of an import: the ordered
//! [`TargetField`] list, header aliases, key fields for upsert matching, and
//! the table/schema/naming settings used when the data reaches a database.
//! Profiles are deserialized once (camelCase JSON) and treated as read-only
//! for the remainder of a run; CLI and config defaults are folded in by the
//! import orchestration before any row is processed.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Declared data type of a target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(alias = "string")]
    String,
    #[serde(alias = "int", alias = "integer", alias = "Integer")]
    Int,
    #[serde(alias = "decimal", alias = "number")]
    Decimal,
    #[serde(alias = "bool", alias = "boolean", alias = "Boolean")]
    Bool,
    #[serde(alias = "datetime", alias = "dateTime", alias = "date-time")]
    DateTime,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "String",
            FieldType::Int => "Int",
            FieldType::Decimal => "Decimal",
            FieldType::Bool => "Bool",
            FieldType::DateTime => "DateTime",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Naming style applied when deriving database column names from field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum NameStyle {
    #[serde(alias = "asis", alias = "as-is", alias = "as_is")]
    AsIs,
    #[serde(alias = "camelCase", alias = "camel-case", alias = "camelcase")]
    CamelCase,
    #[serde(alias = "pascalCase", alias = "pascal-case", alias = "pascalcase")]
    PascalCase,
    #[serde(alias = "snakeCase", alias = "snake-case", alias = "snake_case", alias = "snakecase")]
    SnakeCase,
    #[serde(alias = "kebabCase", alias = "kebab-case", alias = "kebabcase")]
    KebabCase,
    #[serde(alias = "titleWithSpaces", alias = "title-with-spaces", alias = "titlewithspaces")]
    TitleWithSpaces,
}

/// One declared output column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetField {
    pub name: String,
    pub field_type: FieldType,
    pub is_required: bool,
    /// Meaningful only for `String` fields.
    pub max_length: Option<usize>,
}

impl Default for TargetField {
    fn default() -> Self {
        TargetField {
            name: String::new(),
            field_type: FieldType::String,
            is_required: false,
            max_length: None,
        }
    }
}

/// Alternate header text recognized as referring to a target field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnAlias {
    pub target_field_name: String,
    pub alias: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportProfile {
    pub name: String,
    pub target_fields: Vec<TargetField>,
    pub aliases: Vec<ColumnAlias>,
    pub key_fields: Vec<String>,
    pub strict_required_fields: bool,
    /// Optionally schema-qualified via a `.` separator, e.g. `dbo.Tickets`.
    pub table_name: Option<String>,
    pub table_schema: Option<String>,
    pub column_name_style: NameStyle,
    pub table_connection_string: Option<String>,
}

impl Default for ImportProfile {
    fn default() -> Self {
        ImportProfile {
            name: String::new(),
            target_fields: Vec::new(),
            aliases: Vec::new(),
            key_fields: Vec::new(),
            strict_required_fields: true,
            table_name: None,
            table_schema: None,
            column_name_style: NameStyle::SnakeCase,
            table_connection_string: None,
        }
    }
}

impl ImportProfile {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening profile file {path:?}"))?;
        let reader = BufReader::new(file);
        let profile: ImportProfile =
            serde_json::from_reader(reader).context("Parsing profile JSON")?;
        Ok(profile)
    }

    /// Alias texts registered against `field_name`, deduped case-insensitively,
    /// in declaration order.
    pub fn aliases_for(&self, field_name: &str) -> Vec<&str> {
        let mut seen: Vec<String> = Vec::new();
        let mut result = Vec::new();
        for alias in &self.aliases {
            if !alias.target_field_name.eq_ignore_ascii_case(field_name) {
                continue;
            }
            let lowered = alias.alias.to_lowercase();
            if seen.contains(&lowered) {
                continue;
            }
            seen.push(lowered);
            result.push(alias.alias.as_str());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_json_round_trips_camel_case_fields() {
        let json = r#"{
            "name": "Tickets",
            "targetFields": [
                { "name": "TicketId", "fieldType": "String", "isRequired": true, "maxLength": 50 },
                { "name": "Quantity", "fieldType": "Int", "isRequired": false }
            ],
            "aliases": [ { "targetFieldName": "TicketId", "alias": "Ticket #" } ],
            "keyFields": ["TicketId"],
            "tableName": "dbo.Tickets",
            "columnNameStyle": "SnakeCase"
        }"#;
        let profile: ImportProfile = serde_json::from_str(json).expect("parse profile");
        assert_eq!(profile.name, "Tickets");
        assert_eq!(profile.target_fields.len(), 2);
        assert_eq!(profile.target_fields[0].field_type, FieldType::String);
        assert_eq!(profile.target_fields[0].max_length, Some(50));
        assert_eq!(profile.target_fields[1].field_type, FieldType::Int);
        assert!(profile.target_fields[1].max_length.is_none());
        assert_eq!(profile.key_fields, vec!["TicketId"]);
        assert_eq!(profile.column_name_style, NameStyle::SnakeCase);
        // Defaults kick in for fields the JSON omits.
        assert!(profile.strict_required_fields);
        assert!(profile.table_schema.is_none());
    }

    #[test]
    fn field_type_accepts_lowercase_tokens() {
        let field: TargetField =
            serde_json::from_str(r#"{ "name": "n", "fieldType": "datetime" }"#).expect("parse");
        assert_eq!(field.field_type, FieldType::DateTime);
    }

    #[test]
    fn aliases_for_dedupes_case_insensitively() {
        let profile = ImportProfile {
            aliases: vec![
                ColumnAlias {
                    target_field_name: "TicketId".into(),
                    alias: "Ticket #".into(),
                },
                ColumnAlias {
                    target_field_name: "ticketid".into(),
                    alias: "TICKET #".into(),
                },
                ColumnAlias {
                    target_field_name: "TicketId".into(),
                    alias: "Ticket No".into(),
                },
                ColumnAlias {
                    target_field_name: "Other".into(),
                    alias: "Unrelated".into(),
                },
            ],
            ..ImportProfile::default()
        };
        assert_eq!(profile.aliases_for("TicketId"), vec!["Ticket #", "Ticket No"]);
    }
}
