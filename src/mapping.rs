//! Column mapping: binds each declared target field to at most one source
//! column, by exact header match first and registered aliases second.

use crate::profile::ImportProfile;

/// A header/position pair reported by the file reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceColumn {
    pub header: String,
    /// Zero-based column index in the source file.
    pub index: usize,
}

/// The resolved pairing for one target field. `source` is `None` when the
/// field could not be matched to any column.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    /// Index into the profile's `target_fields`.
    pub field_index: usize,
    pub source: Option<SourceColumn>,
    pub auto_mapped: bool,
}

/// Builds source columns from a header row.
pub fn source_columns(headers: &[String]) -> Vec<SourceColumn> {
    headers
        .iter()
        .enumerate()
        .map(|(index, header)| SourceColumn {
            header: header.clone(),
            index,
        })
        .collect()
}

/// Produces exactly one mapping per target field, in declared field order.
///
/// Matching is case-insensitive: an exact header match wins, otherwise the
/// first source column (in file order) whose header matches any alias
/// registered for the field. No uniqueness is enforced across fields; two
/// target fields may bind to the same source column.
pub fn generate_mappings(
    profile: &ImportProfile,
    source_columns: &[SourceColumn],
) -> Vec<ColumnMapping> {
    let mut mappings = Vec::with_capacity(profile.target_fields.len());

    for (field_index, field) in profile.target_fields.iter().enumerate() {
        let exact = source_columns
            .iter()
            .find(|c| c.header.eq_ignore_ascii_case(&field.name));

        if let Some(column) = exact {
            mappings.push(ColumnMapping {
                field_index,
                source: Some(column.clone()),
                auto_mapped: true,
            });
            continue;
        }

        let aliases = profile.aliases_for(&field.name);
        let alias_match = source_columns.iter().find(|c| {
            aliases
                .iter()
                .any(|alias| c.header.eq_ignore_ascii_case(alias))
        });

        mappings.push(ColumnMapping {
            field_index,
            source: alias_match.cloned(),
            auto_mapped: alias_match.is_some(),
        });
    }

    mappings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ColumnAlias, FieldType, TargetField};

    fn field(name: &str) -> TargetField {
        TargetField {
            name: name.to_string(),
            field_type: FieldType::String,
            is_required: true,
            max_length: None,
        }
    }

    fn columns(headers: &[&str]) -> Vec<SourceColumn> {
        source_columns(&headers.iter().map(|h| h.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn exact_header_match_wins() {
        let profile = ImportProfile {
            target_fields: vec![field("TicketId")],
            ..ImportProfile::default()
        };
        let mappings = generate_mappings(&profile, &columns(&["ticketid"]));

        assert_eq!(mappings.len(), 1);
        let source = mappings[0].source.as_ref().expect("mapped");
        assert_eq!(source.header, "ticketid");
        assert_eq!(source.index, 0);
        assert!(mappings[0].auto_mapped);
    }

    #[test]
    fn alias_match_used_when_exact_missing() {
        let profile = ImportProfile {
            target_fields: vec![field("TicketId")],
            aliases: vec![ColumnAlias {
                target_field_name: "TicketId".into(),
                alias: "Ticket #".into(),
            }],
            ..ImportProfile::default()
        };
        let mappings = generate_mappings(&profile, &columns(&["Job", "Ticket #"]));

        let source = mappings[0].source.as_ref().expect("mapped via alias");
        assert_eq!(source.header, "Ticket #");
        assert_eq!(source.index, 1);
        assert!(mappings[0].auto_mapped);
    }

    #[test]
    fn one_mapping_per_field_even_when_unmapped() {
        let profile = ImportProfile {
            target_fields: vec![field("TicketId"), field("JobNumber")],
            ..ImportProfile::default()
        };
        let mappings = generate_mappings(&profile, &columns(&["TicketId"]));

        assert_eq!(mappings.len(), profile.target_fields.len());
        assert!(mappings[0].source.is_some());
        assert!(mappings[1].source.is_none());
        assert!(!mappings[1].auto_mapped);
    }

    #[test]
    fn first_source_column_wins_among_alias_candidates() {
        let profile = ImportProfile {
            target_fields: vec![field("TicketId")],
            aliases: vec![
                ColumnAlias {
                    target_field_name: "TicketId".into(),
                    alias: "Ticket No".into(),
                },
                ColumnAlias {
                    target_field_name: "TicketId".into(),
                    alias: "Ticket #".into(),
                },
            ],
            ..ImportProfile::default()
        };
        // "Ticket #" appears first in the file; source order decides.
        let mappings = generate_mappings(&profile, &columns(&["Ticket #", "Ticket No"]));
        assert_eq!(mappings[0].source.as_ref().map(|s| s.index), Some(0));
    }

    #[test]
    fn two_fields_may_share_one_source_column() {
        // Permissive on purpose: a single source column can feed two
        // derived fields, so no uniqueness check is performed.
        let profile = ImportProfile {
            target_fields: vec![field("TicketId"), field("TicketKey")],
            aliases: vec![ColumnAlias {
                target_field_name: "TicketKey".into(),
                alias: "TicketId".into(),
            }],
            ..ImportProfile::default()
        };
        let mappings = generate_mappings(&profile, &columns(&["TicketId"]));

        assert_eq!(mappings[0].source.as_ref().map(|s| s.index), Some(0));
        assert_eq!(mappings[1].source.as_ref().map(|s| s.index), Some(0));
        assert!(mappings[0].auto_mapped && mappings[1].auto_mapped);
    }
}
