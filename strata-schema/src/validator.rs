//! Schema validation.

use std::collections::HashSet;

use crate::error::{SchemaError, SchemaResult};
use crate::table::Schema;

/// Validate a schema description.
///
/// Checks structural well-formedness only: name collisions, empty tables,
/// and key/index references to columns that do not exist. Semantic checks
/// against a live database are the migration engine's job.
pub fn validate_schema(schema: &Schema) -> SchemaResult<()> {
    let mut index_names: HashSet<&str> = HashSet::new();

    for table in schema.iter_tables() {
        if table.columns.is_empty() {
            return Err(SchemaError::EmptyTable(table.name.clone()));
        }

        let mut column_names: HashSet<&str> = HashSet::new();
        for column in &table.columns {
            if !column_names.insert(&column.name) {
                return Err(SchemaError::DuplicateColumn {
                    table: table.name.clone(),
                    column: column.name.clone(),
                });
            }
        }

        for key_column in &table.primary_key {
            if !column_names.contains(key_column.as_str()) {
                return Err(SchemaError::UnknownPrimaryKeyColumn {
                    table: table.name.clone(),
                    column: key_column.clone(),
                });
            }
        }

        for index in &table.indexes {
            if !index_names.insert(&index.name) {
                return Err(SchemaError::DuplicateIndex(index.name.clone()));
            }
            for indexed_column in &index.columns {
                if !column_names.contains(indexed_column.as_str()) {
                    return Err(SchemaError::UnknownIndexColumn {
                        index: index.name.clone(),
                        table: table.name.clone(),
                        column: indexed_column.clone(),
                    });
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, Index, Table};
    use crate::types::SqlType;

    #[test]
    fn test_valid_schema() {
        let schema = Schema::new().table(
            Table::new("users")
                .column(Column::new("id", SqlType::BigInt))
                .primary_key(["id"])
                .index(Index::new("users_id_idx", ["id"])),
        );
        assert!(validate_schema(&schema).is_ok());
    }

    #[test]
    fn test_empty_table_rejected() {
        let schema = Schema::new().table(Table::new("ghost"));
        assert_eq!(
            validate_schema(&schema),
            Err(SchemaError::EmptyTable("ghost".to_string()))
        );
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let schema = Schema::new().table(
            Table::new("users")
                .column(Column::new("id", SqlType::BigInt))
                .column(Column::new("id", SqlType::Integer)),
        );
        assert!(matches!(
            validate_schema(&schema),
            Err(SchemaError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn test_unknown_primary_key_column_rejected() {
        let schema = Schema::new().table(
            Table::new("users")
                .column(Column::new("id", SqlType::BigInt))
                .primary_key(["uid"]),
        );
        assert!(matches!(
            validate_schema(&schema),
            Err(SchemaError::UnknownPrimaryKeyColumn { .. })
        ));
    }

    #[test]
    fn test_duplicate_index_across_tables_rejected() {
        let schema = Schema::new()
            .table(
                Table::new("a")
                    .column(Column::new("x", SqlType::Integer))
                    .index(Index::new("shared_idx", ["x"])),
            )
            .table(
                Table::new("b")
                    .column(Column::new("y", SqlType::Integer))
                    .index(Index::new("shared_idx", ["y"])),
            );
        assert_eq!(
            validate_schema(&schema),
            Err(SchemaError::DuplicateIndex("shared_idx".to_string()))
        );
    }

    #[test]
    fn test_unknown_index_column_rejected() {
        let schema = Schema::new().table(
            Table::new("users")
                .column(Column::new("id", SqlType::BigInt))
                .index(Index::new("users_email_idx", ["email"])),
        );
        assert!(matches!(
            validate_schema(&schema),
            Err(SchemaError::UnknownIndexColumn { .. })
        ));
    }
}
