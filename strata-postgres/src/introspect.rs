//! Catalog introspection.
//!
//! Reads the `public` schema out of PostgreSQL's catalogs and describes
//! it in target-schema terms, so the differ can compare like with like.
//! The engine's own version table is excluded, as are the indexes that
//! merely back constraints (their constraints are reported instead).

use std::collections::HashMap;

use tokio_postgres::Client;
use tracing::debug;

use strata_migrate::dialect::VERSION_TABLE;
use strata_migrate::{MigrateResult, MigrationError};
use strata_schema::{Column, Index, Schema, SqlType, Table};

// information_schema columns are domain types (sql_identifier,
// cardinal_number, yes_or_no); cast them so the driver can decode them.
const TABLES_SQL: &str = "\
SELECT table_name::text
FROM information_schema.tables
WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
ORDER BY table_name";

const COLUMNS_SQL: &str = "\
SELECT table_name::text, column_name::text, data_type::text,
       is_nullable::text, column_default::text,
       character_maximum_length::int4, numeric_precision::int4,
       numeric_scale::int4
FROM information_schema.columns
WHERE table_schema = 'public'
ORDER BY table_name, ordinal_position";

const PRIMARY_KEYS_SQL: &str = "\
SELECT tc.table_name::text, kcu.column_name::text
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON kcu.constraint_name = tc.constraint_name
 AND kcu.table_schema = tc.table_schema
WHERE tc.table_schema = 'public' AND tc.constraint_type = 'PRIMARY KEY'
ORDER BY tc.table_name, kcu.ordinal_position";

const UNIQUE_COLUMNS_SQL: &str = "\
SELECT tc.table_name::text, tc.constraint_name::text, kcu.column_name::text
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON kcu.constraint_name = tc.constraint_name
 AND kcu.table_schema = tc.table_schema
WHERE tc.table_schema = 'public' AND tc.constraint_type = 'UNIQUE'
ORDER BY tc.table_name, tc.constraint_name, kcu.ordinal_position";

/// Secondary indexes only: primary keys and constraint-backed indexes are
/// reported through their constraints.
const INDEXES_SQL: &str = "\
SELECT t.relname AS table_name,
       i.relname AS index_name,
       ix.indisunique AS is_unique,
       a.attname AS column_name
FROM pg_index ix
JOIN pg_class t ON t.oid = ix.indrelid
JOIN pg_class i ON i.oid = ix.indexrelid
JOIN pg_namespace n ON n.oid = t.relnamespace
JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS k(attnum, ord) ON TRUE
JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
WHERE n.nspname = 'public'
  AND NOT ix.indisprimary
  AND NOT EXISTS (
      SELECT 1 FROM pg_constraint c WHERE c.conindid = ix.indexrelid
  )
ORDER BY t.relname, i.relname, k.ord";

/// Introspect the `public` schema into a [`Schema`] description.
pub async fn introspect_schema(client: &Client) -> MigrateResult<Schema> {
    let table_rows = client.query(TABLES_SQL, &[]).await.map_err(pg_error)?;

    let mut tables: HashMap<String, Table> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for row in table_rows {
        let name: String = row.get(0);
        if name == VERSION_TABLE {
            continue;
        }
        tables.insert(name.clone(), Table::new(&name));
        order.push(name);
    }

    let column_rows = client.query(COLUMNS_SQL, &[]).await.map_err(pg_error)?;
    for row in column_rows {
        let table_name: String = row.get(0);
        let Some(table) = tables.get_mut(&table_name) else {
            continue;
        };

        let name: String = row.get(1);
        let data_type: String = row.get(2);
        let is_nullable: String = row.get(3);
        let default: Option<String> = row.get(4);
        let char_len: Option<i32> = row.get(5);
        let precision: Option<i32> = row.get(6);
        let scale: Option<i32> = row.get(7);

        table.columns.push(Column {
            name,
            sql_type: map_column_type(&data_type, char_len, precision, scale),
            nullable: is_nullable.eq_ignore_ascii_case("YES"),
            default,
            unique: false,
        });
    }

    let pk_rows = client.query(PRIMARY_KEYS_SQL, &[]).await.map_err(pg_error)?;
    for row in pk_rows {
        let table_name: String = row.get(0);
        let column: String = row.get(1);
        if let Some(table) = tables.get_mut(&table_name) {
            table.primary_key.push(column);
        }
    }

    // Single-column UNIQUE constraints surface as the column's flag;
    // multi-column constraints have no column-level representation and
    // are skipped.
    let unique_rows = client
        .query(UNIQUE_COLUMNS_SQL, &[])
        .await
        .map_err(pg_error)?;
    let mut constraint_columns: HashMap<(String, String), Vec<String>> = HashMap::new();
    for row in unique_rows {
        let table_name: String = row.get(0);
        let constraint: String = row.get(1);
        let column: String = row.get(2);
        constraint_columns
            .entry((table_name, constraint))
            .or_default()
            .push(column);
    }
    for ((table_name, _), columns) in constraint_columns {
        if let [column] = columns.as_slice()
            && let Some(table) = tables.get_mut(&table_name)
            && let Some(column) = table.columns.iter_mut().find(|c| &c.name == column)
        {
            column.unique = true;
        }
    }

    let index_rows = client.query(INDEXES_SQL, &[]).await.map_err(pg_error)?;
    let mut indexes: HashMap<(String, String), (bool, Vec<String>)> = HashMap::new();
    let mut index_order: Vec<(String, String)> = Vec::new();
    for row in index_rows {
        let table_name: String = row.get(0);
        let index_name: String = row.get(1);
        let is_unique: bool = row.get(2);
        let column: String = row.get(3);

        let key = (table_name, index_name);
        let entry = indexes.entry(key.clone()).or_insert_with(|| {
            index_order.push(key);
            (is_unique, Vec::new())
        });
        entry.1.push(column);
    }
    for key in index_order {
        let (is_unique, columns) = indexes.remove(&key).ok_or_else(|| {
            MigrationError::database("index row vanished during introspection")
        })?;
        let (table_name, index_name) = key;
        if let Some(table) = tables.get_mut(&table_name) {
            table.indexes.push(Index {
                name: index_name,
                columns,
                unique: is_unique,
            });
        }
    }

    let mut schema = Schema::new();
    for name in order {
        if let Some(table) = tables.remove(&name) {
            schema = schema.table(table);
        }
    }

    debug!(tables = schema.tables.len(), "introspected live schema");
    Ok(schema)
}

/// Map an `information_schema` type description to a [`SqlType`].
fn map_column_type(
    data_type: &str,
    char_len: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
) -> SqlType {
    match data_type.to_ascii_lowercase().as_str() {
        "character varying" | "varchar" => match char_len {
            Some(len) if len > 0 => SqlType::Varchar(len as u32),
            _ => SqlType::Text,
        },
        "numeric" | "decimal" => match (precision, scale) {
            (Some(p), Some(s)) if p > 0 => SqlType::Numeric(p as u16, s as u16),
            _ => SqlType::Custom("NUMERIC".to_string()),
        },
        _ => SqlType::from_sql_name(data_type),
    }
}

fn pg_error(err: tokio_postgres::Error) -> MigrationError {
    MigrationError::database(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_plain_types() {
        assert_eq!(map_column_type("bigint", None, None, None), SqlType::BigInt);
        assert_eq!(map_column_type("text", None, None, None), SqlType::Text);
        assert_eq!(
            map_column_type("timestamp with time zone", None, None, None),
            SqlType::Timestamptz
        );
        assert_eq!(map_column_type("uuid", None, None, None), SqlType::Uuid);
    }

    #[test]
    fn test_map_parameterized_types() {
        assert_eq!(
            map_column_type("character varying", Some(255), None, None),
            SqlType::Varchar(255)
        );
        assert_eq!(
            map_column_type("character varying", None, None, None),
            SqlType::Text
        );
        assert_eq!(
            map_column_type("numeric", None, Some(10), Some(2)),
            SqlType::Numeric(10, 2)
        );
    }

    #[test]
    fn test_unknown_types_survive_as_custom() {
        assert_eq!(
            map_column_type("tsvector", None, None, None),
            SqlType::Custom("tsvector".to_string())
        );
    }

    #[test]
    fn test_catalog_queries_scope_to_public_schema() {
        for sql in [
            TABLES_SQL,
            COLUMNS_SQL,
            PRIMARY_KEYS_SQL,
            UNIQUE_COLUMNS_SQL,
            INDEXES_SQL,
        ] {
            assert!(sql.contains("public"), "query not scoped: {}", sql);
        }
    }

    #[test]
    fn test_index_query_skips_constraint_backed_indexes() {
        assert!(INDEXES_SQL.contains("NOT ix.indisprimary"));
        assert!(INDEXES_SQL.contains("pg_constraint"));
    }
}
