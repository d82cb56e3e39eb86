//! SQL rendering.
//!
//! Dialect-level SQL is a pluggable boundary: the engine hands a
//! [`SqlDialect`] each atomic operation and gets back literal statements,
//! already bound into static values, suitable both for live execution and
//! for offline script output. [`PostgresDialect`] is the shipped
//! implementation.

use strata_schema::{Column, Index, Table};

use crate::ops::SchemaOp;

/// Name of the table holding the database's revision pointer.
pub const VERSION_TABLE: &str = "_strata_version";

/// Renders operations and engine bookkeeping into SQL text.
pub trait SqlDialect: Send + Sync {
    /// Dialect name, for logs.
    fn name(&self) -> &'static str;

    /// Render one operation as a sequence of statements.
    fn render_op(&self, op: &SchemaOp) -> Vec<String>;

    /// Statement opening a transaction.
    fn begin_transaction(&self) -> &'static str {
        "BEGIN;"
    }

    /// Statement committing a transaction.
    fn commit_transaction(&self) -> &'static str {
        "COMMIT;"
    }

    /// Statement creating the version-pointer table if absent.
    fn ensure_version_table_sql(&self) -> String;

    /// Statement reading the version pointer.
    fn select_version_sql(&self) -> String;

    /// Statement moving the version pointer. `None` resets it to base.
    /// Values are bound literally; offline scripts embed this verbatim.
    fn set_version_sql(&self, revision: Option<&str>) -> String;
}

/// SQL generator for PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create the dialect.
    pub fn new() -> Self {
        Self
    }

    /// Render a column definition clause.
    fn column_def(&self, column: &Column) -> String {
        let mut def = format!("{} {}", quote_ident(&column.name), column.sql_type.sql_name());
        if !column.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default {
            def.push_str(&format!(" DEFAULT {}", default));
        }
        if column.unique {
            def.push_str(" UNIQUE");
        }
        def
    }

    fn create_table(&self, table: &Table) -> Vec<String> {
        let mut clauses: Vec<String> =
            table.columns.iter().map(|c| self.column_def(c)).collect();

        if !table.primary_key.is_empty() {
            let key_columns: Vec<String> = table
                .primary_key
                .iter()
                .map(|c| quote_ident(c))
                .collect();
            clauses.push(format!("PRIMARY KEY ({})", key_columns.join(", ")));
        }

        let mut statements = vec![format!(
            "CREATE TABLE {} (\n    {}\n);",
            quote_ident(&table.name),
            clauses.join(",\n    ")
        )];

        for index in &table.indexes {
            statements.push(self.create_index(&table.name, index));
        }

        statements
    }

    fn drop_table(&self, table: &Table) -> String {
        format!("DROP TABLE {};", quote_ident(&table.name))
    }

    fn add_column(&self, table: &str, column: &Column) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {};",
            quote_ident(table),
            self.column_def(column)
        )
    }

    fn drop_column(&self, table: &str, column: &Column) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {};",
            quote_ident(table),
            quote_ident(&column.name)
        )
    }

    /// Emit one ALTER per changed facet, so the statements say exactly
    /// what changed.
    fn alter_column(&self, table: &str, from: &Column, to: &Column) -> Vec<String> {
        let mut statements = Vec::new();
        let table_ident = quote_ident(table);
        let column_ident = quote_ident(&to.name);

        if from.sql_type != to.sql_type {
            statements.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {};",
                table_ident,
                column_ident,
                to.sql_type.sql_name()
            ));
        }

        if from.nullable != to.nullable {
            let action = if to.nullable { "DROP" } else { "SET" };
            statements.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL;",
                table_ident, column_ident, action
            ));
        }

        if from.default != to.default {
            match &to.default {
                Some(default) => statements.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                    table_ident, column_ident, default
                )),
                None => statements.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
                    table_ident, column_ident
                )),
            }
        }

        if from.unique != to.unique {
            let constraint = quote_ident(&format!("{}_{}_key", table, to.name));
            if to.unique {
                statements.push(format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({});",
                    table_ident, constraint, column_ident
                ));
            } else {
                statements.push(format!(
                    "ALTER TABLE {} DROP CONSTRAINT {};",
                    table_ident, constraint
                ));
            }
        }

        statements
    }

    fn create_index(&self, table: &str, index: &Index) -> String {
        let columns: Vec<String> = index.columns.iter().map(|c| quote_ident(c)).collect();
        let unique = if index.unique { "UNIQUE " } else { "" };
        format!(
            "CREATE {}INDEX {} ON {} ({});",
            unique,
            quote_ident(&index.name),
            quote_ident(table),
            columns.join(", ")
        )
    }

    fn drop_index(&self, index: &Index) -> String {
        format!("DROP INDEX {};", quote_ident(&index.name))
    }
}

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn render_op(&self, op: &SchemaOp) -> Vec<String> {
        match op {
            SchemaOp::CreateTable { table } => self.create_table(table),
            SchemaOp::DropTable { table } => vec![self.drop_table(table)],
            SchemaOp::AddColumn { table, column } => vec![self.add_column(table, column)],
            SchemaOp::DropColumn { table, column } => vec![self.drop_column(table, column)],
            SchemaOp::AlterColumn { table, from, to } => self.alter_column(table, from, to),
            SchemaOp::CreateIndex { table, index } => vec![self.create_index(table, index)],
            SchemaOp::DropIndex { index, .. } => vec![self.drop_index(index)],
        }
    }

    fn ensure_version_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
             slot INTEGER PRIMARY KEY DEFAULT 1 CHECK (slot = 1),\n    \
             version VARCHAR(32) NOT NULL\n);",
            quote_ident(VERSION_TABLE)
        )
    }

    fn select_version_sql(&self) -> String {
        format!(
            "SELECT version FROM {} WHERE slot = 1;",
            quote_ident(VERSION_TABLE)
        )
    }

    fn set_version_sql(&self, revision: Option<&str>) -> String {
        match revision {
            Some(revision) => format!(
                "INSERT INTO {} (slot, version) VALUES (1, {}) \
                 ON CONFLICT (slot) DO UPDATE SET version = EXCLUDED.version;",
                quote_ident(VERSION_TABLE),
                quote_literal(revision)
            ),
            None => format!("DELETE FROM {} WHERE slot = 1;", quote_ident(VERSION_TABLE)),
        }
    }
}

/// Quote an identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal, binding the value statically.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
