//! Schema diffing.
//!
//! The differ is a pluggable collaborator: given the declared target schema
//! and (optionally) a live connection, it produces the ordered set of
//! atomic operations that would bring the database in line with the
//! target. [`CatalogDiffer`] is the shipped implementation; it introspects
//! the live schema through the connection and compares. Change detection
//! and script generation both go through the same `diff` call, so what is
//! detected is always exactly what would be written.

use std::collections::HashSet;

use async_trait::async_trait;
use strata_schema::{Schema, Table};

use crate::connection::Connection;
use crate::error::{MigrateResult, MigrationError};
use crate::ops::SchemaOp;

/// The outcome of one diff: an ordered sequence of atomic operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffResult {
    /// Operations in application order.
    pub ops: Vec<SchemaOp>,
}

impl DiffResult {
    /// A diff with no operations.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the diff contains no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// The reverse diff: inverted operations in reverse order.
    pub fn invert(&self) -> DiffResult {
        DiffResult {
            ops: self.ops.iter().rev().map(SchemaOp::invert).collect(),
        }
    }

    /// Human-readable summary, one clause per operation kind.
    pub fn summary(&self) -> String {
        if self.ops.is_empty() {
            return "no changes".to_string();
        }

        let count = |f: fn(&SchemaOp) -> bool| self.ops.iter().filter(|op| f(op)).count();
        let mut parts = Vec::new();

        let pairs: [(usize, &str); 7] = [
            (
                count(|op| matches!(op, SchemaOp::CreateTable { .. })),
                "tables created",
            ),
            (
                count(|op| matches!(op, SchemaOp::DropTable { .. })),
                "tables dropped",
            ),
            (
                count(|op| matches!(op, SchemaOp::AddColumn { .. })),
                "columns added",
            ),
            (
                count(|op| matches!(op, SchemaOp::DropColumn { .. })),
                "columns dropped",
            ),
            (
                count(|op| matches!(op, SchemaOp::AlterColumn { .. })),
                "columns altered",
            ),
            (
                count(|op| matches!(op, SchemaOp::CreateIndex { .. })),
                "indexes created",
            ),
            (
                count(|op| matches!(op, SchemaOp::DropIndex { .. })),
                "indexes dropped",
            ),
        ];

        for (n, label) in pairs {
            if n > 0 {
                parts.push(format!("{} {}", n, label));
            }
        }

        parts.join(", ")
    }
}

/// A schema differ.
///
/// Implementations decide how the live side is observed. The engine treats
/// this as a black box: it hands over the target description and, for
/// online sessions, the connection.
#[async_trait]
pub trait SchemaDiffer: Send + Sync {
    /// Compute the operations needed to reconcile the database with
    /// `target`.
    async fn diff(
        &self,
        target: &Schema,
        conn: Option<&mut (dyn Connection + '_)>,
    ) -> MigrateResult<DiffResult>;
}

/// The default differ: introspect the live catalog through the connection
/// and compare it structurally against the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogDiffer;

impl CatalogDiffer {
    /// Create a catalog differ.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SchemaDiffer for CatalogDiffer {
    async fn diff(
        &self,
        target: &Schema,
        conn: Option<&mut (dyn Connection + '_)>,
    ) -> MigrateResult<DiffResult> {
        let conn = conn.ok_or_else(|| {
            MigrationError::configuration("autogeneration requires a live connection")
        })?;
        let live = conn.introspect().await?;
        Ok(diff_schemas(&live, target))
    }
}

/// Structurally compare two schema descriptions.
///
/// Returns the operations that turn `live` into `target`, ordered so that
/// sequential application is always valid: creations first, then in-place
/// changes, then drops.
pub fn diff_schemas(live: &Schema, target: &Schema) -> DiffResult {
    let mut creates = Vec::new();
    let mut changes = Vec::new();
    let mut drops = Vec::new();

    for table in target.iter_tables() {
        match live.get_table(&table.name) {
            None => creates.push(SchemaOp::CreateTable {
                table: table.clone(),
            }),
            Some(live_table) => diff_table(live_table, table, &mut changes, &mut drops),
        }
    }

    for live_table in live.iter_tables() {
        if target.get_table(&live_table.name).is_none() {
            drops.push(SchemaOp::DropTable {
                table: live_table.clone(),
            });
        }
    }

    let mut ops = creates;
    ops.append(&mut changes);
    ops.append(&mut drops);
    DiffResult { ops }
}

/// Diff one table present on both sides.
fn diff_table(live: &Table, target: &Table, changes: &mut Vec<SchemaOp>, drops: &mut Vec<SchemaOp>) {
    for column in &target.columns {
        match live.get_column(&column.name) {
            None => changes.push(SchemaOp::AddColumn {
                table: target.name.clone(),
                column: column.clone(),
            }),
            Some(live_column) if live_column != column => changes.push(SchemaOp::AlterColumn {
                table: target.name.clone(),
                from: live_column.clone(),
                to: column.clone(),
            }),
            Some(_) => {}
        }
    }

    let target_columns: HashSet<&str> = target.columns.iter().map(|c| c.name.as_str()).collect();
    for live_column in &live.columns {
        if !target_columns.contains(live_column.name.as_str()) {
            drops.push(SchemaOp::DropColumn {
                table: target.name.clone(),
                column: live_column.clone(),
            });
        }
    }

    for index in &target.indexes {
        match live.get_index(&index.name) {
            None => changes.push(SchemaOp::CreateIndex {
                table: target.name.clone(),
                index: index.clone(),
            }),
            Some(live_index) if live_index != index => {
                // Indexes have no in-place ALTER; recreate.
                changes.push(SchemaOp::DropIndex {
                    table: target.name.clone(),
                    index: live_index.clone(),
                });
                changes.push(SchemaOp::CreateIndex {
                    table: target.name.clone(),
                    index: index.clone(),
                });
            }
            Some(_) => {}
        }
    }

    let target_indexes: HashSet<&str> = target.indexes.iter().map(|i| i.name.as_str()).collect();
    for live_index in &live.indexes {
        if !target_indexes.contains(live_index.name.as_str()) {
            drops.push(SchemaOp::DropIndex {
                table: target.name.clone(),
                index: live_index.clone(),
            });
        }
    }
}
