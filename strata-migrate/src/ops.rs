//! Atomic schema-change operations.
//!
//! A [`SchemaOp`] is the unit the whole engine moves around: the differ
//! produces them, revision records persist them, and the executor renders
//! them into SQL. Every op carries enough state to be inverted, which is
//! how a generated upgrade gets its matching downgrade.

use serde::{Deserialize, Serialize};
use strata_schema::{Column, Index, Table};

/// One atomic schema change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaOp {
    /// Create a table, including its columns, primary key and indexes.
    CreateTable {
        /// Full table description.
        table: Table,
    },
    /// Drop a table. Carries the full description so the op can invert.
    DropTable {
        /// Full description of the table being dropped.
        table: Table,
    },
    /// Add a column to an existing table.
    AddColumn {
        /// Table name.
        table: String,
        /// Column to add.
        column: Column,
    },
    /// Drop a column. Carries the full column so the op can invert.
    DropColumn {
        /// Table name.
        table: String,
        /// Column being dropped.
        column: Column,
    },
    /// Alter a column in place. Carries both sides of the change.
    AlterColumn {
        /// Table name.
        table: String,
        /// Column state before the change.
        from: Column,
        /// Column state after the change.
        to: Column,
    },
    /// Create a secondary index.
    CreateIndex {
        /// Table name.
        table: String,
        /// Index to create.
        index: Index,
    },
    /// Drop a secondary index. Carries the full index so the op can invert.
    DropIndex {
        /// Table name.
        table: String,
        /// Index being dropped.
        index: Index,
    },
}

impl SchemaOp {
    /// The exact inverse of this operation.
    ///
    /// Applying `op` then `op.invert()` leaves the schema unchanged. This
    /// is total because every destructive variant carries the state it
    /// destroys.
    pub fn invert(&self) -> SchemaOp {
        match self {
            Self::CreateTable { table } => Self::DropTable {
                table: table.clone(),
            },
            Self::DropTable { table } => Self::CreateTable {
                table: table.clone(),
            },
            Self::AddColumn { table, column } => Self::DropColumn {
                table: table.clone(),
                column: column.clone(),
            },
            Self::DropColumn { table, column } => Self::AddColumn {
                table: table.clone(),
                column: column.clone(),
            },
            Self::AlterColumn { table, from, to } => Self::AlterColumn {
                table: table.clone(),
                from: to.clone(),
                to: from.clone(),
            },
            Self::CreateIndex { table, index } => Self::DropIndex {
                table: table.clone(),
                index: index.clone(),
            },
            Self::DropIndex { table, index } => Self::CreateIndex {
                table: table.clone(),
                index: index.clone(),
            },
        }
    }

    /// Short human-readable description, for logs and summaries.
    pub fn describe(&self) -> String {
        match self {
            Self::CreateTable { table } => format!("create table {}", table.name),
            Self::DropTable { table } => format!("drop table {}", table.name),
            Self::AddColumn { table, column } => {
                format!("add column {}.{}", table, column.name)
            }
            Self::DropColumn { table, column } => {
                format!("drop column {}.{}", table, column.name)
            }
            Self::AlterColumn { table, to, .. } => {
                format!("alter column {}.{}", table, to.name)
            }
            Self::CreateIndex { index, .. } => format!("create index {}", index.name),
            Self::DropIndex { index, .. } => format!("drop index {}", index.name),
        }
    }
}
