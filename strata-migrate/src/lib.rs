//! # strata-migrate
//!
//! Migration engine for Strata.
//!
//! This crate provides:
//! - Change detection between a declared target schema and a live database
//! - Revision generation: diffs persisted as immutable, reversible records
//! - A revision graph with branch/merge structure and symbolic resolution
//!   (`head`, `base`, `current`, id prefixes, `start:end` ranges)
//! - Plan resolution and execution, forward and backward
//! - Offline rendering: any plan as literal SQL instead of live execution
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ Target Schema│────▶│ Schema Differ  │────▶│ Script Writer│
//! └──────────────┘     └────────────────┘     └──────────────┘
//!                                                     │
//!        ┌─────────────┐     ┌───────────────┐        ▼
//!        │ Plan        │◀────│ Revision Graph│◀──┌──────────┐
//!        │ Resolver    │     └───────────────┘   │ Store    │
//!        └─────────────┘                         └──────────┘
//!               │
//!               ▼
//!        ┌─────────────┐     execute ──▶ live connection
//!        │ Executor    │────▶
//!        └─────────────┘     render  ──▶ SQL script
//! ```
//!
//! The engine is configured from application code, not a config file: the
//! connection source, target schema, and script directory all arrive as
//! values. Each top-level operation runs as one session over one
//! exclusively-owned connection (or none, for SQL rendering), and the
//! connection is released on every exit path.
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_migrate::{MigrationConfig, MigrationEngine};
//! use strata_postgres::PgDatabase;
//! use strata_schema::{Column, Schema, SqlType, Table};
//!
//! async fn migrate() -> Result<(), strata_migrate::MigrationError> {
//!     let target = Schema::new().table(
//!         Table::new("users")
//!             .column(Column::new("id", SqlType::BigInt))
//!             .column(Column::new("email", SqlType::Text).unique())
//!             .primary_key(["id"]),
//!     );
//!
//!     let config = MigrationConfig::new("./migrations").target_schema(target);
//!     let engine = MigrationEngine::new(config, PgDatabase::new("postgres://localhost/app"));
//!
//!     engine.initialize().await?;
//!     if engine.new_migration(Some("sync schema"), false).await? {
//!         engine.upgrade("head").await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Revision records
//!
//! Each revision is one TOML record in the script directory, named by its
//! id, carrying its parent pointer(s) and the upgrade/downgrade operation
//! bodies:
//!
//! ```text
//! migrations/
//! ├── 3f2a9c81d04b.toml
//! ├── 77c1e5a2b9f0.toml
//! └── b04d11c83e6f.toml
//! ```

pub mod connection;
pub mod dialect;
pub mod differ;
pub mod engine;
pub mod error;
pub mod executor;
pub mod graph;
pub mod ops;
pub mod plan;
pub mod revision;
pub mod session;
pub mod store;
pub mod writer;

// Re-exports
pub use connection::{Connection, Database};
pub use dialect::{PostgresDialect, SqlDialect, VERSION_TABLE};
pub use differ::{CatalogDiffer, DiffResult, SchemaDiffer, diff_schemas};
pub use engine::{MigrationConfig, MigrationEngine, MigrationStatus};
pub use error::{MigrateResult, MigrationError};
pub use executor::{ConnectionSink, Executor, RenderSink, StepSink, TransactionGranularity};
pub use graph::{BASE, CURRENT, HEAD, RevisionGraph};
pub use ops::SchemaOp;
pub use plan::{Direction, MigrationPlan, PlanResolver, PlanStep};
pub use revision::Revision;
pub use session::{MigrationSession, SessionContext, StepSource};
pub use store::RevisionStore;
pub use writer::ScriptWriter;
