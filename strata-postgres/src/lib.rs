//! # strata-postgres
//!
//! PostgreSQL backend for the Strata migration engine.
//!
//! Implements the engine's [`Database`](strata_migrate::Database) and
//! [`Connection`](strata_migrate::Connection) traits over
//! `tokio-postgres`: statement execution, explicit transactions, the
//! version-pointer table, and catalog introspection into
//! [`strata_schema::Schema`] values.
//!
//! One connection is opened per engine operation and closed when the
//! session ends; there is no pooling, because the engine owns its
//! connection exclusively for the duration of a run.
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_migrate::{MigrationConfig, MigrationEngine};
//! use strata_postgres::PgDatabase;
//!
//! let database = PgDatabase::new("postgres://localhost/app");
//! let engine = MigrationEngine::new(MigrationConfig::new("./migrations"), database);
//! ```

pub mod connection;
pub mod introspect;

pub use connection::{PgConnection, PgDatabase};
pub use introspect::introspect_schema;
