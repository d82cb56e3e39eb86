//! Database connection boundary.
//!
//! The engine never talks SQL wire protocols itself. It drives a
//! [`Connection`] acquired from a [`Database`], and backend crates (or test
//! doubles) supply the implementations. One top-level operation owns one
//! connection exclusively and releases it on every exit path.

use async_trait::async_trait;
use strata_schema::Schema;

use crate::error::MigrateResult;

/// A source of connections, configured with whatever the backend needs
/// (connection string, TLS, and so on).
#[async_trait]
pub trait Database: Send + Sync {
    /// Acquire a fresh connection.
    ///
    /// A failure here means the session cannot start at all; callers
    /// surface it as a configuration error.
    async fn connect(&self) -> MigrateResult<Box<dyn Connection>>;
}

/// One live database connection.
#[async_trait]
pub trait Connection: Send {
    /// Execute one or more SQL statements, discarding any result rows.
    async fn execute(&mut self, sql: &str) -> MigrateResult<()>;

    /// Open a transaction.
    async fn begin(&mut self) -> MigrateResult<()>;

    /// Commit the open transaction.
    async fn commit(&mut self) -> MigrateResult<()>;

    /// Roll back the open transaction.
    async fn rollback(&mut self) -> MigrateResult<()>;

    /// Create the version-pointer table if it does not exist.
    async fn ensure_version_table(&mut self) -> MigrateResult<()>;

    /// Read the database's current revision pointer. `None` means the
    /// database is at base (no revision applied).
    async fn current_revision(&mut self) -> MigrateResult<Option<String>>;

    /// Move the revision pointer. `None` resets it to base.
    async fn set_current_revision(&mut self, revision: Option<&str>) -> MigrateResult<()>;

    /// Describe the schema the database currently has, in target-schema
    /// terms. Engine-internal objects (the version table) are excluded.
    async fn introspect(&mut self) -> MigrateResult<Schema>;

    /// Release the connection. Called on every session exit path; must be
    /// safe to call after a failed statement.
    async fn close(&mut self) -> MigrateResult<()>;
}
