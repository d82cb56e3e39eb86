//! PostgreSQL connection implementation.

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};

use strata_migrate::dialect::{PostgresDialect, SqlDialect};
use strata_migrate::{Connection, Database, MigrateResult, MigrationError};
use strata_schema::Schema;

use crate::introspect::introspect_schema;

/// A source of PostgreSQL connections, configured with a connection URL.
#[derive(Debug, Clone)]
pub struct PgDatabase {
    url: String,
}

impl PgDatabase {
    /// Create a database over a `postgres://` connection URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The configured connection URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn connect(&self) -> MigrateResult<Box<dyn Connection>> {
        let (client, connection) =
            tokio_postgres::connect(&self.url, NoTls).await.map_err(|e| {
                MigrationError::configuration(format!(
                    "failed to connect to '{}': {}",
                    self.url, e
                ))
            })?;

        // The connection future owns the socket; it resolves once the
        // client is dropped.
        let io_task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "postgres connection error");
            }
        });

        debug!(url = %self.url, "opened postgres connection");
        Ok(Box::new(PgConnection {
            client: Some(client),
            io_task: Some(io_task),
            dialect: PostgresDialect::new(),
        }))
    }
}

/// One live PostgreSQL connection.
pub struct PgConnection {
    client: Option<Client>,
    io_task: Option<JoinHandle<()>>,
    dialect: PostgresDialect,
}

impl PgConnection {
    fn client(&self) -> MigrateResult<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| MigrationError::database("connection is closed"))
    }

    async fn batch(&self, sql: &str) -> MigrateResult<()> {
        self.client()?
            .batch_execute(sql)
            .await
            .map_err(pg_error)
    }
}

#[async_trait]
impl Connection for PgConnection {
    async fn execute(&mut self, sql: &str) -> MigrateResult<()> {
        debug!(sql = %sql, "executing statement");
        self.batch(sql).await
    }

    async fn begin(&mut self) -> MigrateResult<()> {
        self.batch("BEGIN").await
    }

    async fn commit(&mut self) -> MigrateResult<()> {
        self.batch("COMMIT").await
    }

    async fn rollback(&mut self) -> MigrateResult<()> {
        self.batch("ROLLBACK").await
    }

    async fn ensure_version_table(&mut self) -> MigrateResult<()> {
        let sql = self.dialect.ensure_version_table_sql();
        self.batch(&sql).await
    }

    async fn current_revision(&mut self) -> MigrateResult<Option<String>> {
        let sql = self.dialect.select_version_sql();
        let row = self
            .client()?
            .query_opt(sql.as_str(), &[])
            .await
            .map_err(pg_error)?;
        Ok(row.map(|r| r.get(0)))
    }

    async fn set_current_revision(&mut self, revision: Option<&str>) -> MigrateResult<()> {
        // The same literally-bound statement the offline renderer emits.
        let sql = self.dialect.set_version_sql(revision);
        self.batch(&sql).await
    }

    async fn introspect(&mut self) -> MigrateResult<Schema> {
        introspect_schema(self.client()?).await
    }

    async fn close(&mut self) -> MigrateResult<()> {
        // Dropping the client lets the io task drain and finish.
        drop(self.client.take());
        if let Some(io_task) = self.io_task.take() {
            let _ = io_task.await;
        }
        debug!("closed postgres connection");
        Ok(())
    }
}

/// Map a driver fault into the engine's error type.
fn pg_error(err: tokio_postgres::Error) -> MigrationError {
    MigrationError::database(err.to_string())
}
