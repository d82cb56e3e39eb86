//! In-memory database double for engine tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use strata_migrate::{Connection, Database, MigrateResult, MigrationError};
use strata_schema::Schema;

/// Observable state shared between a [`MemoryDatabase`] and its tests.
#[derive(Debug, Default)]
pub struct MemoryState {
    /// The revision pointer, as a real database would persist it.
    pub version: Option<String>,
    /// What introspection reports as the live schema.
    pub schema: Schema,
    /// Committed statements, in execution order.
    pub statements: Vec<String>,
    /// Fail any executed statement containing this substring.
    pub fail_on: Option<String>,
    /// Whether the version table has been created.
    pub version_table: bool,
    /// Connections handed out.
    pub opened: usize,
    /// Connections closed.
    pub closed: usize,
}

/// A database whose "storage" is a shared in-memory state.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(schema: Schema) -> Self {
        let db = Self::default();
        db.state.lock().unwrap().schema = schema;
        db
    }

    pub fn state(&self) -> Arc<Mutex<MemoryState>> {
        self.state.clone()
    }

    pub fn version(&self) -> Option<String> {
        self.state.lock().unwrap().version.clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.lock().unwrap().statements.clone()
    }

    pub fn set_fail_on(&self, marker: Option<&str>) {
        self.state.lock().unwrap().fail_on = marker.map(str::to_string);
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn connect(&self) -> MigrateResult<Box<dyn Connection>> {
        self.state.lock().unwrap().opened += 1;
        Ok(Box::new(MemoryConnection {
            state: self.state.clone(),
            tx: None,
        }))
    }
}

/// Pending effects of an open transaction.
struct TxBuffer {
    statements: Vec<String>,
    version: Option<Option<String>>,
}

pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
    tx: Option<TxBuffer>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn execute(&mut self, sql: &str) -> MigrateResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(marker) = &state.fail_on
            && sql.contains(marker.as_str())
        {
            return Err(MigrationError::database(format!("refused: {}", sql)));
        }
        match &mut self.tx {
            Some(tx) => tx.statements.push(sql.to_string()),
            None => state.statements.push(sql.to_string()),
        }
        Ok(())
    }

    async fn begin(&mut self) -> MigrateResult<()> {
        self.tx = Some(TxBuffer {
            statements: Vec::new(),
            version: None,
        });
        Ok(())
    }

    async fn commit(&mut self) -> MigrateResult<()> {
        let Some(tx) = self.tx.take() else {
            return Err(MigrationError::database("commit without transaction"));
        };
        let mut state = self.state.lock().unwrap();
        state.statements.extend(tx.statements);
        if let Some(version) = tx.version {
            state.version = version;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> MigrateResult<()> {
        self.tx = None;
        Ok(())
    }

    async fn ensure_version_table(&mut self) -> MigrateResult<()> {
        self.state.lock().unwrap().version_table = true;
        Ok(())
    }

    async fn current_revision(&mut self) -> MigrateResult<Option<String>> {
        Ok(self.state.lock().unwrap().version.clone())
    }

    async fn set_current_revision(&mut self, revision: Option<&str>) -> MigrateResult<()> {
        let value = revision.map(str::to_string);
        match &mut self.tx {
            Some(tx) => tx.version = Some(value),
            None => self.state.lock().unwrap().version = value,
        }
        Ok(())
    }

    async fn introspect(&mut self) -> MigrateResult<Schema> {
        Ok(self.state.lock().unwrap().schema.clone())
    }

    async fn close(&mut self) -> MigrateResult<()> {
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}
