//! The migration engine.
//!
//! [`MigrationEngine`] is the programmatic surface: configured entirely
//! from code (no config file), it exposes change detection, revision
//! generation, upgrade/downgrade, and their SQL-rendering variants. Each
//! operation is one session over one exclusively-owned connection.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use strata_schema::Schema;
use tokio::sync::RwLock;
use tracing::info;

use crate::connection::Database;
use crate::dialect::{PostgresDialect, SqlDialect};
use crate::differ::{CatalogDiffer, DiffResult, SchemaDiffer};
use crate::error::{MigrateResult, MigrationError};
use crate::executor::TransactionGranularity;
use crate::graph::{BASE, CURRENT, HEAD, RevisionGraph};
use crate::plan::{Direction, MigrationPlan, PlanResolver};
use crate::revision::Revision;
use crate::session::{MigrationSession, SessionContext, StepSource};
use crate::store::RevisionStore;
use crate::writer::ScriptWriter;

/// Engine configuration, supplied from application code.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory holding the revision records.
    pub script_dir: PathBuf,
    /// The declared target schema; required for autogeneration.
    pub target: Option<Schema>,
    /// When true, each step commits in its own transaction instead of
    /// one transaction wrapping the whole plan.
    pub transaction_per_migration: bool,
}

impl MigrationConfig {
    /// Create a configuration over a script directory.
    pub fn new(script_dir: impl Into<PathBuf>) -> Self {
        Self {
            script_dir: script_dir.into(),
            target: None,
            transaction_per_migration: false,
        }
    }

    /// Set the target schema description.
    pub fn target_schema(mut self, schema: Schema) -> Self {
        self.target = Some(schema);
        self
    }

    /// Commit each migration step in its own transaction.
    pub fn transaction_per_migration(mut self, per_step: bool) -> Self {
        self.transaction_per_migration = per_step;
        self
    }

    /// The transaction granularity this configuration selects.
    pub fn granularity(&self) -> TransactionGranularity {
        if self.transaction_per_migration {
            TransactionGranularity::PerStep
        } else {
            TransactionGranularity::WholePlan
        }
    }
}

/// Summary of where the database stands relative to the store.
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// The database's current revision id, `None` at base.
    pub current: Option<String>,
    /// Head revision ids, most recent first.
    pub heads: Vec<String>,
    /// Total revisions in the store.
    pub total: usize,
    /// Ids still to apply to reach head, oldest first. Empty when the
    /// history has branched (see `branched`).
    pub pending: Vec<String>,
    /// Whether the history has more than one head.
    pub branched: bool,
}

/// The main migration engine.
pub struct MigrationEngine<D: Database> {
    config: MigrationConfig,
    database: D,
    store: RevisionStore,
    differ: Box<dyn SchemaDiffer>,
    dialect: Box<dyn SqlDialect>,
    graph: RwLock<Option<Arc<RevisionGraph>>>,
}

impl<D: Database> MigrationEngine<D> {
    /// Create an engine with the default differ and dialect.
    pub fn new(config: MigrationConfig, database: D) -> Self {
        let store = RevisionStore::new(&config.script_dir);
        Self {
            config,
            database,
            store,
            differ: Box::new(CatalogDiffer::new()),
            dialect: Box::new(PostgresDialect::new()),
            graph: RwLock::new(None),
        }
    }

    /// Replace the schema differ.
    pub fn with_differ(mut self, differ: Box<dyn SchemaDiffer>) -> Self {
        self.differ = differ;
        self
    }

    /// Replace the SQL dialect.
    pub fn with_dialect(mut self, dialect: Box<dyn SqlDialect>) -> Self {
        self.dialect = dialect;
        self
    }

    /// The engine configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// The revision store.
    pub fn store(&self) -> &RevisionStore {
        &self.store
    }

    /// Bootstrap the engine: create the script directory and the
    /// version-pointer table.
    pub async fn initialize(&self) -> MigrateResult<()> {
        self.store.ensure_dir().await?;
        self.session().run_online(&mut NoopSource).await?;
        info!(dir = %self.config.script_dir.display(), "initialized migration engine");
        Ok(())
    }

    /// The revision graph, built from the store on first use and cached
    /// for the engine's lifetime.
    pub async fn graph(&self) -> MigrateResult<Arc<RevisionGraph>> {
        {
            let cached = self.graph.read().await;
            if let Some(graph) = cached.as_ref() {
                return Ok(graph.clone());
            }
        }

        let records = self.store.load_all().await?;
        let built = Arc::new(RevisionGraph::build(records)?);
        *self.graph.write().await = Some(built.clone());
        Ok(built)
    }

    /// Drop the cached graph and rebuild it from disk.
    pub async fn reload(&self) -> MigrateResult<()> {
        *self.graph.write().await = None;
        self.graph().await?;
        Ok(())
    }

    /// Whether the live database differs from the target schema.
    ///
    /// Shares its diff path with [`Self::new_migration`], so a `true`
    /// here is exactly "a new migration would be written".
    pub async fn has_changes(&self) -> MigrateResult<bool> {
        let diff = self.autogenerate().await?;
        Ok(!diff.is_empty())
    }

    /// Diff the live database against the target and persist the result
    /// as a new revision.
    ///
    /// Returns `true` when a revision was written; `false` means no
    /// changes were detected (and `allow_empty` was not set).
    pub async fn new_migration(
        &self,
        message: Option<&str>,
        allow_empty: bool,
    ) -> MigrateResult<bool> {
        let diff = self.autogenerate().await?;

        let graph = self.graph().await?;
        let writer = ScriptWriter::new(&self.store, &graph);
        let written = writer.write(&diff, message, allow_empty).await?;

        if written.is_some() {
            self.reload().await?;
        }
        Ok(written.is_some())
    }

    /// The revision the database currently points at, or `None` at base.
    pub async fn get_current(&self) -> MigrateResult<Option<Revision>> {
        let current = self.session().run_online(&mut NoopSource).await?;
        match current {
            None => Ok(None),
            Some(id) => {
                let graph = self.graph().await?;
                Ok(Some(graph.resolve_id(&id)?.clone()))
            }
        }
    }

    /// Migrate the database up to `revision` (`"head"` for the tip).
    pub async fn upgrade(&self, revision: &str) -> MigrateResult<()> {
        reject_range("upgrade", revision)?;
        self.apply(Direction::Up, revision).await
    }

    /// Migrate the database down to `revision` (`"base"` for everything).
    /// The named revision itself stays applied.
    pub async fn downgrade(&self, revision: &str) -> MigrateResult<()> {
        reject_range("downgrade", revision)?;
        self.apply(Direction::Down, revision).await
    }

    async fn apply(&self, direction: Direction, destination: &str) -> MigrateResult<()> {
        let graph = self.graph().await?;
        let mut source = ApplySource {
            graph: &graph,
            direction,
            destination: destination.to_string(),
        };
        self.session().run_online(&mut source).await?;
        Ok(())
    }

    /// Render the SQL an upgrade to `revision` would run, without
    /// touching the database state.
    ///
    /// `revision` may use range syntax `start:end`. When no starting
    /// revision is known, the database is consulted once for its current
    /// revision; pass `Some("base")` to render from the beginning.
    pub async fn show_upgrade_sql(
        &self,
        revision: &str,
        starting_revision: Option<&str>,
    ) -> MigrateResult<String> {
        self.render(Direction::Up, revision, starting_revision).await
    }

    /// Render the SQL a downgrade to `revision` would run.
    ///
    /// Accepts the same range syntax as [`Self::show_upgrade_sql`].
    pub async fn show_downgrade_sql(
        &self,
        revision: &str,
        starting_revision: Option<&str>,
    ) -> MigrateResult<String> {
        self.render(Direction::Down, revision, starting_revision).await
    }

    async fn render(
        &self,
        direction: Direction,
        revision: &str,
        starting_revision: Option<&str>,
    ) -> MigrateResult<String> {
        let (range_start, destination) = split_range(revision, starting_revision)?;

        let starting = match range_start.as_deref() {
            Some(CURRENT) | None => self.get_current().await?.map(|r| r.id),
            Some(BASE) => None,
            Some(explicit) => Some(explicit.to_string()),
        };

        let graph = self.graph().await?;
        let mut source = ApplySource {
            graph: &graph,
            direction,
            destination,
        };
        self.session()
            .run_offline(&mut source, starting.as_deref())
            .await
    }

    /// Summarize where the database stands relative to the store.
    pub async fn status(&self) -> MigrateResult<MigrationStatus> {
        let current = self.session().run_online(&mut NoopSource).await?;
        let graph = self.graph().await?;

        let heads = graph.heads().to_vec();
        let branched = heads.len() > 1;

        let pending = if branched {
            Vec::new()
        } else {
            PlanResolver::new(&graph)
                .resolve_upgrade(current.as_deref(), HEAD)?
                .steps
                .iter()
                .map(|s| s.revision.id.clone())
                .collect()
        };

        Ok(MigrationStatus {
            current,
            heads,
            total: graph.len(),
            pending,
            branched,
        })
    }

    /// Run the differ once, online, against the target schema.
    async fn autogenerate(&self) -> MigrateResult<DiffResult> {
        let mut source = AutogenerateSource {
            differ: self.differ.as_ref(),
            target: self.config.target.as_ref(),
            diff: None,
        };
        self.session().run_online(&mut source).await?;
        source
            .diff
            .ok_or_else(|| MigrationError::database("differ produced no result"))
    }

    fn session(&self) -> MigrationSession<'_> {
        MigrationSession::new(&self.database, self.dialect.as_ref(), self.config.granularity())
    }
}

/// Source that resolves a plan between the session's starting revision
/// and a destination.
struct ApplySource<'g> {
    graph: &'g RevisionGraph,
    direction: Direction,
    destination: String,
}

#[async_trait]
impl StepSource for ApplySource<'_> {
    async fn steps<'ctx, 'sc>(
        &mut self,
        current: Option<&str>,
        _ctx: &'ctx mut SessionContext<'sc>,
    ) -> MigrateResult<MigrationPlan>
    where
        'sc: 'ctx,
    {
        let resolver = PlanResolver::new(self.graph);
        match self.direction {
            Direction::Up => resolver.resolve_upgrade(current, &self.destination),
            Direction::Down => resolver.resolve_downgrade(current, &self.destination),
        }
    }
}

/// Source that runs the differ and keeps the result; its plan is empty.
struct AutogenerateSource<'a> {
    differ: &'a dyn SchemaDiffer,
    target: Option<&'a Schema>,
    diff: Option<DiffResult>,
}

#[async_trait]
impl StepSource for AutogenerateSource<'_> {
    async fn steps<'ctx, 'sc>(
        &mut self,
        _current: Option<&str>,
        ctx: &'ctx mut SessionContext<'sc>,
    ) -> MigrateResult<MigrationPlan>
    where
        'sc: 'ctx,
    {
        let target = self.target.ok_or_else(|| {
            MigrationError::configuration("autogeneration requires a target schema")
        })?;
        target.validate()?;

        let diff = self.differ.diff(target, ctx.connection()).await?;
        self.diff = Some(diff);
        Ok(MigrationPlan::empty())
    }
}

/// Source that does nothing; used to observe the current revision.
struct NoopSource;

#[async_trait]
impl StepSource for NoopSource {
    async fn steps<'ctx, 'sc>(
        &mut self,
        _current: Option<&str>,
        _ctx: &'ctx mut SessionContext<'sc>,
    ) -> MigrateResult<MigrationPlan>
    where
        'sc: 'ctx,
    {
        Ok(MigrationPlan::empty())
    }
}

/// Refuse range syntax where only a single destination makes sense.
fn reject_range(operation: &str, revision: &str) -> MigrateResult<()> {
    if revision.contains(':') {
        return Err(MigrationError::invalid_revision(format!(
            "range revision '{}' is not allowed for {}",
            revision, operation
        )));
    }
    Ok(())
}

/// Split `start:end` range syntax, falling back to the explicit starting
/// revision when the destination is a bare reference.
fn split_range(
    revision: &str,
    starting_revision: Option<&str>,
) -> MigrateResult<(Option<String>, String)> {
    match revision.split_once(':') {
        None => Ok((starting_revision.map(str::to_string), revision.to_string())),
        Some((start, end)) => {
            if starting_revision.is_some() {
                return Err(MigrationError::configuration(format!(
                    "range revision '{}' conflicts with an explicit starting revision",
                    revision
                )));
            }
            if start.is_empty() || end.is_empty() {
                return Err(MigrationError::invalid_revision(format!(
                    "malformed range revision '{}'",
                    revision
                )));
            }
            Ok((Some(start.to_string()), end.to_string()))
        }
    }
}
