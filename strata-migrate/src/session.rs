//! Migration sessions.
//!
//! A session is one run of the engine: either applying a range of
//! existing revisions or generating a new one from a fresh diff. Both go
//! through the same entry points here; what differs is the [`StepSource`]
//! that supplies the plan. Online sessions own their connection for the
//! whole run and release it on every exit path; offline sessions render
//! the same plan as literal SQL without ever touching a connection.

use async_trait::async_trait;

use crate::connection::{Connection, Database};
use crate::dialect::SqlDialect;
use crate::error::{MigrateResult, MigrationError};
use crate::executor::{ConnectionSink, Executor, RenderSink, TransactionGranularity};
use crate::plan::MigrationPlan;

/// What a running session exposes to its step source.
pub struct SessionContext<'a> {
    conn: Option<&'a mut dyn Connection>,
}

impl<'a> SessionContext<'a> {
    /// The session's live connection, if it has one.
    pub fn connection(&mut self) -> Option<&mut (dyn Connection + 'a)> {
        self.conn.as_mut().map(|c| &mut **c)
    }
}

/// Supplies the plan for one session.
///
/// This indirection is what lets one session entry point serve both
/// "apply existing revisions" (the source resolves a plan) and "generate
/// a revision from a fresh diff" (the source runs the differ, captures
/// the result, and returns an empty plan).
#[async_trait]
pub trait StepSource: Send {
    /// Produce the plan to execute, given the database's current revision
    /// (`None` when at base, or the caller-supplied starting revision for
    /// offline runs).
    async fn steps<'ctx, 'sc>(
        &mut self,
        current: Option<&str>,
        ctx: &'ctx mut SessionContext<'sc>,
    ) -> MigrateResult<MigrationPlan>
    where
        'sc: 'ctx;
}

/// One configured migration session.
pub struct MigrationSession<'e> {
    database: &'e dyn Database,
    dialect: &'e dyn SqlDialect,
    granularity: TransactionGranularity,
}

impl<'e> MigrationSession<'e> {
    /// Create a session.
    pub fn new(
        database: &'e dyn Database,
        dialect: &'e dyn SqlDialect,
        granularity: TransactionGranularity,
    ) -> Self {
        Self {
            database,
            dialect,
            granularity,
        }
    }

    /// Run online: acquire a connection, read the current revision, let
    /// the source build its plan, execute it, and release the connection
    /// whatever happens.
    ///
    /// Returns the revision the database was at when the session started.
    pub async fn run_online(&self, source: &mut dyn StepSource) -> MigrateResult<Option<String>> {
        let mut conn = match self.database.connect().await {
            Ok(conn) => conn,
            Err(MigrationError::Configuration(msg)) => {
                return Err(MigrationError::Configuration(msg));
            }
            Err(other) => {
                return Err(MigrationError::configuration(format!(
                    "online mode requires a reachable database: {}",
                    other
                )));
            }
        };

        let result = self.drive(conn.as_mut(), source).await;
        let close_result = conn.close().await;

        match result {
            Ok(current) => {
                close_result?;
                Ok(current)
            }
            Err(err) => {
                // The run's own error wins over a close failure.
                let _ = close_result;
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        conn: &mut dyn Connection,
        source: &mut dyn StepSource,
    ) -> MigrateResult<Option<String>> {
        conn.ensure_version_table().await?;
        let current = conn.current_revision().await?;

        let plan = {
            let mut ctx = SessionContext {
                conn: Some(&mut *conn),
            };
            source.steps(current.as_deref(), &mut ctx).await?
        };

        let executor = Executor::new(self.dialect, self.granularity);
        let mut sink = ConnectionSink::new(conn);
        executor.run(&plan, &mut sink, current.as_deref()).await?;

        Ok(current)
    }

    /// Run offline: no connection is acquired, the plan starts from the
    /// caller-supplied revision, and the result is the rendered SQL
    /// script, transaction markers included.
    pub async fn run_offline(
        &self,
        source: &mut dyn StepSource,
        starting: Option<&str>,
    ) -> MigrateResult<String> {
        let plan = {
            let mut ctx = SessionContext { conn: None };
            source.steps(starting, &mut ctx).await?
        };

        let executor = Executor::new(self.dialect, self.granularity);
        let mut sink = RenderSink::new(self.dialect);
        executor.run(&plan, &mut sink, starting).await?;

        Ok(sink.into_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::PostgresDialect;
    use crate::plan::{Direction, PlanStep};
    use crate::revision::Revision;

    /// Source returning a fixed plan.
    struct FixedSource {
        plan: MigrationPlan,
        saw_current: Option<Option<String>>,
    }

    #[async_trait]
    impl StepSource for FixedSource {
        async fn steps<'ctx, 'sc>(
            &mut self,
            current: Option<&str>,
            _ctx: &'ctx mut SessionContext<'sc>,
        ) -> MigrateResult<MigrationPlan>
        where
            'sc: 'ctx,
        {
            self.saw_current = Some(current.map(str::to_string));
            Ok(self.plan.clone())
        }
    }

    #[tokio::test]
    async fn test_offline_passes_starting_revision_and_renders() {
        let database = FailingDatabase;
        let dialect = PostgresDialect::new();
        let session =
            MigrationSession::new(&database, &dialect, TransactionGranularity::WholePlan);

        let step = PlanStep {
            revision: Revision::new("aaa111", vec![], vec![], vec![]),
            direction: Direction::Up,
            lands_on: Some("aaa111".to_string()),
        };
        let mut source = FixedSource {
            plan: MigrationPlan { steps: vec![step] },
            saw_current: None,
        };

        let sql = session
            .run_offline(&mut source, Some("zzz999"))
            .await
            .unwrap();

        assert_eq!(source.saw_current, Some(Some("zzz999".to_string())));
        assert!(sql.contains("BEGIN;"));
        assert!(sql.contains("-- Running upgrade zzz999 -> aaa111"));
    }

    /// Database whose connections are unreachable.
    struct FailingDatabase;

    #[async_trait]
    impl Database for FailingDatabase {
        async fn connect(&self) -> MigrateResult<Box<dyn Connection>> {
            Err(MigrationError::database("connection refused"))
        }
    }

    #[tokio::test]
    async fn test_online_without_reachable_database_is_configuration_error() {
        let database = FailingDatabase;
        let dialect = PostgresDialect::new();
        let session =
            MigrationSession::new(&database, &dialect, TransactionGranularity::WholePlan);

        let mut source = FixedSource {
            plan: MigrationPlan::empty(),
            saw_current: None,
        };

        let err = session.run_online(&mut source).await.unwrap_err();
        assert!(matches!(err, MigrationError::Configuration(_)));
        // The source never ran: the failure happened before any plan.
        assert!(source.saw_current.is_none());
    }
}
